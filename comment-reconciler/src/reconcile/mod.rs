//! Comment reconciler.
//!
//! Decides, for every placed finding and every comment we posted before,
//! whether to create, update, resolve (strike through) or delete. Runs one
//! pass per finding kind (errors, warnings, messages, markdown) so dedup
//! order within a kind is independent of the others.
//!
//! The function is pure: it produces a [`ReconciliationPlan`] and never
//! talks to a platform. Every "ours" comment ends up in exactly one of
//! `unchanged`, `to_update`, `to_resolve`, `to_delete` or `protected`.

pub mod render;

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::comments::PostedComment;
use crate::config::DismissPolicy;
use crate::findings::{Finding, FindingKind};
use crate::position::{Anchor, Placement};
use render::{Marker, ParsedBody};

/// An inline finding together with its resolved placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedFinding {
    pub finding: Finding,
    pub placement: Placement,
}

/// Everything one reconciliation pass needs.
#[derive(Debug, Clone)]
pub struct ReconcileInput<'a> {
    pub marker: &'a Marker,
    /// Inline findings in grouped `(file, line)` order.
    pub findings: &'a [PlacedFinding],
    /// Comments carrying our marker and a file.
    pub ours: &'a [PostedComment],
    /// All other comments; used to detect human replies.
    pub others: &'a [PostedComment],
    pub dismiss_out_of_range: &'a DismissPolicy,
}

/// A comment to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    pub finding: Finding,
    pub anchor: Anchor,
    pub body: String,
}

/// A new body for an existing comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentEdit {
    pub comment: PostedComment,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OverflowReason {
    OutOfRange,
    Invalid(String),
}

/// An inline finding that could not be attached to the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverflowFinding {
    pub finding: Finding,
    pub reason: OverflowReason,
}

/// Output of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub to_create: Vec<NewComment>,
    pub to_update: Vec<CommentEdit>,
    pub to_resolve: Vec<CommentEdit>,
    pub to_delete: Vec<PostedComment>,
    pub overflow: Vec<OverflowFinding>,
    /// Ids of ours comments that need no write.
    pub unchanged: Vec<String>,
    /// Ids of stale non-sticky comments kept because someone replied.
    pub protected: Vec<String>,
}

impl ReconciliationPlan {
    /// True when applying the plan performs no platform write.
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty()
            && self.to_update.is_empty()
            && self.to_resolve.is_empty()
            && self.to_delete.is_empty()
    }

    pub fn write_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_resolve.len() + self.to_delete.len()
    }
}

/// Parsed view of one of our comments.
struct OwnedComment<'a> {
    comment: &'a PostedComment,
    parsed: ParsedBody,
    fingerprint: String,
}

fn same_body(a: &str, b: &str) -> bool {
    a.replace("\r\n", "\n").trim_end() == b.replace("\r\n", "\n").trim_end()
}

/// Builds the plan for one run.
pub fn reconcile(input: ReconcileInput<'_>) -> ReconciliationPlan {
    let owned: Vec<OwnedComment<'_>> = input
        .ours
        .iter()
        .map(|c| {
            let parsed = render::parse_body(&c.body);
            let fingerprint = parsed.fingerprint();
            OwnedComment {
                comment: c,
                parsed,
                fingerprint,
            }
        })
        .collect();

    let mut plan = ReconciliationPlan::default();
    let mut matched: HashSet<usize> = HashSet::new();

    for kind in FindingKind::ALL {
        for pf in input.findings.iter().filter(|pf| pf.finding.kind == kind) {
            let finding = &pf.finding;
            let anchor = match &pf.placement {
                Placement::Anchored(a) => a,
                Placement::OutOfRange => {
                    if input.dismiss_out_of_range.dismisses(kind) {
                        debug!(
                            "reconcile: dismiss out-of-range {} at {:?}:{:?}",
                            kind,
                            finding.file(),
                            finding.line()
                        );
                    } else {
                        plan.overflow.push(OverflowFinding {
                            finding: finding.clone(),
                            reason: OverflowReason::OutOfRange,
                        });
                    }
                    continue;
                }
                Placement::Invalid(why) => {
                    debug!("reconcile: unplaceable {} finding: {}", kind, why);
                    plan.overflow.push(OverflowFinding {
                        finding: finding.clone(),
                        reason: OverflowReason::Invalid(why.clone()),
                    });
                    continue;
                }
            };

            let body = render::render_open(input.marker, finding);
            let fingerprint = render::finding_fingerprint(finding);

            let hit = owned.iter().enumerate().find(|(i, o)| {
                !matched.contains(i)
                    && o.fingerprint == fingerprint
                    && o.comment.anchor().as_ref() == Some(anchor)
            });

            match hit {
                Some((i, o)) => {
                    matched.insert(i);
                    if same_body(&o.comment.body, &body) {
                        debug!("reconcile: match unchanged id={}", o.comment.id);
                        plan.unchanged.push(o.comment.id.clone());
                    } else {
                        debug!("reconcile: match needs update id={}", o.comment.id);
                        plan.to_update.push(CommentEdit {
                            comment: o.comment.clone(),
                            body,
                        });
                    }
                }
                None => {
                    debug!(
                        "reconcile: new {} at {}:{}",
                        kind, anchor.file, anchor.position
                    );
                    plan.to_create.push(NewComment {
                        finding: finding.clone(),
                        anchor: anchor.clone(),
                        body,
                    });
                }
            }
        }
    }

    let stale = owned
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched.contains(i))
        .map(|(_, o)| o);

    for o in stale {
        let c = o.comment;
        match (o.parsed.sticky, o.parsed.kind) {
            (true, Some(kind)) => {
                let body = render::render_resolved(input.marker, kind, true, &o.parsed.text);
                if same_body(&c.body, &body) {
                    plan.unchanged.push(c.id.clone());
                } else {
                    debug!("reconcile: resolve sticky id={}", c.id);
                    plan.to_resolve.push(CommentEdit {
                        comment: c.clone(),
                        body,
                    });
                }
            }
            _ => {
                if input.others.iter().any(|h| c.shares_anchor_with(h)) {
                    debug!("reconcile: keep stale id={} (has replies)", c.id);
                    plan.protected.push(c.id.clone());
                } else {
                    debug!("reconcile: delete stale id={}", c.id);
                    plan.to_delete.push(c.clone());
                }
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> Marker {
        Marker::new("danger")
    }

    fn placed(finding: Finding, position: Option<u32>) -> PlacedFinding {
        let placement = match position {
            Some(p) => Placement::Anchored(Anchor {
                file: finding.file().unwrap_or_default().to_string(),
                position: p,
            }),
            None => Placement::OutOfRange,
        };
        PlacedFinding { finding, placement }
    }

    /// Simulates the platform after applying `plan` on top of `ours`.
    fn apply(ours: &[PostedComment], plan: &ReconciliationPlan) -> Vec<PostedComment> {
        let deleted: HashSet<&str> = plan.to_delete.iter().map(|c| c.id.as_str()).collect();
        let mut out: Vec<PostedComment> = ours
            .iter()
            .filter(|c| !deleted.contains(c.id.as_str()))
            .map(|c| {
                let edit = plan
                    .to_update
                    .iter()
                    .chain(plan.to_resolve.iter())
                    .find(|e| e.comment.id == c.id);
                match edit {
                    Some(e) => PostedComment {
                        body: e.body.clone(),
                        ..c.clone()
                    },
                    None => c.clone(),
                }
            })
            .collect();
        for (i, n) in plan.to_create.iter().enumerate() {
            out.push(PostedComment {
                id: format!("new-{}-{i}", out.len()),
                file: Some(n.anchor.file.clone()),
                position: Some(n.anchor.position),
                body: n.body.clone(),
                thread_id: None,
            });
        }
        out
    }

    fn run(
        findings: &[PlacedFinding],
        ours: &[PostedComment],
        others: &[PostedComment],
        dismiss: &DismissPolicy,
    ) -> ReconciliationPlan {
        let m = marker();
        reconcile(ReconcileInput {
            marker: &m,
            findings,
            ours,
            others,
            dismiss_out_of_range: dismiss,
        })
    }

    #[test]
    fn second_run_is_a_noop() {
        let findings = vec![
            placed(Finding::inline(FindingKind::Error, "boom", "a.rs", 3, false), Some(2)),
            placed(Finding::inline(FindingKind::Warning, "hmm", "a.rs", 4, true), Some(3)),
            placed(Finding::inline(FindingKind::Message, "fyi", "b.rs", 1, false), Some(0)),
        ];
        let dismiss = DismissPolicy::default();

        let first = run(&findings, &[], &[], &dismiss);
        assert_eq!(first.to_create.len(), 3);

        let ours = apply(&[], &first);
        let second = run(&findings, &ours, &[], &dismiss);
        assert!(second.is_noop(), "{second:?}");
        assert_eq!(second.unchanged.len(), 3);
    }

    #[test]
    fn sticky_resolution_round_trip() {
        let sticky = placed(
            Finding::inline(FindingKind::Warning, "Sure thing", "CHANGELOG.md", 4, true),
            Some(3),
        );
        let dismiss = DismissPolicy::default();

        let run1 = run(std::slice::from_ref(&sticky), &[], &[], &dismiss);
        let ours1 = apply(&[], &run1);

        let run2 = run(&[], &ours1, &[], &dismiss);
        assert_eq!(run2.to_resolve.len(), 1);
        assert!(run2.to_delete.is_empty());
        assert!(run2.to_resolve[0].body.contains("~~Sure thing~~"));
        let ours2 = apply(&ours1, &run2);

        // Still absent: already resolved, nothing to write.
        let run2b = run(&[], &ours2, &[], &dismiss);
        assert!(run2b.is_noop());

        let run3 = run(std::slice::from_ref(&sticky), &ours2, &[], &dismiss);
        assert!(run3.to_create.is_empty());
        assert_eq!(run3.to_update.len(), 1);
        assert_eq!(
            run3.to_update[0].body,
            render::render_open(&marker(), &sticky.finding)
        );
    }

    #[test]
    fn replies_protect_stale_comments() {
        let f = placed(Finding::inline(FindingKind::Error, "boom", "a.rs", 3, false), Some(2));
        let dismiss = DismissPolicy::default();
        let ours = apply(&[], &run(std::slice::from_ref(&f), &[], &[], &dismiss));

        let human = PostedComment {
            id: "h1".into(),
            file: Some("a.rs".into()),
            position: Some(2),
            body: "Fixed in next commit".into(),
            thread_id: None,
        };
        let plan = run(&[], &ours, std::slice::from_ref(&human), &dismiss);
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.protected, vec![ours[0].id.clone()]);

        let plan = run(&[], &ours, &[], &dismiss);
        assert_eq!(plan.to_delete.len(), 1);
    }

    #[test]
    fn dismiss_policy_per_kind() {
        let findings = vec![
            placed(Finding::inline(FindingKind::Error, "e", "a.rs", 90, false), None),
            placed(Finding::inline(FindingKind::Warning, "w", "a.rs", 91, false), None),
        ];
        let dismiss: DismissPolicy =
            serde_json::from_str(r#"{"error": true, "warning": false}"#).unwrap();
        let plan = run(&findings, &[], &[], &dismiss);

        assert!(plan.is_noop());
        assert_eq!(plan.overflow.len(), 1);
        assert_eq!(plan.overflow[0].finding.text, "w");
        assert_eq!(plan.overflow[0].reason, OverflowReason::OutOfRange);
    }

    #[test]
    fn invalid_placement_overflows_without_blocking_others() {
        let findings = vec![
            PlacedFinding {
                finding: Finding::inline(FindingKind::Error, "bad", "a.rs", 0, false),
                placement: Placement::Invalid("line 0".into()),
            },
            placed(Finding::inline(FindingKind::Error, "good", "a.rs", 3, false), Some(2)),
        ];
        let plan = run(&findings, &[], &[], &DismissPolicy::All(true));
        assert_eq!(plan.overflow.len(), 1);
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].finding.text, "good");
    }

    #[test]
    fn moved_finding_replaces_comment() {
        let dismiss = DismissPolicy::default();
        let before = placed(Finding::inline(FindingKind::Error, "boom", "a.rs", 3, false), Some(2));
        let ours = apply(&[], &run(std::slice::from_ref(&before), &[], &[], &dismiss));

        let after = placed(Finding::inline(FindingKind::Error, "boom", "a.rs", 5, false), Some(4));
        let plan = run(std::slice::from_ref(&after), &ours, &[], &dismiss);
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_delete.len(), 1);
    }

    #[test]
    fn changed_commit_link_updates_in_place() {
        let dismiss = DismissPolicy::default();
        let link = |sha: &str| format!("see https://github.com/o/r/blob/{sha}/a.rs#L3");
        let old = placed(
            Finding::inline(FindingKind::Warning, link("1111111111111111111111111111111111111111"), "a.rs", 3, false),
            Some(2),
        );
        let ours = apply(&[], &run(std::slice::from_ref(&old), &[], &[], &dismiss));

        let new = placed(
            Finding::inline(FindingKind::Warning, link("2222222222222222222222222222222222222222"), "a.rs", 3, false),
            Some(2),
        );
        let plan = run(std::slice::from_ref(&new), &ours, &[], &dismiss);
        assert!(plan.to_create.is_empty());
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.to_update.len(), 1);
    }

    #[test]
    fn duplicate_comments_first_wins() {
        let dismiss = DismissPolicy::default();
        let f = placed(Finding::inline(FindingKind::Error, "boom", "a.rs", 3, false), Some(2));
        let body = render::render_open(&marker(), &f.finding);
        let dup = |id: &str| PostedComment {
            id: id.into(),
            file: Some("a.rs".into()),
            position: Some(2),
            body: body.clone(),
            thread_id: None,
        };
        let ours = vec![dup("c1"), dup("c2")];

        let plan = run(std::slice::from_ref(&f), &ours, &[], &dismiss);
        assert_eq!(plan.unchanged, vec!["c1".to_string()]);
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].id, "c2");
    }

    #[test]
    fn every_owned_comment_is_classified_once() {
        let dismiss = DismissPolicy::default();
        let keep = placed(Finding::inline(FindingKind::Error, "keep", "a.rs", 1, false), Some(0));
        let sticky = placed(Finding::inline(FindingKind::Warning, "sticky", "a.rs", 2, true), Some(1));
        let gone = placed(Finding::inline(FindingKind::Message, "gone", "a.rs", 3, false), Some(2));
        let replied = placed(Finding::inline(FindingKind::Message, "replied", "b.rs", 3, false), Some(2));
        let all = vec![keep.clone(), sticky, gone, replied];
        let ours = apply(&[], &run(&all, &[], &[], &dismiss));
        let human = PostedComment {
            id: "h".into(),
            file: Some("b.rs".into()),
            position: Some(2),
            body: "why?".into(),
            thread_id: None,
        };

        let plan = run(std::slice::from_ref(&keep), &ours, std::slice::from_ref(&human), &dismiss);
        let mut seen: Vec<String> = plan.unchanged.clone();
        seen.extend(plan.protected.iter().cloned());
        seen.extend(plan.to_update.iter().map(|e| e.comment.id.clone()));
        seen.extend(plan.to_resolve.iter().map(|e| e.comment.id.clone()));
        seen.extend(plan.to_delete.iter().map(|c| c.id.clone()));
        seen.sort();
        let mut expected: Vec<String> = ours.iter().map(|c| c.id.clone()).collect();
        expected.sort();
        assert_eq!(seen, expected);
        assert_eq!(plan.to_resolve.len(), 1);
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.protected.len(), 1);
    }
}
