//! Comments already present on a change request, split into the ones this
//! tool instance owns and everything else.

use serde::{Deserialize, Serialize};

use crate::position::Anchor;
use crate::reconcile::render::Marker;

/// A comment as fetched from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedComment {
    /// Platform-assigned identifier.
    pub id: String,
    pub file: Option<String>,
    /// Platform anchor: diff position or new-file line depending on the
    /// platform's [`AnchorStyle`](crate::position::AnchorStyle).
    pub position: Option<u32>,
    pub body: String,
    /// Discussion/thread id on platforms with threaded discussions.
    pub thread_id: Option<String>,
}

impl PostedComment {
    /// `(file, position)` when the comment is attached to a diff line.
    pub fn anchor(&self) -> Option<Anchor> {
        Some(Anchor {
            file: self.file.clone()?,
            position: self.position?,
        })
    }

    /// True if `other` sits on the same thread or the same anchor.
    pub fn shares_anchor_with(&self, other: &PostedComment) -> bool {
        if self.thread_id.is_some() && self.thread_id == other.thread_id {
            return true;
        }
        match (self.anchor(), other.anchor()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Fetched comments split by ownership.
#[derive(Debug, Clone, Default)]
pub struct CommentSet {
    /// Ours, attached to a file (inline or outdated inline).
    pub ours: Vec<PostedComment>,
    /// Ours without a file (e.g. the summary comment); never reconciled here.
    pub ours_general: Vec<PostedComment>,
    /// Comments without the marker (humans, other bots, other instances).
    pub others: Vec<PostedComment>,
}

/// Splits comments by presence of `marker`, keeping fetch order.
pub fn partition(comments: Vec<PostedComment>, marker: &Marker) -> CommentSet {
    let mut set = CommentSet::default();
    for c in comments {
        if !marker.is_in(&c.body) {
            set.others.push(c);
        } else if c.file.is_some() {
            set.ours.push(c);
        } else {
            set.ours_general.push(c);
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, file: Option<&str>, position: Option<u32>, body: &str) -> PostedComment {
        PostedComment {
            id: id.into(),
            file: file.map(Into::into),
            position,
            body: body.into(),
            thread_id: None,
        }
    }

    #[test]
    fn partition_by_marker_and_location() {
        let marker = Marker::new("danger");
        let set = partition(
            vec![
                comment("1", Some("a.rs"), Some(2), "<!-- generated_by_danger kind=error sticky=false -->\nx"),
                comment("2", None, None, "summary generated_by_danger"),
                comment("3", Some("a.rs"), Some(2), "I disagree"),
                comment("4", Some("a.rs"), Some(2), "<!-- generated_by_other kind=error sticky=false -->"),
            ],
            &marker,
        );
        let ids = |v: &[PostedComment]| v.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&set.ours), vec!["1"]);
        assert_eq!(ids(&set.ours_general), vec!["2"]);
        assert_eq!(ids(&set.others), vec!["3", "4"]);
    }

    #[test]
    fn shared_anchor_by_thread_or_position() {
        let mut a = comment("1", Some("a.rs"), Some(2), "");
        let b = comment("2", Some("a.rs"), Some(2), "");
        let mut c = comment("3", Some("a.rs"), None, "");
        assert!(a.shares_anchor_with(&b));
        assert!(!a.shares_anchor_with(&c));

        a.thread_id = Some("t1".into());
        c.thread_id = Some("t1".into());
        assert!(a.shares_anchor_with(&c));
    }
}
