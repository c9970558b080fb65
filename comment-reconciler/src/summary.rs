//! Summary aggregation: general findings plus overflow, grouped by kind, for
//! the external summary-comment renderer.

use serde::Serialize;

use crate::findings::{Finding, FindingKind};
use crate::reconcile::{OverflowFinding, OverflowReason};

/// One row of the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub text: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub sticky: bool,
    /// True when the finding was meant to be inline but could not be placed.
    pub escalated: bool,
}

impl SummaryEntry {
    fn general(f: &Finding) -> Self {
        Self {
            text: f.text.clone(),
            file: f.file().map(str::to_string),
            line: f.line(),
            sticky: f.sticky,
            escalated: false,
        }
    }

    fn escalated(o: &OverflowFinding) -> Self {
        Self {
            escalated: true,
            ..Self::general(&o.finding)
        }
    }
}

/// Consolidated document for the main change-request comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryDocument {
    pub errors: Vec<SummaryEntry>,
    pub warnings: Vec<SummaryEntry>,
    pub messages: Vec<SummaryEntry>,
    pub markdowns: Vec<SummaryEntry>,
}

impl SummaryDocument {
    pub fn entries(&self, kind: FindingKind) -> &[SummaryEntry] {
        match kind {
            FindingKind::Error => &self.errors,
            FindingKind::Warning => &self.warnings,
            FindingKind::Message => &self.messages,
            FindingKind::Markdown => &self.markdowns,
        }
    }

    fn bucket(&mut self, kind: FindingKind) -> &mut Vec<SummaryEntry> {
        match kind {
            FindingKind::Error => &mut self.errors,
            FindingKind::Warning => &mut self.warnings,
            FindingKind::Message => &mut self.messages,
            FindingKind::Markdown => &mut self.markdowns,
        }
    }

    pub fn len(&self) -> usize {
        FindingKind::ALL.iter().map(|k| self.entries(*k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A run with errors in the summary should fail the status check.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Groups general findings, then overflow, by kind. Input order is kept
/// inside each kind.
pub fn aggregate(general: &[Finding], overflow: &[OverflowFinding]) -> SummaryDocument {
    let mut doc = SummaryDocument::default();
    for f in general {
        doc.bucket(f.kind).push(SummaryEntry::general(f));
    }
    for o in overflow {
        if let OverflowReason::Invalid(why) = &o.reason {
            tracing::debug!("summary: escalating unplaceable finding ({})", why);
        }
        doc.bucket(o.finding.kind).push(SummaryEntry::escalated(o));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_kind_general_first() {
        let general = vec![
            Finding::general(FindingKind::Warning, "w-general", false),
            Finding::general(FindingKind::Error, "e-general", false),
            Finding::general(FindingKind::Markdown, "## md", false),
        ];
        let overflow = vec![OverflowFinding {
            finding: Finding::inline(FindingKind::Warning, "w-inline", "a.rs", 99, true),
            reason: OverflowReason::OutOfRange,
        }];

        let doc = aggregate(&general, &overflow);
        assert_eq!(doc.len(), 4);
        assert!(doc.has_errors());
        let warnings: Vec<&str> = doc.warnings.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(warnings, vec!["w-general", "w-inline"]);
        assert!(doc.warnings[1].escalated);
        assert_eq!(doc.warnings[1].file.as_deref(), Some("a.rs"));
        assert_eq!(doc.warnings[1].line, Some(99));
        assert!(doc.messages.is_empty());
    }

    #[test]
    fn empty_inputs_give_empty_document() {
        let doc = aggregate(&[], &[]);
        assert!(doc.is_empty());
        assert!(!doc.has_errors());
    }
}
