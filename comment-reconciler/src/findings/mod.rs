//! Findings reported by a build, and the grouper that splits them into
//! inline-capable and general batches.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, MrResult};

/// Closed set of finding kinds. Declaration order is the processing order
/// used by the reconciler and the summary (errors first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Error,
    Warning,
    Message,
    Markdown,
}

impl FindingKind {
    pub const ALL: [FindingKind; 4] = [
        FindingKind::Error,
        FindingKind::Warning,
        FindingKind::Message,
        FindingKind::Markdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Error => "error",
            FindingKind::Warning => "warning",
            FindingKind::Message => "message",
            FindingKind::Markdown => "markdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "errors" | "fail" | "failure" => Some(FindingKind::Error),
            "warning" | "warnings" | "warn" => Some(FindingKind::Warning),
            "message" | "messages" => Some(FindingKind::Message),
            "markdown" | "markdowns" => Some(FindingKind::Markdown),
            _ => None,
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File + new-file line (1-based) a finding is attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FindingLocation {
    pub file: String,
    pub line: u32,
}

/// One reported item. Immutable once produced.
///
/// `file` and `line` are either both present or both absent; the
/// `Option<FindingLocation>` shape makes that impossible to violate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFinding", into = "RawFinding")]
pub struct Finding {
    pub kind: FindingKind,
    pub text: String,
    pub location: Option<FindingLocation>,
    pub sticky: bool,
}

/// Wire shape: flat `file`/`line` fields as produced by the DSL layer.
#[derive(Debug, Serialize, Deserialize)]
struct RawFinding {
    kind: FindingKind,
    #[serde(alias = "message")]
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(default)]
    sticky: bool,
}

impl From<Finding> for RawFinding {
    fn from(f: Finding) -> Self {
        let (file, line) = match f.location {
            Some(FindingLocation { file, line }) => (Some(file), Some(line)),
            None => (None, None),
        };
        Self {
            kind: f.kind,
            text: f.text,
            file,
            line,
            sticky: f.sticky,
        }
    }
}

impl TryFrom<RawFinding> for Finding {
    type Error = Error;

    fn try_from(raw: RawFinding) -> MrResult<Self> {
        Finding::new(raw.kind, raw.text, raw.file, raw.line, raw.sticky)
    }
}

impl Finding {
    /// Builds a finding, rejecting a half-specified location.
    pub fn new(
        kind: FindingKind,
        text: impl Into<String>,
        file: Option<String>,
        line: Option<u32>,
        sticky: bool,
    ) -> MrResult<Self> {
        let location = match (file, line) {
            (Some(file), Some(line)) => Some(FindingLocation { file, line }),
            (None, None) => None,
            (Some(file), None) => {
                return Err(Error::Validation(format!(
                    "finding for file {file:?} has no line"
                )));
            }
            (None, Some(line)) => {
                return Err(Error::Validation(format!(
                    "finding for line {line} has no file"
                )));
            }
        };
        Ok(Self {
            kind,
            text: text.into(),
            location,
            sticky,
        })
    }

    /// Finding without a location (goes to the summary).
    pub fn general(kind: FindingKind, text: impl Into<String>, sticky: bool) -> Self {
        Self {
            kind,
            text: text.into(),
            location: None,
            sticky,
        }
    }

    /// Finding attached to `file:line`.
    pub fn inline(
        kind: FindingKind,
        text: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        sticky: bool,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            location: Some(FindingLocation {
                file: file.into(),
                line,
            }),
            sticky,
        }
    }

    pub fn is_inline(&self) -> bool {
        self.location.is_some()
    }

    pub fn file(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.file.as_str())
    }

    pub fn line(&self) -> Option<u32> {
        self.location.as_ref().map(|l| l.line)
    }
}

/// Output of [`group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedFindings {
    /// Findings without a location, in input order.
    pub general: Vec<Finding>,
    /// Located findings sorted by `(file, line)`.
    pub inline: Vec<Finding>,
}

/// Splits findings by presence of a location and sorts the inline ones by
/// `(file, line)`. The sort is stable, so equal keys keep input order.
pub fn group(findings: impl IntoIterator<Item = Finding>) -> GroupedFindings {
    let (mut inline, general): (Vec<Finding>, Vec<Finding>) =
        findings.into_iter().partition(Finding::is_inline);
    inline.sort_by(|a, b| a.location.cmp(&b.location));
    GroupedFindings { general, inline }
}
