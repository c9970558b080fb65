//! Position resolver: maps `(file, new-file line)` onto a diff anchor.
//!
//! Scan is forward and first-match: the first non-removed line carrying the
//! requested new-file number wins. A request for a line before the start of
//! the next hunk stops the scan, since hunks are ordered.

use serde::Serialize;

use crate::findings::Finding;
use crate::parser::{DiffIndex, FileDiff};

/// Where a line sits inside the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedLine {
    /// Diff-relative position (0 = first line after the first hunk header).
    pub position: u32,
    /// The requested new-file line.
    pub new_line: u32,
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Found(ResolvedLine),
    OutOfRange,
}

/// How a platform anchors inline comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnchorStyle {
    /// Diff position (GitHub review comments).
    DiffPosition,
    /// New-file line number (GitLab discussions).
    NewLine,
}

impl AnchorStyle {
    /// Platform anchor value for a resolved line.
    pub fn anchor_value(&self, r: ResolvedLine) -> u32 {
        match self {
            AnchorStyle::DiffPosition => r.position,
            AnchorStyle::NewLine => r.new_line,
        }
    }
}

/// `(file, position)` as stored on a platform comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Anchor {
    pub file: String,
    pub position: u32,
}

/// Placement of a single inline finding, computed before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Placement {
    Anchored(Anchor),
    OutOfRange,
    /// The finding could not be matched against the diff at all.
    Invalid(String),
}

/// Resolves `line` of `file` against the index.
pub fn resolve(index: &DiffIndex, file: &str, line: u32) -> Resolution {
    match index.file(file) {
        Some(f) => resolve_in_file(f, line),
        None => Resolution::OutOfRange,
    }
}

fn resolve_in_file(file: &FileDiff, line: u32) -> Resolution {
    for hunk in &file.hunks {
        if line < hunk.new_start {
            break;
        }
        let hit = hunk
            .lines
            .iter()
            .find(|l| l.new_line == Some(line));
        if let Some(l) = hit {
            return Resolution::Found(ResolvedLine {
                position: l.position,
                new_line: line,
            });
        }
    }
    Resolution::OutOfRange
}

/// Computes the placement of an inline finding for the given anchor style.
pub fn place(index: &DiffIndex, finding: &Finding, style: AnchorStyle) -> Placement {
    let Some(loc) = finding.location.as_ref() else {
        return Placement::Invalid("finding has no location".into());
    };
    if loc.line == 0 {
        return Placement::Invalid(format!("line 0 in {}", loc.file));
    }
    if loc.file.trim().is_empty() {
        return Placement::Invalid("empty file path".into());
    }
    match resolve(index, &loc.file, loc.line) {
        Resolution::Found(r) => Placement::Anchored(Anchor {
            file: loc.file.clone(),
            position: style.anchor_value(r),
        }),
        Resolution::OutOfRange => Placement::OutOfRange,
    }
}
