//! Unified-diff indexer.
//!
//! Features:
//! - Splits a multi-file diff on `diff --git` / `+++ b/<path>` headers
//!   (a trailing tab after the path is tolerated).
//! - Annotates every body line with a diff-relative `position` and, for
//!   context/added lines, the new-file line number.
//! - Never fails: sections without a `+++` header are skipped, malformed hunk
//!   headers close the current hunk.
//!
//! Position numbering is per file. `0` is the first line after the file's
//! first `@@` header; every later line counts one, including removed lines,
//! `\ No newline at end of file` markers and subsequent `@@` headers.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Kind of a single diff body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineKind {
    Context,
    Added,
    Removed,
    NoNewline,
}

/// One body line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line content without the leading `+`/`-`/` ` marker.
    pub text: String,
    /// Diff-relative position (see module docs).
    pub position: u32,
    /// New-file line number; `None` for removed lines and markers.
    pub new_line: Option<u32>,
}

/// A diff hunk (continuous block of changes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

/// All hunks of one file, keyed by its new path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: String,
    pub is_binary: bool,
    pub hunks: Vec<DiffHunk>,
}

/// Parsed diff. Re-parsing the same text always yields an equal index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffIndex {
    pub files: Vec<FileDiff>,
}

impl DiffIndex {
    /// First section for `path` in diff order.
    pub fn file(&self, path: &str) -> Option<&FileDiff> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sections git reported as binary; they never carry hunks.
    pub fn binary_files(&self) -> impl Iterator<Item = &FileDiff> {
        self.files.iter().filter(|f| f.is_binary)
    }
}

fn hunk_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk regex")
    })
}

/// Mutable cursor state while walking one file section.
struct Builder {
    files: Vec<FileDiff>,
    file: Option<FileDiff>,
    hunk: Option<DiffHunk>,
    old_left: u32,
    new_left: u32,
    next_position: u32,
    seen_hunk: bool,
    /// Next new-file line; `None` once it ran past `u32::MAX`.
    new_cursor: Option<u32>,
}

impl Builder {
    fn new() -> Self {
        Self {
            files: Vec::new(),
            file: None,
            hunk: None,
            old_left: 0,
            new_left: 0,
            next_position: 0,
            seen_hunk: false,
            new_cursor: None,
        }
    }

    fn in_body(&self) -> bool {
        self.hunk.is_some() && (self.old_left > 0 || self.new_left > 0)
    }

    fn close_hunk(&mut self) {
        if let Some(h) = self.hunk.take() {
            if let Some(f) = self.file.as_mut() {
                f.hunks.push(h);
            }
        }
        self.old_left = 0;
        self.new_left = 0;
    }

    fn close_file(&mut self) {
        self.close_hunk();
        if let Some(f) = self.file.take() {
            self.files.push(f);
        }
    }

    fn open_file(&mut self, path: String) {
        self.close_file();
        self.file = Some(FileDiff {
            path,
            is_binary: false,
            hunks: Vec::new(),
        });
        self.next_position = 0;
        self.seen_hunk = false;
    }

    fn open_hunk(&mut self, old_start: u32, old_count: u32, new_start: u32, new_count: u32) {
        self.close_hunk();
        if self.seen_hunk {
            // Later hunk headers occupy a position of their own.
            self.next_position += 1;
        }
        self.seen_hunk = true;
        self.old_left = old_count;
        self.new_left = new_count;
        self.new_cursor = Some(new_start);
        self.hunk = Some(DiffHunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines: Vec::new(),
        });
    }

    fn push(&mut self, kind: LineKind, text: &str) {
        let Some(hunk) = self.hunk.as_mut() else {
            return;
        };
        let new_line = match kind {
            LineKind::Context | LineKind::Added => {
                let n = self.new_cursor;
                self.new_cursor = n.and_then(|n| n.checked_add(1));
                n
            }
            LineKind::Removed | LineKind::NoNewline => None,
        };
        match kind {
            LineKind::Context => {
                self.old_left = self.old_left.saturating_sub(1);
                self.new_left = self.new_left.saturating_sub(1);
            }
            LineKind::Added => self.new_left = self.new_left.saturating_sub(1),
            LineKind::Removed => self.old_left = self.old_left.saturating_sub(1),
            LineKind::NoNewline => {}
        }
        hunk.lines.push(DiffLine {
            kind,
            text: text.to_string(),
            position: self.next_position,
            new_line,
        });
        self.next_position += 1;
    }

    /// Body line classification; `None` when the line is not a body line.
    fn body_kind(line: &str) -> Option<(LineKind, &str)> {
        if line.is_empty() {
            // Some platforms strip the single space of blank context lines.
            return Some((LineKind::Context, ""));
        }
        if let Some(rest) = line.strip_prefix('+') {
            return Some((LineKind::Added, rest));
        }
        if let Some(rest) = line.strip_prefix('-') {
            return Some((LineKind::Removed, rest));
        }
        if let Some(rest) = line.strip_prefix(' ') {
            return Some((LineKind::Context, rest));
        }
        if line.starts_with('\\') {
            return Some((LineKind::NoNewline, line));
        }
        None
    }
}

/// Parses unified diff text into a per-file index.
pub fn parse(diff: &str) -> DiffIndex {
    let mut b = Builder::new();

    for line in diff.lines() {
        if b.in_body() {
            if let Some((kind, text)) = Builder::body_kind(line) {
                b.push(kind, text);
                continue;
            }
            // Counts promised more lines than arrived; treat as header area.
            b.close_hunk();
        }

        if line.starts_with("diff --git ") {
            b.close_file();
            continue;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            match new_path(rest) {
                Some(path) => b.open_file(path),
                // `/dev/null`: deleted file, nothing to anchor on.
                None => b.close_file(),
            }
            continue;
        }
        if line.starts_with("@@") {
            if b.file.is_none() {
                continue;
            }
            match parse_hunk_header(line) {
                Some((os, oc, ns, nc)) => b.open_hunk(os, oc, ns, nc),
                None => b.close_hunk(),
            }
            continue;
        }
        if line.starts_with("--- ") {
            b.close_hunk();
            continue;
        }
        if b.hunk.is_some() {
            // Hunk counts are exhausted; keep trailing markers and tolerate
            // stray body lines of hunks with understated counts.
            if let Some((kind, text)) = Builder::body_kind(line) {
                if !line.is_empty() {
                    b.push(kind, text);
                }
                continue;
            }
        }
        if looks_like_binary_patch(line) {
            if let Some(f) = b.file.as_mut() {
                f.is_binary = true;
            }
        }
    }

    b.close_file();
    DiffIndex { files: b.files }
}

/// Extracts the path from the text after `+++ `. Accepts `b/<path>` with an
/// optional trailing tab (and anything after it).
fn new_path(rest: &str) -> Option<String> {
    let rest = rest.split('\t').next().unwrap_or(rest);
    let path = rest.strip_prefix("b/")?;
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

/// Parses `@@ -a[,b] +c[,d] @@`; omitted counts default to 1.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let caps = hunk_header_re().captures(line)?;
    let num = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };
    Some((num(1, 0)?, num(2, 1)?, num(3, 0)?, num(4, 1)?))
}

/// Simple heuristic to detect binary patches or messages in unified diff.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}
