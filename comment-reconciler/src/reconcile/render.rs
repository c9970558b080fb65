//! Comment body rendering, parsing and normalization.
//!
//! Body layout (first line is hidden on every platform that renders HTML):
//!
//! ```text
//! <!-- generated_by_danger kind=warning sticky=true -->
//! :warning: Sure thing
//! ```
//!
//! The resolved form swaps the prefix for `:white_check_mark:`, strikes
//! through every non-empty text line and appends `resolved` to the header.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::findings::{Finding, FindingKind};

const RESOLVED_PREFIX: &str = ":white_check_mark:";

/// Marker token identifying comments of one tool instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker(String);

impl Marker {
    pub fn new(danger_id: &str) -> Self {
        Self(format!("generated_by_{danger_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `body` carries this exact token (not a longer id sharing
    /// the prefix, e.g. `generated_by_danger2` for `generated_by_danger`).
    pub fn is_in(&self, body: &str) -> bool {
        body.match_indices(self.0.as_str()).any(|(i, m)| {
            body[i + m.len()..]
                .chars()
                .next()
                .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        })
    }
}

/// Metadata and text recovered from a body we rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBody {
    /// `None` when the body carries the marker but not our header layout.
    pub kind: Option<FindingKind>,
    pub sticky: bool,
    pub resolved: bool,
    pub text: String,
}

impl ParsedBody {
    /// Matching key: digest over kind + normalized text.
    pub fn fingerprint(&self) -> String {
        let kind = self.kind.map(|k| k.as_str()).unwrap_or("?");
        fingerprint(kind, &self.text)
    }
}

fn emoji(kind: FindingKind) -> Option<&'static str> {
    match kind {
        FindingKind::Error => Some(":no_entry_sign:"),
        FindingKind::Warning => Some(":warning:"),
        FindingKind::Message => Some(":book:"),
        FindingKind::Markdown => None,
    }
}

fn header(marker: &Marker, kind: FindingKind, sticky: bool, resolved: bool) -> String {
    let mut h = format!("<!-- {} kind={} sticky={}", marker.as_str(), kind, sticky);
    if resolved {
        h.push_str(" resolved");
    }
    h.push_str(" -->");
    h
}

/// Normal (open) rendering of an inline finding.
pub fn render_open(marker: &Marker, finding: &Finding) -> String {
    let head = header(marker, finding.kind, finding.sticky, false);
    match emoji(finding.kind) {
        Some(e) => format!("{head}\n{e} {}", finding.text),
        None => format!("{head}\n{}", finding.text),
    }
}

/// Resolved rendering for a comment whose finding no longer recurs.
pub fn render_resolved(marker: &Marker, kind: FindingKind, sticky: bool, text: &str) -> String {
    let struck: Vec<String> = text
        .lines()
        .map(|l| {
            if l.trim().is_empty() {
                l.to_string()
            } else {
                format!("~~{l}~~")
            }
        })
        .collect();
    format!(
        "{}\n{RESOLVED_PREFIX} {}",
        header(marker, kind, sticky, true),
        struck.join("\n")
    )
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^<!--\s*generated_by_[A-Za-z0-9_-]+\s+kind=(\w+)\s+sticky=(true|false)(\s+resolved)?\s*-->$",
        )
        .expect("valid header regex")
    })
}

fn any_marker_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!--[^>]*generated_by_[A-Za-z0-9_-]+.*?-->").expect("valid marker regex")
    })
}

/// Recovers kind/sticky/resolved/text from a body. Bodies in an unknown
/// layout still yield their text with marker comments removed.
pub fn parse_body(body: &str) -> ParsedBody {
    let body = body.replace("\r\n", "\n");
    let (first, rest) = body.split_once('\n').unwrap_or((body.as_str(), ""));

    let parsed = header_re()
        .captures(first.trim())
        .and_then(|c| Some((FindingKind::parse(c.get(1)?.as_str())?, c)));

    let Some((kind, caps)) = parsed else {
        let text = any_marker_comment_re().replace_all(&body, "");
        return ParsedBody {
            kind: None,
            sticky: false,
            resolved: false,
            text: text.trim().to_string(),
        };
    };

    let sticky = caps.get(2).is_some_and(|m| m.as_str() == "true");
    let resolved = caps.get(3).is_some();

    let text = if resolved {
        let t = rest.strip_prefix(RESOLVED_PREFIX).unwrap_or(rest);
        let t = t.strip_prefix(' ').unwrap_or(t);
        t.lines()
            .map(|l| {
                l.strip_prefix("~~")
                    .and_then(|s| s.strip_suffix("~~"))
                    .unwrap_or(l)
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        match emoji(kind) {
            Some(e) => {
                let t = rest.strip_prefix(e).unwrap_or(rest);
                t.strip_prefix(' ').unwrap_or(t).to_string()
            }
            None => rest.to_string(),
        }
    };

    ParsedBody {
        kind: Some(kind),
        sticky,
        resolved,
        text,
    }
}

fn commit_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/(blob|tree|commit|commits|raw|src)/[0-9a-fA-F]{7,40}(/|\b)")
            .expect("valid commit path regex")
    })
}

fn commit_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([?&](?:sha|ref|commit|at)=)[0-9a-fA-F]{7,40}\b")
            .expect("valid commit query regex")
    })
}

/// Strips volatile, commit-hash-bearing URL segments and trailing
/// whitespace so the same finding matches across commits.
pub fn normalize_text(text: &str) -> String {
    let t = commit_path_re().replace_all(text, "/$1/<sha>$2");
    let t = commit_query_re().replace_all(&t, "${1}<sha>");
    t.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Stable digest of `kind` + normalized `text`.
pub fn fingerprint(kind: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_text(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a fresh finding, comparable with [`ParsedBody::fingerprint`].
pub fn finding_fingerprint(finding: &Finding) -> String {
    fingerprint(finding.kind.as_str(), &finding.text)
}
