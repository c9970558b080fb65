//! Provider-agnostic identifiers shared by the platform adapters.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, MrResult};

/// Supported providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderKind {
    GitLab,
    GitHub,
}

impl ProviderKind {
    pub fn parse(s: &str) -> MrResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            other => Err(ConfigError::UnknownProvider(other.to_string()).into()),
        }
    }

    /// Public API base used when none is configured.
    pub fn default_base_api(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "https://api.github.com",
            ProviderKind::GitLab => "https://gitlab.com/api/v4",
        }
    }
}

/// A unique reference to a change request inside a provider.
///
/// * `project` – GitLab: numeric ID or "group/project"; GitHub: "owner/repo".
/// * `iid`     – GitLab MR IID or GitHub PR number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeRequestId {
    pub project: String,
    pub iid: u64,
}

/// Triple of SHAs used to bind inline comments reliably.
///
/// GitLab exposes base/start/head; GitHub only needs head.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffRefs {
    pub base_sha: String,
    pub start_sha: Option<String>,
    pub head_sha: String,
}
