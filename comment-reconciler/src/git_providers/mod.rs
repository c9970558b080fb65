//! Platform facade w/o async-trait or dynamic trait objects.
//!
//! The engine needs five operations from a platform (fetch diff, fetch
//! comments, create/update/delete a comment). They are expressed as the
//! [`CommentPlatform`] trait with native `async fn`, used through generics
//! only. [`ProviderClient`] is the concrete enum-dispatched implementation.

pub mod types;
pub use types::*;

pub mod github;
pub mod gitlab;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::comments::PostedComment;
use crate::errors::{ConfigError, MrResult, ProviderError};
use crate::position::{Anchor, AnchorStyle};

/// Capability interface the engine consumes.
#[allow(async_fn_in_trait)]
pub trait CommentPlatform {
    /// How this platform anchors inline comments.
    fn anchor_style(&self) -> AnchorStyle;

    /// Unified diff for the change request's current head.
    async fn fetch_diff(&self) -> MrResult<String>;

    /// Every comment visible on the change request.
    async fn fetch_comments(&self) -> MrResult<Vec<PostedComment>>;

    async fn create_comment(&self, anchor: &Anchor, body: &str) -> MrResult<PostedComment>;

    async fn update_comment(&self, comment: &PostedComment, body: &str) -> MrResult<()>;

    async fn delete_comment(&self, comment: &PostedComment) -> MrResult<()>;
}

/// Status check for platform responses. Same contract as
/// `error_for_status`, but keeps `Retry-After` for rate-limit errors.
pub(crate) trait ResponseExt: Sized {
    fn check_status(self) -> Result<Self, ProviderError>;
}

impl ResponseExt for reqwest::Response {
    fn check_status(self) -> Result<Self, ProviderError> {
        let status = self.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ProviderError::from_status_with_retry(
                status.as_u16(),
                retry_after_secs(self.headers()),
            ));
        }
        Ok(self)
    }
}

/// `Retry-After` in delta-seconds form; HTTP-date values are ignored.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Runtime configuration for any provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// API base, e.g. "https://gitlab.com/api/v4" or "https://api.github.com"
    pub base_api: String,
    /// Access token for the provider (PAT or app token).
    pub token: String,
}

impl ProviderConfig {
    /// Validates config values.
    pub fn validate(&self) -> MrResult<()> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken.into());
        }
        let base = self.base_api.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_api.clone()).into());
        }
        Ok(())
    }
}

/// Concrete provider client (enum-dispatch), bound to one change request.
#[derive(Debug, Clone)]
pub enum ProviderClient {
    GitLab(gitlab::GitLabClient),
    GitHub(github::GitHubClient),
}

impl ProviderClient {
    /// Constructs a concrete client from generic config.
    pub fn from_config(cfg: ProviderConfig, id: ChangeRequestId) -> MrResult<Self> {
        cfg.validate()?;
        let client = reqwest::Client::builder()
            .user_agent("danger-annotate/0.1")
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let base = cfg.base_api.trim_end_matches('/').to_string();
        Ok(match cfg.kind {
            ProviderKind::GitLab => {
                Self::GitLab(gitlab::GitLabClient::new(client, base, cfg.token, id))
            }
            ProviderKind::GitHub => {
                Self::GitHub(github::GitHubClient::new(client, base, cfg.token, id))
            }
        })
    }
}

impl CommentPlatform for ProviderClient {
    fn anchor_style(&self) -> AnchorStyle {
        match self {
            Self::GitLab(_) => AnchorStyle::NewLine,
            Self::GitHub(_) => AnchorStyle::DiffPosition,
        }
    }

    async fn fetch_diff(&self) -> MrResult<String> {
        match self {
            Self::GitLab(c) => c.get_raw_diff().await,
            Self::GitHub(c) => c.get_raw_diff().await,
        }
    }

    async fn fetch_comments(&self) -> MrResult<Vec<PostedComment>> {
        match self {
            Self::GitLab(c) => c.list_comments().await,
            Self::GitHub(c) => c.list_comments().await,
        }
    }

    async fn create_comment(&self, anchor: &Anchor, body: &str) -> MrResult<PostedComment> {
        match self {
            Self::GitLab(c) => c.create_comment(anchor, body).await,
            Self::GitHub(c) => c.create_comment(anchor, body).await,
        }
    }

    async fn update_comment(&self, comment: &PostedComment, body: &str) -> MrResult<()> {
        match self {
            Self::GitLab(c) => c.update_comment(comment, body).await,
            Self::GitHub(c) => c.update_comment(comment, body).await,
        }
    }

    async fn delete_comment(&self, comment: &PostedComment) -> MrResult<()> {
        match self {
            Self::GitLab(c) => c.delete_comment(comment).await,
            Self::GitHub(c) => c.delete_comment(comment).await,
        }
    }
}

/// Page size used by every paginated listing.
pub(crate) const PER_PAGE: usize = 100;

/// Safety cap on pages fetched per listing.
pub(crate) const MAX_PAGES: u32 = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_validation() {
        let ok = ProviderConfig {
            kind: ProviderKind::GitHub,
            base_api: "https://api.github.com".into(),
            token: "t".into(),
        };
        assert!(ok.validate().is_ok());

        let no_token = ProviderConfig {
            token: " ".into(),
            ..ok.clone()
        };
        assert!(no_token.validate().is_err());

        let bad_url = ProviderConfig {
            base_api: "api.github.com".into(),
            ..ok
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn anchor_style_per_provider() {
        let id = ChangeRequestId {
            project: "o/r".into(),
            iid: 1,
        };
        let gh = ProviderClient::from_config(
            ProviderConfig {
                kind: ProviderKind::GitHub,
                base_api: "https://api.github.com/".into(),
                token: "t".into(),
            },
            id.clone(),
        )
        .unwrap();
        assert_eq!(gh.anchor_style(), AnchorStyle::DiffPosition);

        let gl = ProviderClient::from_config(
            ProviderConfig {
                kind: ProviderKind::GitLab,
                base_api: "https://gitlab.com/api/v4".into(),
                token: "t".into(),
            },
            id,
        )
        .unwrap();
        assert_eq!(gl.anchor_style(), AnchorStyle::NewLine);
    }

    #[test]
    fn retry_after_seconds_are_read() {
        use reqwest::header::HeaderValue;

        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("42"));
        assert_eq!(retry_after_secs(&headers), Some(42));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_secs(&headers), None);
    }
}
