//! GitHub adapter (REST v3) for pull request review comments.
//!
//! Endpoints used:
//! - GET    /repos/{owner}/{repo}/pulls/{number}            (head sha; diff via Accept)
//! - GET    /repos/{owner}/{repo}/pulls/{number}/comments   (inline, paginated)
//! - GET    /repos/{owner}/{repo}/issues/{number}/comments  (general, paginated)
//! - POST   /repos/{owner}/{repo}/pulls/{number}/comments
//! - PATCH  /repos/{owner}/{repo}/pulls/comments/{id}
//! - DELETE /repos/{owner}/{repo}/pulls/comments/{id}
//!
//! GitHub positions are 1-based (the line below the first `@@` is 1); the
//! engine's are 0-based, so values are shifted at this boundary.

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::comments::PostedComment;
use crate::errors::MrResult;
use crate::git_providers::types::ChangeRequestId;
use crate::git_providers::{MAX_PAGES, PER_PAGE, ResponseExt};
use crate::position::Anchor;

const JSON_MEDIA: &str = "application/vnd.github+json";
const DIFF_MEDIA: &str = "application/vnd.github.v3.diff";

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String, // "https://api.github.com"
    token: String,
    id: ChangeRequestId,
    head_sha: OnceCell<String>,
}

impl GitHubClient {
    pub fn new(http: Client, base_api: String, token: String, id: ChangeRequestId) -> Self {
        Self {
            http,
            base_api,
            token,
            id,
            head_sha: OnceCell::new(),
        }
    }

    fn pull_url(&self) -> String {
        format!(
            "{}/repos/{}/pulls/{}",
            self.base_api, self.id.project, self.id.iid
        )
    }

    fn review_comment_url(&self, comment_id: &str) -> String {
        format!(
            "{}/repos/{}/pulls/comments/{}",
            self.base_api, self.id.project, comment_id
        )
    }

    /// Unified diff of the pull request.
    pub async fn get_raw_diff(&self) -> MrResult<String> {
        let text = self
            .http
            .get(self.pull_url())
            .bearer_auth(&self.token)
            .header(ACCEPT, DIFF_MEDIA)
            .send()
            .await?
            .check_status()?
            .text()
            .await?;
        Ok(text)
    }

    /// Head commit of the pull request (memoised for the client's lifetime).
    async fn head_sha(&self) -> MrResult<&str> {
        let sha = self
            .head_sha
            .get_or_try_init(|| async {
                let pr: GitHubPull = self
                    .http
                    .get(self.pull_url())
                    .bearer_auth(&self.token)
                    .header(ACCEPT, JSON_MEDIA)
                    .send()
                    .await?
                    .check_status()?
                    .json()
                    .await?;
                debug!("github: head sha={}", pr.head.sha);
                MrResult::Ok(pr.head.sha)
            })
            .await?;
        Ok(sha.as_str())
    }

    async fn get_paged<T: for<'de> Deserialize<'de>>(&self, url: &str) -> MrResult<Vec<T>> {
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let batch: Vec<T> = self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .header(ACCEPT, JSON_MEDIA)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?
                .check_status()?
                .json()
                .await?;
            let n = batch.len();
            out.extend(batch);
            if n < PER_PAGE {
                break;
            }
        }
        Ok(out)
    }

    /// Review comments (inline) plus issue comments (general).
    pub async fn list_comments(&self) -> MrResult<Vec<PostedComment>> {
        let inline: Vec<GitHubReviewComment> =
            self.get_paged(&format!("{}/comments", self.pull_url())).await?;
        let issue_url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.base_api, self.id.project, self.id.iid
        );
        let general: Vec<GitHubIssueComment> = self.get_paged(&issue_url).await?;
        debug!(
            "github: comments inline={} general={}",
            inline.len(),
            general.len()
        );

        let mut out: Vec<PostedComment> = inline.into_iter().map(Into::into).collect();
        out.extend(general.into_iter().map(|c| PostedComment {
            id: c.id.to_string(),
            file: None,
            position: None,
            body: c.body.unwrap_or_default(),
            thread_id: None,
        }));
        Ok(out)
    }

    pub async fn create_comment(&self, anchor: &Anchor, body: &str) -> MrResult<PostedComment> {
        #[derive(Serialize)]
        struct Req<'a> {
            body: &'a str,
            commit_id: &'a str,
            path: &'a str,
            position: u32,
        }
        let commit_id = self.head_sha().await?;
        let req = Req {
            body,
            commit_id,
            path: &anchor.file,
            position: anchor.position + 1,
        };
        let created: GitHubReviewComment = self
            .http
            .post(format!("{}/comments", self.pull_url()))
            .bearer_auth(&self.token)
            .header(ACCEPT, JSON_MEDIA)
            .json(&req)
            .send()
            .await?
            .check_status()?
            .json()
            .await?;
        Ok(created.into())
    }

    pub async fn update_comment(&self, comment: &PostedComment, body: &str) -> MrResult<()> {
        #[derive(Serialize)]
        struct Req<'a> {
            body: &'a str,
        }
        self.http
            .patch(self.review_comment_url(&comment.id))
            .bearer_auth(&self.token)
            .header(ACCEPT, JSON_MEDIA)
            .json(&Req { body })
            .send()
            .await?
            .check_status()?;
        Ok(())
    }

    pub async fn delete_comment(&self, comment: &PostedComment) -> MrResult<()> {
        self.http
            .delete(self.review_comment_url(&comment.id))
            .bearer_auth(&self.token)
            .header(ACCEPT, JSON_MEDIA)
            .send()
            .await?
            .check_status()?;
        Ok(())
    }
}

/// --- GitHub response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct GitHubPull {
    head: GitHubRef,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubReviewComment {
    id: u64,
    #[serde(default)]
    body: String,
    path: String,
    /// `null` once the comment is outdated.
    #[serde(default)]
    position: Option<u32>,
    #[serde(default)]
    in_reply_to_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GitHubIssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

impl From<GitHubReviewComment> for PostedComment {
    fn from(c: GitHubReviewComment) -> Self {
        PostedComment {
            id: c.id.to_string(),
            file: Some(c.path),
            position: c.position.and_then(|p| p.checked_sub(1)),
            body: c.body,
            thread_id: Some(c.in_reply_to_id.unwrap_or(c.id).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_comment_maps_to_zero_based_position() {
        let raw = r#"{"id": 7, "body": "hi", "path": "a.rs", "position": 3, "in_reply_to_id": null}"#;
        let c: PostedComment = serde_json::from_str::<GitHubReviewComment>(raw)
            .unwrap()
            .into();
        assert_eq!(c.position, Some(2));
        assert_eq!(c.thread_id.as_deref(), Some("7"));

        let reply = r#"{"id": 8, "body": "ok", "path": "a.rs", "position": null, "in_reply_to_id": 7}"#;
        let r: PostedComment = serde_json::from_str::<GitHubReviewComment>(reply)
            .unwrap()
            .into();
        assert_eq!(r.position, None);
        assert_eq!(r.thread_id.as_deref(), Some("7"));
    }
}
