//! GitLab adapter (REST v4) for MR discussions.
//!
//! Endpoints used:
//! - GET    /projects/:id/merge_requests/:iid                 (diff_refs)
//! - GET    /projects/:id/merge_requests/:iid/raw_diffs
//! - GET    /projects/:id/merge_requests/:iid/discussions     (paginated)
//! - POST   /projects/:id/merge_requests/:iid/discussions     (inline)
//! - PUT    /projects/:id/merge_requests/:iid/notes/:note_id
//! - DELETE /projects/:id/merge_requests/:iid/notes/:note_id
//!
//! Inline position requires `head_sha` + `base_sha` + `start_sha` from MR meta.
//! Anchors are new-file line numbers.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::comments::PostedComment;
use crate::errors::{MrResult, ProviderError};
use crate::git_providers::types::{ChangeRequestId, DiffRefs};
use crate::git_providers::{MAX_PAGES, PER_PAGE, ResponseExt};
use crate::position::Anchor;

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String, // e.g. "https://gitlab.com/api/v4"
    token: String,    // "PRIVATE-TOKEN"
    id: ChangeRequestId,
    diff_refs: OnceCell<DiffRefs>,
}

impl GitLabClient {
    /// Constructs a GitLab client with a shared reqwest instance and auth token.
    pub fn new(http: Client, base_api: String, token: String, id: ChangeRequestId) -> Self {
        Self {
            http,
            base_api,
            token,
            id,
            diff_refs: OnceCell::new(),
        }
    }

    fn mr_url(&self) -> String {
        format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_api,
            urlencoding::encode(&self.id.project),
            self.id.iid
        )
    }

    /// Whole MR diff as one unified text.
    pub async fn get_raw_diff(&self) -> MrResult<String> {
        let raw = self
            .http
            .get(format!("{}/raw_diffs", self.mr_url()))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .check_status()?
            .text()
            .await?;
        Ok(raw)
    }

    /// base/start/head SHAs (memoised for the client's lifetime).
    async fn diff_refs(&self) -> MrResult<&DiffRefs> {
        self.diff_refs
            .get_or_try_init(|| async {
                let mr: GitLabMr = self
                    .http
                    .get(self.mr_url())
                    .header("PRIVATE-TOKEN", &self.token)
                    .send()
                    .await?
                    .check_status()?
                    .json()
                    .await?;
                let refs = mr.diff_refs.ok_or_else(|| {
                    ProviderError::InvalidResponse("merge request has no diff_refs".into())
                })?;
                debug!("gitlab: diff_refs head={}", refs.head_sha);
                MrResult::Ok(DiffRefs {
                    base_sha: refs.base_sha,
                    start_sha: Some(refs.start_sha),
                    head_sha: refs.head_sha,
                })
            })
            .await
    }

    /// All non-system notes of every discussion, flattened.
    pub async fn list_comments(&self) -> MrResult<Vec<PostedComment>> {
        let url = format!("{}/discussions", self.mr_url());
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let batch: Vec<GitLabDiscussion> = self
                .http
                .get(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?
                .check_status()?
                .json()
                .await?;
            let n = batch.len();
            for d in batch {
                out.extend(discussion_to_comments(d));
            }
            if n < PER_PAGE {
                break;
            }
        }
        debug!("gitlab: notes={}", out.len());
        Ok(out)
    }

    pub async fn create_comment(&self, anchor: &Anchor, body: &str) -> MrResult<PostedComment> {
        #[derive(Serialize)]
        struct Position<'a> {
            position_type: &'a str,
            base_sha: &'a str,
            start_sha: &'a str,
            head_sha: &'a str,
            old_path: &'a str,
            new_path: &'a str,
            new_line: u32,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            body: &'a str,
            position: Position<'a>,
        }

        let refs = self.diff_refs().await?;
        let req = Req {
            body,
            position: Position {
                position_type: "text",
                base_sha: &refs.base_sha,
                start_sha: refs.start_sha.as_deref().unwrap_or(&refs.base_sha),
                head_sha: &refs.head_sha,
                old_path: &anchor.file,
                new_path: &anchor.file,
                new_line: anchor.position,
            },
        };

        let disc: GitLabDiscussion = self
            .http
            .post(format!("{}/discussions", self.mr_url()))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&req)
            .send()
            .await?
            .check_status()?
            .json()
            .await?;

        discussion_to_comments(disc).into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("created discussion has no notes".into()).into()
        })
    }

    pub async fn update_comment(&self, comment: &PostedComment, body: &str) -> MrResult<()> {
        #[derive(Serialize)]
        struct Req<'a> {
            body: &'a str,
        }
        self.http
            .put(format!("{}/notes/{}", self.mr_url(), comment.id))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&Req { body })
            .send()
            .await?
            .check_status()?;
        Ok(())
    }

    pub async fn delete_comment(&self, comment: &PostedComment) -> MrResult<()> {
        self.http
            .delete(format!("{}/notes/{}", self.mr_url(), comment.id))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .check_status()?;
        Ok(())
    }
}

fn discussion_to_comments(d: GitLabDiscussion) -> Vec<PostedComment> {
    d.notes
        .into_iter()
        .filter(|n| !n.system)
        .map(|n| {
            let (file, position) = match n.position {
                Some(p) => (p.new_path, p.new_line),
                None => (None, None),
            };
            PostedComment {
                id: n.id.to_string(),
                file,
                position,
                body: n.body,
                thread_id: Some(d.id.clone()),
            }
        })
        .collect()
}

/// --- GitLab response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct GitLabMr {
    #[serde(default)]
    diff_refs: Option<GitLabDiffRefs>,
}

#[derive(Debug, Deserialize)]
struct GitLabDiffRefs {
    base_sha: String,
    head_sha: String,
    start_sha: String,
}

#[derive(Debug, Deserialize)]
struct GitLabDiscussion {
    id: String,
    #[serde(default)]
    notes: Vec<GitLabNote>,
}

#[derive(Debug, Deserialize)]
struct GitLabNote {
    id: u64,
    #[serde(default)]
    body: String,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    position: Option<GitLabNotePosition>,
}

#[derive(Debug, Deserialize)]
struct GitLabNotePosition {
    #[serde(default)]
    new_path: Option<String>,
    #[serde(default)]
    new_line: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discussion_notes_share_thread_and_skip_system() {
        let raw = r#"{
            "id": "abc",
            "notes": [
                {"id": 1, "body": "bot", "system": false,
                 "position": {"new_path": "a.rs", "new_line": 12}},
                {"id": 2, "body": "changed the line", "system": true},
                {"id": 3, "body": "human reply", "system": false,
                 "position": {"new_path": "a.rs", "new_line": 12}}
            ]
        }"#;
        let d: GitLabDiscussion = serde_json::from_str(raw).unwrap();
        let comments = discussion_to_comments(d);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].position, Some(12));
        assert_eq!(comments[0].file.as_deref(), Some("a.rs"));
        assert!(comments.iter().all(|c| c.thread_id.as_deref() == Some("abc")));
        assert!(comments[0].shares_anchor_with(&comments[1]));
    }
}
