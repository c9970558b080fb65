//! Publisher: applies a [`ReconciliationPlan`] to a platform.
//!
//! - Strictly sequential, one call per plan entry (no bulk endpoints exist).
//! - A failed call is logged with `WARN`, recorded, and skipped; the rest of
//!   the plan still runs. No retries here.
//! - Dry-run: log the planned writes without calling the API.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::Error;
use crate::git_providers::CommentPlatform;
use crate::reconcile::ReconciliationPlan;

/// Configuration for the publishing step.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// If true, do not actually send anything; just log what would be written.
    pub dry_run: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dry_run: env_bool("DANGER_PUBLISH_DRY_RUN", false),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Which write an entry needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Resolve,
    Delete,
}

/// A write that the platform rejected.
#[derive(Debug)]
pub struct FailedOperation {
    pub operation: Operation,
    /// Comment id, or `file:position` for creates.
    pub target: String,
    pub error: Error,
}

/// Outcome of applying one plan.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub created: usize,
    pub updated: usize,
    pub resolved: usize,
    pub deleted: usize,
    /// Planned writes skipped because of dry-run.
    pub skipped: usize,
    pub failed: Vec<FailedOperation>,
}

impl PublishReport {
    pub fn performed(&self) -> usize {
        self.created + self.updated + self.resolved + self.deleted
    }

    fn record(&mut self, op: Operation, target: String, res: Result<(), Error>) {
        match res {
            Ok(()) => match op {
                Operation::Create => self.created += 1,
                Operation::Update => self.updated += 1,
                Operation::Resolve => self.resolved += 1,
                Operation::Delete => self.deleted += 1,
            },
            Err(error) => {
                warn!("publish: {:?} {} failed: {}", op, target, error);
                self.failed.push(FailedOperation {
                    operation: op,
                    target,
                    error,
                });
            }
        }
    }
}

/// Applies every entry of `plan` in order: creates, updates, resolves,
/// deletes. Never fails as a whole; see [`PublishReport::failed`].
pub async fn apply_plan<P: CommentPlatform>(
    platform: &P,
    plan: &ReconciliationPlan,
    cfg: &PublishConfig,
) -> PublishReport {
    let t0 = Instant::now();
    let mut report = PublishReport::default();

    if cfg.dry_run {
        for n in &plan.to_create {
            info!("publish(dry-run): create {}:{}", n.anchor.file, n.anchor.position);
        }
        for e in &plan.to_update {
            info!("publish(dry-run): update id={}", e.comment.id);
        }
        for e in &plan.to_resolve {
            info!("publish(dry-run): resolve id={}", e.comment.id);
        }
        for c in &plan.to_delete {
            info!("publish(dry-run): delete id={}", c.id);
        }
        report.skipped = plan.write_count();
        return report;
    }

    for n in &plan.to_create {
        let target = format!("{}:{}", n.anchor.file, n.anchor.position);
        debug!("publish: create {}", target);
        let res = platform
            .create_comment(&n.anchor, &n.body)
            .await
            .map(|posted| debug!("publish: created id={}", posted.id));
        report.record(Operation::Create, target, res);
    }

    for e in &plan.to_update {
        debug!("publish: update id={}", e.comment.id);
        let res = platform.update_comment(&e.comment, &e.body).await;
        report.record(Operation::Update, e.comment.id.clone(), res);
    }

    for e in &plan.to_resolve {
        debug!("publish: resolve id={}", e.comment.id);
        let res = platform.update_comment(&e.comment, &e.body).await;
        report.record(Operation::Resolve, e.comment.id.clone(), res);
    }

    for c in &plan.to_delete {
        debug!("publish: delete id={}", c.id);
        let res = platform.delete_comment(c).await;
        report.record(Operation::Delete, c.id.clone(), res);
    }

    info!(
        "publish: done created={} updated={} resolved={} deleted={} failed={} in {} ms",
        report.created,
        report.updated,
        report.resolved,
        report.deleted,
        report.failed.len(),
        t0.elapsed().as_millis()
    );

    report
}
