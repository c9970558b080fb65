//! Public entry for the comment-reconciler pipeline.
//!
//! One run turns a batch of findings into inline comments on a change
//! request, idempotently:
//!
//! 1) **Step 1: Diff index**
//!    - Fetch the unified diff and index it per file/hunk/line
//!
//! 2) **Step 2: Placement**
//!    - Fetch existing comments, split "ours" (marker token) from the rest
//!    - Group findings into general/inline, sort inline by `(file, line)`
//!    - Resolve each inline finding to a platform anchor or out-of-range
//!
//! 3) **Step 3: Reconcile**
//!    - Decide create / update / resolve / delete / keep per comment
//!    - Aggregate general + overflow findings into a summary document
//!
//! 4) **Step 4: Publish**
//!    - Apply the plan sequentially; failures are logged and skipped
//!
//! Steps 1–3 are pure and available on their own via [`plan_run`]. The
//! pipeline avoids `async-trait` and heap trait objects; the platform is a
//! generic [`CommentPlatform`](git_providers::CommentPlatform).

pub mod comments;
pub mod config;
pub mod errors;
pub mod findings;
pub mod git_providers;
pub mod parser; // step 1
pub mod position; // step 2
pub mod publish; // step 4
pub mod reconcile; // step 3
pub mod summary;

use std::time::Instant;
use tracing::{debug, info};

use comments::PostedComment;
use config::ReconcilerConfig;
use errors::MrResult;
use findings::Finding;
use git_providers::CommentPlatform;
use position::AnchorStyle;
use publish::{PublishConfig, PublishReport};
use reconcile::{PlacedFinding, ReconcileInput, ReconciliationPlan};
use summary::SummaryDocument;

/// Output of steps 1–3.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub plan: ReconciliationPlan,
    pub summary: SummaryDocument,
    /// Our comments without a file (a previous summary comment), for the
    /// summary renderer to edit in place instead of posting a new one.
    pub summary_comments: Vec<PostedComment>,
}

/// Output of a full run.
#[derive(Debug)]
pub struct RunOutcome {
    pub plan: ReconciliationPlan,
    pub summary: SummaryDocument,
    pub summary_comments: Vec<PostedComment>,
    pub report: PublishReport,
}

/// Steps 1–3 without any I/O: index `diff`, place `findings`, reconcile
/// against `comments`, aggregate the summary.
///
/// Fails only on invalid configuration.
pub fn plan_run(
    diff: &str,
    findings: Vec<Finding>,
    comments: Vec<PostedComment>,
    style: AnchorStyle,
    cfg: &ReconcilerConfig,
) -> MrResult<RunPlan> {
    cfg.validate()?;
    let marker = cfg.marker();

    let index = parser::parse(diff);
    debug!(
        "step1: diff indexed files={} binary={}",
        index.files.len(),
        index.binary_files().count()
    );
    for f in index.binary_files() {
        debug!("step1: binary file {} has no anchorable lines", f.path);
    }

    let set = comments::partition(comments, &marker);
    let grouped = findings::group(findings);
    debug!(
        "step2: comments ours={} ours_general={} others={} findings general={} inline={}",
        set.ours.len(),
        set.ours_general.len(),
        set.others.len(),
        grouped.general.len(),
        grouped.inline.len()
    );

    let placed: Vec<PlacedFinding> = grouped
        .inline
        .into_iter()
        .map(|finding| {
            let placement = position::place(&index, &finding, style);
            PlacedFinding { finding, placement }
        })
        .collect();

    let plan = reconcile::reconcile(ReconcileInput {
        marker: &marker,
        findings: &placed,
        ours: &set.ours,
        others: &set.others,
        dismiss_out_of_range: &cfg.dismiss_out_of_range,
    });
    let summary = summary::aggregate(&grouped.general, &plan.overflow);

    info!(
        "step3: plan create={} update={} resolve={} delete={} unchanged={} protected={} overflow={}",
        plan.to_create.len(),
        plan.to_update.len(),
        plan.to_resolve.len(),
        plan.to_delete.len(),
        plan.unchanged.len(),
        plan.protected.len(),
        plan.overflow.len()
    );

    Ok(RunPlan {
        plan,
        summary,
        summary_comments: set.ours_general,
    })
}

/// Runs steps **1–4** against `platform` and returns the plan, the summary
/// for the external renderer, and the publish report.
///
/// Read failures (diff, comment listing) abort the run; write failures do
/// not (see [`PublishReport::failed`]).
pub async fn run_annotation<P: CommentPlatform>(
    platform: &P,
    findings: Vec<Finding>,
    cfg: &ReconcilerConfig,
    publish_cfg: &PublishConfig,
) -> MrResult<RunOutcome> {
    let t0 = Instant::now();
    cfg.validate()?;

    debug!("step1: fetch diff");
    let diff = platform.fetch_diff().await?;
    debug!("step1: diff fetched bytes={}", diff.len());

    debug!("step2: fetch comments");
    let comments = platform.fetch_comments().await?;
    debug!("step2: comments fetched count={}", comments.len());

    let RunPlan {
        plan,
        summary,
        summary_comments,
    } =
        plan_run(&diff, findings, comments, platform.anchor_style(), cfg)?;

    debug!("step4: apply plan writes={}", plan.write_count());
    let report = publish::apply_plan(platform, &plan, publish_cfg).await;

    info!(
        "run: done writes={} failed={} summary_entries={} in {} ms",
        report.performed(),
        report.failed.len(),
        summary.len(),
        t0.elapsed().as_millis()
    );

    Ok(RunOutcome {
        plan,
        summary,
        summary_comments,
        report,
    })
}

// -----------------------------------------------------------------------------
// Convenience re-exports for downstream users
// -----------------------------------------------------------------------------

pub use config::DismissPolicy;
pub use findings::FindingKind;
pub use git_providers::{ChangeRequestId, ProviderClient, ProviderConfig, ProviderKind};
