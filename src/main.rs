use anyhow::{Context, Result};
use comment_reconciler::config::ReconcilerConfig;
use comment_reconciler::findings::Finding;
use comment_reconciler::publish::PublishConfig;
use comment_reconciler::{ChangeRequestId, ProviderClient, ProviderConfig, ProviderKind};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is not set"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present.
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,comment_reconciler=info"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let reconciler_cfg = ReconcilerConfig::from_env()?;
    let kind = ProviderKind::parse(&env_required("DANGER_PROVIDER")?)?;
    let provider_cfg = ProviderConfig {
        kind,
        base_api: std::env::var("DANGER_API_BASE")
            .unwrap_or_else(|_| kind.default_base_api().to_string()),
        token: env_required("DANGER_TOKEN")?,
    };
    let id = ChangeRequestId {
        project: env_required("DANGER_PROJECT")?,
        iid: env_required("DANGER_PR")?
            .parse()
            .context("DANGER_PR must be a number")?,
    };

    let findings_path = env_required("DANGER_FINDINGS_PATH")?;
    let raw = tokio::fs::read(&findings_path)
        .await
        .with_context(|| format!("reading {findings_path}"))?;
    let findings: Vec<Finding> =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {findings_path}"))?;
    tracing::info!(
        "loaded {} findings for {}#{}",
        findings.len(),
        id.project,
        id.iid
    );

    let client = ProviderClient::from_config(provider_cfg, id)?;
    let outcome = comment_reconciler::run_annotation(
        &client,
        findings,
        &reconciler_cfg,
        &PublishConfig::default(),
    )
    .await?;

    for f in &outcome.report.failed {
        tracing::warn!("not applied: {:?} {}: {}", f.operation, f.target, f.error);
    }

    // Summary goes to stdout for the summary-comment renderer.
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);

    if outcome.summary.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
