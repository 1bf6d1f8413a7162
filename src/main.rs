//! Issue Syncer
//!
//! Main entry point: runs one sync pass and exits.

use clap::Parser;
use issue_syncer::config::{validate_config_result, SourceConfig, SyncConfig};
use issue_syncer::integrations::{google_credentials, source_from_config, target_from_config};
use issue_syncer::state::{open_store, StateLocation};
use issue_syncer::sync::{RunOutcome, SyncOptions, SyncReconciler, DEFAULT_SYNC_LIMIT};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Sync support cases and their comments into Jira
#[derive(Parser, Debug)]
#[command(name = "issue-syncer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    config: PathBuf,

    /// Maximum number of issues examined in one run
    #[arg(short, long, env = "SYNC_LIMIT", default_value_t = DEFAULT_SYNC_LIMIT)]
    limit: usize,

    /// Where the watermark is kept: a local path or gs://bucket/object
    #[arg(long, env = "STATE_FILE_URL")]
    state_url: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(RunOutcome::Success) => {}
        Ok(RunOutcome::PartialFailure) => {
            tracing::warn!("Sync finished with errors");
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunOutcome> {
    use anyhow::Context;

    let mut config = SyncConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    if let Err(e) = issue_syncer::logging::init(&config.logging_config()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    config.inject_secrets_from_env();
    validate_config_result(&config)?;

    let SourceConfig::GoogleCloud(google) = &config.source;
    let storage_auth = google_credentials(google)?;
    let timeout = Duration::from_secs(google.timeout_secs);

    let source = source_from_config(&config.source).context("Failed to create source")?;
    let target = target_from_config(&config.target).context("Failed to create target")?;

    let location = StateLocation::parse(cli.state_url.as_deref())?;
    let store = open_store(location, storage_auth, timeout)?;

    tracing::info!(
        source = %config.source.kind(),
        target = %config.target.kind(),
        limit = cli.limit,
        "Starting sync"
    );

    let reconciler = SyncReconciler::new(source, target, config.transformer())
        .with_options(SyncOptions::new().with_limit(cli.limit));
    let report = reconciler.run(store.as_ref()).await?;

    for failure in &report.failures {
        tracing::warn!(issue = %failure.issue_id, error = %failure.error, "Issue not synced");
    }

    Ok(report.outcome())
}
