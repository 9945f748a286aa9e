//! Media Sync (pisign-ms) - Main entry point
//!
//! One reconciliation pass per invocation, started by a systemd timer.
//! Exits 0 on success, no-op or lock contention; non-zero when the manifest
//! cannot be fetched or the playlist cannot be published.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pisign_common::{logging, DeviceConfig};
use pisign_ms::{
    HttpAssetSource, ManifestClient, PlaylistPublisher, ReconcileOutcome, Reconciler, SyncLock,
    TargetSet,
};
use tracing::{debug, error, info, warn};

/// Command-line arguments for pisign-ms
#[derive(Parser, Debug)]
#[command(name = "pisign-ms")]
#[command(about = "Reconcile local signage media with the campaign manifest")]
#[command(version)]
struct Args {
    /// Override a lock whose owner is gone or unparsable (never a live one)
    #[arg(short, long)]
    force: bool,

    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match DeviceConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init(args.debug, None);
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(args.debug, config.logging.level.as_deref());

    match run(&config, args.force).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Sync failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &DeviceConfig, force: bool) -> Result<()> {
    let lock = SyncLock::new(&config.lock_file);
    let Some(_guard) = lock.acquire(force).context("Failed to take sync lock")? else {
        return Ok(());
    };

    info!(device_id = %config.device_id, "Media sync starting");

    let manifest = ManifestClient::new(config.require_api_url()?, config.api_token.as_deref())?;
    let items = manifest
        .fetch(&config.device_id)
        .await
        .context("Error fetching campaigns")?;
    debug!(count = items.len(), "Fetched campaign items");

    let target = TargetSet::from_items(&items);
    if target.is_empty() {
        warn!("Manifest lists no media; clearing media directory");
    }

    let reconciler = Reconciler::new(
        &config.media_dir,
        HttpAssetSource::new(config.host_url.as_deref())?,
        PlaylistPublisher::new(config.playlist_path()),
    );

    match reconciler.reconcile(&target).await? {
        ReconcileOutcome::Unchanged => debug!("Nothing to do"),
        ReconcileOutcome::PlaylistRefreshed => info!("Sync complete (playlist only)"),
        ReconcileOutcome::Updated(report) => {
            info!(
                downloaded = report.downloaded.len(),
                removed = report.removed.len(),
                failed_downloads = report.failed_downloads.len(),
                failed_removals = report.failed_removals.len(),
                "Sync complete"
            );
            if !report.is_complete() {
                warn!("Some files could not be synced; they will be retried next cycle");
            }
        }
    }

    Ok(())
}
