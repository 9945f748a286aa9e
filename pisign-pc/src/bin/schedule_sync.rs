//! Schedule sync (pisign-schedule-sync)
//!
//! Downloads the device's weekly power schedule and caches it next to the
//! media for pisign-pc. Exits non-zero when the schedule cannot be fetched
//! or written; the previous cache stays in place.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pisign_common::{logging, DeviceConfig};
use pisign_pc::schedule_sync::save_schedules;
use pisign_pc::ScheduleClient;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pisign-schedule-sync")]
#[command(about = "Fetch the display power schedule from the backend")]
#[command(version)]
struct Args {
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

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Schedule sync failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &DeviceConfig) -> Result<()> {
    let client = ScheduleClient::new(config.require_host_url()?, config.api_token.as_deref())?;
    let schedules = client
        .fetch(&config.device_id)
        .await
        .context("Error fetching schedule")?;
    info!(device_id = %config.device_id, rules = schedules.len(), "Fetched schedule");

    save_schedules(&config.schedule_path(), &schedules).context("Error saving schedule")?;
    Ok(())
}
