//! Power Control (pisign-pc) - Main entry point
//!
//! Evaluates the cached schedule against local time once and applies the
//! result to the display. Meant to run every minute from a systemd timer.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use pisign_common::{logging, time, DeviceConfig};
use pisign_pc::{decide, Actuation, CecClient, PowerActuator, PowerStateStore, Schedule};
use tracing::{debug, error, info};

/// Command-line arguments for pisign-pc
#[derive(Parser, Debug)]
#[command(name = "pisign-pc")]
#[command(about = "Switch the display on or off according to the weekly schedule")]
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
            error!("Power control failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &DeviceConfig) -> Result<()> {
    let schedule = Schedule::load(&config.schedule_path());
    let now = time::local_now();
    let should_be_on = decide(&schedule, now);

    info!(
        decision = if should_be_on { "ON" } else { "OFF" },
        day = now.weekday().number_from_monday(),
        time = %now.format("%H:%M:%S"),
        rules = schedule.rules().len(),
        "Schedule evaluated"
    );

    let actuator = PowerActuator::new(
        CecClient::new(&config.cec),
        PowerStateStore::new(config.power_state_path()),
    )
    .with_verify_state(config.cec.verify_state);

    let actuation = actuator
        .apply(should_be_on)
        .await
        .context("Failed to record power state")?;
    match actuation {
        Actuation::Unchanged => debug!("No power change"),
        Actuation::AlreadyInState => info!("Display already in desired state"),
        Actuation::Sent(command) => info!(command = ?command, "Power command sent"),
    }

    Ok(())
}
