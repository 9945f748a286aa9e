//! Liveness ping (pisign-health)
//!
//! Pings the configured health-check URL once. Intended to run every minute
//! from a systemd timer. An unset URL is a no-op.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pisign_common::http::{build_client, ping, PING_TIMEOUT};
use pisign_common::{logging, DeviceConfig};
use tracing::{debug, error, warn};

#[derive(Parser, Debug)]
#[command(name = "pisign-health")]
#[command(about = "Report device liveness to the health-check endpoint")]
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

    let Some(url) = config.healthcheck_url.as_deref() else {
        debug!("No healthcheck_url configured; skipping");
        return ExitCode::SUCCESS;
    };

    let client = match build_client(PING_TIMEOUT, None) {
        Ok(client) => client,
        Err(e) => {
            error!("Health check error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match ping(&client, url).await {
        Ok(200) => {
            debug!(url, "Health check returned 200");
            ExitCode::SUCCESS
        }
        Ok(status) => {
            warn!(url, status, "Health check returned non-200 status");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(url, "Health check failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
