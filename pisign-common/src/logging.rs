//! Tracing subscriber initialisation shared by all pisign binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment switch equivalent to passing `--debug`
pub const DEBUG_ENV: &str = "PISIGN_DEBUG";

/// Pick the filter directive for this run
///
/// Priority: `--debug` or `PISIGN_DEBUG` → `RUST_LOG` → config level →
/// `default_level`.
pub fn filter_directive(
    debug: bool,
    rust_log: Option<String>,
    config_level: Option<&str>,
    default_level: &str,
) -> String {
    if debug {
        return "debug".to_string();
    }
    if let Some(directive) = rust_log.filter(|d| !d.trim().is_empty()) {
        return directive;
    }
    config_level.unwrap_or(default_level).to_string()
}

/// Install the global subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init(debug: bool, config_level: Option<&str>) {
    let debug = debug || std::env::var_os(DEBUG_ENV).is_some();
    let directive = filter_directive(
        debug,
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        config_level,
        "info",
    );

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
