//! HDMI-CEC control bus
//!
//! Commands are line-oriented scripts piped into a single-shot
//! `cec-client -s -d 1 [device]` invocation. Every invocation is bounded by
//! a timeout and the child is killed if it overruns.

use async_trait::async_trait;
use pisign_common::config::CecConfig;
use pisign_common::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Timeout for power commands
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the power status query
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands understood by the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CecCommand {
    /// `on 0`
    PowerOn,
    /// `standby 0`
    Standby,
    /// `pow 0`
    QueryPower,
    /// Power on, Image View On, then Active Source
    AggressiveWake,
}

impl CecCommand {
    pub fn script(&self) -> &'static str {
        match self {
            CecCommand::PowerOn => "on 0\n",
            CecCommand::Standby => "standby 0\n",
            CecCommand::QueryPower => "pow 0\n",
            CecCommand::AggressiveWake => "on 0\ntx 10:04\nas\n",
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            CecCommand::QueryPower => QUERY_TIMEOUT,
            _ => COMMAND_TIMEOUT,
        }
    }
}

/// Power status as reported by the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedPower {
    On,
    Standby,
}

/// Captured result of one client invocation
#[derive(Debug, Clone, Default)]
pub struct CecOutput {
    /// Exit code; `None` if the client was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CecOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Extract the power status from `pow 0` output
///
/// Looks for a line mentioning "power status". "standby" is checked first
/// because transition states mention both words.
pub fn parse_power_status(stdout: &str) -> Option<ReportedPower> {
    stdout
        .lines()
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| l.contains("power status"))
        .find_map(|l| {
            if l.contains("standby") {
                Some(ReportedPower::Standby)
            } else if l.contains("on") {
                Some(ReportedPower::On)
            } else {
                None
            }
        })
}

/// A display control channel
#[async_trait]
pub trait CecBus: Send + Sync {
    /// Run one command; `Err` only when the client could not run or timed out
    async fn execute(&self, command: CecCommand) -> Result<CecOutput>;

    /// Best-effort power status; `None` when unknown
    async fn power_status(&self) -> Option<ReportedPower> {
        match self.execute(CecCommand::QueryPower).await {
            Ok(output) if output.success() => {
                let status = parse_power_status(&output.stdout);
                if status.is_none() {
                    debug!("Could not parse power state from pow 0 output");
                }
                status
            }
            Ok(output) => {
                tracing::warn!(status = ?output.status, stderr = %output.stderr.trim(), "pow 0 failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to query display power state");
                None
            }
        }
    }
}

/// `cec-client` subprocess runner
#[derive(Debug, Clone)]
pub struct CecClient {
    binary: String,
    device: Option<String>,
}

impl CecClient {
    pub fn new(config: &CecConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            device: config.device.clone(),
        }
    }

    /// Arguments for a single-shot, quiet invocation
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-s".to_string(), "-d".to_string(), "1".to_string()];
        if let Some(device) = self.device.as_deref().filter(|d| !d.trim().is_empty()) {
            args.push(device.to_string());
        }
        args
    }
}

#[async_trait]
impl CecBus for CecClient {
    async fn execute(&self, command: CecCommand) -> Result<CecOutput> {
        debug!(binary = %self.binary, args = ?self.args(), command = ?command, "Running control client");

        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Command(format!("failed to start {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(command.script().as_bytes())
                .await
                .map_err(|e| Error::Command(format!("failed to write to {}: {}", self.binary, e)))?;
            // Dropping stdin sends EOF so the single-shot client exits
        }

        let output = tokio::time::timeout(command.timeout(), child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Command(format!(
                    "{} timed out after {:?}",
                    self.binary,
                    command.timeout()
                ))
            })?
            .map_err(|e| Error::Command(format!("{} failed: {}", self.binary, e)))?;

        let result = CecOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(status = ?result.status, stdout = %result.stdout.trim(), "Control client finished");
        Ok(result)
    }
}
