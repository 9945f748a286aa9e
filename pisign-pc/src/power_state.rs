//! Last applied power state
//!
//! Persisted as a single word (`on` / `off`) so that repeated evaluations
//! with an unchanged schedule do not re-send commands to the display.

use pisign_common::fs::write_atomic;
use pisign_common::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Display power target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn from_bool(on: bool) -> Self {
        if on {
            PowerState::On
        } else {
            PowerState::Off
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(PowerState::On),
            "off" | "standby" => Ok(PowerState::Off),
            other => Err(format!("unknown power state: {:?}", other)),
        }
    }
}

/// File-backed record of the last actuated state
#[derive(Debug, Clone)]
pub struct PowerStateStore {
    path: PathBuf,
}

impl PowerStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted state; `None` if never written or unreadable
    pub fn load(&self) -> Option<PowerState> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match content.parse() {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable power state");
                None
            }
        }
    }

    pub fn store(&self, state: PowerState) -> Result<()> {
        write_atomic(&self.path, format!("{}\n", state).as_bytes())
    }
}
