//! Configuration loading and device identity resolution
//!
//! Settings are resolved once at process start into a [`DeviceConfig`] that is
//! passed into every component. Priority order, highest first:
//! 1. Environment variables (`PISIGN_*`, `CEC_DEVICE`)
//! 2. TOML config file (`--config`, `PISIGN_CONFIG`, user, then system path)
//! 3. Compiled defaults
//!
//! A missing config file is not an error: the device still starts with
//! defaults and whatever the environment provides. Components that need an
//! endpoint ask for it through `require_*` and fail with [`Error::Config`].

use crate::paths::{PLAYLIST_FILE, POWER_STATE_FILE, SCHEDULE_FILE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "PISIGN_CONFIG";

/// On-disk TOML configuration
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Device identity sent to the backend (defaults to the hostname)
    #[serde(default)]
    pub device_id: Option<String>,

    /// Campaign playlist endpoint, queried with `?device_id=`
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bearer token for backend requests
    #[serde(default)]
    pub api_token: Option<String>,

    /// Backend base URL for assets and the schedule endpoint
    #[serde(default)]
    pub host_url: Option<String>,

    /// Liveness ping URL
    #[serde(default)]
    pub healthcheck_url: Option<String>,

    /// Local media directory
    #[serde(default)]
    pub media_dir: Option<PathBuf>,

    /// Reconciliation lock record
    #[serde(default)]
    pub lock_file: Option<PathBuf>,

    #[serde(default)]
    pub cec: CecConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Display control bus settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CecConfig {
    /// Control client executable
    #[serde(default = "default_cec_binary")]
    pub binary: String,

    /// Adapter device node; `None` lets the client pick one
    #[serde(default = "default_cec_device")]
    pub device: Option<String>,

    /// Query reported power before toggling
    #[serde(default = "default_verify_state")]
    pub verify_state: bool,
}

impl Default for CecConfig {
    fn default() -> Self {
        Self {
            binary: default_cec_binary(),
            device: default_cec_device(),
            verify_state: default_verify_state(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

fn default_cec_binary() -> String {
    "cec-client".to_string()
}

fn default_cec_device() -> Option<String> {
    Some("/dev/cec0".to_string())
}

fn default_verify_state() -> bool {
    true
}

/// Built-in fallbacks used when neither file nor environment sets a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub media_dir: PathBuf,
    pub lock_file: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let media_dir = dirs::data_local_dir()
            .map(|d| d.join("pisign").join("media"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/pisign/media"));

        Self {
            media_dir,
            lock_file: PathBuf::from("/tmp/pisign-sync.lock"),
        }
    }
}

/// Fully resolved device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub device_id: String,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub host_url: Option<String>,
    pub healthcheck_url: Option<String>,
    /// Always absolute, so playlist entries are absolute paths
    pub media_dir: PathBuf,
    pub lock_file: PathBuf,
    pub cec: CecConfig,
    pub logging: LoggingConfig,
}

impl DeviceConfig {
    /// Resolve configuration from file, process environment and defaults
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let toml_config = match locate_config_file(cli_path, |k| std::env::var(k).ok())? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                read_toml_config(&path)?
            }
            None => {
                tracing::debug!("No config file found; using defaults and environment");
                TomlConfig::default()
            }
        };

        Self::from_sources(toml_config, |k| std::env::var(k).ok())
    }

    /// Merge a parsed file with an environment lookup
    ///
    /// `env` is injected so resolution can be tested without touching the
    /// process environment.
    pub fn from_sources<F>(file: TomlConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CompiledDefaults::for_current_platform();
        let pick = |key: &str, from_file: Option<String>| {
            non_empty(env(key)).or_else(|| non_empty(from_file))
        };

        let device_id = match pick("PISIGN_DEVICE_ID", file.device_id) {
            Some(id) => id,
            None => hostname()?,
        };

        let media_dir = non_empty(env("PISIGN_MEDIA_DIR"))
            .map(PathBuf::from)
            .or(file.media_dir)
            .unwrap_or(defaults.media_dir);
        let media_dir = absolutize(media_dir)?;

        let lock_file = non_empty(env("PISIGN_LOCK_FILE"))
            .map(PathBuf::from)
            .or(file.lock_file)
            .unwrap_or(defaults.lock_file);

        let mut cec = file.cec;
        if let Some(device) = env("CEC_DEVICE") {
            // An explicitly empty CEC_DEVICE means "let the client choose"
            cec.device = non_empty(Some(device));
        }

        Ok(Self {
            device_id,
            api_url: pick("PISIGN_API_URL", file.api_url),
            api_token: pick("PISIGN_API_TOKEN", file.api_token),
            host_url: pick("PISIGN_HOST_URL", file.host_url),
            healthcheck_url: pick("PISIGN_HEALTHCHECK_URL", file.healthcheck_url),
            media_dir,
            lock_file,
            cec,
            logging: file.logging,
        })
    }

    /// Manifest endpoint, or a configuration error when unset
    pub fn require_api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .ok_or_else(|| Error::Config("api_url is not configured".to_string()))
    }

    /// Backend base URL, or a configuration error when unset
    pub fn require_host_url(&self) -> Result<&str> {
        self.host_url
            .as_deref()
            .ok_or_else(|| Error::Config("host_url is not configured".to_string()))
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.media_dir.join(PLAYLIST_FILE)
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.media_dir.join(SCHEDULE_FILE)
    }

    pub fn power_state_path(&self) -> PathBuf {
        self.media_dir.join(POWER_STATE_FILE)
    }
}

/// Find the config file to load, if any
///
/// An explicitly named file (CLI or `PISIGN_CONFIG`) must exist; the
/// user and system locations are only probed.
pub fn locate_config_file<F>(cli_path: Option<&Path>, env: F) -> Result<Option<PathBuf>>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = cli_path
        .map(Path::to_path_buf)
        .or_else(|| non_empty(env(CONFIG_ENV)).map(PathBuf::from));

    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(Some(path));
        }
        return Err(Error::Config(format!("Config file not found: {}", path.display())));
    }

    let user_config = dirs::config_dir().map(|d| d.join("pisign").join("config.toml"));
    let system_config = PathBuf::from("/etc/pisign/config.toml");

    Ok(user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|p| p.is_file()))
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Kernel hostname, used as the default device identity
fn hostname() -> Result<String> {
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .find_map(|s| non_empty(Some(s)))
        .ok_or_else(|| Error::Config("device_id is not configured and hostname is unavailable".to_string()))
}
