//! Common error types for pisign

use thiserror::Error;

/// Common result type for pisign operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across pisign services
#[derive(Error, Debug)]
pub enum Error {
    /// Required endpoint or identity missing, or config file unreadable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure or timeout talking to the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success status or undecodable response body
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Filesystem operation error (wraps std::io::Error)
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Control-bus subprocess could not be run or timed out
    #[error("Control command error: {0}")]
    Command(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_status() || err.is_decode() {
            Error::Protocol(err.to_string())
        } else if err.is_builder() {
            Error::Config(err.to_string())
        } else {
            // timeouts, refused connections, DNS failures, broken bodies
            Error::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(format!("invalid JSON: {}", err))
    }
}

impl Error {
    /// True for failures that a later polling cycle may not see again
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
