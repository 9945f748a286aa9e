//! # pisign Common Library
//!
//! Shared code for the pisign signage services:
//! - Device configuration resolution (TOML, environment, compiled defaults)
//! - Error taxonomy shared by both pipelines
//! - Atomic file replacement for documents read by other processes
//! - HTTP client construction and the liveness ping
//! - Logging initialisation
//! - Well-known local file names

pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod logging;
pub mod paths;
pub mod time;

pub use config::DeviceConfig;
pub use error::{Error, Result};
