//! Shared test utilities for media sync integration tests
//!
//! Provides an in-memory asset server so reconciliation can be exercised
//! without network access, including injected transient failures.

use async_trait::async_trait;
use pisign_common::{Error, Result};
use pisign_ms::AssetSource;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// In-memory stand-in for the backend asset host
#[derive(Default)]
pub struct FakeAssetSource {
    assets: HashMap<String, Vec<u8>>,
    /// Remaining injected failures per server path
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl FakeAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, server_path: &str, body: &[u8]) -> Self {
        self.assets.insert(server_path.to_string(), body.to_vec());
        self
    }

    /// Make the next `times` fetches of `server_path` fail with a timeout
    pub fn failing(self, server_path: &str, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(server_path.to_string(), times);
        self
    }

    /// Server paths requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl AssetSource for FakeAssetSource {
    async fn fetch(&self, server_path: &str, dest: &Path) -> Result<u64> {
        self.calls.lock().unwrap().push(server_path.to_string());

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(server_path) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Transport(format!("timed out fetching {}", server_path)));
                }
            }
        }

        let body = self
            .assets
            .get(server_path)
            .ok_or_else(|| Error::Protocol(format!("{} returned 404 Not Found", server_path)))?;
        std::fs::write(dest, body)?;
        Ok(body.len() as u64)
    }
}
