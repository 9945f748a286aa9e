//! Schedule download
//!
//! The device detail endpoint `GET {host_url}/api/v1/device/detail/c/{device_id}/`
//! returns the device record; its `schedules` array is cached verbatim as
//! `schedule.json` for the power controller to read offline.

use pisign_common::fs::write_atomic;
use pisign_common::http::{build_client, METADATA_TIMEOUT};
use pisign_common::{Error, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Client for the device detail endpoint
pub struct ScheduleClient {
    http_client: reqwest::Client,
    host_url: String,
}

impl ScheduleClient {
    pub fn new(host_url: impl Into<String>, api_token: Option<&str>) -> Result<Self> {
        let host_url = host_url.into().trim().trim_end_matches('/').to_string();
        if host_url.is_empty() {
            return Err(Error::Config("host_url is not configured".to_string()));
        }
        Ok(Self {
            http_client: build_client(METADATA_TIMEOUT, api_token)?,
            host_url,
        })
    }

    pub fn detail_url(&self, device_id: &str) -> String {
        format!("{}/api/v1/device/detail/c/{}/", self.host_url, device_id)
    }

    /// Fetch the schedule rules for `device_id` as raw JSON
    pub async fn fetch(&self, device_id: &str) -> Result<Vec<Value>> {
        let url = self.detail_url(device_id);
        debug!(url = %url, "Fetching device schedules");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Protocol(format!(
                "device detail endpoint returned {}",
                status
            )));
        }

        let body = response.bytes().await?;
        extract_schedules(&body)
    }
}

/// Pull the `schedules` array out of a device detail body
///
/// A missing or null `schedules` field is an empty list.
pub fn extract_schedules(body: &[u8]) -> Result<Vec<Value>> {
    let detail: Value = serde_json::from_slice(body)?;
    let Some(object) = detail.as_object() else {
        return Err(Error::Protocol(
            "device detail is not a JSON object".to_string(),
        ));
    };

    match object.get("schedules") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(Error::Protocol(
            "device detail `schedules` is not a list".to_string(),
        )),
    }
}

/// Cache schedules at `path`
///
/// An empty list is not written, leaving any previous cache in place.
/// Returns whether the file was written.
pub fn save_schedules(path: &Path, schedules: &[Value]) -> Result<bool> {
    if schedules.is_empty() {
        info!("No schedules found for this device; keeping existing cache");
        return Ok(false);
    }

    let mut document = serde_json::to_string_pretty(schedules)?;
    document.push('\n');
    write_atomic(path, document.as_bytes())?;
    info!(path = %path.display(), rules = schedules.len(), "Schedule saved");
    Ok(true)
}
