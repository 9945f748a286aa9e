//! HTTP client construction and the liveness ping

use crate::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use std::time::Duration;

/// User agent sent with every backend request
pub const USER_AGENT: &str = concat!("pisign-device/", env!("CARGO_PKG_VERSION"));

/// Timeout for manifest and schedule requests
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single asset download
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for the liveness ping
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a client with the device user agent and a request timeout
///
/// When `token` is set every request carries `Authorization: Bearer <token>`.
pub fn build_client(timeout: Duration, token: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| crate::Error::Config(format!("invalid api_token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Fire a liveness ping and return the HTTP status code
///
/// Non-success statuses are returned, not raised; only transport failures
/// are errors.
pub async fn ping(client: &reqwest::Client, url: &str) -> Result<u16> {
    let response = client.get(url).send().await?;
    Ok(response.status().as_u16())
}
