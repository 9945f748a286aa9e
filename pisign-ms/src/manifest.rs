//! Campaign manifest: backend client and target set
//!
//! The backend answers `GET {api_url}?device_id={id}` with a JSON array of
//! campaign items. Only `media_file` matters here; other fields are ignored.

use pisign_common::http::{build_client, METADATA_TIMEOUT};
use pisign_common::paths::is_reserved;
use pisign_common::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// One campaign entry from the manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaItem {
    /// Server-relative asset path, e.g. `campaigns/a.mp4`
    #[serde(default)]
    pub media_file: Option<String>,
}

impl MediaItem {
    pub fn new(media_file: impl Into<String>) -> Self {
        Self {
            media_file: Some(media_file.into()),
        }
    }
}

/// Local identity of a server path: its final path component
///
/// Returns `None` for names that cannot be a file in the media directory.
pub fn basename(server_path: &str) -> Option<&str> {
    let name = server_path.rsplit('/').next()?;
    match name {
        "" | "." | ".." => None,
        _ if name.contains('\\') || name.contains('\0') => None,
        _ => Some(name),
    }
}

/// An item that survived validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    pub server_path: String,
    pub name: String,
}

/// Desired media directory contents, derived from the manifest
///
/// Items whose file name is reserved (playlist, schedule cache, hidden files)
/// are dropped. Keeps manifest order for the playlist and a basename index for the diff.
/// Two server paths with the same basename share one local file; the last
/// one in the manifest is the one downloaded.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    entries: Vec<TargetEntry>,
    by_name: HashMap<String, String>,
}

impl TargetSet {
    pub fn from_items(items: &[MediaItem]) -> Self {
        let mut set = Self::default();
        for item in items {
            let Some(server_path) = item.media_file.as_deref() else {
                debug!("Skipping manifest item without media_file");
                continue;
            };
            let Some(name) = basename(server_path) else {
                warn!(media_file = %server_path, "Skipping manifest item with unusable file name");
                continue;
            };
            // The media scan never sees these, and the playlist and schedule
            // cache must not be overwritten by a download
            if is_reserved(name) {
                warn!(media_file = %server_path, "Skipping manifest item with reserved or hidden file name");
                continue;
            }
            if let Some(previous) = set.by_name.insert(name.to_string(), server_path.to_string()) {
                if previous != server_path {
                    warn!(
                        file = %name,
                        replaced = %previous,
                        by = %server_path,
                        "Two manifest paths share a file name; last one wins"
                    );
                }
            }
            set.entries.push(TargetEntry {
                server_path: server_path.to_string(),
                name: name.to_string(),
            });
        }
        set
    }

    /// Entries in manifest order, duplicates included
    pub fn entries(&self) -> &[TargetEntry] {
        &self.entries
    }

    /// Distinct local file names
    pub fn names(&self) -> BTreeSet<String> {
        self.by_name.keys().cloned().collect()
    }

    /// Server path to download for a local file name
    pub fn server_path(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Client for the campaign playlist endpoint
pub struct ManifestClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl ManifestClient {
    pub fn new(api_url: impl Into<String>, api_token: Option<&str>) -> Result<Self> {
        let api_url = api_url.into();
        if api_url.trim().is_empty() {
            return Err(Error::Config("api_url is not configured".to_string()));
        }
        Ok(Self {
            http_client: build_client(METADATA_TIMEOUT, api_token)?,
            api_url,
        })
    }

    /// Fetch the campaign items for `device_id`
    ///
    /// No retries; a failed fetch aborts this cycle and the next timer tick
    /// tries again.
    pub async fn fetch(&self, device_id: &str) -> Result<Vec<MediaItem>> {
        debug!(url = %self.api_url, device_id, "Fetching campaign manifest");

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[("device_id", device_id)])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Protocol(format!(
                "manifest endpoint returned {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let body = response.bytes().await?;
        parse_manifest(&body)
    }
}

/// Decode a manifest body
pub fn parse_manifest(body: &[u8]) -> Result<Vec<MediaItem>> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Protocol(format!("failed to decode manifest: {}", e)))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
