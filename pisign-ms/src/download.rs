//! Asset downloads
//!
//! [`AssetSource`] is the seam between the reconciler and the network. The
//! HTTP implementation streams `GET {host_url}/{server_path}` into a hidden
//! `.<name>.part` sibling and renames it into place once the body is
//! complete, so an interrupted download never looks like a present asset.

use async_trait::async_trait;
use pisign_common::http::{build_client, DOWNLOAD_TIMEOUT};
use pisign_common::paths::{temp_sibling, PARTIAL_SUFFIX};
use pisign_common::{Error, Result};
use reqwest::Url;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Something that can place a server asset at a local path
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch `server_path` into `dest`, returning the number of bytes written
    ///
    /// On error `dest` must not have been created or replaced.
    async fn fetch(&self, server_path: &str, dest: &Path) -> Result<u64>;
}

/// Downloads assets from the backend host
///
/// An unset host is only an error once something actually has to be
/// downloaded, so a pass that merely deletes still runs.
pub struct HttpAssetSource {
    http_client: reqwest::Client,
    host_url: Option<Url>,
}

impl HttpAssetSource {
    pub fn new(host_url: Option<&str>) -> Result<Self> {
        let host_url = match host_url.map(str::trim).filter(|h| !h.is_empty()) {
            Some(host_url) => Some(parse_host(host_url)?),
            None => None,
        };
        Ok(Self {
            http_client: build_client(DOWNLOAD_TIMEOUT, None)?,
            host_url,
        })
    }

    /// Absolute URL for a server-relative asset path
    pub fn asset_url(&self, server_path: &str) -> Result<Url> {
        let Some(host_url) = &self.host_url else {
            return Err(Error::Config("host_url is not configured".to_string()));
        };
        host_url
            .join(server_path)
            .map_err(|e| Error::Protocol(format!("invalid asset path {:?}: {}", server_path, e)))
    }

    async fn stream_to(&self, url: Url, partial: &Path) -> Result<u64> {
        let mut response = self.http_client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Protocol(format!("{} returned {}", url, status)));
        }

        let mut file = tokio::fs::File::create(partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, server_path: &str, dest: &Path) -> Result<u64> {
        let url = self.asset_url(server_path)?;
        let partial = temp_sibling(dest, PARTIAL_SUFFIX);

        tracing::debug!(url = %url, dest = %dest.display(), "Downloading asset");

        let written = self.stream_to(url, &partial).await;
        finish_partial(written, &partial, dest).await
    }
}

fn parse_host(host_url: &str) -> Result<Url> {
    let mut url = Url::parse(host_url)
        .map_err(|e| Error::Config(format!("invalid host_url {:?}: {}", host_url, e)))?;
    // Url::join replaces the last segment unless the base ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Move a completed partial download into place
///
/// The partial file is removed whenever `dest` is not produced, including
/// when the rename itself fails.
pub async fn finish_partial(written: Result<u64>, partial: &Path, dest: &Path) -> Result<u64> {
    let result = match written {
        Ok(written) => tokio::fs::rename(partial, dest)
            .await
            .map(|()| written)
            .map_err(Error::from),
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(partial).await;
    }
    result
}
