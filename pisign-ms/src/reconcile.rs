//! Media reconciliation
//!
//! Diffs the target set against the media directory, downloads what is
//! missing, deletes what is unused, then republishes the playlist.
//!
//! Individual download and delete failures are logged and skipped. The
//! failed asset is still missing (or still unused) on the next cycle, so the
//! set difference retries exactly the work that did not happen.

use crate::download::AssetSource;
use crate::manifest::TargetSet;
use crate::playlist::{self, PlaylistPublisher};
use pisign_common::paths::{is_reserved, PARTIAL_SUFFIX};
use pisign_common::Result;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Media asset names currently in `media_dir`
///
/// Regular files only; the playlist, the schedule cache and hidden files
/// (power state, temporaries, partial downloads) are not assets. A missing
/// directory is an empty set.
pub fn scan_media_dir(media_dir: &Path) -> Result<BTreeSet<String>> {
    let entries = match std::fs::read_dir(media_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = %entry.path().display(), "Ignoring non UTF-8 file name");
            continue;
        };
        if !is_reserved(&name) {
            names.insert(name);
        }
    }
    Ok(names)
}

/// Delete partial downloads left behind by an interrupted run
///
/// Only called while the sync lock is held, so no download is in flight.
/// Returns how many were removed.
pub fn sweep_partials(media_dir: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(media_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let is_partial = name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX);
        if !is_partial || !entry.file_type()?.is_file() {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!(file = %name, "Removed leftover partial download");
                removed += 1;
            }
            Err(e) => warn!(file = %name, error = %e, "Error removing partial download"),
        }
    }
    Ok(removed)
}

fn remove_asset(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub downloaded: Vec<String>,
    pub failed_downloads: Vec<String>,
    pub removed: Vec<String>,
    pub failed_removals: Vec<String>,
}

impl ReconcileReport {
    /// True when every planned download and deletion succeeded
    pub fn is_complete(&self) -> bool {
        self.failed_downloads.is_empty() && self.failed_removals.is_empty()
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Disk and playlist already match the manifest; nothing was written
    Unchanged,
    /// Files matched but the playlist was stale and has been republished
    PlaylistRefreshed,
    /// Files were downloaded and/or removed and the playlist republished
    Updated(ReconcileReport),
}

/// Drives the media directory towards a target set
pub struct Reconciler<S: AssetSource> {
    media_dir: PathBuf,
    source: S,
    publisher: PlaylistPublisher,
    remover: fn(&Path) -> std::io::Result<()>,
}

impl<S: AssetSource> Reconciler<S> {
    pub fn new(media_dir: impl Into<PathBuf>, source: S, publisher: PlaylistPublisher) -> Self {
        Self {
            media_dir: media_dir.into(),
            source,
            publisher,
            remover: remove_asset,
        }
    }

    /// Replace the function used to delete unused assets (tests inject failures)
    pub fn with_remover(mut self, remover: fn(&Path) -> std::io::Result<()>) -> Self {
        self.remover = remover;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one pass
    ///
    /// Fails only when the media directory cannot be listed or created, or
    /// the playlist cannot be published.
    pub async fn reconcile(&self, target: &TargetSet) -> Result<ReconcileOutcome> {
        sweep_partials(&self.media_dir)?;
        let on_disk = scan_media_dir(&self.media_dir)?;
        let wanted = target.names();
        let document = playlist::render(target, &self.media_dir);

        if wanted == on_disk {
            if self.publisher.current().as_deref() == Some(document.as_str()) {
                debug!("Media directory and playlist match manifest; no changes needed");
                return Ok(ReconcileOutcome::Unchanged);
            }
            info!("Media files match manifest but playlist is stale; republishing");
            self.publisher.publish(&document)?;
            return Ok(ReconcileOutcome::PlaylistRefreshed);
        }

        info!(
            wanted = wanted.len(),
            on_disk = on_disk.len(),
            "Differences detected; syncing"
        );
        tokio::fs::create_dir_all(&self.media_dir).await?;

        let mut report = ReconcileReport::default();

        let missing: Vec<&String> = wanted.difference(&on_disk).collect();
        if missing.is_empty() {
            debug!("No missing media files");
        }
        for name in missing {
            let Some(server_path) = target.server_path(name) else {
                continue;
            };
            let dest = self.media_dir.join(name);
            info!(file = %name, "Downloading missing file");
            match self.source.fetch(server_path, &dest).await {
                Ok(bytes) => {
                    info!(file = %name, bytes, "Downloaded");
                    report.downloaded.push(name.clone());
                }
                Err(e) => {
                    warn!(file = %name, error = %e, transient = e.is_transient(), "Failed to download");
                    report.failed_downloads.push(name.clone());
                }
            }
        }

        let unused: Vec<&String> = on_disk.difference(&wanted).collect();
        if unused.is_empty() {
            debug!("No unused media files to remove");
        }
        for name in unused {
            match (self.remover)(&self.media_dir.join(name)) {
                Ok(()) => {
                    info!(file = %name, "Removed");
                    report.removed.push(name.clone());
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Error removing file");
                    report.failed_removals.push(name.clone());
                }
            }
        }

        self.publisher.publish(&document)?;
        info!(
            path = %self.publisher.path().display(),
            entries = target.entries().len(),
            "Updated playlist"
        );

        Ok(ReconcileOutcome::Updated(report))
    }
}
