//! # pisign Media Sync (pisign-ms)
//!
//! Keeps the local media directory and playlist in line with the campaign
//! manifest published by the backend:
//! fetch manifest → diff against disk → download/delete → publish playlist.
//!
//! One run is one pass. Runs are serialised per device by [`lock::SyncLock`].

pub mod download;
pub mod lock;
pub mod manifest;
pub mod playlist;
pub mod reconcile;

pub use download::{AssetSource, HttpAssetSource};
pub use lock::SyncLock;
pub use manifest::{ManifestClient, MediaItem, TargetSet};
pub use playlist::PlaylistPublisher;
pub use reconcile::{ReconcileOutcome, ReconcileReport, Reconciler};
