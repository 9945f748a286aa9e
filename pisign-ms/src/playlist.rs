//! Playlist document and publisher
//!
//! The playback process loops `{media_dir}/playlist.m3u`. The document is
//! regenerated wholesale from the target set and replaced atomically.

use crate::manifest::TargetSet;
use pisign_common::fs::write_atomic;
use pisign_common::Result;
use std::path::{Path, PathBuf};

/// First line of every playlist
pub const HEADER: &str = "#EXTM3U";

/// Render the extended M3U document for `target`
///
/// One `#EXTINF` line (server path annotation and display name) followed by
/// the absolute local path, per entry, in manifest order.
pub fn render(target: &TargetSet, media_dir: &Path) -> String {
    let mut lines = vec![HEADER.to_string()];
    for entry in target.entries() {
        lines.push(format!(
            "#EXTINF:-1 server-url=\"{}\",name=\"{}\"",
            entry.server_path, entry.name
        ));
        lines.push(media_dir.join(&entry.name).display().to_string());
    }
    lines.join("\n") + "\n"
}

/// Publishes the playlist to its canonical path
#[derive(Debug, Clone)]
pub struct PlaylistPublisher {
    path: PathBuf,
}

impl PlaylistPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Currently published document, if any
    pub fn current(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    /// Replace the published document
    pub fn publish(&self, document: &str) -> Result<()> {
        write_atomic(&self.path, document.as_bytes())
    }
}

/// Local paths listed in a playlist document
pub fn entries(document: &str) -> Vec<PathBuf> {
    document
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MediaItem;

    #[test]
    fn test_render_single_item() {
        let target = TargetSet::from_items(&[MediaItem::new("campaigns/a.mp4")]);
        let doc = render(&target, Path::new("/srv/media"));

        assert_eq!(
            doc,
            "#EXTM3U\n\
             #EXTINF:-1 server-url=\"campaigns/a.mp4\",name=\"a.mp4\"\n\
             /srv/media/a.mp4\n"
        );
    }

    #[test]
    fn test_render_empty_target_is_header_only() {
        let doc = render(&TargetSet::default(), Path::new("/srv/media"));
        assert_eq!(doc, "#EXTM3U\n");
        assert!(entries(&doc).is_empty());
    }

    #[test]
    fn test_render_keeps_manifest_order() {
        let target = TargetSet::from_items(&[
            MediaItem::new("z/last.mp4"),
            MediaItem::new("a/first.mp4"),
        ]);
        let doc = render(&target, Path::new("/m"));

        assert_eq!(
            entries(&doc),
            vec![PathBuf::from("/m/last.mp4"), PathBuf::from("/m/first.mp4")]
        );
    }

    #[test]
    fn test_publish_replaces_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let publisher = PlaylistPublisher::new(dir.path().join("playlist.m3u"));
        assert!(publisher.current().is_none());

        publisher.publish("#EXTM3U\n/a\n").unwrap();
        publisher.publish("#EXTM3U\n").unwrap();

        assert_eq!(publisher.current().as_deref(), Some("#EXTM3U\n"));
    }
}
