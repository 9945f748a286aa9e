//! Well-known file names inside the media directory
//!
//! The media directory is shared by both pipelines and by the playback
//! process. Only the files listed here are not media assets.

use std::path::{Path, PathBuf};

/// Published playlist, looped by the playback process
pub const PLAYLIST_FILE: &str = "playlist.m3u";

/// Cached copy of the backend schedule
pub const SCHEDULE_FILE: &str = "schedule.json";

/// Last power state applied to the display
pub const POWER_STATE_FILE: &str = ".power_state";

/// Suffix for in-flight asset downloads (`.<name>.part`)
pub const PARTIAL_SUFFIX: &str = ".part";

/// Whether `name` is bookkeeping rather than a media asset
///
/// Hidden files cover the power state, temporary files and partial downloads.
pub fn is_reserved(name: &str) -> bool {
    name == PLAYLIST_FILE || name == SCHEDULE_FILE || name.starts_with('.')
}

/// Hidden sibling used while `path` is being written
pub fn temp_sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", name, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("playlist.m3u"));
        assert!(is_reserved("schedule.json"));
        assert!(is_reserved(".power_state"));
        assert!(is_reserved(".clip.mp4.part"));
        assert!(!is_reserved("clip.mp4"));
        assert!(!is_reserved("playlist.m3u8"));
    }

    #[test]
    fn test_temp_sibling_stays_in_directory() {
        let tmp = temp_sibling(Path::new("/srv/media/playlist.m3u"), ".tmp");
        assert_eq!(tmp, PathBuf::from("/srv/media/.playlist.m3u.tmp"));
        assert!(is_reserved(&tmp.file_name().unwrap().to_string_lossy()));
    }
}
