//! Atomic file replacement
//!
//! Documents in the media directory are read by processes we do not control
//! (the player loops the playlist, the power pipeline reads the schedule).
//! Every write goes to a hidden sibling first and is renamed over the target,
//! so a reader sees either the old file or the new one, never a partial one.

use crate::paths::temp_sibling;
use crate::Result;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Replace `target` with `contents` via temp file + rename
///
/// The temp file lives in the same directory so the rename never crosses a
/// filesystem boundary. On failure the temp file is removed and `target` is
/// left untouched.
pub fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_sibling(target, ".tmp");
    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, target)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
