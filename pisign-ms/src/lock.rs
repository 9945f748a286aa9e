//! Reconciliation lock
//!
//! At most one media sync runs per device. Runs are started by a timer, so
//! a slow download can overlap the next tick; the second run finds the lock
//! and exits instead of queueing.
//!
//! The lock is a single `pid:timestamp` line. A record is overridden when it
//! cannot be parsed, when its owner is no longer running, or when it is older
//! than [`STALE_AFTER`]. A live owner inside the staleness window always keeps
//! the lock, even against `--force`.

use pisign_common::time::{now, unix_seconds};
use pisign_common::Result;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Age after which an unreleased lock is assumed abandoned
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Persisted lock owner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockRecord {
    pub pid: u32,
    /// Unix seconds
    pub acquired_at: f64,
}

impl LockRecord {
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: unix_seconds(now()),
        }
    }

    pub fn parse(line: &str) -> Option<Self> {
        let (pid, ts) = line.trim().split_once(':')?;
        let pid: u32 = pid.trim().parse().ok()?;
        let acquired_at: f64 = ts.trim().parse().ok()?;
        // pid 0 addresses the whole process group; never a real owner
        if pid == 0 || !acquired_at.is_finite() {
            return None;
        }
        Some(Self { pid, acquired_at })
    }

    pub fn to_line(&self) -> String {
        format!("{}:{}\n", self.pid, self.acquired_at)
    }
}

/// Signal-0 liveness probe
///
/// "No such process" means dead. "Permission denied" still proves the
/// process exists, so it counts as alive.
pub fn process_alive(pid: u32) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill with signal 0 performs permission and existence checks only
    if unsafe { libc::kill(raw, 0) } == 0 {
        return true;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::ESRCH) => false,
        Some(libc::EPERM) => true,
        _ => true,
    }
}

/// File-backed lock for reconciliation runs
pub struct SyncLock {
    path: PathBuf,
    stale_after: Duration,
    probe: fn(u32) -> bool,
}

impl SyncLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_after: STALE_AFTER,
            probe: process_alive,
        }
    }

    /// Replace the liveness probe (tests simulate dead or live owners)
    pub fn with_probe(mut self, probe: fn(u32) -> bool) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock
    ///
    /// Returns `Ok(None)` when another live, fresh run holds it. The returned
    /// guard deletes the record when dropped, whichever way the run ends.
    pub fn acquire(&self, force: bool) -> Result<Option<SyncLockGuard<'_>>> {
        if self.create_record()? {
            debug!(path = %self.path.display(), "Lock acquired");
            return Ok(Some(SyncLockGuard { lock: self }));
        }

        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => LockRecord::parse(&content),
            // Released between our create attempt and the read
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        match existing {
            Some(record) => {
                let age = unix_seconds(now()) - record.acquired_at;
                let stale = age > self.stale_after.as_secs_f64();
                let running = (self.probe)(record.pid);

                if running && !stale {
                    if force {
                        warn!(
                            pid = record.pid,
                            "Sync appears to be running; not overriding lock even with --force"
                        );
                    } else {
                        info!(pid = record.pid, "Sync already in progress, skipping");
                    }
                    return Ok(None);
                }

                if stale {
                    info!(
                        pid = record.pid,
                        age_secs = age as u64,
                        "Stale lock detected; overriding"
                    );
                } else {
                    info!(pid = record.pid, "Lock owner is no longer running; overriding");
                }
            }
            None => warn!(path = %self.path.display(), "Lock file is corrupt; treating as stale"),
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if self.create_record()? {
            Ok(Some(SyncLockGuard { lock: self }))
        } else {
            // Another run recovered the same stale lock first
            info!("Lost race while recovering stale lock, skipping");
            Ok(None)
        }
    }

    /// Create the record exclusively; `false` if one already exists
    fn create_record(&self) -> Result<bool> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path);

        match file {
            Ok(mut file) => {
                file.write_all(LockRecord::current().to_line().as_bytes())?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove lock file"),
        }
    }
}

/// Held lock; releasing happens on drop
pub struct SyncLockGuard<'a> {
    lock: &'a SyncLock,
}

impl Drop for SyncLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
