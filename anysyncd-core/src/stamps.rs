//! Stamp store — persisted `lastchange` / `success` epoch seconds per syncer.
//!
//! Two files per syncer in the state directory:
//! `<name>_lastchange_stamp` and `<name>_success_stamp`, each holding one
//! decimal epoch-second integer. The in-memory cache is authoritative during
//! a process lifetime; disk is the source of truth across restarts and for
//! the remote helper. Readers tolerate a missing or empty file as unknown.
//! Stamps never decrease on disk.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::SyncerName;

/// Path of the `success` stamp file for `name` under `statedir`.
pub fn success_path_at(statedir: &Path, name: &SyncerName) -> PathBuf {
    statedir.join(format!("{name}_success_stamp"))
}

/// Path of the `lastchange` stamp file for `name` under `statedir`.
pub fn lastchange_path_at(statedir: &Path, name: &SyncerName) -> PathBuf {
    statedir.join(format!("{name}_lastchange_stamp"))
}

/// Read one stamp file.
///
/// A missing file or non-numeric content reads as `None`; any other I/O
/// failure is reported so the remote helper can exit non-zero on it.
pub fn read_stamp(path: &Path) -> io::Result<Option<u64>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse::<u64>().ok()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Current time as epoch seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Per-syncer stamp cache with best-effort persistence.
#[derive(Debug)]
pub struct StampStore {
    statedir: PathBuf,
    name: SyncerName,
    lastchange: Option<u64>,
    success: Option<u64>,
}

impl StampStore {
    /// Open the store, priming the cache from whatever is on disk.
    pub fn open(statedir: &Path, name: SyncerName) -> Self {
        let lastchange = read_stamp(&lastchange_path_at(statedir, &name))
            .ok()
            .flatten();
        let success = read_stamp(&success_path_at(statedir, &name)).ok().flatten();
        Self {
            statedir: statedir.to_path_buf(),
            name,
            lastchange,
            success,
        }
    }

    pub fn lastchange(&self) -> Option<u64> {
        self.lastchange
    }

    pub fn success(&self) -> Option<u64> {
        self.success
    }

    /// Record the latest observed local change.
    ///
    /// Values below the cached stamp are ignored to keep the on-disk value
    /// monotonically non-decreasing. The write itself is best-effort; the
    /// returned error is for the caller to log.
    pub fn set_lastchange(&mut self, ts: u64) -> io::Result<()> {
        if self.lastchange.is_some_and(|cur| ts < cur) {
            return Ok(());
        }
        self.lastchange = Some(ts);
        write_stamp(&lastchange_path_at(&self.statedir, &self.name), ts)
    }

    /// Record the start time of the last fully successful pipeline.
    pub fn set_success(&mut self, ts: u64) -> io::Result<()> {
        if self.success.is_some_and(|cur| ts < cur) {
            return Ok(());
        }
        self.success = Some(ts);
        write_stamp(&success_path_at(&self.statedir, &self.name), ts)
    }
}

fn write_stamp(path: &Path, ts: u64) -> io::Result<()> {
    std::fs::write(path, ts.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
