//! Peer-side two-phase commit.
//!
//! Executed by `anysyncd-helper commit <syncer>` on each peer. The staged
//! tree is mirrored next to the live tree and swapped in with renames; the
//! previous live tree is recycled as the next staging area so the following
//! swap stays cheap.
//!
//! Not idempotent under partial failure: a crash between the renames leaves
//! the rotation incomplete and recovery relies on the next sync re-running
//! the mirror step.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anysyncd_core::stamps::{lastchange_path_at, read_stamp, success_path_at};
use anysyncd_core::types::SyncerName;

use crate::error::{io_err, SyncError};
use crate::mirror::MirrorRunner;

/// Staging sibling of the live tree: `/srv/www` → `/srv/.www.tmp`.
pub fn staging_dir(prod: &Path) -> PathBuf {
    sibling(prod, |name| format!(".{name}.tmp"))
}

/// Backup sibling used during the swap: `/srv/www` → `/srv/www.bak`.
pub fn backup_dir(prod: &Path) -> PathBuf {
    sibling(prod, |name| format!("{name}.bak"))
}

fn sibling(prod: &Path, rename: impl Fn(&str) -> String) -> PathBuf {
    let name = prod
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    prod.with_file_name(rename(&name))
}

/// Atomically swap the staged content into the live tree.
///
/// 1. Mirror `csync` into the staging sibling (archive + delete).
/// 2. If `prod` exists, rename it aside to the backup sibling.
/// 3. Rename staging → `prod`.
/// 4. If the backup exists, rename it back to staging for the next round.
pub async fn commit_swap(
    mirror: &MirrorRunner,
    prod: &Path,
    csync: &Path,
) -> Result<(), SyncError> {
    let staging = staging_dir(prod);
    let backup = backup_dir(prod);

    if !staging.exists() {
        std::fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
    }
    mirror.mirror_plain(csync, &staging).await?;

    match std::fs::rename(prod, &backup) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(prod, err)),
    }
    std::fs::rename(&staging, prod).map_err(|e| io_err(&staging, e))?;
    match std::fs::rename(&backup, &staging) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(&backup, err)),
    }

    Ok(())
}

/// Build the `"<success>:<lastchange>"` response for the stamps operation.
///
/// Missing or non-numeric stamp files yield empty fields; an I/O failure on
/// a present file propagates so the helper exits non-zero.
pub fn stamps_line(statedir: &Path, name: &SyncerName) -> Result<String, SyncError> {
    let success_path = success_path_at(statedir, name);
    let lastchange_path = lastchange_path_at(statedir, name);
    let success = read_stamp(&success_path).map_err(|e| io_err(&success_path, e))?;
    let lastchange = read_stamp(&lastchange_path).map_err(|e| io_err(&lastchange_path, e))?;
    Ok(format!(
        "{}:{}",
        success.map(|v| v.to_string()).unwrap_or_default(),
        lastchange.map(|v| v.to_string()).unwrap_or_default()
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
