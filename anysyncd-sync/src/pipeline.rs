//! Pipeline driver state machine.
//!
//! `Idle → Local-Mirror → Freshness-Check → Distribute → Commit → Idle`,
//! with every failure branch unwinding to the caller (the daemon's
//! completion handling releases the lock, skips the success stamp, and
//! dispatches the reporter). This module performs no locking itself; the
//! per-syncer serialization lives in the daemon.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;

use anysyncd_core::stamps::unix_now;
use anysyncd_core::types::{Handler, SyncerName};

use crate::error::SyncError;
use crate::mirror::{render_status, split_command, MirrorRunner};
use crate::pending::PendingSet;
use crate::remote::RemoteRunner;

/// Safety ceiling for the local-mirror loop. Not a transport retry policy;
/// it bounds runaway iteration under pathological write loads.
pub const MAX_MIRROR_RETRIES: usize = 100;

/// Everything one pipeline run needs, assembled by the daemon per syncer.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub name: SyncerName,
    pub handler: Handler,
    pub mirror: MirrorRunner,
    pub remote: RemoteRunner,
    /// Group replication primitive (command string, may carry arguments).
    pub csync_command: String,
    pub pending: Arc<PendingSet>,
    /// Minimum spacing between local-mirror attempts.
    pub retry_interval: Duration,
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineRun {
    /// `pending` was empty and this was not a full sync; nothing ran.
    Skipped,
    /// All phases finished. `start_ts` was captured just before the final
    /// successful local mirror and becomes the `success` stamp.
    Completed { start_ts: u64 },
}

/// Run the pipeline once.
///
/// The caller must hold the syncer's lock for the duration of this future.
pub async fn run(ctx: &PipelineContext, full_sync: bool) -> Result<PipelineRun, SyncError> {
    if !full_sync && ctx.pending.is_empty() {
        return Ok(PipelineRun::Skipped);
    }

    match &ctx.handler {
        Handler::Mirror { from, to } => {
            let start_ts = local_mirror_loop(ctx, from, to).await?;
            Ok(PipelineRun::Completed { start_ts })
        }
        Handler::Csync2 {
            prod_dir,
            csync_dir,
            remote_hosts,
            csync_group,
            ..
        } => {
            let start_ts = local_mirror_loop(ctx, prod_dir, csync_dir).await?;
            freshness_check(ctx, remote_hosts).await?;
            distribute(ctx, csync_group).await?;
            commit_phase(ctx, remote_hosts).await?;
            Ok(PipelineRun::Completed { start_ts })
        }
    }
}

// ---------------------------------------------------------------------------
// Local-Mirror
// ---------------------------------------------------------------------------

/// Repeat the mirror until an iteration sees no error and no interference,
/// keeping `retry_interval` spacing between attempts.
///
/// Returns the epoch second captured just before the final clean mirror;
/// after that instant no unreplicated local change can have been initiated.
async fn local_mirror_loop(
    ctx: &PipelineContext,
    from: &Path,
    to: &Path,
) -> Result<u64, SyncError> {
    for attempt in 1..=MAX_MIRROR_RETRIES {
        let drained = ctx.pending.drain();
        let start_ts = unix_now();
        let started = Instant::now();

        match ctx.mirror.mirror_verified(from, to).await {
            Ok(()) if ctx.pending.is_empty() => {
                tracing::debug!(
                    syncer = %ctx.name,
                    attempt,
                    drained = drained.len(),
                    "local mirror settled"
                );
                return Ok(start_ts);
            }
            Ok(()) => {
                tracing::debug!(
                    syncer = %ctx.name,
                    attempt,
                    pending = ctx.pending.len(),
                    "writes arrived during mirror, retrying"
                );
            }
            Err(err) => {
                tracing::warn!(
                    syncer = %ctx.name,
                    attempt,
                    error = %err,
                    "local mirror attempt failed"
                );
            }
        }

        let elapsed = started.elapsed();
        if elapsed < ctx.retry_interval {
            tokio::time::sleep(ctx.retry_interval - elapsed).await;
        }
    }

    Err(SyncError::RetriesExceeded)
}

// ---------------------------------------------------------------------------
// Freshness-Check
// ---------------------------------------------------------------------------

/// Veto the run if any peer reports local changes newer than its last
/// confirmed sync from this node.
async fn freshness_check(ctx: &PipelineContext, hosts: &[String]) -> Result<(), SyncError> {
    for host in hosts {
        let stamps = ctx.remote.stamps(host, &ctx.name).await?;
        if stamps.is_stale() {
            return Err(SyncError::PeerStale {
                host: host.clone(),
                // is_stale() implies both fields are populated.
                success: stamps.success.unwrap_or_default(),
                lastchange: stamps.lastchange.unwrap_or_default(),
            });
        }
        tracing::debug!(syncer = %ctx.name, host = %host, "peer is fresh");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Distribute
// ---------------------------------------------------------------------------

async fn distribute(ctx: &PipelineContext, group: &str) -> Result<(), SyncError> {
    let (program, leading_args) = split_command(&ctx.csync_command);
    let output = Command::new(&program)
        .args(&leading_args)
        .args(["-x", "-G", group])
        .output()
        .await
        .map_err(|e| SyncError::Spawn {
            program: program.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(SyncError::DistributeFailed {
            group: group.to_string(),
            status: render_status(&output),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Ask every peer to swap its live tree. Failures are accumulated per host;
/// peers that committed before a failure keep their new tree (documented
/// asymmetry: there is no rollback protocol).
async fn commit_phase(ctx: &PipelineContext, hosts: &[String]) -> Result<(), SyncError> {
    let mut failures = Vec::new();
    for host in hosts {
        match ctx.remote.commit(host, &ctx.name).await {
            Ok(()) => tracing::info!(syncer = %ctx.name, host = %host, "peer committed"),
            Err(err) => failures.push((host.clone(), err.to_string())),
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(SyncError::CommitFailed { failures })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
