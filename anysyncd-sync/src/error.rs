//! Error types for anysyncd-sync.

use std::fmt::Write as _;
use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from pipeline and helper operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured external program could not be launched at all.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The mirror primitive exited non-zero.
    #[error("mirror from {from} to {to} failed ({status}): {stderr}")]
    MirrorFailed {
        from: PathBuf,
        to: PathBuf,
        status: String,
        stderr: String,
    },

    /// The post-mirror equality check found differing trees.
    #[error("mirror verification found differences between {from} and {to}: {details}")]
    VerifyFailed {
        from: PathBuf,
        to: PathBuf,
        details: String,
    },

    /// The local-mirror loop hit its iteration ceiling.
    #[error("could not achieve a consistent local sync state after 100 retries")]
    RetriesExceeded,

    /// A peer has local changes newer than its last confirmed sync.
    #[error(
        "peer {host} is ahead of its last sync (lastchange {lastchange} > success {success}); refusing to overwrite"
    )]
    PeerStale {
        host: String,
        success: u64,
        lastchange: u64,
    },

    /// The remote helper invocation failed (network or exec).
    #[error("remote helper on {host} failed: {message}")]
    PeerTransport { host: String, message: String },

    /// The stamps response did not match `"<success>:<lastchange>"`.
    #[error("unparsable stamps response from {host}: {line:?}")]
    StampsParse { host: String, line: String },

    /// The group replication primitive exited non-zero.
    #[error("distribution for group '{group}' failed ({status}): {stderr}")]
    DistributeFailed {
        group: String,
        status: String,
        stderr: String,
    },

    /// One or more peers failed the commit phase. Peers that committed
    /// before the failure keep their new tree.
    #[error("{}", render_commit_failures(.failures))]
    CommitFailed { failures: Vec<(String, String)> },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

fn render_commit_failures(failures: &[(String, String)]) -> String {
    let mut out = String::from("commit failed on");
    for (host, reason) in failures {
        let _ = write!(out, " {host}: {reason};");
    }
    out.trim_end_matches(';').to_string()
}
