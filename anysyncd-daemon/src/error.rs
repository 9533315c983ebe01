use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syncer '{syncer}' has invalid cron expression: {message}")]
    InvalidCron { syncer: String, message: String },

    #[error("signal handler setup failed: {0}")]
    Signal(#[source] std::io::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
