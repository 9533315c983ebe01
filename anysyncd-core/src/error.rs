//! Error types for anysyncd-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file did not exist at the expected path.
    #[error("configuration file not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// INI parse error on load, with file path context.
    #[error("failed to parse configuration at {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A syncer section is missing a key its handler requires.
    #[error("syncer '{section}' is missing required key '{key}'")]
    MissingKey { section: String, key: String },

    /// The `handler` key named a variant outside the closed set.
    #[error("syncer '{section}' has unknown handler '{value}' (expected: mirror, csync2)")]
    UnknownHandler { section: String, value: String },

    /// A key was present but could not be interpreted.
    #[error("syncer '{section}' has invalid value for '{key}': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
