//! Domain types for anysyncd syncers.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem
//! paths. Handler selection is a closed variant set resolved at configuration
//! time; adding a handler is a source change, not a runtime plugin.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for one configured replication unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncerName(pub String);

impl fmt::Display for SyncerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SyncerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SyncerName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Handler variants
// ---------------------------------------------------------------------------

/// The closed set of syncer handler kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Local mirror only: `from` → `to`, no network phase.
    Mirror,
    /// Two-phase group replication: local snapshot, peer freshness check,
    /// group distribution, atomic remote commit.
    Csync2,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Mirror => write!(f, "mirror"),
            HandlerKind::Csync2 => write!(f, "csync2"),
        }
    }
}

impl FromStr for HandlerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mirror" => Ok(HandlerKind::Mirror),
            "csync2" => Ok(HandlerKind::Csync2),
            other => Err(format!("unknown handler '{other}'")),
        }
    }
}

/// A validated handler with its variant-specific configuration.
#[derive(Debug, Clone)]
pub enum Handler {
    /// Simple local mirror from one directory to another.
    Mirror { from: PathBuf, to: PathBuf },
    /// Two-phase replication of `prod_dir` to `remote_hosts` via the
    /// staging tree in `csync_dir`.
    Csync2 {
        prod_dir: PathBuf,
        csync_dir: PathBuf,
        remote_hosts: Vec<String>,
        remote_prefix_command: Option<String>,
        /// Group name handed to the distribution primitive; defaults to the
        /// syncer name.
        csync_group: String,
    },
}

impl Handler {
    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Mirror { .. } => HandlerKind::Mirror,
            Handler::Csync2 { .. } => HandlerKind::Csync2,
        }
    }
}

// ---------------------------------------------------------------------------
// Syncer configuration
// ---------------------------------------------------------------------------

/// Default quiescence window following the first event of a burst.
pub const DEFAULT_WAITING_TIME: Duration = Duration::from_secs(5);

/// Default minimum spacing between local-mirror attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Default ignore pattern for watcher events.
pub const DEFAULT_FILTER: &str = r"\.(swp|tmp)$";

/// One configured replication unit.
#[derive(Debug, Clone)]
pub struct SyncerConfig {
    pub name: SyncerName,
    pub handler: Handler,
    /// Directory the watcher subscribes to, recursively.
    pub watcher: PathBuf,
    /// Events whose path matches are discarded before coalescing.
    pub filter: Regex,
    /// Quiescence window after the first event of a burst.
    pub waiting_time: Duration,
    /// Minimum spacing between local-mirror attempts.
    pub retry_interval: Duration,
    /// Optional cron expression for periodic full syncs.
    pub cron: Option<String>,
    /// When configured and the file is absent, the syncer is paused.
    pub noop_file: Option<PathBuf>,
    pub admin_from: Option<String>,
    pub admin_to: Option<String>,
}

impl SyncerConfig {
    /// Whether the error reporter should attempt mail delivery.
    pub fn mail_enabled(&self) -> bool {
        self.admin_from.is_some() && self.admin_to.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
