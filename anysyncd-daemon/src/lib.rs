//! Daemon runtime: per-syncer coalescing actors, watcher subscriptions,
//! cron triggers, pipeline worker offload, and signal handling.

mod error;
pub mod cron_trigger;
pub mod logging;
pub mod reporter;
pub mod runtime;
pub mod syncer;

pub use error::DaemonError;
pub use logging::ReopenableLog;
pub use runtime::{run, start_blocking};
pub use syncer::SyncerHandle;
