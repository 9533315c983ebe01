//! # anysyncd-sync
//!
//! Consistency pipeline and its collaborators.
//!
//! [`pipeline::run`] is the canonical entrypoint for both the daemon's
//! event-triggered runs and cron-triggered full syncs. [`commit`] holds the
//! peer-side two-phase swap executed by `anysyncd-helper`.

pub mod commit;
pub mod error;
pub mod mirror;
pub mod pending;
pub mod pipeline;
pub mod remote;

pub use error::SyncError;
pub use mirror::MirrorRunner;
pub use pending::PendingSet;
pub use pipeline::{PipelineContext, PipelineRun, MAX_MIRROR_RETRIES};
pub use remote::{PeerStamps, RemoteRunner};
