//! anysyncd core library — domain types, configuration, stamp store.
//!
//! Public API surface:
//! - [`types`] — newtypes and the closed handler variant set
//! - [`config`] — INI loading and validation
//! - [`stamps`] — persisted `lastchange` / `success` epoch stamps
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod stamps;
pub mod types;

pub use config::DaemonConfig;
pub use error::ConfigError;
pub use stamps::StampStore;
pub use types::{Handler, HandlerKind, SyncerConfig, SyncerName};
