//! Mutex-guarded pending-path set shared between the syncer's event handling
//! and a running pipeline.
//!
//! The pipeline drains the set at the start of each local-mirror attempt and
//! re-checks emptiness right after the mirror returns; both operations take
//! the same lock, so no event observed before a drain can be lost.

use std::collections::BTreeSet;
use std::sync::Mutex;

/// Unordered set of path strings awaiting replication.
#[derive(Debug, Default)]
pub struct PendingSet {
    paths: Mutex<BTreeSet<String>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append paths. Duplicates collapse; the pipeline mirrors whole trees,
    /// so only membership matters.
    pub fn add<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.paths.lock().expect("pending set poisoned");
        guard.extend(paths.into_iter().map(Into::into));
    }

    /// Atomically take everything, leaving the set empty.
    pub fn drain(&self) -> BTreeSet<String> {
        let mut guard = self.paths.lock().expect("pending set poisoned");
        std::mem::take(&mut *guard)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().expect("pending set poisoned").is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.lock().expect("pending set poisoned").len()
    }
}
