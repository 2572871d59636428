//! The set of files awaiting diagnostics re-computation.

use std::time::Instant;

use lsp_types::Url;

use crate::resource_map::{MapConfig, PathNormalizer, ResourceMap, ResourceSet};

/// Files queued for the next diagnostics drain, each carrying the moment it
/// was queued.
///
/// Re-queueing a file overwrites its timestamp; a later request supersedes
/// an earlier one for the same file.
pub struct PendingDiagnostics {
    map: ResourceMap<Instant>,
}

impl PendingDiagnostics {
    /// Creates an empty queue with the given keying policy.
    #[must_use]
    pub fn new(normalizer: PathNormalizer, config: MapConfig) -> Self {
        Self {
            map: ResourceMap::new(normalizer, config),
        }
    }

    /// Queues `resource`, superseding any earlier entry for it.
    pub fn insert(&mut self, resource: &Url, timestamp: Instant) {
        self.map.insert(resource, timestamp);
    }

    /// Drops `resource` from the queue.
    pub fn remove(&mut self, resource: &Url) {
        self.map.remove(resource);
    }

    /// Empties the queue.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of queued files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the queued files ordered by age, oldest request first.
    /// Entries queued at the same instant keep their insertion order.
    #[must_use]
    pub fn get_ordered_file_set(&self) -> ResourceSet {
        let mut entries: Vec<(&Url, Instant)> =
            self.map.entries().map(|(resource, ts)| (resource, *ts)).collect();
        entries.sort_by_key(|(_, timestamp)| *timestamp);

        let mut ordered = ResourceSet::new(self.map.normalizer(), self.map.config());
        for (resource, _) in entries {
            ordered.insert(resource, ());
        }
        ordered
    }
}
