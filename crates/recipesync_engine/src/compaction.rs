//! Tombstone compaction hook.
//!
//! The engine never purges on its own timing. After a merge that created
//! tombstones it notifies the configured hook, which decides what to do.

use recipesync_store::{LocalStore, StoreResult, Table};
use tracing::debug;

/// Called after a committed merge created tombstones.
pub trait CompactionHook: Send + Sync {
    /// `created` tombstones were just written to `table`.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller and never fail the sync round.
    fn tombstones_created(&self, store: &LocalStore, table: Table, created: usize) -> StoreResult<()>;
}

/// Purges synced tombstones once enough of them have piled up, then
/// checkpoints the journal.
#[derive(Debug, Clone, Copy)]
pub struct PurgeSyncedTombstones {
    threshold: usize,
}

impl PurgeSyncedTombstones {
    /// Purges once at least `threshold` tombstones exist in the table.
    pub const fn new(threshold: usize) -> Self {
        Self { threshold }
    }
}

impl Default for PurgeSyncedTombstones {
    fn default() -> Self {
        Self::new(64)
    }
}

impl CompactionHook for PurgeSyncedTombstones {
    fn tombstones_created(&self, store: &LocalStore, table: Table, _created: usize) -> StoreResult<()> {
        if store.tombstones(table).len() < self.threshold {
            return Ok(());
        }
        let purged = store.purge_tombstones(table, |_| true)?;
        store.checkpoint()?;
        debug!(table = %table, purged, "tombstones compacted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipesync_store::{fields, StoreError};

    #[test]
    fn purges_only_past_threshold() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .atomically(|txn| {
                for i in 0..3 {
                    let r = txn.insert_synced(Table::Recipes, fields([("title", format!("r{i}"))]));
                    txn.retire(&r)?;
                }
                Ok::<_, StoreError>(())
            })
            .unwrap();

        PurgeSyncedTombstones::new(4)
            .tombstones_created(&store, Table::Recipes, 3)
            .unwrap();
        assert_eq!(store.tombstones(Table::Recipes).len(), 3);

        PurgeSyncedTombstones::new(3)
            .tombstones_created(&store, Table::Recipes, 3)
            .unwrap();
        assert!(store.tombstones(Table::Recipes).is_empty());
    }
}
