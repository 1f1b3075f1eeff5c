//! Compact command implementation.

use super::open_store;
use recipesync_store::{SyncStatus, Table};
use std::path::Path;
use tracing::debug;

/// Runs the compact command.
///
/// Only tombstones the server already knows about are purged; deletions
/// still waiting to be pushed are kept.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let store = open_store(path)?;
    let before = store.stats()?.journal_bytes;

    println!("Compacting {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let mut total = 0;
    for table in Table::ALL {
        let purgeable = store
            .tombstones(table)
            .iter()
            .filter(|r| r.status == SyncStatus::Synced)
            .count();
        let purged = if dry_run || purgeable == 0 {
            purgeable
        } else {
            store.purge_tombstones(table, |_| true)?
        };
        debug!(table = %table, purged, "tombstones");
        println!("  {:<12} {} tombstone(s)", table.name(), purged);
        total += purged;
    }

    if dry_run {
        println!();
        println!("{total} tombstone(s) would be purged");
        return Ok(());
    }

    store.checkpoint()?;
    let after = store.stats()?.journal_bytes;
    println!();
    println!("  Size before: {before} bytes");
    println!("  Size after:  {after} bytes");
    println!("✓ Compaction complete");
    Ok(())
}
