//! Inspect command implementation.

use super::open_store;
use recipesync_engine::Session;
use recipesync_store::{StoreStats, SCHEMA_VERSION};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Schema version of this build.
    pub schema_version: u32,
    /// Sync cursor, if any sync has completed.
    pub cursor: Option<i64>,
    /// Whether a credential is stored.
    pub signed_in: bool,
    /// Per-table counts.
    pub tables: Vec<TableRow>,
}

/// Counts for a single table.
#[derive(Debug, Serialize)]
pub struct TableRow {
    /// Table name.
    pub name: String,
    /// Live records.
    pub live: usize,
    /// Tombstones not yet purged.
    pub tombstones: usize,
    /// Records waiting to be pushed.
    pub pending: usize,
}

impl InspectResult {
    fn new(path: &Path, stats: &StoreStats, signed_in: bool) -> Self {
        Self {
            path: path.display().to_string(),
            journal_bytes: stats.journal_bytes,
            schema_version: SCHEMA_VERSION,
            cursor: stats.cursor,
            signed_in,
            tables: stats
                .tables
                .iter()
                .map(|t| TableRow {
                    name: t.table.name().to_string(),
                    live: t.live,
                    tombstones: t.tombstones,
                    pending: t.pending,
                })
                .collect(),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let store = Arc::new(open_store(path)?);
    let stats = store.stats()?;
    let signed_in = Session::new(Arc::clone(&store)).is_signed_in();
    let result = InspectResult::new(path, &stats, signed_in);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_text(&result);
    }
    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!("Journal size:   {} bytes", result.journal_bytes);
    println!("Schema version: {}", result.schema_version);
    match result.cursor {
        Some(cursor) => println!("Cursor:         {cursor}"),
        None => println!("Cursor:         never synced"),
    }
    println!("Signed in:      {}", if result.signed_in { "yes" } else { "no" });
    println!();
    println!("{:<12} {:>6} {:>11} {:>8}", "table", "live", "tombstones", "pending");
    for table in &result.tables {
        println!(
            "{:<12} {:>6} {:>11} {:>8}",
            table.name, table.live, table.tombstones, table.pending
        );
    }
}
