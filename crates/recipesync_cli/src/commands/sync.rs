//! Sync command implementation.

use super::{coordinator, open_store, Remote};
use recipesync_engine::{SkipReason, SyncOutcome, SyncReport};
use std::path::Path;

/// Runs one sync round against the configured server.
pub fn run(path: &Path, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = coordinator(open_store(path)?, remote)?;
    println!("Syncing with {}", coordinator.config().base_url);

    match coordinator.sync() {
        Ok(SyncOutcome::Completed(report)) => {
            print!("{}", summarize(&report));
            Ok(())
        }
        Ok(SyncOutcome::Skipped(SkipReason::NoCredential)) => {
            println!("Not signed in; nothing to do");
            Ok(())
        }
        Ok(SyncOutcome::Skipped(SkipReason::AlreadyRunning)) => {
            println!("A sync is already running");
            Ok(())
        }
        Err(e) => {
            if e.is_unauthorized() {
                println!("The server rejected the session; log in again");
            } else if e.is_retryable() {
                println!("Sync failed; local changes are kept and will be retried");
            }
            Err(e.into())
        }
    }
}

fn summarize(report: &SyncReport) -> String {
    let merged = &report.merged;
    let mut out = format!("Pull:   {:?}, {} change(s)\n", report.pull_status, report.pulled);
    out.push_str(&format!(
        "Merge:  {} inserted, {} replaced, {} duplicate draft(s), {} removed\n",
        merged.inserted, merged.replaced, merged.title_collisions, merged.removed
    ));
    out.push_str(&format!("Push:   {} change(s)\n", report.pushed));
    match report.cursor {
        Some(cursor) => out.push_str(&format!("Cursor: {cursor}\n")),
        None => out.push_str("Cursor: none\n"),
    }
    out.push_str(&format!("Took {} ms\n", report.duration.as_millis()));
    out
}
