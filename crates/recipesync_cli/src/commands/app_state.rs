//! App-state command implementation.

use super::open_store;
use std::path::Path;

/// Lists, reads, writes or clears app-state flags.
pub fn run(
    path: &Path,
    key: Option<&str>,
    value: Option<&str>,
    clear: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;

    let Some(key) = key else {
        let entries = store.app_state_entries();
        if entries.is_empty() {
            println!("No app state");
        }
        for entry in entries {
            println!("{} = {}", entry.key, entry.value);
        }
        return Ok(());
    };

    if clear {
        if store.clear_app_state(key)? {
            println!("Cleared {key}");
        } else {
            println!("{key} is not set");
        }
        return Ok(());
    }

    match value {
        Some(value) => {
            store.set_app_state(key, value)?;
            println!("{key} = {value}");
        }
        None => match store.app_state(key) {
            Some(value) => println!("{key} = {value}"),
            None => println!("{key} is not set"),
        },
    }
    Ok(())
}
