//! Named app-state slots.
//!
//! Each key holds at most one live value. Setting a key retires the old
//! value(s) in the same transaction before inserting the new one.

use crate::error::{StoreError, StoreResult};
use crate::models::{Model, NamedState};
use crate::store::{LocalStore, WriteTxn};
use crate::types::{now_millis, Filter, Record, Table};

/// App-state key signalling that the recipe list should be reloaded.
pub const SHOULD_REFRESH_RECIPES: &str = "shouldRefreshRecipes";

impl WriteTxn<'_> {
    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Propagates store errors from retiring the previous value.
    pub fn set_app_state(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.clear_app_state(key)?;
        let slot = NamedState {
            key: key.to_string(),
            value: value.to_string(),
            created_at: now_millis(),
        };
        self.create(Table::AppState, slot.to_fields());
        Ok(())
    }

    /// Retires every value stored under `key`. Returns how many were live.
    ///
    /// # Errors
    ///
    /// Propagates store errors from retiring a value.
    pub fn clear_app_state(&mut self, key: &str) -> StoreResult<usize> {
        let old = self.query(Table::AppState, &Filter::eq("key", key));
        for record in &old {
            self.retire(record)?;
        }
        Ok(old.len())
    }

    /// Returns the value stored under `key`.
    pub fn app_state(&self, key: &str) -> Option<String> {
        latest(self.query(Table::AppState, &Filter::eq("key", key)))
    }
}

impl LocalStore {
    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn set_app_state(&self, key: &str, value: &str) -> StoreResult<()> {
        self.atomically(|txn| txn.set_app_state(key, value))
    }

    /// Returns the value stored under `key`.
    pub fn app_state(&self, key: &str) -> Option<String> {
        latest(self.query(Table::AppState, &Filter::eq("key", key)))
    }

    /// Removes the value stored under `key`. Returns true if one was live.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn clear_app_state(&self, key: &str) -> StoreResult<bool> {
        self.atomically(|txn| Ok::<_, StoreError>(txn.clear_app_state(key)? > 0))
    }

    /// Returns every live app-state slot, oldest first.
    pub fn app_state_entries(&self) -> Vec<NamedState> {
        self.query(Table::AppState, &Filter::all())
            .iter()
            .filter_map(|r| NamedState::from_record(r).ok())
            .collect()
    }
}

fn latest(records: Vec<Record>) -> Option<String> {
    records.last().map(|r| r.text("value").to_string())
}
