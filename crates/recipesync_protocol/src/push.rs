//! Push request encoding.

use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One flattened local change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEntry {
    /// Remote identity if known, else the local identity.
    pub id: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Ingredients, comma-joined.
    pub ingredients: String,
    /// Steps, newline-joined.
    pub steps: String,
    /// Cooking time.
    pub cooking_time: String,
    /// Remote identity, `null` for drafts.
    pub remote_id: Option<String>,
    /// `created`, `updated` or `deleted`.
    pub sync_status: String,
}

/// Body of `POST /recipes/sync/push`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Flattened changes per table.
    pub changes: BTreeMap<String, Vec<PushEntry>>,
    /// Cursor the client last pulled at.
    #[serde(rename = "lastPulledAt")]
    pub last_pulled_at: Option<i64>,
    /// True when the push is the final flush before sign-out.
    pub is_logout: bool,
}

impl PushRequest {
    /// Creates an empty push request.
    pub fn new(last_pulled_at: Option<i64>, is_logout: bool) -> Self {
        Self {
            changes: BTreeMap::new(),
            last_pulled_at,
            is_logout,
        }
    }

    /// Adds a table's changes, flattened in created, updated, deleted order.
    ///
    /// Each entry's `sync_status` is overwritten with the list it came from.
    pub fn add_table(
        &mut self,
        table: impl Into<String>,
        created: Vec<PushEntry>,
        updated: Vec<PushEntry>,
        deleted: Vec<PushEntry>,
    ) {
        let tag = |status: &'static str| {
            move |mut entry: PushEntry| {
                entry.sync_status = status.to_string();
                entry
            }
        };

        let flat = created
            .into_iter()
            .map(tag("created"))
            .chain(updated.into_iter().map(tag("updated")))
            .chain(deleted.into_iter().map(tag("deleted")))
            .collect();

        self.changes.insert(table.into(), flat);
    }

    /// Total number of entries across tables.
    pub fn len(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }

    /// Returns true if there is nothing to push.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
