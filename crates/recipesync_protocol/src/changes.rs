//! Typed change-sets.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Name of the recipes table on the wire.
pub const RECIPES_TABLE: &str = "recipes";

/// Tables the server may report changes for.
pub const KNOWN_TABLES: [&str; 4] = [RECIPES_TABLE, "users", "tokens", "app_state"];

const INGREDIENT_SEPARATOR: &str = ", ";
const STEP_SEPARATOR: &str = "\n";

/// A recipe as sent by the server, id-normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRecipe {
    /// Server identity, trimmed and non-empty after decoding.
    pub remote_id: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Ingredients, joined with `", "`.
    pub ingredients: String,
    /// Steps, joined with `"\n"`.
    pub steps: String,
    /// Cooking time.
    pub cooking_time: String,
}

impl RemoteRecipe {
    /// Creates a remote recipe with an identity and a title.
    pub fn new(remote_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Reads a recipe from a JSON object.
    ///
    /// Returns `None` when no identity can be derived from `id` or `ID`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            remote_id: identity_of(obj)?,
            title: scalar(obj.get("title")),
            description: scalar(obj.get("description")),
            ingredients: joined(obj.get("ingredients"), INGREDIENT_SEPARATOR),
            steps: joined(obj.get("steps"), STEP_SEPARATOR),
            cooking_time: scalar(obj.get("cooking_time")),
        })
    }
}

/// Changes to one table: `{created, updated, deleted}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableChanges {
    /// Records new to this client.
    pub created: Vec<RemoteRecipe>,
    /// Records changed on the server.
    pub updated: Vec<RemoteRecipe>,
    /// Remote identities deleted on the server.
    pub deleted: Vec<String>,
}

impl TableChanges {
    /// Returns true if the table has no changes.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// A pulled change-set.
///
/// Only recipes are merged locally; entries for other known tables are
/// counted so they can be reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Recipe changes.
    pub recipes: TableChanges,
    /// Entry counts for tables that are accepted but not merged.
    pub ignored: BTreeMap<String, usize>,
}

impl ChangeSet {
    /// An empty change-set for every known table.
    ///
    /// Tables other than recipes start with a zero count in `ignored`.
    pub fn empty() -> Self {
        Self {
            recipes: TableChanges::default(),
            ignored: KNOWN_TABLES
                .into_iter()
                .filter(|table| *table != RECIPES_TABLE)
                .map(|table| (table.to_string(), 0))
                .collect(),
        }
    }

    /// Returns true if no table has changes.
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty() && self.ignored.values().all(|n| *n == 0)
    }
}

/// Derives the remote identity of a JSON object from `id` or `ID`.
pub(crate) fn identity_of(obj: &Map<String, Value>) -> Option<String> {
    ["id", "ID"]
        .into_iter()
        .filter_map(|key| obj.get(key))
        .find_map(identity)
}

/// Coerces a bare id (string or number) to a trimmed non-empty string.
pub(crate) fn identity(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn joined(value: Option<&Value>, separator: &str) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| scalar(Some(item)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(separator),
        other => scalar(other),
    }
}
