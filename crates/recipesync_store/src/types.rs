//! Core record types for the local store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// The four tables of the local schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Session credentials (`jwt`, `created_at`).
    Tokens,
    /// Signed-in profile (`name`, `email`, `created_at`).
    Users,
    /// Recipes (`title`, `description`, `ingredients`, `steps`,
    /// `cooking_time`, `remote_id`).
    Recipes,
    /// Named key/value signals (`key`, `value`, `created_at`).
    AppState,
}

impl Table {
    /// Every table, in schema order.
    pub const ALL: [Table; 4] = [Table::Tokens, Table::Users, Table::Recipes, Table::AppState];

    /// Returns the table name used in the schema and on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Table::Tokens => "tokens",
            Table::Users => "users",
            Table::Recipes => "recipes",
            Table::AppState => "app_state",
        }
    }

    /// Looks a table up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Returns true if local writes to this table are tracked for push.
    ///
    /// Tokens, users and app state never leave the device.
    #[must_use]
    pub const fn is_synced(self) -> bool {
        matches!(self, Table::Recipes)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Local identity of a record.
///
/// Record IDs are random UUIDs assigned on create and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a record ID from its string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldValue {
    /// Absent value. Only optional columns (`remote_id`) hold it.
    #[default]
    Null,
    /// Text column.
    Text(String),
    /// Numeric column (timestamps).
    Integer(i64),
}

impl FieldValue {
    /// Returns the text value, if this is a text field.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer field.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true for [`FieldValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Column values of a record, keyed by column name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Builds a [`Fields`] map from `(name, value)` pairs.
pub fn fields<I, K, V>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Push state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing to push.
    Synced,
    /// Created locally, never pushed.
    Created,
    /// Changed locally since the last push.
    Updated,
    /// Deleted locally, deletion not yet pushed.
    Deleted,
}

impl SyncStatus {
    /// Returns the wire name (`created`, `updated`, `deleted`, `synced`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Created => "created",
            SyncStatus::Updated => "updated",
            SyncStatus::Deleted => "deleted",
        }
    }

    /// Returns true if the record has a change waiting to be pushed.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !matches!(self, SyncStatus::Synced)
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Local identity.
    pub id: RecordId,
    /// Owning table.
    pub table: Table,
    /// Column values.
    pub fields: Fields,
    /// Push state.
    pub status: SyncStatus,
    /// Tombstone flag. Tombstones are invisible to `find` and `query`.
    pub deleted: bool,
    /// Creation order within the store.
    pub seq: u64,
    /// Bumped on every write to this record.
    pub revision: u64,
}

impl Record {
    /// Returns the value of a column, `Null` if it is absent.
    #[must_use]
    pub fn get(&self, field: &str) -> &FieldValue {
        static NULL: FieldValue = FieldValue::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Returns a text column, or `""` if absent or not text.
    #[must_use]
    pub fn text(&self, field: &str) -> &str {
        self.get(field).as_text().unwrap_or("")
    }

    /// Returns a non-empty text column, or `None`.
    #[must_use]
    pub fn optional_text(&self, field: &str) -> Option<&str> {
        self.get(field).as_text().filter(|s| !s.is_empty())
    }

    /// Returns an integer column, or `0` if absent.
    #[must_use]
    pub fn integer(&self, field: &str) -> i64 {
        self.get(field).as_integer().unwrap_or_default()
    }

    /// Returns true if the record is live (not a tombstone).
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// Single-field predicate for queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every live record.
    All,
    /// `field == value`.
    Eq(String, FieldValue),
    /// `field` is absent, null, or the empty string.
    IsNull(String),
}

impl Filter {
    /// Matches every live record.
    #[must_use]
    pub fn all() -> Self {
        Filter::All
    }

    /// Equality match on one field.
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    /// Matches records whose `field` holds no value.
    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }

    /// Evaluates the predicate against a record's fields.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => record.get(field) == value,
            Filter::IsNull(field) => match record.get(field) {
                FieldValue::Null => true,
                FieldValue::Text(s) => s.is_empty(),
                FieldValue::Integer(_) => false,
            },
        }
    }
}
