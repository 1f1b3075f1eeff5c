//! Pull request and response decoding.
//!
//! The pull response is parsed and validated once here. Everything
//! downstream works with the typed [`ChangeSet`].

use crate::changes::{identity, identity_of, ChangeSet, RemoteRecipe, TableChanges, RECIPES_TABLE};
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /recipes/sync/pull`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Cursor of the last successful sync; `null` on a first sync.
    #[serde(rename = "lastPulledAt")]
    pub last_pulled_at: Option<i64>,
}

impl PullRequest {
    /// Creates a pull request from the stored cursor.
    pub fn new(last_pulled_at: Option<i64>) -> Self {
        Self { last_pulled_at }
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// How trustworthy a pulled change-set is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullStatus {
    /// Well-formed response from the server.
    Fresh,
    /// The server could not be reached or answered with an error status.
    Unreachable,
    /// The body was not the expected JSON shape and was read as empty.
    Malformed,
    /// A table was sent as an array where `{created, updated, deleted}` is
    /// required.
    ShapeViolation {
        /// The offending table.
        table: String,
    },
}

impl PullStatus {
    /// Returns true if the cursor may advance past this pull.
    pub fn is_fresh(&self) -> bool {
        matches!(self, PullStatus::Fresh)
    }
}

/// Decoder switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Read a table sent as a bare array as that table's `created` list.
    pub accept_legacy_table_arrays: bool,
}

/// Result of decoding a pull response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPull {
    /// Normalized changes.
    pub changes: ChangeSet,
    /// Server timestamp, if the body carried a usable one.
    pub timestamp: Option<i64>,
    /// Shape verdict.
    pub status: PullStatus,
    /// Entries dropped because no identity could be derived.
    pub dropped: usize,
}

impl DecodedPull {
    fn malformed(timestamp: Option<i64>) -> Self {
        Self {
            changes: ChangeSet::empty(),
            timestamp,
            status: PullStatus::Malformed,
            dropped: 0,
        }
    }
}

/// Decodes a pull response body.
///
/// Never fails: a body that is not JSON, or whose `changes` is missing or
/// not an object, decodes to an empty change-set with
/// [`PullStatus::Malformed`].
pub fn decode_pull_response(body: &[u8], options: DecodeOptions) -> DecodedPull {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return DecodedPull::malformed(None);
    };
    let Some(root) = value.as_object() else {
        return DecodedPull::malformed(None);
    };

    let timestamp = root
        .get("timestamp")
        .and_then(Value::as_i64)
        .filter(|t| *t > 0);

    let Some(changes) = root.get("changes").and_then(Value::as_object) else {
        return DecodedPull::malformed(timestamp);
    };

    let mut decoded = DecodedPull {
        changes: ChangeSet::empty(),
        timestamp,
        status: PullStatus::Fresh,
        dropped: 0,
    };

    for (table, entry) in changes {
        let table_changes = match entry {
            Value::Object(members) => decode_table(members, &mut decoded.dropped),
            Value::Array(items) if options.accept_legacy_table_arrays => {
                let mut legacy = Map::new();
                legacy.insert("created".into(), Value::Array(items.clone()));
                decode_table(&legacy, &mut decoded.dropped)
            }
            Value::Array(_) => {
                if decoded.status.is_fresh() {
                    decoded.status = PullStatus::ShapeViolation {
                        table: table.clone(),
                    };
                }
                continue;
            }
            _ => TableChanges::default(),
        };

        if table == RECIPES_TABLE {
            decoded.changes.recipes = table_changes;
        } else {
            decoded
                .changes
                .ignored
                .insert(table.clone(), table_changes.len());
        }
    }

    decoded
}

fn decode_table(members: &Map<String, Value>, dropped: &mut usize) -> TableChanges {
    let records = |key: &str, dropped: &mut usize| -> Vec<RemoteRecipe> {
        let Some(Value::Array(items)) = members.get(key) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let record = RemoteRecipe::from_json(item);
                if record.is_none() {
                    *dropped += 1;
                }
                record
            })
            .collect()
    };

    let created = records("created", dropped);
    let updated = records("updated", dropped);

    let deleted = match members.get("deleted") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let id = match item {
                    Value::Object(obj) => identity_of(obj),
                    other => identity(other),
                };
                if id.is_none() {
                    *dropped += 1;
                }
                id
            })
            .collect(),
        _ => Vec::new(),
    };

    TableChanges {
        created,
        updated,
        deleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> DecodedPull {
        decode_pull_response(value.to_string().as_bytes(), DecodeOptions::default())
    }

    #[test]
    fn first_sync_sends_null_cursor() {
        let body = PullRequest::new(None).to_json().unwrap();
        assert_eq!(body, br#"{"lastPulledAt":null}"#);

        let body = PullRequest::new(Some(1_700)).to_json().unwrap();
        assert_eq!(body, br#"{"lastPulledAt":1700}"#);
    }

    #[test]
    fn well_formed_response() {
        let decoded = decode(json!({
            "changes": {
                "recipes": {
                    "created": [{"id": 42, "title": "Pasta"}],
                    "updated": [{"ID": "43", "title": "Soup"}],
                    "deleted": ["44", 45, {"id": "46"}],
                },
                "users": {"created": [], "updated": [], "deleted": []},
            },
            "timestamp": 1_700_000_000_000i64,
        }));

        assert_eq!(decoded.status, PullStatus::Fresh);
        assert_eq!(decoded.timestamp, Some(1_700_000_000_000));
        assert_eq!(decoded.changes.recipes.created, vec![RemoteRecipe::new("42", "Pasta")]);
        assert_eq!(decoded.changes.recipes.updated[0].remote_id, "43");
        assert_eq!(decoded.changes.recipes.deleted, vec!["44", "45", "46"]);
        assert_eq!(decoded.changes.ignored.get("users"), Some(&0));
        assert_eq!(decoded.dropped, 0);
    }

    #[test]
    fn tables_missing_from_response_report_zero() {
        let decoded = decode(json!({
            "changes": {"tokens": {"created": [{"id": "t1"}]}},
            "timestamp": 9,
        }));

        assert_eq!(decoded.changes.ignored.get("tokens"), Some(&1));
        assert_eq!(decoded.changes.ignored.get("users"), Some(&0));
        assert_eq!(decoded.changes.ignored.get("app_state"), Some(&0));
        assert!(!decoded.changes.is_empty());
    }

    #[test]
    fn non_object_changes_is_malformed() {
        let decoded = decode(json!({"changes": "not-an-object", "timestamp": 5}));
        assert_eq!(decoded.status, PullStatus::Malformed);
        assert!(decoded.changes.is_empty());
        assert_eq!(decoded.timestamp, Some(5));
    }

    #[test]
    fn garbage_body_is_malformed() {
        let decoded = decode_pull_response(b"<html>oops</html>", DecodeOptions::default());
        assert_eq!(decoded.status, PullStatus::Malformed);
        assert!(decoded.changes.is_empty());
        assert_eq!(decoded.timestamp, None);

        let decoded = decode(json!([1, 2, 3]));
        assert_eq!(decoded.status, PullStatus::Malformed);
    }

    #[test]
    fn missing_members_default_to_empty() {
        let decoded = decode(json!({
            "changes": {"recipes": {"created": "nope", "deleted": null}},
        }));
        assert_eq!(decoded.status, PullStatus::Fresh);
        assert!(decoded.changes.recipes.is_empty());
        assert_eq!(decoded.timestamp, None);
    }

    #[test]
    fn identity_less_records_are_dropped() {
        let decoded = decode(json!({
            "changes": {"recipes": {
                "created": [{"title": "Orphan"}, {"id": "", "title": "Blank"}, {"id": 1}],
                "deleted": [null, "  "],
            }},
        }));
        assert_eq!(decoded.changes.recipes.created.len(), 1);
        assert!(decoded.changes.recipes.deleted.is_empty());
        assert_eq!(decoded.dropped, 4);
    }

    #[test]
    fn table_array_is_a_shape_violation() {
        let decoded = decode(json!({
            "changes": {"recipes": [{"id": 1, "title": "Flat"}]},
            "timestamp": 10,
        }));
        assert_eq!(
            decoded.status,
            PullStatus::ShapeViolation {
                table: "recipes".into()
            }
        );
        assert!(decoded.changes.recipes.is_empty());
    }

    #[test]
    fn legacy_table_array_reads_as_created() {
        let body = json!({"changes": {"recipes": [{"id": 1, "title": "Flat"}]}}).to_string();
        let options = DecodeOptions {
            accept_legacy_table_arrays: true,
        };
        let decoded = decode_pull_response(body.as_bytes(), options);
        assert_eq!(decoded.status, PullStatus::Fresh);
        assert_eq!(decoded.changes.recipes.created, vec![RemoteRecipe::new("1", "Flat")]);
    }

    #[test]
    fn zero_timestamp_is_ignored() {
        let decoded = decode(json!({"changes": {}, "timestamp": 0}));
        assert_eq!(decoded.timestamp, None);
        assert!(decoded.status.is_fresh());
    }
}
