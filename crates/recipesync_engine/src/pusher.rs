//! Push side of a sync round.

use crate::error::SyncResult;
use crate::transport::SyncTransport;
use recipesync_protocol::{PushEntry, PushRequest, RECIPES_TABLE};
use recipesync_store::{LocalStore, PendingChanges, Record, RecordId, StoreResult, Table, WriteTxn};
use tracing::{debug, warn};

/// Record versions a successful push acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReceipt {
    /// Number of entries sent.
    pub pushed: usize,
    /// `(id, revision)` of every pushed record.
    pub acks: Vec<(RecordId, u64)>,
}

impl PushReceipt {
    /// Marks the acknowledged records as synced inside `txn`.
    ///
    /// Records written again since they were captured stay pending.
    pub fn acknowledge(&self, txn: &mut WriteTxn<'_>) -> usize {
        txn.mark_synced(Table::Recipes, &self.acks)
    }
}

/// Converts a stored recipe into its wire form.
pub fn push_entry(record: &Record) -> PushEntry {
    let remote_id = record.optional_text("remote_id").map(str::to_string);
    PushEntry {
        id: remote_id.clone().unwrap_or_else(|| record.id.to_string()),
        title: record.text("title").to_string(),
        description: record.text("description").to_string(),
        ingredients: record.text("ingredients").to_string(),
        steps: record.text("steps").to_string(),
        cooking_time: record.text("cooking_time").to_string(),
        remote_id,
        sync_status: record.status.as_str().to_string(),
    }
}

/// Builds the push body for pending recipe changes.
pub fn build_request(pending: &PendingChanges, cursor: Option<i64>, is_logout: bool) -> PushRequest {
    let entries = |records: &[Record]| records.iter().map(push_entry).collect::<Vec<_>>();

    let mut request = PushRequest::new(cursor, is_logout);
    request.add_table(
        RECIPES_TABLE,
        entries(&pending.created),
        entries(&pending.updated),
        entries(&pending.deleted),
    );
    request
}

/// Uploads local changes.
pub struct ChangePusher<'a, T: SyncTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: SyncTransport + ?Sized> ChangePusher<'a, T> {
    /// Creates a pusher.
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Pushes `pending` with the given credential.
    ///
    /// Nothing local changes here; apply the returned receipt in a
    /// transaction to mark the records synced.
    ///
    /// # Errors
    ///
    /// Returns the transport or server error; the caller's state is left
    /// untouched.
    pub fn push(
        &self,
        jwt: &str,
        pending: &PendingChanges,
        cursor: Option<i64>,
    ) -> SyncResult<PushReceipt> {
        let request = build_request(pending, cursor, false);

        if let Err(e) = self.transport.push(jwt, &request) {
            warn!(error = %e, entries = request.len(), "push failed");
            return Err(e);
        }

        debug!(entries = request.len(), "pushed local changes");
        Ok(PushReceipt {
            pushed: request.len(),
            acks: pending.acknowledgements(),
        })
    }

    /// Tells the server the session is ending.
    ///
    /// The notice carries no records. Servers may discard whatever changes
    /// arrive with the logout flag, so local changes must be flushed with
    /// [`push`](Self::push) first.
    ///
    /// # Errors
    ///
    /// Returns the transport or server error.
    pub fn notify_logout(&self, jwt: &str, cursor: Option<i64>) -> SyncResult<()> {
        let request = build_request(&PendingChanges::default(), cursor, true);
        self.transport.push(jwt, &request).inspect_err(|e| {
            warn!(error = %e, "logout notice failed");
        })?;
        debug!("sent logout notice");
        Ok(())
    }
}

/// Acknowledges a receipt in its own transaction.
///
/// # Errors
///
/// Returns an error if the journal write fails.
pub fn acknowledge(store: &LocalStore, receipt: &PushReceipt) -> StoreResult<usize> {
    store.atomically(|txn| Ok(receipt.acknowledge(txn)))
}
