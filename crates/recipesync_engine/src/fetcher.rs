//! Pull side of a sync round.

use crate::config::SyncConfig;
use crate::transport::SyncTransport;
use recipesync_protocol::{decode_pull_response, ChangeSet, PullRequest, PullStatus};
use recipesync_store::now_millis;
use tracing::{debug, warn};

/// Normalized result of a pull. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    /// Typed changes; empty unless the server answered.
    pub changes: ChangeSet,
    /// Server timestamp, or local now when the server gave none.
    pub timestamp: i64,
    /// Whether the cursor may advance past this pull.
    pub status: PullStatus,
}

impl PullOutcome {
    fn unreachable() -> Self {
        Self {
            changes: ChangeSet::empty(),
            timestamp: now_millis(),
            status: PullStatus::Unreachable,
        }
    }
}

/// Fetches remote changes since the cursor.
pub struct ChangeFetcher<'a, T: SyncTransport + ?Sized> {
    transport: &'a T,
    config: &'a SyncConfig,
}

impl<'a, T: SyncTransport + ?Sized> ChangeFetcher<'a, T> {
    /// Creates a fetcher.
    pub fn new(transport: &'a T, config: &'a SyncConfig) -> Self {
        Self { transport, config }
    }

    /// Pulls changes since `cursor` with the given credential.
    ///
    /// Transport failures and non-success statuses give an empty change-set
    /// with [`PullStatus::Unreachable`]; bodies of the wrong shape give an
    /// empty change-set with [`PullStatus::Malformed`].
    pub fn fetch(&self, jwt: &str, cursor: Option<i64>) -> PullOutcome {
        let request = PullRequest::new(cursor);

        let body = match self.transport.pull(jwt, &request) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, cursor = ?cursor, "pull failed, continuing with no remote changes");
                return PullOutcome::unreachable();
            }
        };

        let decoded = decode_pull_response(&body, self.config.decode_options());

        match &decoded.status {
            PullStatus::Malformed => {
                warn!(bytes = body.len(), "pull response malformed, treating as empty");
            }
            PullStatus::ShapeViolation { table } => {
                warn!(table = %table, "pull response sent a table as a bare array");
            }
            PullStatus::Fresh | PullStatus::Unreachable => {}
        }
        if decoded.dropped > 0 {
            debug!(dropped = decoded.dropped, "dropped remote entries without identity");
        }

        PullOutcome {
            changes: decoded.changes,
            timestamp: decoded.timestamp.unwrap_or_else(now_millis),
            status: decoded.status,
        }
    }
}
