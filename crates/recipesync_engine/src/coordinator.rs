//! Sync coordinator: one round at a time, pull before push.

use crate::compaction::CompactionHook;
use crate::config::SyncConfig;
use crate::credential::{CredentialGate, Session};
use crate::error::{SyncError, SyncResult};
use crate::fetcher::ChangeFetcher;
use crate::pusher::ChangePusher;
use crate::reconcile::{ReconcileReport, ReconciliationEngine};
use crate::transport::SyncTransport;
use parking_lot::RwLock;
use recipesync_protocol::PullStatus;
use recipesync_store::{LocalStore, StoreError, Table};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a round did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No credential is stored.
    NoCredential,
    /// Another round is in progress.
    AlreadyRunning,
}

/// The observable state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Ready to sync.
    Idle,
    /// A round is in progress.
    Running,
    /// Sync cannot run until the user signs in.
    Blocked(SkipReason),
}

impl SyncState {
    /// Returns true if a round is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Running)
    }

    /// Returns true if a new round would start.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle)
    }
}

/// Summary of a completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// How the pull went.
    pub pull_status: PullStatus,
    /// Remote entries received.
    pub pulled: usize,
    /// What the merge did.
    pub merged: ReconcileReport,
    /// Local entries pushed.
    pub pushed: usize,
    /// Cursor after the round.
    pub cursor: Option<i64>,
    /// Wall-clock duration of the round.
    pub duration: Duration,
}

/// Result of a sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The round ran to completion.
    Completed(SyncReport),
    /// The round did not run. Not an error.
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// Returns the report of a completed round.
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }
}

/// Statistics about sync rounds.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Rounds that completed.
    pub rounds_completed: u64,
    /// Rounds that failed.
    pub rounds_failed: u64,
    /// Requests that were skipped.
    pub rounds_skipped: u64,
    /// Remote entries received across rounds.
    pub records_pulled: u64,
    /// Local entries pushed across rounds.
    pub records_pushed: u64,
    /// Time of the last completed round.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Releases the running flag on drop.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs sync rounds against one store and one transport.
///
/// A round is: credential check, pull, merge, push, then cursor advance.
/// At most one round runs at a time per coordinator; a request while a
/// round is running is skipped, not queued.
pub struct SyncCoordinator<T: SyncTransport> {
    config: SyncConfig,
    store: Arc<LocalStore>,
    transport: T,
    reconciler: ReconciliationEngine,
    running: AtomicBool,
    stats: RwLock<SyncStats>,
}

impl<T: SyncTransport> SyncCoordinator<T> {
    /// Creates a coordinator.
    pub fn new(config: SyncConfig, store: Arc<LocalStore>, transport: T) -> Self {
        Self {
            reconciler: ReconciliationEngine::new(Arc::clone(&store)),
            config,
            store,
            transport,
            running: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Sets the hook notified after merges that created tombstones.
    pub fn with_compaction(mut self, hook: Arc<dyn CompactionHook>) -> Self {
        self.reconciler = self.reconciler.with_compaction(hook);
        self
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the credential gate.
    pub fn gate(&self) -> CredentialGate {
        CredentialGate::new(Arc::clone(&self.store))
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        if self.running.load(Ordering::Acquire) {
            SyncState::Running
        } else if self.gate().get().is_none() {
            SyncState::Blocked(SkipReason::NoCredential)
        } else {
            SyncState::Idle
        }
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn skip(&self, reason: SkipReason) -> SyncResult<SyncOutcome> {
        debug!(?reason, "sync skipped");
        self.stats.write().rounds_skipped += 1;
        Ok(SyncOutcome::Skipped(reason))
    }

    /// Runs one sync round.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvariantViolation`] if the pull broke the
    /// change-set shape, the push error if the push failed, or a store
    /// error. The cursor is unchanged on every error.
    pub fn sync(&self) -> SyncResult<SyncOutcome> {
        let Some(credential) = self.gate().get() else {
            return self.skip(SkipReason::NoCredential);
        };
        let Some(_guard) = RunningGuard::claim(&self.running) else {
            return self.skip(SkipReason::AlreadyRunning);
        };

        let start = Instant::now();
        match self.run_round(&credential.jwt) {
            Ok(mut report) => {
                report.duration = start.elapsed();
                {
                    let mut stats = self.stats.write();
                    stats.rounds_completed += 1;
                    stats.records_pulled += report.pulled as u64;
                    stats.records_pushed += report.pushed as u64;
                    stats.last_sync_time = Some(Instant::now());
                    stats.last_error = None;
                }
                info!(
                    pull_status = ?report.pull_status,
                    pulled = report.pulled,
                    pushed = report.pushed,
                    cursor = ?report.cursor,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "sync round completed"
                );
                Ok(SyncOutcome::Completed(report))
            }
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    fn run_round(&self, jwt: &str) -> SyncResult<SyncReport> {
        let cursor = self.store.cursor();

        let pull = ChangeFetcher::new(&self.transport, &self.config).fetch(jwt, cursor);
        if let PullStatus::ShapeViolation { table } = &pull.status {
            return Err(SyncError::invariant(format!(
                "table {table} was sent as an array instead of {{created, updated, deleted}}"
            )));
        }

        let merged = self.reconciler.merge(&pull.changes)?;

        let advance_to = pull
            .status
            .is_fresh()
            .then(|| cursor.map_or(pull.timestamp, |c| c.max(pull.timestamp)));

        // The push reports how far this round has seen.
        let pending = self.store.pending_changes(Table::Recipes);
        let receipt = if pending.is_empty() {
            None
        } else {
            Some(ChangePusher::new(&self.transport).push(jwt, &pending, advance_to.or(cursor))?)
        };

        self.store.atomically(|txn| {
            if let Some(receipt) = &receipt {
                receipt.acknowledge(txn);
            }
            if let Some(next) = advance_to {
                txn.set_cursor(next);
            }
            Ok::<_, StoreError>(())
        })?;

        Ok(SyncReport {
            pulled: pull.changes.recipes.len(),
            pull_status: pull.status,
            merged,
            pushed: receipt.map_or(0, |r| r.pushed),
            cursor: self.store.cursor(),
            duration: Duration::ZERO,
        })
    }

    /// Flushes pending changes, sends the logout notice, then clears the
    /// credential and profile.
    ///
    /// The flush is an ordinary push and is the only one acknowledged; the
    /// notice carries no records. Local sign-out happens even if either
    /// request fails; the error is returned afterwards and unflushed
    /// changes stay pending. If a round is running both requests are
    /// skipped. Returns the number of entries flushed.
    ///
    /// # Errors
    ///
    /// Returns the push error, or a store error from clearing the session.
    pub fn sign_out(&self) -> SyncResult<usize> {
        let mut pushed = Ok(0);

        if let Some(credential) = self.gate().get() {
            match RunningGuard::claim(&self.running) {
                Some(_guard) => {
                    pushed = self.final_push(&credential.jwt);
                }
                None => warn!("sync round in progress, signing out without final push"),
            }
        }

        Session::new(Arc::clone(&self.store)).clear()?;
        info!("signed out");

        if let Err(e) = &pushed {
            warn!(error = %e, "final push before sign-out failed");
            self.handle_error(e);
        }
        pushed
    }

    fn final_push(&self, jwt: &str) -> SyncResult<usize> {
        let pusher = ChangePusher::new(&self.transport);
        let pending = self.store.pending_changes(Table::Recipes);

        let mut flushed = 0;
        if !pending.is_empty() {
            let receipt = pusher.push(jwt, &pending, self.store.cursor())?;
            self.store
                .atomically(|txn| Ok::<_, StoreError>(receipt.acknowledge(txn)))?;
            self.stats.write().records_pushed += receipt.pushed as u64;
            flushed = receipt.pushed;
        }

        pusher.notify_logout(jwt, self.store.cursor())?;
        Ok(flushed)
    }

    fn handle_error(&self, error: &SyncError) {
        let mut stats = self.stats.write();
        stats.rounds_failed += 1;
        stats.last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockReply, MockTransport};
    use recipesync_store::RecipeDraft;

    fn coordinator() -> SyncCoordinator<MockTransport> {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        SyncCoordinator::new(SyncConfig::default(), store, MockTransport::new())
    }

    fn signed_in() -> SyncCoordinator<MockTransport> {
        let c = coordinator();
        c.gate().set("jwt").unwrap();
        c
    }

    #[test]
    fn sync_state_checks() {
        assert!(SyncState::Idle.can_start_sync());
        assert!(!SyncState::Running.can_start_sync());
        assert!(SyncState::Running.is_active());
        assert!(!SyncState::Blocked(SkipReason::NoCredential).can_start_sync());
    }

    #[test]
    fn no_credential_is_a_no_op() {
        let c = coordinator();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();

        assert_eq!(c.state(), SyncState::Blocked(SkipReason::NoCredential));
        let outcome = c.sync().unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NoCredential));
        assert_eq!(c.transport().calls(), 0);
        assert_eq!(c.store().cursor(), None);
        assert_eq!(c.store().pending_changes(Table::Recipes).len(), 1);
        assert_eq!(c.stats().rounds_skipped, 1);
    }

    #[test]
    fn running_flag_skips_second_request() {
        let c = signed_in();
        let _guard = RunningGuard::claim(&c.running).unwrap();

        assert_eq!(c.state(), SyncState::Running);
        assert_eq!(c.sync().unwrap(), SyncOutcome::Skipped(SkipReason::AlreadyRunning));
        assert_eq!(c.transport().calls(), 0);
    }

    #[test]
    fn flag_is_released_after_failure() {
        let c = signed_in();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();
        c.transport().queue_push(MockReply::Status(500));

        assert!(c.sync().is_err());
        assert_eq!(c.state(), SyncState::Idle);
        assert!(c.sync().unwrap().report().is_some());
    }

    #[test]
    fn first_sync_sets_cursor_from_server() {
        let c = signed_in();
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":5000}"#);

        let outcome = c.sync().unwrap();
        assert_eq!(outcome.report().unwrap().cursor, Some(5000));
        assert_eq!(c.transport().pulled()[0].last_pulled_at, None);
        assert_eq!(c.transport().push_calls(), 0);
        assert_eq!(c.stats().rounds_completed, 1);
    }

    #[test]
    fn cursor_never_moves_back() {
        let c = signed_in();
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":5000}"#);
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":4000}"#);
        c.sync().unwrap();
        c.sync().unwrap();
        assert_eq!(c.store().cursor(), Some(5000));
        assert_eq!(c.transport().pulled()[1].last_pulled_at, Some(5000));
    }

    #[test]
    fn unreachable_pull_keeps_cursor() {
        let c = signed_in();
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":5000}"#);
        c.sync().unwrap();

        c.transport().queue_pull(MockReply::Unreachable("offline".into()));
        let outcome = c.sync().unwrap();
        assert_eq!(outcome.report().unwrap().pull_status, PullStatus::Unreachable);
        assert_eq!(c.store().cursor(), Some(5000));
    }

    #[test]
    fn shape_violation_aborts_round() {
        let c = signed_in();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();
        c.transport()
            .queue_pull_body(r#"{"changes":{"recipes":[{"id":1}]},"timestamp":9}"#);

        let err = c.sync().unwrap_err();
        assert!(matches!(err, SyncError::InvariantViolation(_)));
        assert_eq!(c.transport().push_calls(), 0);
        assert_eq!(c.store().cursor(), None);
        assert_eq!(c.stats().rounds_failed, 1);
    }

    #[test]
    fn legacy_arrays_are_accepted_when_configured() {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let config = SyncConfig::default().with_legacy_table_arrays(true);
        let c = SyncCoordinator::new(config, store, MockTransport::new());
        c.gate().set("jwt").unwrap();
        c.transport()
            .queue_pull_body(r#"{"changes":{"recipes":[{"id":1,"title":"Flat"}]},"timestamp":9}"#);

        c.sync().unwrap();
        assert_eq!(c.store().recipe_by_remote_id("1").unwrap().title, "Flat");
    }

    #[test]
    fn push_failure_keeps_cursor_and_pending() {
        let c = signed_in();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":5000}"#);
        c.transport().queue_push(MockReply::Unreachable("reset".into()));

        let err = c.sync().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(c.store().cursor(), None);
        assert_eq!(c.store().pending_changes(Table::Recipes).len(), 1);
        assert!(c.stats().last_error.is_some());
    }

    #[test]
    fn successful_push_clears_pending() {
        let c = signed_in();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();

        let report = c.sync().unwrap().report().cloned().unwrap();
        assert_eq!(report.pushed, 1);
        assert!(c.store().pending_changes(Table::Recipes).is_empty());
        assert!(!c.transport().pushed()[0].is_logout);
    }

    #[test]
    fn sign_out_flushes_then_sends_empty_notice() {
        let c = signed_in();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();

        assert_eq!(c.sign_out().unwrap(), 1);
        let sent = c.transport().pushed();
        assert_eq!(sent.len(), 2);
        assert!(!sent[0].is_logout);
        assert_eq!(sent[0].len(), 1);
        assert!(sent[1].is_logout);
        assert!(sent[1].is_empty());
        assert!(c.gate().get().is_none());
        assert_eq!(c.sync().unwrap(), SyncOutcome::Skipped(SkipReason::NoCredential));
    }

    #[test]
    fn sign_out_with_nothing_pending_only_notifies() {
        let c = signed_in();

        assert_eq!(c.sign_out().unwrap(), 0);
        let sent = c.transport().pushed();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_logout);
    }

    #[test]
    fn sign_out_clears_even_when_push_fails() {
        let c = signed_in();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();
        c.transport().queue_push(MockReply::Status(503));

        assert!(c.sign_out().is_err());
        assert!(c.gate().get().is_none());
        assert_eq!(c.store().pending_changes(Table::Recipes).len(), 1);
        assert_eq!(c.transport().push_calls(), 1);
    }

    #[test]
    fn failed_logout_notice_keeps_flushed_changes_acknowledged() {
        let c = signed_in();
        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();
        c.transport().queue_push(MockReply::Ok(b"{}".to_vec()));
        c.transport().queue_push(MockReply::Unreachable("reset".into()));

        assert!(c.sign_out().is_err());
        assert!(c.gate().get().is_none());
        assert!(c.store().pending_changes(Table::Recipes).is_empty());
    }

    #[test]
    fn malformed_pull_completes_without_moving_cursor() {
        let c = signed_in();
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":5000}"#);
        c.sync().unwrap();

        c.transport().queue_pull_body(r#"{"changes":"not-an-object","timestamp":9000}"#);
        let outcome = c.sync().unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.pull_status, PullStatus::Malformed);
        assert_eq!(report.pulled, 0);
        assert!(!report.merged.changed());
        assert_eq!(c.store().cursor(), Some(5000));
        assert!(c.store().recipes().is_empty());
    }

    #[test]
    fn push_carries_timestamp_of_fresh_pull() {
        let c = signed_in();
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":5000}"#);
        c.sync().unwrap();

        c.store().create_recipe(&RecipeDraft::new("Draft")).unwrap();
        c.transport().queue_pull_body(r#"{"changes":{},"timestamp":6000}"#);
        c.sync().unwrap();
        assert_eq!(c.transport().pushed()[0].last_pulled_at, Some(6000));

        c.store().create_recipe(&RecipeDraft::new("Offline")).unwrap();
        c.transport().queue_pull(MockReply::Unreachable("offline".into()));
        c.sync().unwrap();
        assert_eq!(c.transport().pushed()[1].last_pulled_at, Some(6000));
    }
}
