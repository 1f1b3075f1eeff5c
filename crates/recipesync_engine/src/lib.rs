//! # recipesync engine
//!
//! Keeps a [`LocalStore`](recipesync_store::LocalStore) consistent with the
//! recipe server across intermittent connectivity.
//!
//! This crate provides:
//! - Credential gate and sign-in session
//! - Pull with strict, never-failing response normalization
//! - Reconciliation with replace-on-pull and title deduplication
//! - Push with revision-checked acknowledgement
//! - A single-flight sync coordinator
//! - HTTP transport abstraction
//!
//! ## Round
//!
//! 1. Check the credential; skip quietly if signed out
//! 2. Pull changes since the cursor
//! 3. Merge them in one transaction
//! 4. Push pending local changes
//! 5. Acknowledge the push and advance the cursor in one transaction
//!
//! ## Key Invariants
//!
//! - The server is authoritative
//! - Pull always happens before push
//! - Merging the same pull twice leaves the same live records
//! - The cursor only moves forward, and only after a fresh pull and a
//!   successful push

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compaction;
mod config;
mod coordinator;
mod credential;
mod error;
mod fetcher;
mod http;
mod pusher;
mod reconcile;
mod transport;

pub use compaction::{CompactionHook, PurgeSyncedTombstones};
pub use config::{SyncConfig, DEFAULT_BASE_URL, DEFAULT_PULL_PATH, DEFAULT_PUSH_PATH};
pub use coordinator::{SkipReason, SyncCoordinator, SyncOutcome, SyncReport, SyncState, SyncStats};
pub use credential::{CredentialGate, Session};
pub use error::{SyncError, SyncResult};
pub use fetcher::{ChangeFetcher, PullOutcome};
pub use http::{HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer};
pub use pusher::{acknowledge, build_request, push_entry, ChangePusher, PushReceipt};
pub use reconcile::{apply as apply_changes, validate as validate_changes, ReconcileReport, ReconciliationEngine};
pub use transport::{MockReply, MockTransport, SyncTransport};
