//! CLI command implementations.

pub mod app_state;
pub mod compact;
pub mod inspect;
pub mod recipes;
pub mod session;
pub mod sync;

use crate::http_client::ReqwestClient;
use recipesync_engine::{HttpTransport, PurgeSyncedTombstones, SyncConfig, SyncCoordinator};
use recipesync_store::LocalStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Where and how to reach the recipe server.
pub struct Remote {
    /// Base URL.
    pub server: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Opens the store, creating it on first use.
pub fn open_store(path: &Path) -> Result<LocalStore, Box<dyn std::error::Error>> {
    Ok(LocalStore::open(path)?)
}

/// Builds a coordinator talking to `remote` over HTTP.
pub fn coordinator(
    store: LocalStore,
    remote: &Remote,
) -> Result<SyncCoordinator<HttpTransport<ReqwestClient>>, Box<dyn std::error::Error>> {
    let config = SyncConfig::new(remote.server.as_str()).with_timeout(remote.timeout);
    let transport = HttpTransport::new(config.clone(), ReqwestClient::new(config.timeout)?);
    Ok(SyncCoordinator::new(config, Arc::new(store), transport)
        .with_compaction(Arc::new(PurgeSyncedTombstones::default())))
}
