//! Configuration for the sync engine.

use recipesync_protocol::DecodeOptions;
use std::time::Duration;

/// Server used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Default pull endpoint, relative to the base URL.
pub const DEFAULT_PULL_PATH: &str = "/recipes/sync/pull";

/// Default push endpoint, relative to the base URL.
pub const DEFAULT_PUSH_PATH: &str = "/recipes/sync/push";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server base URL (e.g. `http://localhost:8080/api`).
    pub base_url: String,
    /// Pull endpoint path.
    pub pull_path: String,
    /// Push endpoint path.
    pub push_path: String,
    /// Request timeout, handed to the HTTP client.
    pub timeout: Duration,
    /// Read a pulled table sent as a bare array as its `created` list
    /// instead of aborting the round.
    pub accept_legacy_table_arrays: bool,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            pull_path: DEFAULT_PULL_PATH.into(),
            push_path: DEFAULT_PUSH_PATH.into(),
            timeout: Duration::from_secs(30),
            accept_legacy_table_arrays: false,
        }
    }

    /// Sets the pull endpoint path.
    pub fn with_pull_path(mut self, path: impl Into<String>) -> Self {
        self.pull_path = path.into();
        self
    }

    /// Sets the push endpoint path.
    pub fn with_push_path(mut self, path: impl Into<String>) -> Self {
        self.push_path = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accepts bare table arrays in pull responses.
    pub fn with_legacy_table_arrays(mut self, accept: bool) -> Self {
        self.accept_legacy_table_arrays = accept;
        self
    }

    /// Full pull URL.
    pub fn pull_url(&self) -> String {
        join_url(&self.base_url, &self.pull_path)
    }

    /// Full push URL.
    pub fn push_url(&self) -> String {
        join_url(&self.base_url, &self.push_path)
    }

    /// Decoder switches derived from this configuration.
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            accept_legacy_table_arrays: self.accept_legacy_table_arrays,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
