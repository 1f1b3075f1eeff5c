//! Store configuration.

/// Schema version of the local tables.
///
/// Bumping this without a migration wipes existing local data on open.
pub const SCHEMA_VERSION: u32 = 4;

/// Configuration for opening a [`LocalStore`](crate::LocalStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to sync the journal on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Schema version expected by this build.
    pub schema_version: u32,

    /// Whether a torn journal tail is repaired on open.
    ///
    /// When false, opening a journal with a torn tail fails with
    /// [`StoreError::JournalCorruption`](crate::StoreError::JournalCorruption).
    pub repair_torn_tail: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            schema_version: SCHEMA_VERSION,
            repair_torn_tail: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the expected schema version.
    #[must_use]
    pub const fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Sets whether a torn journal tail is repaired on open.
    #[must_use]
    pub const fn repair_torn_tail(mut self, value: bool) -> Self {
        self.repair_torn_tail = value;
        self
    }
}
