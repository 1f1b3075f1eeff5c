//! Storage backend trait definition.

use crate::error::StorageResult;

/// A durable, append-only byte store.
///
/// The local store writes one framed journal entry per committed
/// transaction with [`append`](StorageBackend::append) and replays the whole
/// journal with [`read_all`](StorageBackend::read_all) when it is opened.
/// A checkpoint swaps the entire content for a snapshot with
/// [`replace`](StorageBackend::replace).
///
/// # Invariants
///
/// - `append` returns the offset where the data starts
/// - `read_all` returns every byte appended since the last `replace`
/// - after `sync` returns, appended bytes survive process termination
/// - `replace` is all-or-nothing: readers see either the old or new content
pub trait StorageBackend: Send + Sync {
    /// Reads the complete content of the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Forces appended data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Atomically replaces the whole content with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the new content cannot be written. The previous
    /// content is left intact in that case.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;
}
