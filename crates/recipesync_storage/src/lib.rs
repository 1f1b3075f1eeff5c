//! # recipesync storage
//!
//! Byte-level storage for the recipesync local store.
//!
//! Backends are **opaque byte stores**: the local store frames, checksums and
//! decodes its journal itself, a backend only keeps the bytes durable.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway stores
//! - [`FileBackend`] - A single journal file guarded by an advisory lock
//!
//! ## Example
//!
//! ```rust
//! use recipesync_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"frame-1").unwrap();
//! backend.append(b"frame-2").unwrap();
//! assert_eq!(backend.read_all().unwrap(), b"frame-1frame-2");
//!
//! backend.replace(b"snapshot").unwrap();
//! assert_eq!(backend.read_all().unwrap(), b"snapshot");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
