//! # recipesync protocol
//!
//! Wire types for the recipe sync endpoints.
//!
//! This crate provides:
//! - `PullRequest` and the strict pull-response decoder
//! - `ChangeSet` / `TableChanges` / `RemoteRecipe`, the typed form of a pull
//! - `PushRequest` / `PushEntry` and change flattening for push
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changes;
mod error;
mod pull;
mod push;

pub use changes::{ChangeSet, RemoteRecipe, TableChanges, KNOWN_TABLES, RECIPES_TABLE};
pub use error::{ProtocolError, ProtocolResult};
pub use pull::{decode_pull_response, DecodeOptions, DecodedPull, PullRequest, PullStatus};
pub use push::{PushEntry, PushRequest};
