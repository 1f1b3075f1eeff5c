//! # recipesync store
//!
//! Durable on-device record store for the recipe client.
//!
//! This crate provides:
//! - Four typed tables (tokens, users, recipes, app state) with soft-delete
//! - Field-equality queries over live records
//! - Scoped write transactions with a single writer
//! - A CRC-framed journal on a [`StorageBackend`](recipesync_storage::StorageBackend)
//! - Pending-change tracking for the sync engine
//!
//! ```rust
//! use recipesync_store::{LocalStore, RecipeDraft};
//!
//! let store = LocalStore::open_in_memory().unwrap();
//! let recipe = store
//!     .create_recipe(&RecipeDraft::new("Pasta").ingredient("flour").ingredient("eggs"))
//!     .unwrap();
//!
//! assert_eq!(recipe.ingredients, "flour, eggs");
//! assert_eq!(store.recipes().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod app_state;
mod config;
mod error;
mod journal;
mod models;
mod recipes;
mod store;
mod types;

pub use app_state::SHOULD_REFRESH_RECIPES;
pub use config::{StoreConfig, SCHEMA_VERSION};
pub use error::{StoreError, StoreResult};
pub use journal::{compute_crc32, FRAME_MAGIC};
pub use models::{
    Credential, Model, NamedState, Profile, Recipe, RecipeDraft, INGREDIENT_SEPARATOR,
    STEP_SEPARATOR,
};
pub use store::{LocalStore, PendingChanges, StoreStats, TableStats, WriteTxn};
pub use types::{fields, now_millis, FieldValue, Fields, Filter, Record, RecordId, SyncStatus, Table};
