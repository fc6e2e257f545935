//! Durable home of the ledger.
//!
//! The engine loads every group once at startup and hands the full state back
//! after each successful mutation. Backends only serialize what they receive;
//! they never interpret ledger semantics beyond the schema upgrade applied
//! while loading (see [`schema`]).

use std::{collections::BTreeMap, fmt};

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

use crate::{Clock, Group};

mod json_file;
mod memory;
pub mod schema;
mod sqlite;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Full ledger state keyed by group id.
pub type Groups = BTreeMap<String, Group>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence backend for the ledger state.
#[async_trait]
pub trait Store: fmt::Debug + Send + Sync {
    /// Read the whole state, upgraded to the current schema. `clock` supplies
    /// the defaults for fields older layouts did not record.
    async fn load(&self, clock: &dyn Clock) -> StoreResult<Groups>;

    /// Overwrite the whole state.
    async fn save(&self, groups: &Groups) -> StoreResult<()>;
}

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed state: {0}")]
    Malformed(String),
}
