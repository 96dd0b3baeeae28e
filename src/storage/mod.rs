//! Storage module for persisting extracted items
//!
//! This module contains the `Storage` sink trait and its implementations:
//! - SQLite storage with batched writes
//! - In-memory storage for tests and dry runs

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use sqlite::{SqliteStorage, DEFAULT_BATCH_COUNT};
pub use traits::{Storage, StorageError, StorageResult};

use crate::SpindleError;
use std::path::Path;

/// Opens the SQLite item database at `path`
pub fn open_storage(path: &Path, batch_count: usize) -> Result<SqliteStorage, SpindleError> {
    SqliteStorage::new(path, batch_count)
}
