//! Storage traits and error types
//!
//! This module defines the trait interface for item sinks and the associated
//! error types.

use crate::spider::Item;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{count} items dropped: {source}")]
    Dropped {
        count: usize,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Attributes `count` lost items to `source`, adding to any count it
    /// already carries
    pub fn dropped(count: usize, source: StorageError) -> Self {
        match source {
            StorageError::Dropped {
                count: already,
                source,
            } => StorageError::Dropped {
                count: already + count,
                source,
            },
            other => StorageError::Dropped {
                count,
                source: Box::new(other),
            },
        }
    }

    /// Number of items this failure lost, when the sink knows it
    pub fn dropped_items(&self) -> Option<usize> {
        match self {
            StorageError::Dropped { count, .. } => Some(*count),
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Batched persistence of extracted items
///
/// The engine calls `save` for every result batch and `flush` once when the
/// run ends. A failed call is logged by the engine and its batch is dropped;
/// nothing is retried. A buffering sink that loses more than the batch it was
/// handed reports the real loss through [`StorageError::Dropped`].
pub trait Storage: Send {
    /// Accepts items, possibly buffering them until the next flush
    fn save(&mut self, items: Vec<Item>) -> StorageResult<()>;

    /// Writes out anything still buffered
    fn flush(&mut self) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_counts_accumulate() {
        let err = StorageError::dropped(3, StorageError::Database("disk full".to_string()));
        assert_eq!(err.dropped_items(), Some(3));

        let err = StorageError::dropped(2, err);
        assert_eq!(err.dropped_items(), Some(5));
        assert_eq!(err.to_string(), "5 items dropped: Database error: disk full");
    }

    #[test]
    fn test_plain_errors_carry_no_count() {
        assert_eq!(StorageError::Database("locked".to_string()).dropped_items(), None);
    }
}
