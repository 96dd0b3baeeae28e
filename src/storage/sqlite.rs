//! SQLite storage implementation
//!
//! Items are buffered in memory and written in batches, one transaction per
//! batch.

use crate::spider::Item;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::SpindleError;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

/// Default number of items buffered before a write
pub const DEFAULT_BATCH_COUNT: usize = 100;

/// SQLite item sink
pub struct SqliteStorage {
    conn: Connection,
    buffer: Vec<Item>,
    batch_count: usize,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// A `batch_count` of zero is treated as one.
    pub fn new(path: &Path, batch_count: usize) -> Result<Self, SpindleError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::with_connection(conn, batch_count))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory(batch_count: usize) -> Result<Self, SpindleError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::with_connection(conn, batch_count))
    }

    fn with_connection(conn: Connection, batch_count: usize) -> Self {
        let batch_count = batch_count.max(1);
        Self {
            conn,
            buffer: Vec::with_capacity(batch_count),
            batch_count,
        }
    }

    /// Number of items waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Stored item counts per table, sorted by table name
    pub fn count_by_table(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, COUNT(*) FROM items GROUP BY table_name ORDER BY table_name",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    /// Loads every stored item of a table in insertion order
    pub fn load_items(&self, table: &str) -> StorageResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(
            "SELECT task, table_name, url, data FROM items WHERE table_name = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(task, table, url, data)| {
                Ok(Item {
                    task,
                    table,
                    url,
                    data: serde_json::from_str(&data)?,
                })
            })
            .collect()
    }
}

impl Storage for SqliteStorage {
    /// Buffers items, writing a batch whenever the buffer is full
    ///
    /// If a write fails, the failed batch and every item not yet buffered are
    /// lost; the error carries their total.
    fn save(&mut self, items: Vec<Item>) -> StorageResult<()> {
        let mut items = items.into_iter();
        while let Some(item) = items.next() {
            if self.buffer.len() >= self.batch_count {
                if let Err(e) = self.flush() {
                    return Err(StorageError::dropped(1 + items.len(), e));
                }
            }
            self.buffer.push(item);
        }
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        // The buffer is cleared even if the write fails
        let batch = std::mem::take(&mut self.buffer);
        tracing::debug!("Flushing {} items to SQLite", batch.len());

        self.write_batch(&batch)
            .map_err(|e| StorageError::dropped(batch.len(), e))
    }
}

impl SqliteStorage {
    fn write_batch(&mut self, batch: &[Item]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO items (task, table_name, url, data, saved_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for item in batch {
                let data = serde_json::to_string(&item.data)?;
                stmt.execute(params![item.task, item.table, item.url, data, now])?;
            }
        }
        tx.commit()?;

        Ok(())
    }
}
