//! Database schema definitions
//!
//! This module contains the SQL schema for the Spindle item database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Extracted items, one row per item
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task TEXT NOT NULL,
    table_name TEXT NOT NULL,
    url TEXT NOT NULL,
    data TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_table ON items(table_name);
CREATE INDEX IF NOT EXISTS idx_items_task ON items(task);
"#;

/// Initializes the database schema
///
/// Safe to call on an existing database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
