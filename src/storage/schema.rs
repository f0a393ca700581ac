//! Database schema definitions
//!
//! The SQLite backend stores every ledger entry in a single key-value table.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Ledger entries for all crawl runs, namespaced by sanitized key
CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
