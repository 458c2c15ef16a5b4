//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Bookwatch database.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Persisted work queue of crawl targets
CREATE TABLE IF NOT EXISTS work_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_work_queue_kind_status ON work_queue(kind, status);

-- One record per detail page, keyed by source URL
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url TEXT NOT NULL UNIQUE,
    content_hash TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL,
    price_incl_tax REAL NOT NULL,
    price_excl_tax REAL NOT NULL,
    availability TEXT NOT NULL,
    num_reviews INTEGER NOT NULL,
    rating TEXT NOT NULL,
    image_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_content_hash ON records(content_hash);

-- Append-only log of record changes
CREATE TABLE IF NOT EXISTS change_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL REFERENCES records(id),
    snapshot TEXT NOT NULL,
    changed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_change_log_record ON change_log(record_id);
"#;

/// Optional uniqueness constraint on record content hashes.
///
/// When enabled, two distinct source URLs whose raw HTML is byte-identical
/// cannot both persist. See the storage config for why this is opt-in.
const UNIQUE_CONTENT_HASH_SQL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_records_content_hash_unique ON records(content_hash);";

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - An open database connection
/// * `unique_content_hash` - Whether to enforce content-hash uniqueness
pub fn initialize_schema(
    conn: &Connection,
    unique_content_hash: bool,
) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    if unique_content_hash {
        conn.execute_batch(UNIQUE_CONTENT_HASH_SQL)?;
    }
    Ok(())
}
