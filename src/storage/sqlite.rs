//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::extract::BookCandidate;
use crate::queue::{ItemStatus, PageKind, WorkItem};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::{BookRecord, ChangeLogEntry, QueueCounts};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at the given path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `unique_content_hash` - Whether to enforce content-hash uniqueness
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path, unique_content_hash: bool) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn, unique_content_hash)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory(unique_content_hash: bool) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn, unique_content_hash)?;
        Ok(Self { conn })
    }

    fn row_to_work_item(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
        Ok(WorkItem {
            id: row.get(0)?,
            url: row.get(1)?,
            kind: PageKind::from_db_string(&row.get::<_, String>(2)?)
                .unwrap_or(PageKind::DetailPage),
            status: ItemStatus::from_db_string(&row.get::<_, String>(3)?)
                .unwrap_or(ItemStatus::Pending),
            created_at: row.get(4)?,
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<BookRecord> {
        Ok(BookRecord {
            id: row.get(0)?,
            source_url: row.get(1)?,
            content_hash: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            category: row.get(5)?,
            price_incl_tax: row.get(6)?,
            price_excl_tax: row.get(7)?,
            availability: row.get(8)?,
            num_reviews: row.get(9)?,
            rating: row.get(10)?,
            image_url: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    /// Maps SQLite constraint violations to the expected-duplicate error,
    /// so callers can swallow them without masking real failures.
    fn map_constraint(e: rusqlite::Error) -> StorageError {
        match &e {
            rusqlite::Error::SqliteFailure(inner, message)
                if inner.code == ErrorCode::ConstraintViolation =>
            {
                StorageError::Constraint(message.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => StorageError::Database(e),
        }
    }
}

const RECORD_COLUMNS: &str = "id, source_url, content_hash, title, description, category, \
     price_incl_tax, price_excl_tax, availability, num_reviews, rating, image_url, \
     created_at, updated_at";

impl Store for SqliteStore {
    // ===== Work queue =====

    fn enqueue(&mut self, urls: &[String], kind: PageKind) -> StorageResult<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO work_queue (url, kind, status, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for url in urls {
                inserted += stmt.execute(params![
                    url,
                    kind.to_db_string(),
                    ItemStatus::Pending.to_db_string(),
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn claim_pending(&self, kind: PageKind) -> StorageResult<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, kind, status, created_at FROM work_queue
             WHERE kind = ?1 AND status = ?2 ORDER BY id ASC",
        )?;

        let items = stmt
            .query_map(
                params![kind.to_db_string(), ItemStatus::Pending.to_db_string()],
                Self::row_to_work_item,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn mark_done(&mut self, item_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE work_queue SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![
                ItemStatus::Done.to_db_string(),
                item_id,
                ItemStatus::Pending.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn is_queue_empty(&self, kind: PageKind) -> StorageResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM work_queue WHERE kind = ?1 AND status = ?2",
            params![kind.to_db_string(), ItemStatus::Pending.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count == 0)
    }

    fn queue_size(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM work_queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn queue_counts(&self) -> StorageResult<QueueCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM work_queue GROUP BY status")?;

        let mut counts = QueueCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            match ItemStatus::from_db_string(&status) {
                Some(ItemStatus::Pending) => counts.pending = count as u64,
                Some(ItemStatus::Done) => counts.done = count as u64,
                None => {}
            }
        }

        Ok(counts)
    }

    fn clear_queue(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM work_queue", [])?;
        Ok(())
    }

    // ===== Records =====

    fn insert_record(&mut self, candidate: &BookCandidate, now: &str) -> StorageResult<i64> {
        self.conn
            .execute(
                "INSERT INTO records (source_url, content_hash, title, description, category,
                 price_incl_tax, price_excl_tax, availability, num_reviews, rating, image_url,
                 created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    candidate.source_url,
                    candidate.content_hash,
                    candidate.title,
                    candidate.description,
                    candidate.category,
                    candidate.price_incl_tax,
                    candidate.price_excl_tax,
                    candidate.availability,
                    candidate.num_reviews,
                    candidate.rating,
                    candidate.image_url,
                    now,
                    now
                ],
            )
            .map_err(Self::map_constraint)?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_record(
        &mut self,
        record_id: i64,
        candidate: &BookCandidate,
        now: &str,
    ) -> StorageResult<()> {
        self.conn
            .execute(
                "UPDATE records SET content_hash = ?1, title = ?2, description = ?3,
                 category = ?4, price_incl_tax = ?5, price_excl_tax = ?6, availability = ?7,
                 num_reviews = ?8, rating = ?9, image_url = ?10, updated_at = ?11
                 WHERE id = ?12",
                params![
                    candidate.content_hash,
                    candidate.title,
                    candidate.description,
                    candidate.category,
                    candidate.price_incl_tax,
                    candidate.price_excl_tax,
                    candidate.availability,
                    candidate.num_reviews,
                    candidate.rating,
                    candidate.image_url,
                    now,
                    record_id
                ],
            )
            .map_err(Self::map_constraint)?;
        Ok(())
    }

    fn touch_record(&mut self, record_id: i64, now: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE records SET updated_at = ?1 WHERE id = ?2",
            params![now, record_id],
        )?;
        Ok(())
    }

    fn get_record(&self, record_id: i64) -> StorageResult<BookRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS))?;

        stmt.query_row(params![record_id], Self::row_to_record)
            .map_err(|_| StorageError::RecordNotFound(record_id))
    }

    fn get_record_by_source_url(&self, source_url: &str) -> StorageResult<Option<BookRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM records WHERE source_url = ?1",
            RECORD_COLUMNS
        ))?;

        let record = stmt
            .query_row(params![source_url], Self::row_to_record)
            .optional()?;

        Ok(record)
    }

    fn list_records(&self, limit: u32, offset: u32) -> StorageResult<Vec<BookRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM records ORDER BY id ASC LIMIT ?1 OFFSET ?2",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![limit, offset], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Change log =====

    fn append_change(&mut self, record_id: i64, snapshot: &str, now: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO change_log (record_id, snapshot, changed_at) VALUES (?1, ?2, ?3)",
            params![record_id, snapshot, now],
        )?;
        Ok(())
    }

    fn list_changes(&self, limit: u32) -> StorageResult<Vec<ChangeLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, record_id, snapshot, changed_at FROM change_log
             ORDER BY id DESC LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(ChangeLogEntry {
                    id: row.get(0)?,
                    record_id: row.get(1)?,
                    snapshot: row.get(2)?,
                    changed_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn count_changes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM change_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
