//! Storage trait and error definitions

use crate::extract::BookCandidate;
use crate::queue::{PageKind, WorkItem};
use crate::storage::{BookRecord, ChangeLogEntry, QueueCounts};
use thiserror::Error;

/// Errors raised by storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Record not found: {0}")]
    RecordNotFound(i64),
}

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage backend abstraction
///
/// The engine only issues CRUD-style operations against the persisted
/// collections through this trait; the backend is responsible for
/// serializing concurrent writes.
pub trait Store {
    // ===== Work queue =====

    /// Inserts new Pending items for the given URLs, skipping URLs that are
    /// already queued regardless of kind. Returns the number actually
    /// inserted. One colliding URL never fails the batch.
    fn enqueue(&mut self, urls: &[String], kind: PageKind) -> StorageResult<usize>;

    /// Returns all Pending items of the given kind in insertion order.
    fn claim_pending(&self, kind: PageKind) -> StorageResult<Vec<WorkItem>>;

    /// Transitions an item Pending -> Done. No-op if already Done.
    fn mark_done(&mut self, item_id: i64) -> StorageResult<()>;

    /// Returns true if no Pending items of the given kind remain.
    fn is_queue_empty(&self, kind: PageKind) -> StorageResult<bool>;

    /// Returns the total number of items in the queue, any status.
    fn queue_size(&self) -> StorageResult<u64>;

    /// Returns Pending/Done counts for reporting.
    fn queue_counts(&self) -> StorageResult<QueueCounts>;

    /// Wipes the whole queue. Called only after a pass fully completes.
    fn clear_queue(&mut self) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts a new record, returning its id.
    fn insert_record(&mut self, candidate: &BookCandidate, now: &str) -> StorageResult<i64>;

    /// Overwrites an existing record's fields, preserving created_at.
    fn update_record(&mut self, record_id: i64, candidate: &BookCandidate, now: &str)
        -> StorageResult<()>;

    /// Refreshes updated_at without touching any other field.
    fn touch_record(&mut self, record_id: i64, now: &str) -> StorageResult<()>;

    fn get_record(&self, record_id: i64) -> StorageResult<BookRecord>;

    fn get_record_by_source_url(&self, source_url: &str) -> StorageResult<Option<BookRecord>>;

    fn list_records(&self, limit: u32, offset: u32) -> StorageResult<Vec<BookRecord>>;

    fn count_records(&self) -> StorageResult<u64>;

    // ===== Change log =====

    /// Appends a change log entry. Entries are never mutated or deleted.
    fn append_change(&mut self, record_id: i64, snapshot: &str, now: &str) -> StorageResult<()>;

    /// Returns change log entries, newest first.
    fn list_changes(&self, limit: u32) -> StorageResult<Vec<ChangeLogEntry>>;

    fn count_changes(&self) -> StorageResult<u64>;
}
