//! Record change tracking
//!
//! The tracker owns upsert semantics: records are keyed by source URL, and
//! the content hash decides whether a re-crawl touched, changed, or merely
//! revisited a record. Every detected change appends the incoming candidate
//! to the change log before the stored record is overwritten, so the log is
//! a history of what each change introduced.

use crate::extract::BookCandidate;
use crate::storage::{
    BookRecord, ChangeLogEntry, SqliteStore, StorageError, Store, UpsertOutcome,
};
use crate::Result;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Tracks record identity and changes across crawl passes
#[derive(Clone)]
pub struct ChangeTracker {
    store: Arc<Mutex<SqliteStore>>,
}

impl ChangeTracker {
    pub fn new(store: Arc<Mutex<SqliteStore>>) -> Self {
        Self { store }
    }

    /// Upserts a candidate by source URL
    ///
    /// # Returns
    ///
    /// * `UpsertOutcome::Inserted` - First time this URL produced a record
    /// * `UpsertOutcome::Updated` - Content changed; logged and overwritten
    /// * `UpsertOutcome::Unchanged` - Identical content; only updated_at moves
    /// * `UpsertOutcome::Skipped` - A uniqueness constraint rejected the write
    pub fn upsert(&self, candidate: &BookCandidate) -> Result<UpsertOutcome> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut store = self.store.lock().unwrap();

        let existing = store.get_record_by_source_url(&candidate.source_url)?;

        let Some(record) = existing else {
            return match store.insert_record(candidate, &now) {
                Ok(_) => {
                    info!(url = %candidate.source_url, title = %candidate.title, "New record");
                    Ok(UpsertOutcome::Inserted)
                }
                Err(StorageError::Constraint(reason)) => {
                    warn!(url = %candidate.source_url, reason = %reason, "Insert skipped");
                    Ok(UpsertOutcome::Skipped)
                }
                Err(e) => Err(e.into()),
            };
        };

        if record.content_hash == candidate.content_hash {
            debug!(url = %candidate.source_url, "Record unchanged");
            store.touch_record(record.id, &now)?;
            return Ok(UpsertOutcome::Unchanged);
        }

        // The log entry captures the incoming candidate, i.e. what the
        // record becomes, not what it replaced. It is appended before the
        // overwrite, matching the order changes have always been recorded in.
        let snapshot = serde_json::to_string(candidate)?;
        store.append_change(record.id, &snapshot, &now)?;

        match store.update_record(record.id, candidate, &now) {
            Ok(()) => {}
            Err(StorageError::Constraint(reason)) => {
                warn!(url = %candidate.source_url, reason = %reason, "Update skipped");
                return Ok(UpsertOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        info!(url = %candidate.source_url, title = %candidate.title, "Record changed");
        Ok(UpsertOutcome::Updated)
    }

    pub fn get_record(&self, record_id: i64) -> Result<BookRecord> {
        Ok(self.store.lock().unwrap().get_record(record_id)?)
    }

    pub fn record_by_source_url(&self, source_url: &str) -> Result<Option<BookRecord>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .get_record_by_source_url(source_url)?)
    }

    pub fn list_records(&self, limit: u32, offset: u32) -> Result<Vec<BookRecord>> {
        Ok(self.store.lock().unwrap().list_records(limit, offset)?)
    }

    pub fn list_changes(&self, limit: u32) -> Result<Vec<ChangeLogEntry>> {
        Ok(self.store.lock().unwrap().list_changes(limit)?)
    }
}
