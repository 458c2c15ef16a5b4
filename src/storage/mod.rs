//! Storage module for persisting crawl state
//!
//! This module handles all database operations for the engine:
//! - Work queue persistence (the resumability mechanism)
//! - Book record storage with source-URL identity
//! - Append-only change log
//!
//! The store is opened once at engine startup; a store that cannot be opened
//! is fatal to the whole run, before any queue mutation.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{StorageError, StorageResult, Store};

/// A persisted book record
#[derive(Debug, Clone)]
pub struct BookRecord {
    pub id: i64,
    pub source_url: String,
    pub content_hash: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub price_incl_tax: f64,
    pub price_excl_tax: f64,
    pub availability: String,
    pub num_reviews: i64,
    pub rating: String,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One append-only change log entry
#[derive(Debug, Clone)]
pub struct ChangeLogEntry {
    pub id: i64,
    pub record_id: i64,
    /// Serialized candidate captured at change time
    pub snapshot: String,
    pub changed_at: String,
}

/// Outcome of a record upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for the source URL; a new one was inserted
    Inserted,

    /// The record existed and differed; it was overwritten and logged
    Updated,

    /// The record existed and was identical; only updated_at moved
    Unchanged,

    /// The insert hit an expected uniqueness constraint and was skipped
    Skipped,
}

/// Pending/Done item counts for reporting
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueCounts {
    pub pending: u64,
    pub done: u64,
}
