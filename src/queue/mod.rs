//! Work queue domain types
//!
//! The work queue holds one item per crawl target URL. Items are created when
//! a catalogue page is seeded or extracted, transition from Pending to Done
//! exactly once, and are only ever removed by the end-of-pass sweep.

use std::fmt;

/// The kind of page a work item points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// A catalogue page enumerating links to detail pages
    ListPage,

    /// A page containing the fields of one book record
    DetailPage,
}

impl PageKind {
    /// Converts the kind to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::ListPage => "list",
            Self::DetailPage => "detail",
        }
    }

    /// Parses a kind from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "list" => Some(Self::ListPage),
            "detail" => Some(Self::DetailPage),
            _ => None,
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// The completion status of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    /// The item has not been fully processed yet
    Pending,

    /// The item was fetched, extracted, and persisted
    Done,
}

impl ItemStatus {
    /// Returns true if this is the terminal state
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One queued crawl target
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: i64,
    pub url: String,
    pub kind: PageKind,
    pub status: ItemStatus,
    pub created_at: String,
}
