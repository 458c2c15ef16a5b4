//! Pure HTML extraction
//!
//! Extraction is a pure function over the fetched document: no I/O, no
//! storage access. Catalogue pages yield the detail URLs they link to;
//! detail pages yield one candidate record. Anything the selectors cannot
//! account for is reported as a parse failure rather than a panic, so one
//! malformed page never takes down a pass.

mod book;
mod catalogue;

pub use book::extract_book;
pub use catalogue::{extract_child_urls, total_pages};

use crate::queue::PageKind;
use serde::{Deserialize, Serialize};

/// A fully extracted record, not yet persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookCandidate {
    pub source_url: String,
    /// SHA-256 of the raw page HTML, hex encoded
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
}

/// Result of extracting one fetched page
#[derive(Debug, Clone)]
pub enum ExtractResult {
    /// Detail URLs found on a catalogue page
    ChildUrls(Vec<String>),

    /// The record extracted from a detail page
    Candidate(Box<BookCandidate>),

    /// The document did not match the expected shape
    ParseError(String),
}

/// Extracts the content of a fetched page according to its kind
///
/// # Arguments
///
/// * `html` - The raw page HTML
/// * `page_url` - The URL the page was fetched from, for link resolution
/// * `kind` - Whether this is a catalogue or a detail page
pub fn extract(html: &str, page_url: &str, kind: PageKind) -> ExtractResult {
    match kind {
        PageKind::ListPage => match extract_child_urls(html, page_url) {
            Ok(urls) => ExtractResult::ChildUrls(urls),
            Err(reason) => ExtractResult::ParseError(reason),
        },
        PageKind::DetailPage => match extract_book(html, page_url) {
            Ok(candidate) => ExtractResult::Candidate(Box::new(candidate)),
            Err(reason) => ExtractResult::ParseError(reason),
        },
    }
}

/// Computes the hex-encoded SHA-256 of the raw HTML
pub fn content_hash(html: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    hex::encode(hasher.finalize())
}
