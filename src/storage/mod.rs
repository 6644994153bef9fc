//! Storage module for the bookmark archive
//!
//! This module handles all database operations, including:
//! - SQLite schema creation and the full-text mirror triggers
//! - Tolerant bookmark inserts (duplicate hrefs are "already known")
//! - Candidate selection for refresh runs
//! - The batched content-update path shared by all fetch workers
//! - Ranked full-text search

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::{BookmarkStore, ContentBatch};
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// A bookmark as handed over by an importer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub href: String,
    /// Unix seconds the bookmark was added
    pub date: i64,
    pub icon: Option<Vec<u8>>,
}

/// A stored bookmark row
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub id: i64,
    pub title: Option<String>,
    pub href: String,
    /// Unix seconds the bookmark was added
    pub date: i64,
    pub icon: Option<Vec<u8>>,
    /// Extracted text, `None` until the first successful fetch
    pub content: Option<String>,
    /// Content fingerprint, 0 when never fetched
    pub hash: u64,
    /// Last-Modified of the stored content, `None` when unknown
    pub modified: Option<DateTime<Utc>>,
    /// Extractor version the content was produced with
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A bookmark selected for a refresh run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCandidate {
    pub id: i64,
    pub href: String,
    pub title: String,
    pub hash: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub version: i64,
    /// A newer extractor than the one that produced the stored content exists
    pub outdated: bool,
}

impl FetchCandidate {
    /// Forgets the cached signals so the next fetch is treated as new content
    ///
    /// Without a stored Last-Modified no conditional header is sent, and a
    /// zero hash never matches a real body.
    pub fn reset_cache(&mut self) {
        self.hash = 0;
        self.last_modified = None;
    }
}

/// New content for one bookmark, produced by a fetch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUpdate {
    pub id: i64,
    pub content: String,
    pub hash: u64,
    pub modified: DateTime<Utc>,
    pub version: i64,
}

/// A full-text search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub href: String,
    /// Excerpt of the content around the match
    pub snippet: String,
}

/// Outcome of a batch import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    /// Entries whose href was already stored
    pub duplicates: usize,
}

/// Converts stored unix seconds into an optional timestamp
///
/// The epoch is the column default and means "unknown".
pub(crate) fn timestamp_from_unix(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs, 0)
}
