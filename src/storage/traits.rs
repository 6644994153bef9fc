//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Bookmark, Entry, FetchCandidate, SearchResult};
use crate::strategy::StrategyRegistry;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for bookmark storage backends
///
/// Batched content updates are not part of the trait: they are tied to a
/// transaction on the concrete backend (see `BookmarkStore::begin_content_batch`).
pub trait Storage {
    /// Inserts one bookmark
    ///
    /// # Returns
    ///
    /// * `Ok(Some(id))` - The bookmark was stored
    /// * `Ok(None)` - A bookmark with the same href already exists
    /// * `Err(StorageError)` - Any other database failure
    fn insert(&mut self, entry: &Entry) -> StorageResult<Option<i64>>;

    /// Returns bookmarks to refresh, in random order
    ///
    /// # Arguments
    ///
    /// * `uncached_only` - Only bookmarks that were never fetched successfully
    /// * `registry` - Used to flag candidates whose extractor got newer
    fn fetch_candidates(
        &self,
        uncached_only: bool,
        registry: &StrategyRegistry,
    ) -> StorageResult<Vec<FetchCandidate>>;

    /// Ranked full-text search over title, href and content
    ///
    /// `open` and `close` surround matched text in the snippet.
    fn search(&self, query: &str, open: &str, close: &str) -> StorageResult<Vec<SearchResult>>;

    /// Gets a bookmark by ID
    fn get_bookmark(&self, id: i64) -> StorageResult<Option<Bookmark>>;

    /// Gets total bookmark count
    fn count_bookmarks(&self) -> StorageResult<u64>;

    /// Deletes a bookmark; its index entry goes with it
    fn delete_bookmark(&mut self, id: i64) -> StorageResult<()>;
}
