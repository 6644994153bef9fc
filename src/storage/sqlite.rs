//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait,
//! plus the transactional batch used by refresh runs.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    timestamp_from_unix, Bookmark, ContentUpdate, Entry, FetchCandidate, ImportReport,
    SearchResult,
};
use crate::strategy::StrategyRegistry;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

const INSERT_SQL: &str = "INSERT INTO bookmark (title, href, date, icon)
     VALUES (?1, ?2, datetime(?3, 'unixepoch'), ?4)";

const UPDATE_CONTENT_SQL: &str = "UPDATE bookmark
     SET content = ?1, hash = ?2, modified = datetime(?3, 'unixepoch'), version = ?4
     WHERE id = ?5";

const SELECT_BOOKMARK_SQL: &str = "SELECT id, title, href, CAST(strftime('%s', date) AS INTEGER),
     icon, content, hash, CAST(strftime('%s', modified) AS INTEGER), version,
     created_at, updated_at
     FROM bookmark WHERE id = ?1";

/// Maximum number of tokens in a search snippet
const SNIPPET_TOKENS: i64 = 64;

/// SQLite bookmark store
pub struct BookmarkStore {
    conn: Connection,
}

impl BookmarkStore {
    /// Opens (or creates) the database at `path` and initializes the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(BookmarkStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Creates the table, the full-text mirror and its triggers if missing
    pub fn init(&self) -> StorageResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    /// Inserts many entries in one transaction
    ///
    /// Entries whose href is already stored are counted, not reported as
    /// errors; any other failure rolls the whole import back.
    pub fn import_entries(&mut self, entries: &[Entry]) -> StorageResult<ImportReport> {
        let tx = self.conn.transaction()?;
        let mut report = ImportReport::default();

        for entry in entries {
            match insert_entry(&tx, entry)? {
                Some(_) => report.inserted += 1,
                None => report.duplicates += 1,
            }
        }

        tx.commit()?;
        Ok(report)
    }

    /// Starts the transaction all content updates of a refresh run go through
    ///
    /// The update statement is prepared here so a broken schema fails the
    /// run before any network traffic happens.
    pub fn begin_content_batch(&mut self) -> StorageResult<ContentBatch<'_>> {
        let tx = self.conn.transaction()?;
        tx.prepare_cached(UPDATE_CONTENT_SQL)?;
        Ok(ContentBatch { tx })
    }
}

impl Storage for BookmarkStore {
    fn insert(&mut self, entry: &Entry) -> StorageResult<Option<i64>> {
        insert_entry(&self.conn, entry)
    }

    fn fetch_candidates(
        &self,
        uncached_only: bool,
        registry: &StrategyRegistry,
    ) -> StorageResult<Vec<FetchCandidate>> {
        let filter = if uncached_only {
            "WHERE content IS NULL"
        } else {
            ""
        };
        let query = format!(
            "SELECT id, title, href, hash, CAST(strftime('%s', modified) AS INTEGER), version
             FROM bookmark {} ORDER BY RANDOM()",
            filter
        );

        let mut stmt = self.conn.prepare(&query)?;
        let candidates = stmt
            .query_map([], |row| {
                let href: String = row.get(2)?;
                let version: i64 = row.get(5)?;
                Ok(FetchCandidate {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    outdated: registry.is_outdated(&href, version),
                    href,
                    hash: row.get::<_, i64>(3)? as u64,
                    last_modified: timestamp_from_unix(row.get(4)?),
                    version,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(candidates)
    }

    fn search(&self, query: &str, open: &str, close: &str) -> StorageResult<Vec<SearchResult>> {
        let expression = match_expression(query);
        if expression.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT rowid, title, href, snippet(bookmark_fts, 2, ?1, ?2, '...', ?3)
             FROM bookmark_fts WHERE bookmark_fts MATCH ?4 ORDER BY rank",
        )?;

        let results = stmt
            .query_map(params![open, close, SNIPPET_TOKENS, expression], |row| {
                Ok(SearchResult {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    href: row.get(2)?,
                    snippet: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }

    fn get_bookmark(&self, id: i64) -> StorageResult<Option<Bookmark>> {
        let bookmark = self
            .conn
            .query_row(SELECT_BOOKMARK_SQL, params![id], bookmark_from_row)
            .optional()?;
        Ok(bookmark)
    }

    fn count_bookmarks(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM bookmark", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn delete_bookmark(&mut self, id: i64) -> StorageResult<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM bookmark WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StorageError::BookmarkNotFound(id));
        }
        Ok(())
    }
}

/// An open refresh transaction
///
/// Owned by a single writer; fetch workers hand their results to that writer
/// instead of touching the connection. Dropping the batch without calling
/// [`ContentBatch::commit`] rolls every update back.
pub struct ContentBatch<'conn> {
    tx: Transaction<'conn>,
}

impl ContentBatch<'_> {
    /// Stores new content, fingerprint, Last-Modified and extractor version
    pub fn update_content(&self, update: &ContentUpdate) -> StorageResult<()> {
        let mut stmt = self.tx.prepare_cached(UPDATE_CONTENT_SQL)?;
        let changed = stmt.execute(params![
            update.content,
            update.hash as i64,
            update.modified.timestamp(),
            update.version,
            update.id
        ])?;

        if changed == 0 {
            return Err(StorageError::BookmarkNotFound(update.id));
        }
        Ok(())
    }

    /// Makes every update of the batch durable at once
    pub fn commit(self) -> StorageResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}

/// Inserts one entry, treating an href uniqueness violation as "already known"
fn insert_entry(conn: &Connection, entry: &Entry) -> StorageResult<Option<i64>> {
    let mut stmt = conn.prepare_cached(INSERT_SQL)?;
    match stmt.execute(params![entry.title, entry.href, entry.date, entry.icon]) {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => {
            tracing::trace!("Bookmark already known: {}", entry.href);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Turns free text into an FTS5 expression of quoted terms
///
/// Quoting keeps URL punctuation and FTS5 operators from being parsed as
/// query syntax; adjacent terms are implicitly ANDed.
fn match_expression(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn bookmark_from_row(row: &Row<'_>) -> rusqlite::Result<Bookmark> {
    Ok(Bookmark {
        id: row.get(0)?,
        title: row.get(1)?,
        href: row.get(2)?,
        date: row.get(3)?,
        icon: row.get(4)?,
        content: row.get(5)?,
        hash: row.get::<_, i64>(6)? as u64,
        modified: timestamp_from_unix(row.get(7)?),
        version: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
