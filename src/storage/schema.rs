//! Database schema definitions
//!
//! The full-text index is an FTS5 external-content table over `bookmark`.
//! It is written exclusively by the triggers below: FTS5 cannot read the old
//! values of an external-content row by itself, so every update and delete
//! retracts the previously indexed values explicitly before anything new is
//! indexed.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bookmark (
    id INTEGER NOT NULL PRIMARY KEY,
    title TEXT,
    href TEXT UNIQUE NOT NULL,
    date TIMESTAMP NOT NULL DEFAULT (datetime(0, 'unixepoch')),
    icon BLOB,
    content TEXT,
    hash INTEGER NOT NULL DEFAULT 0,
    modified TIMESTAMP NOT NULL DEFAULT (datetime(0, 'unixepoch')),
    version INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE VIRTUAL TABLE IF NOT EXISTS bookmark_fts USING fts5(
    title,
    href,
    content,
    content = 'bookmark',
    content_rowid = 'id',
    tokenize = 'trigram'
);

CREATE TRIGGER IF NOT EXISTS bookmark_fts_insert AFTER INSERT ON bookmark
BEGIN
    INSERT INTO bookmark_fts (rowid, title, href, content)
    VALUES (new.id, new.title, new.href, new.content);
END;

CREATE TRIGGER IF NOT EXISTS bookmark_fts_delete AFTER DELETE ON bookmark
BEGIN
    INSERT INTO bookmark_fts (bookmark_fts, rowid, title, href, content)
    VALUES ('delete', old.id, old.title, old.href, old.content);
END;

CREATE TRIGGER IF NOT EXISTS bookmark_fts_update AFTER UPDATE OF title, href, content ON bookmark
BEGIN
    INSERT INTO bookmark_fts (bookmark_fts, rowid, title, href, content)
    VALUES ('delete', old.id, old.title, old.href, old.content);
    INSERT INTO bookmark_fts (rowid, title, href, content)
    VALUES (new.id, new.title, new.href, new.content);
END;

CREATE TRIGGER IF NOT EXISTS bookmark_updated_at
AFTER UPDATE OF title, href, date, icon, content, hash, modified, version ON bookmark
BEGIN
    UPDATE bookmark SET updated_at = CURRENT_TIMESTAMP WHERE id = new.id;
END;
"#;

/// Initializes the database schema
///
/// Every statement is guarded with `IF NOT EXISTS`, so running this on an
/// initialized database is a no-op.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
