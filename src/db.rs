use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::source::{Document, DocumentFilter, DocumentSource};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id          INTEGER PRIMARY KEY,
            post_type   TEXT NOT NULL,
            status      TEXT NOT NULL,
            title       TEXT NOT NULL,
            slug        TEXT NOT NULL,
            url         TEXT NOT NULL,
            content     TEXT NOT NULL,
            modified    TEXT,
            imported_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(post_type, status);
        CREATE INDEX IF NOT EXISTS idx_documents_title ON documents(title);

        -- Cached extraction results, keyed by document and content hash
        CREATE TABLE IF NOT EXISTS extractions (
            document_id  INTEGER PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
            content_hash TEXT NOT NULL,
            data         TEXT NOT NULL,
            extracted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Documents ──

/// Insert or replace documents. Any cached extraction for a written document is dropped.
pub fn upsert_documents(conn: &Connection, docs: &[Document]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut upsert = tx.prepare(
            "INSERT INTO documents (id, post_type, status, title, slug, url, content, modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                post_type = excluded.post_type,
                status = excluded.status,
                title = excluded.title,
                slug = excluded.slug,
                url = excluded.url,
                content = excluded.content,
                modified = excluded.modified,
                imported_at = datetime('now')",
        )?;
        let mut invalidate = tx.prepare("DELETE FROM extractions WHERE document_id = ?1")?;
        for d in docs {
            count += upsert.execute(rusqlite::params![
                d.id, d.post_type, d.status, d.title, d.slug, d.url, d.content, d.modified,
            ])?;
            invalidate.execute(rusqlite::params![d.id])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

const DOCUMENT_COLUMNS: &str = "id, post_type, status, title, slug, url, content, modified";

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        post_type: row.get(1)?,
        status: row.get(2)?,
        title: row.get(3)?,
        slug: row.get(4)?,
        url: row.get(5)?,
        content: row.get(6)?,
        modified: row.get(7)?,
    })
}

pub fn fetch_document(conn: &Connection, id: i64) -> Result<Option<Document>> {
    let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
    let doc = conn
        .query_row(&sql, rusqlite::params![id], row_to_document)
        .optional()?;
    Ok(doc)
}

pub fn fetch_documents(conn: &Connection, filter: &DocumentFilter) -> Result<Vec<Document>> {
    let sql = format!(
        "SELECT {} FROM documents
         WHERE post_type = ?1 AND status = ?2
         ORDER BY title, id",
        DOCUMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![filter.post_type, filter.status], row_to_document)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Adapts a connection to the [`DocumentSource`] interface.
pub struct SqliteSource<'a>(pub &'a Connection);

impl DocumentSource for SqliteSource<'_> {
    fn get_document(&self, id: i64) -> Result<Option<Document>> {
        fetch_document(self.0, id)
    }

    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        fetch_documents(self.0, filter)
    }
}

// ── Extraction cache ──

pub struct ExtractionRow {
    pub content_hash: String,
    pub data: String,
}

pub fn fetch_extraction(conn: &Connection, document_id: i64) -> Result<Option<ExtractionRow>> {
    let row = conn
        .query_row(
            "SELECT content_hash, data FROM extractions WHERE document_id = ?1",
            rusqlite::params![document_id],
            |row| {
                Ok(ExtractionRow {
                    content_hash: row.get(0)?,
                    data: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn save_extraction(conn: &Connection, document_id: i64, row: &ExtractionRow) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO extractions (document_id, content_hash, data)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![document_id, row.content_hash, row.data],
    )?;
    Ok(())
}

pub fn delete_extraction(conn: &Connection, document_id: i64) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM extractions WHERE document_id = ?1",
        rusqlite::params![document_id],
    )?;
    Ok(n)
}

pub fn clear_extractions(conn: &Connection) -> Result<usize> {
    let n = conn.execute("DELETE FROM extractions", [])?;
    Ok(n)
}

// ── Stats ──

pub struct Stats {
    pub documents: usize,
    pub matching: usize,
    pub other: usize,
    pub cached: usize,
    pub uncached: usize,
}

pub fn get_stats(conn: &Connection, filter: &DocumentFilter) -> Result<Stats> {
    let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let matching: usize = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE post_type = ?1 AND status = ?2",
        rusqlite::params![filter.post_type, filter.status],
        |r| r.get(0),
    )?;
    let cached: usize = conn.query_row("SELECT COUNT(*) FROM extractions", [], |r| r.get(0))?;
    Ok(Stats {
        documents,
        matching,
        other: documents - matching,
        cached,
        uncached: documents.saturating_sub(cached),
    })
}

#[cfg(test)]
pub(crate) fn memory() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    init_schema(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::doc;

    fn filter() -> DocumentFilter {
        DocumentFilter {
            post_type: "integration".to_string(),
            status: "publish".to_string(),
        }
    }

    #[test]
    fn upsert_and_fetch() {
        let conn = memory();
        let written = upsert_documents(&conn, &[doc(2, "Zapier", "<p>z</p>"), doc(1, "Aweber", "<p>a</p>")]).unwrap();
        assert_eq!(written, 2);

        let d = fetch_document(&conn, 2).unwrap().unwrap();
        assert_eq!(d.title, "Zapier");
        assert_eq!(d.content, "<p>z</p>");
        assert!(fetch_document(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn documents_ordered_by_title_and_filtered() {
        let conn = memory();
        let mut page = doc(3, "About", "");
        page.post_type = "page".to_string();
        upsert_documents(&conn, &[doc(2, "Zapier", ""), doc(1, "Aweber", ""), page]).unwrap();

        let titles: Vec<String> = fetch_documents(&conn, &filter())
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["Aweber", "Zapier"]);
    }

    #[test]
    fn upsert_replaces_and_invalidates() {
        let conn = memory();
        upsert_documents(&conn, &[doc(1, "Aweber", "old")]).unwrap();
        save_extraction(
            &conn,
            1,
            &ExtractionRow {
                content_hash: "h".to_string(),
                data: "{}".to_string(),
            },
        )
        .unwrap();
        assert!(fetch_extraction(&conn, 1).unwrap().is_some());

        upsert_documents(&conn, &[doc(1, "AWeber", "new")]).unwrap();
        let d = fetch_document(&conn, 1).unwrap().unwrap();
        assert_eq!(d.title, "AWeber");
        assert_eq!(d.content, "new");
        assert!(fetch_extraction(&conn, 1).unwrap().is_none());
    }

    #[test]
    fn extractions_require_a_stored_document() {
        let conn = memory();
        let row = ExtractionRow {
            content_hash: "h".to_string(),
            data: "{}".to_string(),
        };
        assert!(save_extraction(&conn, 404, &row).is_err());
    }

    #[test]
    fn stats_counts() {
        let conn = memory();
        let mut draft = doc(2, "Draft", "");
        draft.status = "draft".to_string();
        upsert_documents(&conn, &[doc(1, "Aweber", ""), draft]).unwrap();
        let s = get_stats(&conn, &filter()).unwrap();
        assert_eq!(s.documents, 2);
        assert_eq!(s.matching, 1);
        assert_eq!(s.other, 1);
        assert_eq!(s.cached, 0);
    }

    #[test]
    fn sqlite_source_adapter() {
        let conn = memory();
        upsert_documents(&conn, &[doc(1, "Aweber", "")]).unwrap();
        let source = SqliteSource(&conn);
        assert_eq!(source.list_documents(&filter()).unwrap().len(), 1);
        assert!(source.get_document(1).unwrap().is_some());
    }
}
