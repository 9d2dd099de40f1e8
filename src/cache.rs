use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db::{self, ExtractionRow};
use crate::model::ExtractionResult;
use crate::parser::process_content;
use crate::source::Document;

/// Stored extraction results, reused while a document's content hash is unchanged.
///
/// Kept apart from the extractor: callers opt in by going through the cache.
pub struct ExtractionCache<'a> {
    conn: &'a Connection,
}

pub fn content_hash(content: &str) -> String {
    format!("{:x}", md5::compute(content.as_bytes()))
}

impl<'a> ExtractionCache<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        ExtractionCache { conn }
    }

    /// `doc` must already be stored: entries reference `documents(id)` and the write fails
    /// otherwise.
    pub fn get_or_extract(&self, doc: &Document) -> Result<ExtractionResult> {
        let hash = content_hash(&doc.content);

        if let Some(row) = db::fetch_extraction(self.conn, doc.id)? {
            if row.content_hash == hash {
                match serde_json::from_str(&row.data) {
                    Ok(result) => {
                        debug!(id = doc.id, "extraction cache hit");
                        return Ok(result);
                    }
                    Err(e) => warn!(id = doc.id, "discarding unreadable cache entry: {}", e),
                }
            }
        }

        let result = process_content(&doc.content);
        let data = serde_json::to_string(&result)
            .with_context(|| format!("Failed to serialize extraction for document {}", doc.id))?;
        db::save_extraction(
            self.conn,
            doc.id,
            &ExtractionRow {
                content_hash: hash,
                data,
            },
        )
        .with_context(|| format!("Failed to cache extraction for document {}", doc.id))?;
        debug!(id = doc.id, "extraction cache miss");
        Ok(result)
    }

    pub fn invalidate(&self, document_id: i64) -> Result<bool> {
        Ok(db::delete_extraction(self.conn, document_id)? > 0)
    }

    pub fn clear(&self) -> Result<usize> {
        db::clear_extractions(self.conn)
    }
}
