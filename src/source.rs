use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;

/// One post of the integration content type, with its raw block content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub post_type: String,
    pub status: String,
    pub title: String,
    pub slug: String,
    pub url: String,
    #[serde(skip)]
    pub content: String,
    pub modified: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    pub post_type: String,
    pub status: String,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        doc.post_type == self.post_type && doc.status == self.status
    }
}

pub trait DocumentSource {
    fn get_document(&self, id: i64) -> Result<Option<Document>>;

    /// Matching documents ordered by title, then id.
    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;
}

/// Documents held in memory, for ad-hoc runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource(pub Vec<Document>);

impl DocumentSource for MemorySource {
    fn get_document(&self, id: i64) -> Result<Option<Document>> {
        Ok(self.0.iter().find(|d| d.id == id).cloned())
    }

    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.0.iter().filter(|d| filter.matches(d)).cloned().collect();
        docs.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(docs)
    }
}

impl<S: DocumentSource + ?Sized> DocumentSource for &S {
    fn get_document(&self, id: i64) -> Result<Option<Document>> {
        (**self).get_document(id)
    }

    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        (**self).list_documents(filter)
    }
}

#[cfg(test)]
pub(crate) fn doc(id: i64, title: &str, content: &str) -> Document {
    Document {
        id,
        post_type: "integration".to_string(),
        status: "publish".to_string(),
        title: title.to_string(),
        slug: crate::parser::markup::slugify(title),
        url: format!("https://example.com/integrations/{}/", crate::parser::markup::slugify(title)),
        content: content.to_string(),
        modified: None,
    }
}
