//! WordPress eXtended RSS (WXR) export import.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::parser::markup::slugify;
use crate::source::Document;

const WP_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Content,
    PostId,
    PostName,
    PostType,
    Status,
    Modified,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        Some(match tag {
            b"title" => Field::Title,
            b"link" => Field::Link,
            b"content:encoded" => Field::Content,
            b"wp:post_id" => Field::PostId,
            b"wp:post_name" => Field::PostName,
            b"wp:post_type" => Field::PostType,
            b"wp:status" => Field::Status,
            b"wp:post_modified_gmt" => Field::Modified,
            _ => return None,
        })
    }
}

#[derive(Default)]
struct Item {
    title: String,
    link: String,
    content: String,
    post_id: String,
    post_name: String,
    post_type: String,
    status: String,
    modified: String,
}

impl Item {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Content => &mut self.content,
            Field::PostId => &mut self.post_id,
            Field::PostName => &mut self.post_name,
            Field::PostType => &mut self.post_type,
            Field::Status => &mut self.status,
            Field::Modified => &mut self.modified,
        }
    }

    fn into_document(self) -> Option<Document> {
        let id = match self.post_id.trim().parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                warn!("Skipping item {:?}: no numeric post id", self.title.trim());
                return None;
            }
        };
        let title = self.title.trim().to_string();
        let slug = match self.post_name.trim() {
            "" => slugify(&title),
            s => s.to_string(),
        };

        Some(Document {
            id,
            post_type: self.post_type.trim().to_string(),
            status: self.status.trim().to_string(),
            title,
            slug,
            url: self.link.trim().to_string(),
            content: self.content,
            modified: parse_wp_date(&self.modified),
        })
    }
}

/// `0000-00-00 00:00:00` and empty values have no date.
fn parse_wp_date(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), WP_DATE_FORMAT).ok()
}

/// Parse every `<item>` of a WXR export into a [`Document`], whatever its post type.
pub fn parse_wxr(xml: &str) -> Result<Vec<Document>> {
    let mut reader = Reader::from_str(xml);
    let mut docs = Vec::new();
    let mut item: Option<Item> = None;
    // Depth below <item>; only its direct children are read.
    let mut depth = 0usize;
    let mut field: Option<Field> = None;

    loop {
        let pos = reader.buffer_position();
        let event = reader
            .read_event()
            .with_context(|| format!("Malformed WXR near byte {}", pos))?;

        match event {
            Event::Start(e) => {
                if let Some(current) = item.as_mut() {
                    depth += 1;
                    if depth == 1 {
                        field = Field::from_tag(e.name().as_ref());
                        if let Some(f) = field {
                            current.field_mut(f).clear();
                        }
                    }
                } else if e.name().as_ref() == b"item" {
                    item = Some(Item::default());
                    depth = 0;
                }
            }
            Event::End(e) => {
                if item.is_some() && depth == 0 && e.name().as_ref() == b"item" {
                    if let Some(doc) = item.take().and_then(Item::into_document) {
                        docs.push(doc);
                    }
                } else if item.is_some() {
                    if depth == 1 {
                        field = None;
                    }
                    depth = depth.saturating_sub(1);
                }
            }
            Event::Text(e) => {
                if let (Some(current), Some(f)) = (item.as_mut(), field) {
                    let text = e.unescape().context("Invalid text in WXR item")?;
                    current.field_mut(f).push_str(&text);
                }
            }
            Event::CData(e) => {
                if let (Some(current), Some(f)) = (item.as_mut(), field) {
                    let text = std::str::from_utf8(&e).context("Invalid UTF-8 in WXR CDATA")?;
                    current.field_mut(f).push_str(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(items = docs.len(), "parsed WXR export");
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<rss version="2.0"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
    <title>Popup Maker</title>
    <link>https://wppopupmaker.com</link>
    <item>
        <title><![CDATA[HubSpot]]></title>
        <link>https://wppopupmaker.com/integrations/hubspot/</link>
        <content:encoded><![CDATA[<!-- wp:popup-maker/integration-feature {"label":"Sync Leads","tier":"pro"} /-->]]></content:encoded>
        <wp:post_id>42</wp:post_id>
        <wp:post_modified_gmt><![CDATA[2024-03-05 14:22:10]]></wp:post_modified_gmt>
        <wp:post_name><![CDATA[hubspot]]></wp:post_name>
        <wp:status><![CDATA[publish]]></wp:status>
        <wp:post_type><![CDATA[integration]]></wp:post_type>
        <wp:postmeta>
            <wp:meta_key><![CDATA[_edit_last]]></wp:meta_key>
            <wp:meta_value><![CDATA[1]]></wp:meta_value>
        </wp:postmeta>
    </item>
    <item>
        <title>Forms &amp; Surveys</title>
        <link>https://wppopupmaker.com/?p=43</link>
        <content:encoded><![CDATA[]]></content:encoded>
        <wp:post_id>43</wp:post_id>
        <wp:post_modified_gmt><![CDATA[0000-00-00 00:00:00]]></wp:post_modified_gmt>
        <wp:post_name><![CDATA[]]></wp:post_name>
        <wp:status><![CDATA[draft]]></wp:status>
        <wp:post_type><![CDATA[page]]></wp:post_type>
    </item>
    <item>
        <title>Broken</title>
        <wp:post_id></wp:post_id>
    </item>
</channel>
</rss>"#;

    #[test]
    fn reads_items() {
        let docs = parse_wxr(EXPORT).unwrap();
        assert_eq!(docs.len(), 2);

        let hubspot = &docs[0];
        assert_eq!(hubspot.id, 42);
        assert_eq!(hubspot.title, "HubSpot");
        assert_eq!(hubspot.slug, "hubspot");
        assert_eq!(hubspot.post_type, "integration");
        assert_eq!(hubspot.status, "publish");
        assert_eq!(hubspot.url, "https://wppopupmaker.com/integrations/hubspot/");
        assert!(hubspot.content.starts_with("<!-- wp:popup-maker/integration-feature"));
        assert_eq!(
            hubspot.modified,
            NaiveDateTime::parse_from_str("2024-03-05 14:22:10", WP_DATE_FORMAT).ok()
        );
    }

    #[test]
    fn entities_zero_dates_and_missing_slugs() {
        let docs = parse_wxr(EXPORT).unwrap();
        let forms = &docs[1];
        assert_eq!(forms.title, "Forms & Surveys");
        assert_eq!(forms.slug, "forms-surveys");
        assert_eq!(forms.content, "");
        assert!(forms.modified.is_none());
    }

    #[test]
    fn channel_fields_are_not_items() {
        let docs = parse_wxr(EXPORT).unwrap();
        assert!(docs.iter().all(|d| d.title != "Popup Maker"));
    }

    #[test]
    fn extracts_from_imported_content() {
        let docs = parse_wxr(EXPORT).unwrap();
        let result = crate::parser::process_content(&docs[0].content);
        assert_eq!(result.total_features, 1);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_wxr("<rss><channel><item><title>x</item></channel></rss>").is_err());
    }
}
