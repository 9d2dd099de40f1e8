use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::source::Document;

const CONCURRENCY: usize = 4;
const PER_PAGE: u32 = 100;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REST_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub site_url: String,
    pub rest_base: String,
    pub post_type: String,
    pub status: String,
    pub username: Option<String>,
    pub app_password: Option<String>,
    /// Stop after this many pages of results.
    pub max_pages: Option<u32>,
}

impl SyncOptions {
    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/wp-json/wp/v2/{}?context=edit&per_page={}&page={}&status={}",
            self.site_url.trim_end_matches('/'),
            self.rest_base,
            PER_PAGE,
            page,
            self.status
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct RestText {
    #[serde(default)]
    raw: Option<String>,
    #[serde(default)]
    rendered: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestPost {
    id: i64,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    status: String,
    #[serde(rename = "type", default)]
    post_type: Option<String>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    modified_gmt: Option<String>,
    #[serde(default)]
    title: RestText,
    #[serde(default)]
    content: RestText,
}

impl RestPost {
    fn into_document(self, default_type: &str) -> Document {
        let content = match (self.content.raw, self.content.rendered) {
            (Some(raw), _) => raw,
            (None, rendered) => {
                warn!(
                    id = self.id,
                    "No raw content (missing edit rights?), falling back to rendered HTML"
                );
                rendered.unwrap_or_default()
            }
        };

        Document {
            id: self.id,
            post_type: self.post_type.unwrap_or_else(|| default_type.to_string()),
            status: self.status,
            title: self.title.raw.or(self.title.rendered).unwrap_or_default(),
            slug: self.slug,
            url: self.link,
            content,
            modified: self
                .modified_gmt
                .and_then(|d| NaiveDateTime::parse_from_str(&d, REST_DATE_FORMAT).ok()),
        }
    }
}

struct Page {
    posts: Vec<RestPost>,
    total_pages: u32,
}

/// Pull every post of the configured type and status from the WordPress REST API.
pub async fn fetch_documents(opts: &SyncOptions) -> Result<Vec<Document>> {
    let client = Client::builder()
        .user_agent(concat!("integration_features/", env!("CARGO_PKG_VERSION")))
        .build()?;

    info!("Fetching page 1 of {}", opts.page_url(1));
    let first = fetch_with_retry(&client, opts, 1).await?;
    let total_pages = pages_to_fetch(first.total_pages, opts.max_pages);
    info!("{} pages to fetch", total_pages);

    let mut pages: Vec<Option<Vec<RestPost>>> = (0..total_pages).map(|_| None).collect();
    if let Some(slot) = pages.first_mut() {
        *slot = Some(first.posts);
    }

    if total_pages > 1 {
        let client = Arc::new(client);
        let opts = Arc::new(opts.clone());
        let semaphore = Arc::new(Semaphore::new(CONCURRENCY));

        let pb = ProgressBar::new(total_pages as u64 - 1);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")?
                .progress_chars("=> "),
        );

        let mut handles = Vec::new();
        for page in 2..=total_pages {
            let client = Arc::clone(&client);
            let opts = Arc::clone(&opts);
            let sem = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await?;
                let fetched = fetch_with_retry(&client, &opts, page).await?;
                Ok::<_, anyhow::Error>((page, fetched.posts))
            }));
        }

        for handle in handles {
            let (page, posts) = handle.await.context("Page fetch task panicked")??;
            pages[page as usize - 1] = Some(posts);
            pb.inc(1);
        }
        pb.finish_and_clear();
    }

    let docs: Vec<Document> = pages
        .into_iter()
        .flatten()
        .flatten()
        .map(|post| post.into_document(&opts.post_type))
        .collect();
    info!("Fetched {} posts", docs.len());
    Ok(docs)
}

async fn fetch_with_retry(client: &Client, opts: &SyncOptions, page: u32) -> Result<Page> {
    let mut attempt = 0;
    loop {
        match fetch_page(client, opts, page).await {
            Ok(fetched) => return Ok(fetched),
            Err(FetchError::Retryable(status)) if attempt < MAX_RETRIES => {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                attempt += 1;
                warn!(
                    "HTTP {} on page {} (attempt {}/{}), backing off {:.1}s",
                    status,
                    page,
                    attempt,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
            Err(FetchError::Retryable(status)) => {
                bail!("Page {} still failing with HTTP {} after {} retries", page, status, MAX_RETRIES)
            }
            Err(FetchError::Fatal(e)) => return Err(e),
        }
    }
}

enum FetchError {
    Retryable(StatusCode),
    Fatal(anyhow::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Fatal(e.into())
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn fetch_page(client: &Client, opts: &SyncOptions, page: u32) -> Result<Page, FetchError> {
    let mut request = client.get(opts.page_url(page));
    if let Some(user) = &opts.username {
        request = request.basic_auth(user, opts.app_password.as_deref());
    }

    let response = request.send().await?;
    let status = response.status();
    if is_retryable(status) {
        return Err(FetchError::Retryable(status));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Fatal(anyhow!(
            "HTTP {} fetching page {}: {}",
            status,
            page,
            body.chars().take(200).collect::<String>()
        )));
    }

    let total_pages = total_pages_header(response.headers());
    let posts: Vec<RestPost> = response.json().await?;
    Ok(Page { posts, total_pages })
}

/// Reported page count capped by `max_pages`. Page 1 is always kept.
fn pages_to_fetch(reported: u32, max_pages: Option<u32>) -> u32 {
    max_pages.map_or(reported, |max| reported.min(max)).max(1)
}

/// `X-WP-TotalPages`, at least 1.
fn total_pages_header(headers: &reqwest::header::HeaderMap) -> u32 {
    headers
        .get("x-wp-totalpages")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn options() -> SyncOptions {
        SyncOptions {
            site_url: "https://wppopupmaker.com/".to_string(),
            rest_base: "integrations".to_string(),
            post_type: "integration".to_string(),
            status: "publish".to_string(),
            username: None,
            app_password: None,
            max_pages: None,
        }
    }

    #[test]
    fn builds_page_urls() {
        assert_eq!(
            options().page_url(3),
            "https://wppopupmaker.com/wp-json/wp/v2/integrations?context=edit&per_page=100&page=3&status=publish"
        );
    }

    #[test]
    fn converts_edit_context_posts() {
        let json = r#"{
            "id": 42,
            "slug": "hubspot",
            "status": "publish",
            "type": "integration",
            "link": "https://wppopupmaker.com/integrations/hubspot/",
            "modified_gmt": "2024-03-05T14:22:10",
            "title": {"raw": "HubSpot", "rendered": "HubSpot"},
            "content": {"raw": "<!-- wp:paragraph --><p>x</p><!-- /wp:paragraph -->", "rendered": "<p>x</p>"}
        }"#;
        let post: RestPost = serde_json::from_str(json).unwrap();
        let doc = post.into_document("integration");
        assert_eq!(doc.id, 42);
        assert_eq!(doc.title, "HubSpot");
        assert_eq!(doc.slug, "hubspot");
        assert!(doc.content.starts_with("<!-- wp:paragraph"));
        assert!(doc.modified.is_some());
    }

    #[test]
    fn falls_back_to_rendered_content() {
        let json = r#"{
            "id": 7,
            "status": "publish",
            "title": {"rendered": "Zoom"},
            "content": {"rendered": "<p>Rendered only</p>"}
        }"#;
        let post: RestPost = serde_json::from_str(json).unwrap();
        let doc = post.into_document("integration");
        assert_eq!(doc.content, "<p>Rendered only</p>");
        assert_eq!(doc.title, "Zoom");
        assert_eq!(doc.post_type, "integration");
        assert!(doc.modified.is_none());
    }

    #[test]
    fn reads_total_pages() {
        let mut headers = HeaderMap::new();
        assert_eq!(total_pages_header(&headers), 1);
        headers.insert("X-WP-TotalPages", HeaderValue::from_static("7"));
        assert_eq!(total_pages_header(&headers), 7);
        headers.insert("X-WP-TotalPages", HeaderValue::from_static("0"));
        assert_eq!(total_pages_header(&headers), 1);
    }

    #[test]
    fn page_limit_never_drops_the_first_page() {
        assert_eq!(pages_to_fetch(5, None), 5);
        assert_eq!(pages_to_fetch(5, Some(2)), 2);
        assert_eq!(pages_to_fetch(2, Some(10)), 2);
        assert_eq!(pages_to_fetch(5, Some(0)), 1);
    }

    #[test]
    fn retries_rate_limits_and_server_errors() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::OK));
    }
}
