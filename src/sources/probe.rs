//! Storefront page timing probe.
//!
//! Each configured page is fetched once per cycle. The adapter measures
//! time to first body chunk (TTFB), total download time and body size, and
//! runs a few markup sanity checks. A page that cannot be reached still
//! yields a row, without a status code, so it classifies as critical.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Instant;
use url::Url;

use crate::domain::pagespeed::PageType;
use crate::domain::RawRow;
use crate::sources::{SourceAdapter, SourceResult};

/// Markup checks on a fetched page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sanity {
    pub title_len: usize,
    pub has_h1: bool,
    pub has_canonical: bool,
    pub has_product_jsonld: Option<bool>,
    pub warnings: i64,
    pub criticals: i64,
}

fn title_len(html: &str) -> usize {
    let Some(start) = html.find("<title") else {
        return 0;
    };
    let rest = &html[start..];
    let Some(open_end) = rest.find('>') else {
        return 0;
    };
    let body = &rest[open_end + 1..];
    body.find("</title>")
        .map(|end| body[..end].trim().chars().count())
        .unwrap_or(0)
}

/// Cheap substring checks over the lowercased markup.
pub fn sanity_checks(html: &str, page: PageType) -> Sanity {
    let lower = html.to_ascii_lowercase();
    let title_len = title_len(&lower);
    let has_h1 = lower.contains("<h1");
    let has_canonical = lower.contains("rel=\"canonical\"") || lower.contains("rel='canonical'");
    let has_product_jsonld = match page {
        PageType::Product => Some(lower.contains("application/ld+json") && lower.contains("\"product\"")),
        PageType::Home => None,
    };

    let warnings = [(30..=65).contains(&title_len), has_h1, has_canonical]
        .iter()
        .filter(|ok| !**ok)
        .count() as i64;
    let criticals = i64::from(has_product_jsonld == Some(false));

    Sanity { title_len, has_h1, has_canonical, has_product_jsonld, warnings, criticals }
}

pub struct PageProbeSource {
    name: String,
    client: reqwest::Client,
    pages: Vec<(PageType, Url)>,
    /// Feed sanity warnings into classification.
    count_sanity_warnings: bool,
}

impl PageProbeSource {
    pub fn new(name: impl Into<String>, client: reqwest::Client, pages: Vec<(PageType, Url)>) -> Self {
        Self { name: name.into(), client, pages, count_sanity_warnings: false }
    }

    pub fn with_sanity_warnings(mut self, enabled: bool) -> Self {
        self.count_sanity_warnings = enabled;
        self
    }

    async fn probe(&self, page: PageType, url: &Url) -> RawRow {
        let started = Instant::now();
        let mut row = json!({ "page_type": page.as_str(), "url": url.as_str() });

        let result = async {
            let mut response = self
                .client
                .get(url.clone())
                .header(ACCEPT, "text/html")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            let mut body = Vec::new();
            let mut first_chunk_ms = None;
            while let Some(chunk) = response.chunk().await? {
                if first_chunk_ms.is_none() {
                    first_chunk_ms = Some(started.elapsed().as_millis() as u64);
                }
                body.extend_from_slice(&chunk);
            }
            let total_ms = started.elapsed().as_millis() as u64;
            Ok::<_, reqwest::Error>((status, content_type, body, first_chunk_ms.unwrap_or(total_ms), total_ms))
        }
        .await;

        match result {
            Ok((status, content_type, body, ttfb_ms, total_ms)) => {
                let sanity = sanity_checks(&String::from_utf8_lossy(&body), page);
                let fields = json!({
                    "status_code": status,
                    "ttfb_ms": ttfb_ms,
                    "total_ms": total_ms,
                    "html_bytes": body.len(),
                    "content_type": content_type,
                    "sanity_critical": sanity.criticals,
                    "sanity_warning": if self.count_sanity_warnings { sanity.warnings } else { 0 },
                    "title_len": sanity.title_len,
                    "h1_ok": sanity.has_h1,
                    "canonical_ok": sanity.has_canonical,
                    "jsonld_product_ok": sanity.has_product_jsonld,
                });
                merge(&mut row, fields);
            }
            Err(err) => {
                tracing::warn!(source = %self.name, page = page.as_str(), error = %err, "Page probe failed");
                merge(&mut row, json!({ "error": err.to_string() }));
            }
        }

        match row {
            Value::Object(map) => map,
            _ => RawRow::new(),
        }
    }
}

fn merge(target: &mut Value, extra: Value) {
    if let (Value::Object(t), Value::Object(e)) = (target, extra) {
        t.extend(e);
    }
}

#[async_trait]
impl SourceAdapter for PageProbeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> SourceResult<Vec<RawRow>> {
        let mut rows = Vec::with_capacity(self.pages.len());
        for (page, url) in &self.pages {
            rows.push(self.probe(*page, url).await);
        }
        Ok(rows)
    }
}
