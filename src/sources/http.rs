//! JSON feed adapter over `reqwest`.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::domain::RawRow;
use crate::resilience::{retry_with_backoff, RetryPolicy};
use crate::sources::{SourceAdapter, SourceError, SourceResult};

/// How rows are laid out in a feed's JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedShape {
    /// `{"data": [...]}`; a missing `data` key is an empty feed.
    #[default]
    Data,
    /// A bare list, or `{"items": [...]}` / `{"data": [...]}`.
    ListOrItems,
    /// `{"warning": [...], "critical": [...]}`, each row tagged with its
    /// bucket as `severity` when it carries none. Falls back to `items`/`data`.
    SeverityBuckets,
    /// The whole object is a single row.
    Object,
}

fn into_rows(field: &str, value: Value) -> SourceResult<Vec<RawRow>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(SourceError::Malformed(format!(
                    "`{field}` contains a non-object row: {other}"
                ))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(SourceError::Malformed(format!(
            "`{field}` is not a list (got {})",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn items_or_data(mut obj: serde_json::Map<String, Value>) -> SourceResult<Vec<RawRow>> {
    for key in ["items", "data"] {
        if let Some(v) = obj.remove(key) {
            if !v.is_null() {
                return into_rows(key, v);
            }
        }
    }
    Ok(Vec::new())
}

/// Pull the rows out of a decoded feed body.
pub fn extract_rows(shape: FeedShape, body: Value) -> SourceResult<Vec<RawRow>> {
    match (shape, body) {
        (FeedShape::Data, Value::Object(mut obj)) => into_rows("data", obj.remove("data").unwrap_or(Value::Null)),
        (FeedShape::ListOrItems, Value::Array(items)) => into_rows("body", Value::Array(items)),
        (FeedShape::ListOrItems, Value::Object(obj)) => items_or_data(obj),
        (FeedShape::SeverityBuckets, Value::Array(items)) => into_rows("body", Value::Array(items)),
        (FeedShape::SeverityBuckets, Value::Object(mut obj)) => {
            let mut rows = Vec::new();
            for bucket in ["warning", "critical"] {
                if let Some(part) = obj.remove(bucket) {
                    for mut row in into_rows(bucket, part)? {
                        row.entry("severity").or_insert_with(|| Value::String(bucket.to_string()));
                        rows.push(row);
                    }
                }
            }
            if rows.is_empty() {
                return items_or_data(obj);
            }
            Ok(rows)
        }
        (FeedShape::Object, Value::Object(obj)) => Ok(vec![obj]),
        (shape, other) => Err(SourceError::Malformed(format!(
            "unexpected {} body for {shape:?} feed",
            type_name(&other)
        ))),
    }
}

pub struct HttpJsonSource {
    name: String,
    client: reqwest::Client,
    url: Url,
    query: Vec<(String, String)>,
    shape: FeedShape,
    retry: RetryPolicy,
}

impl HttpJsonSource {
    pub fn new(name: impl Into<String>, client: reqwest::Client, url: Url, shape: FeedShape) -> Self {
        Self {
            name: name.into(),
            client,
            url,
            query: Vec::new(),
            shape,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self) -> SourceResult<Value> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&self.query)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| SourceError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl SourceAdapter for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> SourceResult<Vec<RawRow>> {
        let body = retry_with_backoff(&self.retry, &self.name, || self.fetch_once()).await?;
        let rows = extract_rows(self.shape, body)?;
        tracing::debug!(source = %self.name, rows = rows.len(), "Fetched feed");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_shape() {
        let rows = extract_rows(FeedShape::Data, json!({"data": [{"method": "MBWay"}]})).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(extract_rows(FeedShape::Data, json!({"ok": true})).unwrap().is_empty());
        assert!(matches!(
            extract_rows(FeedShape::Data, json!({"data": "nope"})),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(extract_rows(FeedShape::Data, json!([1, 2])), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_list_or_items_shape() {
        assert_eq!(extract_rows(FeedShape::ListOrItems, json!([{"id_order": 1}])).unwrap().len(), 1);
        assert_eq!(
            extract_rows(FeedShape::ListOrItems, json!({"items": [{"id_order": 1}, {"id_order": 2}]}))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(extract_rows(FeedShape::ListOrItems, json!({"data": [{}]})).unwrap().len(), 1);
        assert!(extract_rows(FeedShape::ListOrItems, json!({})).unwrap().is_empty());
        assert!(matches!(
            extract_rows(FeedShape::ListOrItems, json!([1])),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn test_severity_buckets_tag_rows() {
        let rows = extract_rows(
            FeedShape::SeverityBuckets,
            json!({
                "counts": {"warning": 1, "critical": 1},
                "warning": [{"id_product": 1}],
                "critical": [{"id_product": 2, "severity": "warning"}],
            }),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["severity"], "warning");
        // an explicit tag is kept as sent
        assert_eq!(rows[1]["severity"], "warning");

        let fallback = extract_rows(FeedShape::SeverityBuckets, json!({"items": [{"id_product": 3}]})).unwrap();
        assert_eq!(fallback.len(), 1);
    }

    #[test]
    fn test_object_shape() {
        let rows = extract_rows(FeedShape::Object, json!({"status": "ok"})).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(extract_rows(FeedShape::Object, json!([])).is_err());
    }
}
