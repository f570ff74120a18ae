use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{SnapshotSource, FETCH_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::RawRecord;

/// Produces the raw ticket records for the current moment.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<RawRecord>>;
}

pub fn build_fetcher(source: &SnapshotSource) -> Result<Box<dyn SnapshotFetcher>> {
    match source {
        SnapshotSource::Http {
            url,
            method,
            payload,
            headers,
        } => Ok(Box::new(HttpSnapshotFetcher::new(
            url.clone(),
            method,
            payload.clone(),
            headers,
        )?)),
        SnapshotSource::File(path) => Ok(Box::new(FileSnapshotFetcher::new(path.clone()))),
    }
}

// ---------------------------------------------------------------------------
// HTTP: replay a captured search request
// ---------------------------------------------------------------------------

pub struct HttpSnapshotFetcher {
    client: reqwest::Client,
    url: String,
    method: Method,
    payload: Option<Value>,
}

impl HttpSnapshotFetcher {
    pub fn new(
        url: String,
        method: &str,
        payload: Option<Value>,
        headers: &HashMap<String, String>,
    ) -> Result<Self> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| AppError::Config(format!("SEARCH_METHOD '{method}' is not an HTTP method")))?;

        let mut header_map = HeaderMap::new();
        for (k, v) in headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|_| AppError::Config(format!("invalid header name '{k}'")))?;
            let value = HeaderValue::from_str(v)
                .map_err(|_| AppError::Config(format!("invalid value for header '{k}'")))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .default_headers(header_map)
            .build()?;

        Ok(Self {
            client,
            url,
            method,
            payload,
        })
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let mut req = self.client.request(self.method.clone(), &self.url);
        if let Some(body) = &self.payload {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!(
                "search endpoint returned HTTP {status}"
            )));
        }

        let body: Value = resp.json().await?;
        let records = extract_records(&body).ok_or_else(|| {
            AppError::Fetch("search response has no recognizable record list".to_string())
        })?;
        info!("[FETCH] {} records from {}", records.len(), self.url);
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// File: a stored backend response
// ---------------------------------------------------------------------------

pub struct FileSnapshotFetcher {
    path: String,
}

impl FileSnapshotFetcher {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SnapshotFetcher for FileSnapshotFetcher {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let body: Value = serde_json::from_str(&contents)?;
        let records = extract_records(&body).ok_or_else(|| {
            AppError::Fetch(format!("{} has no recognizable record list", self.path))
        })?;
        info!("[FETCH] {} records from {}", records.len(), self.path);
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// Keys that commonly wrap the record list in search responses.
const LIST_KEYS: &[&str] = &["results", "hits", "items", "data"];

/// Pull the record objects out of a search response.
///
/// Accepts a bare array, an object holding the array under one of `LIST_KEYS`
/// (optionally nested in `response`), and the search-engine layout
/// `responses[*].hits.hits[*]._source`. Non-object entries are skipped.
/// Returns None when no list is found at all.
pub fn extract_records(body: &Value) -> Option<Vec<RawRecord>> {
    if let Some(items) = body.as_array() {
        return Some(objects(items));
    }

    let obj = body.as_object()?;

    if let Some(responses) = obj.get("responses").and_then(Value::as_array) {
        let mut out = Vec::new();
        for r in responses {
            let hits = r
                .get("hits")
                .and_then(|h| h.get("hits"))
                .and_then(Value::as_array);
            for hit in hits.into_iter().flatten() {
                let source = hit.get("_source").unwrap_or(hit);
                if let Some(o) = source.as_object() {
                    out.push(o.clone());
                }
            }
        }
        debug!("[FETCH] extracted {} records from search-engine envelope", out.len());
        return Some(out);
    }

    if let Some(inner) = obj.get("response") {
        if let Some(found) = extract_records(inner) {
            return Some(found);
        }
    }

    for key in LIST_KEYS {
        match obj.get(*key) {
            Some(Value::Array(items)) => return Some(objects(items)),
            Some(nested) if nested.is_object() => {
                if let Some(found) = extract_records(nested) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }

    None
}

fn objects(items: &[Value]) -> Vec<RawRecord> {
    items
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}
