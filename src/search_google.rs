//! Google Custom Search transport.
//!
//! Calls the Custom Search JSON API (`GET /customsearch/v1`) and maps its
//! failure modes onto the [`SearchError`] taxonomy: 429 and 5xx are
//! transient, other 4xx are permanent, network errors are transient.
//! Retrying is the caller's job (see
//! [`search_with_retry`](crate::search::search_with_retry)).
//!
//! Credentials come from `GOOGLE_API_KEY` and `GOOGLE_SEARCH_ENGINE_ID`.
//! The key is read from the environment at request time and never stored.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::models::RawHit;
use crate::search::SearchClient;

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Results requested per query; the API caps a single page at 10.
const RESULTS_PER_QUERY: u32 = 10;

pub struct GoogleSearchClient {
    client: reqwest::Client,
    endpoint: String,
    engine_id: String,
}

impl GoogleSearchClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `GOOGLE_API_KEY` or `GOOGLE_SEARCH_ENGINE_ID`
    /// is not set, or the HTTP client cannot be built.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        if std::env::var("GOOGLE_API_KEY").is_err() {
            bail!("GOOGLE_API_KEY environment variable not set");
        }
        let engine_id = std::env::var("GOOGLE_SEARCH_ENGINE_ID")
            .map_err(|_| anyhow::anyhow!("GOOGLE_SEARCH_ENGINE_ID environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            engine_id,
        })
    }

    /// Point the client at a different endpoint (tests).
    #[doc(hidden)]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchClient for GoogleSearchClient {
    fn provider(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str) -> Result<Vec<RawHit>, SearchError> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| SearchError::Permanent("GOOGLE_API_KEY not set".to_string()))?;

        let num = RESULTS_PER_QUERY.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Transient(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Transient(format!(
                "Google API error {}: {}",
                status, body
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Permanent(format!(
                "Google API error {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::Permanent(format!("invalid response body: {}", e)))?;

        Ok(parse_items(&json))
    }
}

/// Extract `{link, snippet}` pairs from a Custom Search response.
///
/// Items missing either field are skipped; an absent `items` array (the
/// API's shape for zero results) yields an empty list.
fn parse_items(json: &serde_json::Value) -> Vec<RawHit> {
    let items = match json.get("items").and_then(|i| i.as_array()) {
        Some(items) => items,
        None => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let link = item.get("link")?.as_str()?;
            let snippet = item.get("snippet")?.as_str()?;
            Some(RawHit {
                source_url: link.to_string(),
                snippet_text: snippet.to_string(),
            })
        })
        .collect()
}
