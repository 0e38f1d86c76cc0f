//! Search capability abstraction.
//!
//! Defines the [`SearchClient`] trait and the shared retry wrapper every
//! transport goes through, plus [`StaticSearchClient`], the deterministic
//! in-memory implementation used by tests and demo mode.
//!
//! # Retry Strategy
//!
//! - Transient failures (timeout, rate limit, 5xx-equivalent) → retry with
//!   exponential backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5).
//! - Permanent failures (auth, 4xx-equivalent) → fail immediately.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::models::RawHit;

/// An external capability that turns a query string into text hits.
///
/// Implementations own the transport; retry policy lives in
/// [`search_with_retry`] so every transport gets the same behavior.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Returns the provider identifier (e.g. `"google"`), used in logs.
    fn provider(&self) -> &str;

    /// Execute one query attempt.
    async fn search(&self, query: &str) -> Result<Vec<RawHit>, SearchError>;
}

/// Execute a query with the shared transient-retry policy.
pub async fn search_with_retry(
    client: &dyn SearchClient,
    query: &str,
    max_retries: u32,
) -> Result<Vec<RawHit>, SearchError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match client.search(query).await {
            Ok(hits) => return Ok(hits),
            Err(err @ SearchError::Permanent(_)) => return Err(err),
            Err(err @ SearchError::Transient(_)) => {
                tracing::debug!(
                    provider = client.provider(),
                    attempt,
                    %err,
                    "transient search failure"
                );
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| SearchError::Transient("retries exhausted".to_string())))
}

/// Deterministic in-memory search client.
///
/// Returns the hits of every entry whose needle is a substring of the
/// query, in registration order. Queries matching no entry return an empty
/// hit list.
#[derive(Default)]
pub struct StaticSearchClient {
    entries: Vec<(String, Vec<RawHit>)>,
}

impl StaticSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register hits served for any query containing `needle`.
    pub fn with_hits(mut self, needle: impl Into<String>, hits: Vec<RawHit>) -> Self {
        self.entries.push((needle.into(), hits));
        self
    }
}

#[async_trait]
impl SearchClient for StaticSearchClient {
    fn provider(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str) -> Result<Vec<RawHit>, SearchError> {
        let mut hits = Vec::new();
        for (needle, entry_hits) in &self.entries {
            if query.contains(needle.as_str()) {
                hits.extend(entry_hits.iter().cloned());
            }
        }
        Ok(hits)
    }
}

/// Instantiate the search client named by the configuration.
pub fn create_search_client(config: &SearchConfig) -> Result<Arc<dyn SearchClient>> {
    match config.provider.as_str() {
        "static" => Ok(Arc::new(StaticSearchClient::new())),
        "google" => Ok(Arc::new(crate::search_google::GoogleSearchClient::new(
            config,
        )?)),
        other => anyhow::bail!("Unknown search provider: '{}'. Must be google or static.", other),
    }
}
