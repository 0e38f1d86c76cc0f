//! Error taxonomy for the research and reporting pipeline.
//!
//! Failure policy: everything that can go wrong for a single query or a
//! single product is captured and folded into that product's
//! [`LifecycleRecord`](crate::models::LifecycleRecord) as an [`ErrorKind`]
//! annotation. Only job-level failures ([`ReportError::JobNotFound`],
//! writer failures) surface to the orchestrator's caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single search query against the external capability.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Timeout, rate limit, or 5xx-equivalent. Retried with backoff.
    #[error("transient search failure: {0}")]
    Transient(String),

    /// Auth or 4xx-equivalent. Never retried.
    #[error("permanent search failure: {0}")]
    Permanent(String),
}

/// Failure researching a single product.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The identifier is empty or malformed; no queries can be built.
    /// Fatal to this product's research, non-fatal to the job.
    #[error("cannot build queries for {product_id:?}: {reason}")]
    QueryGeneration { product_id: String, reason: String },

    /// Unexpected state during scoring (e.g. a corrupt candidate).
    /// Fatal only to this product's record.
    #[error("aggregation failed: {0}")]
    Aggregation(String),
}

/// Failure of a whole report request.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("report writer failed: {0}")]
    Writer(String),
}

/// Delivery failure to a single progress subscriber.
///
/// Does not affect the job's server-side progress, only that subscriber's
/// visibility; the registry drops the subscriber and the job continues.
#[derive(Debug, Error)]
#[error("progress delivery failed: {0}")]
pub struct ProgressStreamError(pub String);

/// The error annotation carried on a [`LifecycleRecord`].
///
/// A flattened, serializable view of whichever failure prevented (or
/// degraded) one product's research.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    QueryGeneration,
    SearchTransient,
    SearchPermanent,
    Aggregation,
    /// The report was cancelled before this product's research started.
    Skipped,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::QueryGeneration => "query_generation",
            ErrorKind::SearchTransient => "search_transient",
            ErrorKind::SearchPermanent => "search_permanent",
            ErrorKind::Aggregation => "aggregation",
            ErrorKind::Skipped => "skipped",
        }
    }
}

impl From<&SearchError> for ErrorKind {
    fn from(err: &SearchError) -> Self {
        match err {
            SearchError::Transient(_) => ErrorKind::SearchTransient,
            SearchError::Permanent(_) => ErrorKind::SearchPermanent,
        }
    }
}

impl From<&ResearchError> for ErrorKind {
    fn from(err: &ResearchError) -> Self {
        match err {
            ResearchError::QueryGeneration { .. } => ErrorKind::QueryGeneration,
            ResearchError::Aggregation(_) => ErrorKind::Aggregation,
        }
    }
}
