//! Product set retrieval.
//!
//! The orchestrator fetches a job's products through the [`ProductSource`]
//! trait; durable storage of jobs lives outside this crate. The in-memory
//! implementation backs tests and the CLI, which loads a job from a JSON
//! products file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::ReportError;
use crate::models::Product;

/// Supplies the product batch for a job id.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// # Errors
    ///
    /// [`ReportError::JobNotFound`] when the job id is unknown, the only
    /// failure that is fatal to a whole report request.
    async fn get_products(&self, job_id: &str) -> Result<Vec<Product>, ReportError>;
}

/// Job batches held in memory, keyed by job id.
#[derive(Default)]
pub struct InMemoryProductSource {
    jobs: HashMap<String, Vec<Product>>,
}

impl InMemoryProductSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&mut self, job_id: impl Into<String>, products: Vec<Product>) {
        self.jobs.insert(job_id.into(), products);
    }

    /// A source holding exactly one job.
    pub fn single_job(job_id: impl Into<String>, products: Vec<Product>) -> Self {
        let mut source = Self::new();
        source.insert_job(job_id, products);
        source
    }
}

#[async_trait]
impl ProductSource for InMemoryProductSource {
    async fn get_products(&self, job_id: &str) -> Result<Vec<Product>, ReportError> {
        self.jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| ReportError::JobNotFound(job_id.to_string()))
    }
}

/// Load a JSON array of products (the CLI's job file format).
pub fn load_products_file(path: &Path) -> Result<Vec<Product>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read products file: {}", path.display()))?;

    let products: Vec<Product> =
        serde_json::from_str(&content).with_context(|| "Failed to parse products file")?;

    Ok(products)
}
