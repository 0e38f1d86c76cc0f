//! Report orchestration.
//!
//! Drives the research engine across every product in a job with bounded
//! parallelism, streams progress to registered subscribers, tolerates
//! per-product failure, and hands the ordered records plus statistics to
//! the report writer.
//!
//! State machine per report:
//!
//! ```text
//! Queued → FetchingProducts → Researching → Aggregating → Completed
//!             │                                             (or CompletedWithErrors)
//!             └── Failed (job not found; only reachable before research)
//! ```
//!
//! A report always completes with one record per requested product; a
//! product whose research failed is annotated, never omitted.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::ResearchEngine;
use crate::error::{ErrorKind, ReportError};
use crate::models::{LifecycleField, LifecycleRecord, Product, ReportStatistics};
use crate::products::ProductSource;
use crate::progress::{ProgressCallback, ProgressEvent, ProgressRegistry, ReportState};
use crate::writer::ReportWriter;

/// Which date field a job treats as its lifecycle-risk basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EolYearBasis {
    #[default]
    #[serde(rename = "lastDayOfSupport")]
    LastDayOfSupport,
    #[serde(rename = "endOfSale")]
    EndOfSale,
}

impl EolYearBasis {
    pub fn field(&self) -> LifecycleField {
        match self {
            EolYearBasis::LastDayOfSupport => LifecycleField::LastDayOfSupport,
            EolYearBasis::EndOfSale => LifecycleField::EndOfSale,
        }
    }
}

impl FromStr for EolYearBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lastDayOfSupport" | "last_day_of_support" => Ok(EolYearBasis::LastDayOfSupport),
            "endOfSale" | "end_of_sale" => Ok(EolYearBasis::EndOfSale),
            other => Err(format!(
                "unknown EOL year basis '{}'; use lastDayOfSupport or endOfSale",
                other
            )),
        }
    }
}

/// Per-request report options, consumed from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(default)]
    pub eol_year_basis: EolYearBasis,
    #[serde(default = "default_true")]
    pub include_charts: bool,
    #[serde(default = "default_true")]
    pub include_recommendations: bool,
    /// Caller-supplied report id so subscribers can register before the
    /// run starts. Generated (`rpt_…`) when absent.
    #[serde(default)]
    pub report_id: Option<String>,
    /// Reference date for the risk window. Defaults to today (UTC).
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            eol_year_basis: EolYearBasis::default(),
            include_charts: true,
            include_recommendations: true,
            report_id: None,
            reference_date: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A batch mid-assembly: the fetched products plus accumulated records.
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub job_id: String,
    pub products: Vec<Product>,
    pub records: Vec<LifecycleRecord>,
    pub statistics: ReportStatistics,
}

impl ReportJob {
    fn new(job_id: impl Into<String>, products: Vec<Product>) -> Self {
        Self {
            job_id: job_id.into(),
            products,
            records: Vec::new(),
            statistics: ReportStatistics::default(),
        }
    }
}

/// A finished report, handed back to the caller.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub report_id: String,
    /// `Completed` or `CompletedWithErrors`.
    pub state: ReportState,
    pub statistics: ReportStatistics,
    pub filename: String,
    pub payload: Vec<u8>,
    /// The records in original input order, as handed to the writer.
    pub records: Vec<LifecycleRecord>,
}

/// Drives research across a job and assembles the report.
///
/// An explicit instance with injected collaborators; construct one per
/// deployment (or per test) rather than reaching for a singleton.
pub struct ReportOrchestrator {
    engine: Arc<ResearchEngine>,
    products: Arc<dyn ProductSource>,
    writer: Arc<dyn ReportWriter>,
    progress: Arc<ProgressRegistry>,
    concurrency: usize,
    risk_window_days: i64,
    filename_prefix: String,
}

impl ReportOrchestrator {
    pub fn new(
        engine: Arc<ResearchEngine>,
        products: Arc<dyn ProductSource>,
        writer: Arc<dyn ReportWriter>,
        progress: Arc<ProgressRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            products,
            writer,
            progress,
            concurrency: config.research.concurrency.max(1),
            risk_window_days: config.research.risk_window_days,
            filename_prefix: config.report.filename_prefix.clone(),
        }
    }

    /// Subscribe a callback to a report's progress events.
    pub fn register_progress_callback(&self, report_id: &str, callback: ProgressCallback) {
        self.progress.register(report_id, callback);
    }

    /// Remove a report's progress subscribers.
    pub fn unregister_progress_callback(&self, report_id: &str) {
        self.progress.unregister(report_id);
    }

    /// The shared progress registry (for channel subscriptions).
    pub fn progress(&self) -> &Arc<ProgressRegistry> {
        &self.progress
    }

    /// Generate a report for every product of `job_id`.
    ///
    /// # Errors
    ///
    /// [`ReportError::JobNotFound`] when the job id is unknown, and
    /// [`ReportError::Writer`] when the writer rejects the batch. Individual
    /// product failures never surface here; they are annotated records.
    pub async fn generate_report(
        &self,
        job_id: &str,
        options: &ReportOptions,
    ) -> Result<ReportOutput, ReportError> {
        let report_id = options
            .report_id
            .clone()
            .unwrap_or_else(|| format!("rpt_{}", Uuid::new_v4().simple()));

        self.emit(&report_id, ReportState::Queued, 0, None);
        self.emit(&report_id, ReportState::FetchingProducts, 5, None);

        let products = match self.products.get_products(job_id).await {
            Ok(products) => products,
            Err(err) => {
                tracing::error!(job_id, report_id = %report_id, %err, "report failed");
                self.emit(&report_id, ReportState::Failed, 5, None);
                return Err(err);
            }
        };

        let mut job = ReportJob::new(job_id, products);
        let total = job.products.len();
        tracing::info!(job_id, report_id = %report_id, products = total, "starting lifecycle research");
        self.emit(&report_id, ReportState::Researching, 10, None);

        job.records = self.research_all(&report_id, &job.products).await;
        debug_assert_eq!(job.records.len(), total);

        self.emit(&report_id, ReportState::Aggregating, 95, None);
        job.statistics = self.compute_statistics(&job, options);

        let filename = format!(
            "{}_{}.{}",
            self.filename_prefix,
            report_id,
            self.writer.extension()
        );
        let payload = self
            .writer
            .write(&job.records, &job.statistics, options)
            .map_err(|e| ReportError::Writer(e.to_string()))?;

        let failed = job
            .records
            .iter()
            .filter(|r| r.research_error.is_some())
            .count();
        let state = if failed > 0 {
            ReportState::CompletedWithErrors
        } else {
            ReportState::Completed
        };
        self.emit(&report_id, state, 100, None);
        tracing::info!(
            report_id = %report_id,
            records = job.records.len(),
            failed,
            state = state.as_str(),
            "report complete"
        );

        Ok(ReportOutput {
            report_id,
            state,
            statistics: job.statistics,
            filename,
            payload,
            records: job.records,
        })
    }

    /// Research every product with bounded parallelism, returning records
    /// in the original input order.
    async fn research_all(&self, report_id: &str, products: &[Product]) -> Vec<LifecycleRecord> {
        let total = products.len();
        if total == 0 {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let done = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(total);

        for (index, product) in products.iter().cloned().enumerate() {
            let engine = Arc::clone(&self.engine);
            let progress = Arc::clone(&self.progress);
            let semaphore = Arc::clone(&semaphore);
            let done = Arc::clone(&done);
            let report_id = report_id.to_string();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            LifecycleRecord::unresearched(
                                product.product_id.clone(),
                                ErrorKind::Skipped,
                            ),
                        )
                    }
                };

                // Stop scheduling research once the stream consumer is gone.
                let record = if progress.is_cancelled(&report_id) {
                    LifecycleRecord::unresearched(product.product_id.clone(), ErrorKind::Skipped)
                } else {
                    match engine.perform_research(&product).await {
                        Ok(record) => record,
                        Err(err) => {
                            tracing::warn!(
                                product = %product.product_id,
                                %err,
                                "product research failed"
                            );
                            LifecycleRecord::unresearched(
                                product.product_id.clone(),
                                ErrorKind::from(&err),
                            )
                        }
                    }
                };

                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                let percent = (10 + finished * 80 / total) as u8;
                progress.notify(&ProgressEvent {
                    report_id: report_id.clone(),
                    step: ReportState::Researching,
                    percent_complete: percent,
                    current_product_id: Some(product.product_id.clone()),
                });

                (index, record)
            }));
        }

        let mut slots: Vec<Option<LifecycleRecord>> = vec![None; total];
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok((index, record)) => slots[index] = Some(record),
                Err(err) => {
                    tracing::error!(%err, "research task aborted");
                    slots[i] = Some(LifecycleRecord::unresearched(
                        products[i].product_id.clone(),
                        ErrorKind::Aggregation,
                    ));
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| {
                    LifecycleRecord::unresearched(
                        products[i].product_id.clone(),
                        ErrorKind::Aggregation,
                    )
                })
            })
            .collect()
    }

    fn compute_statistics(&self, job: &ReportJob, options: &ReportOptions) -> ReportStatistics {
        let reference = options
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let horizon = reference + Duration::days(self.risk_window_days);
        let basis = options.eol_year_basis.field();

        // Dates already past the reference count as critical too.
        let critical_risk_count = job
            .records
            .iter()
            .filter(|r| r.field(basis).value.map_or(false, |d| d <= horizon))
            .count() as u32;

        ReportStatistics {
            total_products: job.products.len() as u32,
            total_quantity: job.products.iter().map(|p| p.quantity as u64).sum(),
            critical_risk_count,
        }
    }

    fn emit(
        &self,
        report_id: &str,
        step: ReportState,
        percent_complete: u8,
        current_product_id: Option<String>,
    ) {
        self.progress.notify(&ProgressEvent {
            report_id: report_id.to_string(),
            step,
            percent_complete,
            current_product_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_parses_both_casings() {
        assert_eq!(
            "lastDayOfSupport".parse::<EolYearBasis>().unwrap(),
            EolYearBasis::LastDayOfSupport
        );
        assert_eq!(
            "end_of_sale".parse::<EolYearBasis>().unwrap(),
            EolYearBasis::EndOfSale
        );
        assert!("yearOfDoom".parse::<EolYearBasis>().is_err());
    }

    #[test]
    fn options_default_matches_original_service() {
        let options = ReportOptions::default();
        assert_eq!(options.eol_year_basis, EolYearBasis::LastDayOfSupport);
        assert!(options.include_charts);
        assert!(options.include_recommendations);
    }

    #[test]
    fn options_deserialize_with_camel_case_basis() {
        let options: ReportOptions =
            serde_json::from_str(r#"{"eol_year_basis": "endOfSale"}"#).unwrap();
        assert_eq!(options.eol_year_basis, EolYearBasis::EndOfSale);
        assert!(options.include_charts);
    }
}
