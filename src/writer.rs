//! Report output contract.
//!
//! The orchestrator hands the external writer an ordered list of records
//! plus the statistics object; the writer owns file formatting entirely.
//! The built-in CSV writer exists so a report request can return a real
//! payload without any external rendering service; spreadsheet and chart
//! rendering stay outside this crate.

use anyhow::Result;

use crate::models::{LifecycleField, LifecycleRecord, ReportStatistics};
use crate::report::ReportOptions;

/// Formats a finished report batch into a file payload.
pub trait ReportWriter: Send + Sync {
    /// File extension (without dot) for generated filenames.
    fn extension(&self) -> &str;

    /// Render the ordered records and statistics into file bytes.
    ///
    /// `options` carries the presentation flags (`include_charts`,
    /// `include_recommendations`) that only writers interpret.
    fn write(
        &self,
        records: &[LifecycleRecord],
        statistics: &ReportStatistics,
        options: &ReportOptions,
    ) -> Result<Vec<u8>>;
}

/// Plain CSV writer: one row per product, summary columns last.
#[derive(Debug, Default)]
pub struct CsvReportWriter;

impl CsvReportWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportWriter for CsvReportWriter {
    fn extension(&self) -> &str {
        "csv"
    }

    fn write(
        &self,
        records: &[LifecycleRecord],
        _statistics: &ReportStatistics,
        _options: &ReportOptions,
    ) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["product_id".to_string()];
        for field in LifecycleField::ALL {
            header.push(field.as_str().to_string());
            header.push(format!("{}_confidence", field.as_str()));
        }
        header.extend(
            [
                "overall_confidence",
                "vendor_site_sources",
                "third_party_sources",
                "manual_entry_sources",
                "is_current_product",
                "research_error",
            ]
            .map(String::from),
        );
        writer.write_record(&header)?;

        for record in records {
            let mut row = vec![record.product_id.clone()];
            for field in LifecycleField::ALL {
                let assessment = record.field(field);
                row.push(
                    assessment
                        .value
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                );
                row.push(assessment.confidence.to_string());
            }
            row.push(record.overall_confidence.to_string());
            row.push(record.data_source_counts.vendor_site.to_string());
            row.push(record.data_source_counts.third_party.to_string());
            row.push(record.data_source_counts.manual_entry.to_string());
            row.push(record.is_current_product.to_string());
            row.push(
                record
                    .research_error
                    .map(|e| e.as_str().to_string())
                    .unwrap_or_default(),
            );
            writer.write_record(&row)?;
        }

        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("CSV buffer flush failed: {}", e))
    }
}
