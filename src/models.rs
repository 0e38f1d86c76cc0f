//! Core data models used throughout EOL Harness.
//!
//! These types represent the products, search hits, date candidates, and
//! lifecycle records that flow through the research and reporting pipeline.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// A product to research, as supplied by the caller. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub manufacturer: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Unit count from the source job; feeds the total-quantity statistic.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// A raw text hit returned by the search capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawHit {
    pub source_url: String,
    pub snippet_text: String,
}

/// The lifecycle milestones this system researches.
///
/// `EndOfSale` and `LastDayOfSupport` are the primary fields; the two
/// maintenance-window fields are secondary and carry less weight in the
/// overall confidence roll-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleField {
    EndOfSale,
    LastDayOfSupport,
    EndOfSwMaintenance,
    EndOfVulnerabilitySupport,
}

impl LifecycleField {
    /// All fields, in roll-up order.
    pub const ALL: [LifecycleField; 4] = [
        LifecycleField::EndOfSale,
        LifecycleField::LastDayOfSupport,
        LifecycleField::EndOfSwMaintenance,
        LifecycleField::EndOfVulnerabilitySupport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleField::EndOfSale => "end_of_sale",
            LifecycleField::LastDayOfSupport => "last_day_of_support",
            LifecycleField::EndOfSwMaintenance => "end_of_sw_maintenance",
            LifecycleField::EndOfVulnerabilitySupport => "end_of_vulnerability_support",
        }
    }

    /// Primary fields dominate the overall confidence average.
    pub fn is_primary(&self) -> bool {
        matches!(
            self,
            LifecycleField::EndOfSale | LifecycleField::LastDayOfSupport
        )
    }
}

/// Trust classification of where a candidate date was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    VendorSite,
    ThirdParty,
    /// Reserved for human-injected overrides; never produced by extraction.
    ManualEntry,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::VendorSite => "vendor_site",
            SourceTier::ThirdParty => "third_party",
            SourceTier::ManualEntry => "manual_entry",
        }
    }
}

/// A date found in a snippet, tagged with the rule that produced it.
///
/// Ephemeral: created per raw hit during extraction and discarded after
/// reconciliation by the scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCandidate {
    pub field: LifecycleField,
    /// The raw date token as it appeared in the text.
    pub raw_text: String,
    pub normalized_date: Option<NaiveDate>,
    pub source_url: String,
    pub source_tier: SourceTier,
    /// Id of the registry rule that matched, for auditability.
    pub pattern_id: String,
}

/// A reconciled value plus its confidence for one lifecycle field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAssessment {
    pub value: Option<NaiveDate>,
    /// Integer in [0, 100].
    pub confidence: u8,
}

/// Count of hits that contributed candidates, bucketed by trust tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceCounts {
    pub vendor_site: u32,
    pub third_party: u32,
    pub manual_entry: u32,
}

impl DataSourceCounts {
    pub fn bump(&mut self, tier: SourceTier) {
        match tier {
            SourceTier::VendorSite => self.vendor_site += 1,
            SourceTier::ThirdParty => self.third_party += 1,
            SourceTier::ManualEntry => self.manual_entry += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.vendor_site + self.third_party + self.manual_entry
    }
}

/// The reconciled, per-product output of the research engine.
///
/// Created once per product and immutable thereafter. `fields` always
/// contains an entry for every [`LifecycleField`] so downstream consumers
/// never need to distinguish "absent" from "unresearched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub product_id: String,
    pub fields: BTreeMap<LifecycleField, FieldAssessment>,
    /// Integer in [0, 100]; a deterministic function of the per-field scores.
    pub overall_confidence: u8,
    pub data_source_counts: DataSourceCounts,
    /// Research completed cleanly but found no dated values for any field.
    pub is_current_product: bool,
    pub research_error: Option<ErrorKind>,
}

impl LifecycleRecord {
    /// An all-null record for a product whose research found nothing.
    pub fn empty(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            fields: Self::null_fields(),
            overall_confidence: 0,
            data_source_counts: DataSourceCounts::default(),
            is_current_product: true,
            research_error: None,
        }
    }

    /// An all-null record annotated with the failure that prevented research.
    pub fn unresearched(product_id: impl Into<String>, error: ErrorKind) -> Self {
        Self {
            product_id: product_id.into(),
            fields: Self::null_fields(),
            overall_confidence: 0,
            data_source_counts: DataSourceCounts::default(),
            is_current_product: false,
            research_error: Some(error),
        }
    }

    /// One null assessment per lifecycle field.
    pub fn null_fields() -> BTreeMap<LifecycleField, FieldAssessment> {
        LifecycleField::ALL
            .iter()
            .map(|f| (*f, FieldAssessment::default()))
            .collect()
    }

    /// The assessment for one field (always present).
    pub fn field(&self, field: LifecycleField) -> FieldAssessment {
        self.fields.get(&field).copied().unwrap_or_default()
    }
}

/// Summary statistics for a completed report job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub total_products: u32,
    pub total_quantity: u64,
    /// Records whose risk-basis date falls within the near-term risk window.
    pub critical_risk_count: u32,
}
