//! Multi-source confidence scoring.
//!
//! Reconciles the extractor's date candidates into one value per lifecycle
//! field plus a 0–100 confidence, then rolls the per-field scores into an
//! overall score.
//!
//! # Scoring Algorithm
//!
//! Per field:
//!
//! 1. Group candidates by normalized date value.
//! 2. Within a value, collapse candidates to distinct source domains,
//!    keeping each domain's best tier weight; a single domain repeating
//!    the same phrase twice contributes once.
//! 3. Aggregate weight = Σ(per-domain tier weight)
//!    + `AGREEMENT_BONUS` × (distinct domains − 1).
//! 4. Select the value with the highest aggregate weight; ties break
//!    toward the earlier date so reruns are deterministic.
//! 5. Confidence = aggregate weight capped at 100.
//!
//! A field with zero candidates yields `value = None, confidence = 0`,
//! never an error. The overall score is a weighted average where the
//! primary fields (end-of-sale, last-day-of-support) carry weight 3 and the
//! maintenance-window fields weight 1, rounded to the nearest integer.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::classify::source_domain;
use crate::error::ResearchError;
use crate::models::{DateCandidate, FieldAssessment, LifecycleField, LifecycleRecord, SourceTier};

/// Base weight of a vendor-site candidate.
pub const VENDOR_SITE_WEIGHT: u32 = 40;
/// Base weight of a third-party candidate.
pub const THIRD_PARTY_WEIGHT: u32 = 15;
/// Base weight of a manually entered candidate.
pub const MANUAL_ENTRY_WEIGHT: u32 = 10;
/// Bonus per distinct supporting domain beyond the first.
pub const AGREEMENT_BONUS: u32 = 10;

const PRIMARY_FIELD_WEIGHT: u32 = 3;
const SECONDARY_FIELD_WEIGHT: u32 = 1;

fn tier_weight(tier: SourceTier) -> u32 {
    match tier {
        SourceTier::VendorSite => VENDOR_SITE_WEIGHT,
        SourceTier::ThirdParty => THIRD_PARTY_WEIGHT,
        SourceTier::ManualEntry => MANUAL_ENTRY_WEIGHT,
    }
}

/// The scorer's output: one assessment per field plus the roll-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredFields {
    pub fields: BTreeMap<LifecycleField, FieldAssessment>,
    pub overall_confidence: u8,
}

/// Reconciles date candidates across sources into confidence-scored values.
#[derive(Debug, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score all candidates, grouped internally by field.
    ///
    /// # Errors
    ///
    /// [`ResearchError::Aggregation`] on a corrupt candidate (one without a
    /// normalized date); the caller folds this into the product's record.
    pub fn score(&self, candidates: &[DateCandidate]) -> Result<ScoredFields, ResearchError> {
        let mut fields = LifecycleRecord::null_fields();

        for field in LifecycleField::ALL {
            let field_candidates: Vec<&DateCandidate> =
                candidates.iter().filter(|c| c.field == field).collect();
            if field_candidates.is_empty() {
                continue;
            }
            fields.insert(field, self.score_field(&field_candidates)?);
        }

        let overall_confidence = overall_confidence(&fields);
        Ok(ScoredFields {
            fields,
            overall_confidence,
        })
    }

    fn score_field(
        &self,
        candidates: &[&DateCandidate],
    ) -> Result<FieldAssessment, ResearchError> {
        // value → domain → best tier weight seen for that domain.
        let mut by_value: BTreeMap<NaiveDate, BTreeMap<String, u32>> = BTreeMap::new();

        for candidate in candidates {
            let date = candidate.normalized_date.ok_or_else(|| {
                ResearchError::Aggregation(format!(
                    "candidate without normalized date (pattern {})",
                    candidate.pattern_id
                ))
            })?;
            let domain = source_domain(&candidate.source_url);
            let weight = tier_weight(candidate.source_tier);

            let entry = by_value.entry(date).or_default().entry(domain).or_insert(0);
            if weight > *entry {
                *entry = weight;
            }
        }

        // Ascending date iteration + strictly-greater replacement keeps the
        // earlier date on ties.
        let mut best: Option<(NaiveDate, u32)> = None;
        for (date, domains) in &by_value {
            let base: u32 = domains.values().sum();
            let agreement = AGREEMENT_BONUS * (domains.len() as u32 - 1);
            let weight = base + agreement;

            if best.map_or(true, |(_, w)| weight > w) {
                best = Some((*date, weight));
            }
        }

        Ok(best
            .map(|(date, weight)| FieldAssessment {
                value: Some(date),
                confidence: weight.min(100) as u8,
            })
            .unwrap_or_default())
    }
}

/// Weighted average of per-field confidences, rounded to nearest.
fn overall_confidence(fields: &BTreeMap<LifecycleField, FieldAssessment>) -> u8 {
    let mut numerator = 0u32;
    let mut denominator = 0u32;

    for field in LifecycleField::ALL {
        let weight = if field.is_primary() {
            PRIMARY_FIELD_WEIGHT
        } else {
            SECONDARY_FIELD_WEIGHT
        };
        let confidence = fields.get(&field).map(|a| a.confidence as u32).unwrap_or(0);
        numerator += weight * confidence;
        denominator += weight;
    }

    ((numerator + denominator / 2) / denominator) as u8
}
