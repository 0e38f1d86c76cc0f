//! Date extraction over raw search-hit text.
//!
//! The extractor walks every rule of the [`PatternRegistry`] over a text
//! blob and returns every match: a blob may yield multiple candidates for
//! the same field from different phrasings. Arbitration between conflicting
//! values happens downstream in the scorer, never here.
//!
//! A label that matches with an unparseable date token (shape without a
//! calendar date, e.g. `31-Feb-2015`) produces no candidate; it is logged
//! as a non-fatal anomaly.

use chrono::NaiveDate;

use crate::models::{DateCandidate, LifecycleField, RawHit, SourceTier};
use crate::patterns::PatternRegistry;

/// One registry-rule match inside a text blob, before source attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub field: LifecycleField,
    pub raw_text: String,
    pub date: NaiveDate,
    pub pattern_id: String,
}

/// Scans text against the declarative pattern registry.
pub struct DateExtractor {
    registry: PatternRegistry,
}

impl DateExtractor {
    pub fn new(registry: PatternRegistry) -> Self {
        Self { registry }
    }

    /// An extractor loaded with the built-in phrasing rows.
    pub fn with_defaults() -> Self {
        Self::new(PatternRegistry::with_defaults())
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Apply every registry rule over `text` and return all parsed matches.
    pub fn extract(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();

        for rule in self.registry.rules() {
            for token in rule.find_all(text) {
                match rule.grammar.parse(token) {
                    Some(date) => matches.push(PatternMatch {
                        field: rule.field,
                        raw_text: token.to_string(),
                        date,
                        pattern_id: rule.id.clone(),
                    }),
                    None => {
                        tracing::warn!(
                            pattern = %rule.id,
                            token,
                            "matched lifecycle label with unparseable date token"
                        );
                    }
                }
            }
        }

        matches
    }

    /// Extract from one search hit, attributing candidates to its source.
    pub fn extract_from_hit(&self, hit: &RawHit, tier: SourceTier) -> Vec<DateCandidate> {
        self.extract(&hit.snippet_text)
            .into_iter()
            .map(|m| DateCandidate {
                field: m.field,
                raw_text: m.raw_text,
                normalized_date: Some(m.date),
                source_url: hit.source_url.clone(),
                source_tier: tier,
                pattern_id: m.pattern_id,
            })
            .collect()
    }
}
