//! Per-product research orchestration.
//!
//! [`ResearchEngine`] composes the lower components for one product:
//! QueryBuilder → SearchClient → DateExtractor (per hit) → SourceClassifier
//! (per hit) → ConfidenceScorer. Each query is attempted independently and
//! every failure short of a malformed identifier is folded into the
//! returned [`LifecycleRecord`] rather than raised.

use std::collections::HashSet;
use std::sync::Arc;

use crate::classify::SourceClassifier;
use crate::config::{Config, VendorsConfig};
use crate::error::{ErrorKind, ResearchError};
use crate::extract::DateExtractor;
use crate::models::{DataSourceCounts, DateCandidate, LifecycleRecord, Product};
use crate::patterns::PatternRegistry;
use crate::query::QueryBuilder;
use crate::score::ConfidenceScorer;
use crate::search::{search_with_retry, SearchClient};

/// Researches one product end to end.
///
/// Constructed with an injected search client so tests can run against a
/// deterministic stub; all other collaborators are built from config.
pub struct ResearchEngine {
    search: Arc<dyn SearchClient>,
    queries: QueryBuilder,
    extractor: DateExtractor,
    scorer: ConfidenceScorer,
    vendors: VendorsConfig,
    max_retries: u32,
}

impl ResearchEngine {
    pub fn new(search: Arc<dyn SearchClient>, config: &Config) -> Self {
        Self {
            search,
            queries: QueryBuilder::from_config(&config.search, &config.vendors),
            extractor: DateExtractor::with_defaults(),
            scorer: ConfidenceScorer::new(),
            vendors: config.vendors.clone(),
            max_retries: config.search.max_retries,
        }
    }

    /// Replace the default pattern registry (e.g. with appended rows).
    pub fn with_registry(mut self, registry: PatternRegistry) -> Self {
        self.extractor = DateExtractor::new(registry);
        self
    }

    /// Research one product and reconcile everything found into a record.
    ///
    /// # Errors
    ///
    /// Only [`ResearchError::QueryGeneration`] propagates (malformed
    /// identifier). Search failures and aggregation failures are captured
    /// in the record's `research_error` annotation instead.
    pub async fn perform_research(
        &self,
        product: &Product,
    ) -> Result<LifecycleRecord, ResearchError> {
        let queries = self.queries.build(product)?;
        let classifier = SourceClassifier::for_manufacturer(&product.manufacturer, &self.vendors);

        let mut candidates: Vec<DateCandidate> = Vec::new();
        let mut counts = DataSourceCounts::default();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut succeeded = 0usize;
        let mut last_error: Option<ErrorKind> = None;

        for query in &queries {
            match search_with_retry(self.search.as_ref(), query, self.max_retries).await {
                Ok(hits) => {
                    succeeded += 1;
                    tracing::debug!(
                        product = %product.product_id,
                        query,
                        hits = hits.len(),
                        "search query returned"
                    );
                    for hit in &hits {
                        // The same page routinely surfaces under several queries.
                        if !seen_urls.insert(hit.source_url.clone()) {
                            continue;
                        }
                        let tier = classifier.classify(&hit.source_url);
                        let hit_candidates = self.extractor.extract_from_hit(hit, tier);
                        if !hit_candidates.is_empty() {
                            counts.bump(tier);
                        }
                        candidates.extend(hit_candidates);
                    }
                }
                Err(err) => {
                    tracing::warn!(product = %product.product_id, query, %err, "search query failed");
                    last_error = Some(ErrorKind::from(&err));
                }
            }
        }

        if succeeded == 0 {
            if let Some(kind) = last_error {
                return Ok(LifecycleRecord::unresearched(
                    product.product_id.clone(),
                    kind,
                ));
            }
        }

        dedup_candidates(&mut candidates);

        let scored = match self.scorer.score(&candidates) {
            Ok(scored) => scored,
            Err(err) => {
                tracing::warn!(product = %product.product_id, %err, "candidate aggregation failed");
                return Ok(LifecycleRecord::unresearched(
                    product.product_id.clone(),
                    ErrorKind::from(&err),
                ));
            }
        };

        let has_values = scored.fields.values().any(|a| a.value.is_some());
        Ok(LifecycleRecord {
            product_id: product.product_id.clone(),
            fields: scored.fields,
            overall_confidence: scored.overall_confidence,
            data_source_counts: counts,
            is_current_product: !has_values,
            research_error: None,
        })
    }
}

/// Drop duplicate candidates produced by overlapping query results.
///
/// Identity is (field, date, source URL, pattern); a vendor page surfacing
/// under two different queries must count once.
fn dedup_candidates(candidates: &mut Vec<DateCandidate>) {
    let mut seen = HashSet::new();
    candidates.retain(|c| {
        seen.insert((
            c.field,
            c.normalized_date,
            c.source_url.clone(),
            c.pattern_id.clone(),
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LifecycleField, RawHit};
    use crate::search::StaticSearchClient;
    use chrono::NaiveDate;

    fn product(id: &str, manufacturer: &str) -> Product {
        Product {
            product_id: id.to_string(),
            manufacturer: manufacturer.to_string(),
            description: None,
            quantity: 1,
        }
    }

    fn engine(client: StaticSearchClient) -> ResearchEngine {
        ResearchEngine::new(Arc::new(client), &Config::default())
    }

    #[tokio::test]
    async fn empty_results_yield_all_null_record() {
        let engine = engine(StaticSearchClient::new());
        let record = engine.perform_research(&product("MS225-48FP", "Cisco Meraki")).await.unwrap();

        for field in LifecycleField::ALL {
            assert_eq!(record.field(field).value, None);
            assert_eq!(record.field(field).confidence, 0);
        }
        assert_eq!(record.overall_confidence, 0);
        assert!(record.is_current_product);
        assert!(record.research_error.is_none());
    }

    #[tokio::test]
    async fn populated_record_from_vendor_snippet() {
        let client = StaticSearchClient::new().with_hits(
            "WS-C3850-48P",
            vec![RawHit {
                source_url: "https://www.cisco.com/eos/ws-c3850.html".to_string(),
                snippet_text: "End of Sale Date: 31-Oct-2021. Last Date of Support: 31-Oct-2026."
                    .to_string(),
            }],
        );

        let record = engine(client)
            .perform_research(&product("WS-C3850-48P", "Cisco"))
            .await
            .unwrap();

        assert_eq!(
            record.field(LifecycleField::EndOfSale).value,
            NaiveDate::from_ymd_opt(2021, 10, 31)
        );
        assert_eq!(
            record.field(LifecycleField::LastDayOfSupport).value,
            NaiveDate::from_ymd_opt(2026, 10, 31)
        );
        assert!(!record.is_current_product);
        assert_eq!(record.data_source_counts.vendor_site, 1);
        assert_eq!(record.data_source_counts.third_party, 0);
    }

    #[tokio::test]
    async fn overlapping_queries_do_not_double_count_a_source() {
        // MR33-HW generates several queries; both Meraki-scoped ones match
        // the same needle, returning the identical hit repeatedly.
        let hit = RawHit {
            source_url: "https://documentation.meraki.com/MR33".to_string(),
            snippet_text: "End-of-Sale Date: July 14, 2022".to_string(),
        };
        let client = StaticSearchClient::new().with_hits("MR33", vec![hit]);

        let record = engine(client)
            .perform_research(&product("MR33-HW", "Cisco Meraki"))
            .await
            .unwrap();

        // One domain, one value: base vendor weight only.
        assert_eq!(record.field(LifecycleField::EndOfSale).confidence, 40);
        assert_eq!(
            record.field(LifecycleField::EndOfSale).value,
            NaiveDate::from_ymd_opt(2022, 7, 14)
        );
    }

    #[tokio::test]
    async fn appended_registry_row_is_honored() {
        use crate::patterns::{DateGrammar, PatternRule};

        let client = StaticSearchClient::new().with_hits(
            "FortiGate-60E",
            vec![RawHit {
                source_url: "https://www.fortinet.com/support/eol".to_string(),
                snippet_text: "Hardware EOL: 2022-04-11".to_string(),
            }],
        );

        let mut registry = crate::patterns::PatternRegistry::with_defaults();
        registry.push(
            PatternRule::new(
                "custom.00.iso",
                LifecycleField::EndOfSale,
                "Hardware EOL",
                DateGrammar::Iso,
            )
            .unwrap(),
        );

        let engine = ResearchEngine::new(Arc::new(client), &Config::default())
            .with_registry(registry);
        let record = engine
            .perform_research(&product("FortiGate-60E", "Fortinet"))
            .await
            .unwrap();

        assert_eq!(
            record.field(LifecycleField::EndOfSale).value,
            NaiveDate::from_ymd_opt(2022, 4, 11)
        );
    }

    #[tokio::test]
    async fn malformed_identifier_propagates() {
        let engine = engine(StaticSearchClient::new());
        let err = engine.perform_research(&product("   ", "Cisco")).await.unwrap_err();
        assert!(matches!(err, ResearchError::QueryGeneration { .. }));
    }

    #[tokio::test]
    async fn deterministic_given_deterministic_client() {
        let make = || {
            StaticSearchClient::new()
                .with_hits(
                    "WS-C3850-48P",
                    vec![
                        RawHit {
                            source_url: "https://www.cisco.com/eos.html".to_string(),
                            snippet_text: "End of Sale Date: 31-Oct-2021".to_string(),
                        },
                        RawHit {
                            source_url: "https://thirdparty.example.com/eol".to_string(),
                            snippet_text: "End of Sale: 31-Oct-2021. End of Support: 31-Oct-2026."
                                .to_string(),
                        },
                    ],
                )
        };

        let first = engine(make())
            .perform_research(&product("WS-C3850-48P", "Cisco"))
            .await
            .unwrap();
        let second = engine(make())
            .perform_research(&product("WS-C3850-48P", "Cisco"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
