//! Search query construction.
//!
//! Builds an ordered, deduplicated, length-capped list of query strings for
//! one product. Priority order: a generic quoted exact-match query, then
//! vendor-scoped `site:` queries triggered by identifier-prefix rules, then
//! a variant with the trailing hardware suffix stripped so vendor pages
//! listing the base model are found.
//!
//! The prefix rules are a data-driven table, extended from configuration
//! the same way the pattern registry is extended by rows.

use regex::Regex;

use crate::config::{SearchConfig, VendorsConfig};
use crate::error::ResearchError;
use crate::models::Product;

/// Built-in identifier-prefix → authoritative documentation domain rows.
const SITE_RULE_ROWS: &[(&str, &str)] = &[
    (r"^(MR|MS|MX)\d", "documentation.meraki.com"),
    (r"^WS-", "cisco.com"),
    (r"^N\dK-", "cisco.com"),
    (r"^C9\d", "cisco.com"),
    (r"^(FG-|FortiGate)", "fortinet.com"),
    (r"^PA-", "paloaltonetworks.com"),
    (r"^(JL|JH)\d", "hpe.com"),
    (r"^(SRX|EX|QFX)\d", "juniper.net"),
];

/// Hardware ordering suffix vendors append to base model names.
const HW_SUFFIX: &str = "-HW";

struct SiteRule {
    matcher: Regex,
    domain: String,
}

/// Generates search queries for a product.
pub struct QueryBuilder {
    rules: Vec<SiteRule>,
    max_queries: usize,
}

impl QueryBuilder {
    /// A builder with the built-in prefix rules and the given query cap.
    pub fn new(max_queries: usize) -> Self {
        let rules = SITE_RULE_ROWS
            .iter()
            .map(|(pattern, domain)| SiteRule {
                matcher: Regex::new(&format!("(?i){}", pattern))
                    .expect("built-in site rule compiles"),
                domain: domain.to_string(),
            })
            .collect();

        Self { rules, max_queries }
    }

    /// A builder with built-in rules plus configured extras appended.
    ///
    /// Config patterns are validated at load time; a row that still fails
    /// to compile is skipped with a warning rather than failing research.
    pub fn from_config(search: &SearchConfig, vendors: &VendorsConfig) -> Self {
        let mut builder = Self::new(search.max_queries_per_product);

        for rule in &vendors.site_rules {
            match Regex::new(&format!("(?i){}", rule.pattern)) {
                Ok(matcher) => builder.rules.push(SiteRule {
                    matcher,
                    domain: rule.domain.clone(),
                }),
                Err(err) => {
                    tracing::warn!(pattern = %rule.pattern, %err, "skipping invalid site rule");
                }
            }
        }

        builder
    }

    /// Build the ordered query list for `product`.
    ///
    /// # Errors
    ///
    /// [`ResearchError::QueryGeneration`] when the identifier is empty or
    /// contains no alphanumeric characters. Fatal for this product only.
    pub fn build(&self, product: &Product) -> Result<Vec<String>, ResearchError> {
        let id = product.product_id.trim();
        if id.is_empty() {
            return Err(ResearchError::QueryGeneration {
                product_id: product.product_id.clone(),
                reason: "identifier is empty".to_string(),
            });
        }
        if !id.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(ResearchError::QueryGeneration {
                product_id: product.product_id.clone(),
                reason: "identifier has no alphanumeric characters".to_string(),
            });
        }

        let manufacturer = product.manufacturer.trim();
        let base = strip_hw_suffix(id);

        let mut queries = vec![generic_query(id, manufacturer)];

        for rule in &self.rules {
            if rule.matcher.is_match(id) {
                queries.push(format!("\"{}\" site:{} end of life", id, rule.domain));
                if let Some(base) = base {
                    queries.push(format!("\"{}\" site:{} EOL", base, rule.domain));
                }
            }
        }

        if let Some(base) = base {
            queries.push(generic_query(base, manufacturer));
        }

        dedup_in_order(&mut queries);
        queries.truncate(self.max_queries);
        Ok(queries)
    }
}

fn generic_query(id: &str, manufacturer: &str) -> String {
    if manufacturer.is_empty() {
        format!("\"{}\" end of life", id)
    } else {
        format!("\"{}\" {} end of life", id, manufacturer)
    }
}

/// The identifier with a trailing `-HW` removed, if present.
fn strip_hw_suffix(id: &str) -> Option<&str> {
    if id.len() <= HW_SUFFIX.len() {
        return None;
    }
    let split = id.len() - HW_SUFFIX.len();
    match (id.get(..split), id.get(split..)) {
        (Some(base), Some(tail)) if tail.eq_ignore_ascii_case(HW_SUFFIX) => Some(base),
        _ => None,
    }
}

fn dedup_in_order(queries: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
}
