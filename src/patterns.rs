//! Declarative registry of lifecycle-date phrasings.
//!
//! Extraction is driven entirely by this table: each row pairs a lifecycle
//! field with a label phrasing and a date grammar. New vendor phrasings are
//! added by appending rows; extraction logic never changes.
//!
//! Label matching is case-insensitive and tolerant of hyphen, slash, and
//! spacing variants ("End-of-Sale Date" and "End of Sale Date" are the same
//! row), with an optional colon before the date token.

use chrono::NaiveDate;
use regex::Regex;

use crate::models::LifecycleField;

/// A date token syntax the registry understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrammar {
    /// `31-Jan-2015`
    DMonY,
    /// `July 14, 2022` (also `Jul 14 2022`)
    MonthDY,
    /// `2015-01-31`
    Iso,
}

impl DateGrammar {
    pub const ALL: [DateGrammar; 3] = [DateGrammar::DMonY, DateGrammar::MonthDY, DateGrammar::Iso];

    pub fn tag(&self) -> &'static str {
        match self {
            DateGrammar::DMonY => "dmony",
            DateGrammar::MonthDY => "monthdy",
            DateGrammar::Iso => "iso",
        }
    }

    /// Regex fragment matching one date token of this grammar.
    fn token_pattern(&self) -> &'static str {
        match self {
            DateGrammar::DMonY => r"\d{1,2}-[A-Za-z]{3}-\d{4}",
            DateGrammar::MonthDY => r"[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}",
            DateGrammar::Iso => r"\d{4}-\d{2}-\d{2}",
        }
    }

    /// Parse a matched token into a calendar date.
    ///
    /// Returns `None` for tokens that match the shape but not the calendar
    /// (e.g. `31-Feb-2015`); the extractor logs these as anomalies.
    pub fn parse(&self, token: &str) -> Option<NaiveDate> {
        let token = token.trim();
        match self {
            DateGrammar::DMonY => NaiveDate::parse_from_str(token, "%d-%b-%Y").ok(),
            DateGrammar::MonthDY => {
                let cleaned = token.replace('.', "");
                NaiveDate::parse_from_str(&cleaned, "%B %d, %Y")
                    .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%B %d %Y"))
                    .ok()
            }
            DateGrammar::Iso => NaiveDate::parse_from_str(token, "%Y-%m-%d").ok(),
        }
    }
}

/// One registry row: a label phrasing bound to a field and a date grammar.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub id: String,
    pub field: LifecycleField,
    pub label: String,
    pub grammar: DateGrammar,
    matcher: Regex,
}

impl PatternRule {
    pub fn new(
        id: impl Into<String>,
        field: LifecycleField,
        label: impl Into<String>,
        grammar: DateGrammar,
    ) -> Result<Self, regex::Error> {
        let label = label.into();
        let matcher = Regex::new(&label_pattern(&label, grammar))?;
        Ok(Self {
            id: id.into(),
            field,
            label,
            grammar,
            matcher,
        })
    }

    /// All date tokens in `text` introduced by this rule's label.
    pub fn find_all<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.matcher
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }
}

/// Build the tolerant label-then-date regex for one row.
///
/// Words of the label may be separated by any run of spaces, hyphens, or
/// slashes; an optional colon separates the label from the date token.
fn label_pattern(label: &str, grammar: DateGrammar) -> String {
    let words: Vec<String> = label
        .split(|c: char| c == ' ' || c == '-' || c == '/')
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();

    format!(
        r"(?i)\b{}\s*:?\s*({})",
        words.join(r"[\s\-/]+"),
        grammar.token_pattern()
    )
}

/// Label phrasings observed across vendor EOL bulletins.
///
/// Row order is the registry order; each phrasing is expanded against every
/// date grammar.
const LABEL_ROWS: &[(LifecycleField, &str)] = &[
    (LifecycleField::EndOfSale, "End of Sale Date"),
    (LifecycleField::EndOfSale, "End of Sale"),
    (LifecycleField::LastDayOfSupport, "Last Date of Support"),
    (LifecycleField::LastDayOfSupport, "Last Day of Support"),
    (LifecycleField::LastDayOfSupport, "End of Support Date"),
    (LifecycleField::LastDayOfSupport, "End of Support"),
    (
        LifecycleField::EndOfSwMaintenance,
        "End of Software Maintenance Releases",
    ),
    (LifecycleField::EndOfSwMaintenance, "End of SW Maintenance"),
    (
        LifecycleField::EndOfVulnerabilitySupport,
        "End of Vulnerability/Security Support",
    ),
    (
        LifecycleField::EndOfVulnerabilitySupport,
        "End of Vulnerability Support",
    ),
];

/// Ordered collection of [`PatternRule`]s.
pub struct PatternRegistry {
    rules: Vec<PatternRule>,
}

impl PatternRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a registry pre-loaded with the built-in phrasing rows.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (row, (field, label)) in LABEL_ROWS.iter().enumerate() {
            for grammar in DateGrammar::ALL {
                let id = format!("{}.{:02}.{}", field.as_str(), row, grammar.tag());
                let rule = PatternRule::new(id, *field, *label, grammar)
                    .expect("built-in pattern row compiles");
                registry.push(rule);
            }
        }
        registry
    }

    /// Append a rule. Later rows never shadow earlier ones; all rules apply.
    pub fn push(&mut self, rule: PatternRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dmony_parses() {
        assert_eq!(
            DateGrammar::DMonY.parse("31-Jan-2015"),
            Some(date(2015, 1, 31))
        );
        assert_eq!(DateGrammar::DMonY.parse("7-Oct-2021"), Some(date(2021, 10, 7)));
    }

    #[test]
    fn dmony_rejects_impossible_calendar_date() {
        assert_eq!(DateGrammar::DMonY.parse("31-Feb-2015"), None);
    }

    #[test]
    fn month_name_parses_full_and_abbreviated() {
        assert_eq!(
            DateGrammar::MonthDY.parse("July 14, 2022"),
            Some(date(2022, 7, 14))
        );
        assert_eq!(
            DateGrammar::MonthDY.parse("Jul 14 2022"),
            Some(date(2022, 7, 14))
        );
    }

    #[test]
    fn iso_parses() {
        assert_eq!(
            DateGrammar::Iso.parse("2020-04-30"),
            Some(date(2020, 4, 30))
        );
    }

    #[test]
    fn label_tolerates_hyphen_and_colon_variants() {
        let rule = PatternRule::new(
            "t.00.dmony",
            LifecycleField::EndOfSale,
            "End of Sale Date",
            DateGrammar::DMonY,
        )
        .unwrap();

        assert_eq!(rule.find_all("End-of-Sale Date: 31-Jan-2015"), ["31-Jan-2015"]);
        assert_eq!(rule.find_all("End of Sale Date 31-Oct-2021"), ["31-Oct-2021"]);
        assert_eq!(rule.find_all("end OF sale date: 31-Oct-2021"), ["31-Oct-2021"]);
    }

    #[test]
    fn label_match_respects_word_boundary() {
        let rule = PatternRule::new(
            "t.02.dmony",
            LifecycleField::LastDayOfSupport,
            "End of Support",
            DateGrammar::DMonY,
        )
        .unwrap();

        assert!(rule.find_all("Suspend of Support: 31-Jan-2020").is_empty());
        assert_eq!(rule.find_all("End of Support: 31-Jan-2020"), ["31-Jan-2020"]);
    }

    #[test]
    fn label_requires_adjacent_date_token() {
        let rule = PatternRule::new(
            "t.01.dmony",
            LifecycleField::EndOfSale,
            "End of Sale",
            DateGrammar::DMonY,
        )
        .unwrap();

        // The "Date" word blocks the shorter phrasing from matching.
        assert!(rule.find_all("End of Sale Date: 31-Jan-2015").is_empty());
    }

    #[test]
    fn defaults_expand_every_row_by_every_grammar() {
        let registry = PatternRegistry::with_defaults();
        assert_eq!(registry.len(), LABEL_ROWS.len() * DateGrammar::ALL.len());

        let ids: Vec<&str> = registry.rules().iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"end_of_sale.00.dmony"));
        assert!(ids.contains(&"end_of_vulnerability_support.09.iso"));
    }

    #[test]
    fn registry_extension_by_appending() {
        let mut registry = PatternRegistry::new();
        assert!(registry.is_empty());
        registry.push(
            PatternRule::new(
                "custom.00.iso",
                LifecycleField::EndOfSale,
                "Retirada de venta",
                DateGrammar::Iso,
            )
            .unwrap(),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.rules()[0].find_all("Retirada de venta: 2024-05-01"),
            ["2024-05-01"]
        );
    }
}
