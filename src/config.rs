use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub vendors: VendorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// `"google"` (Custom Search JSON API) or `"static"` (in-memory stub).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_queries")]
    pub max_queries_per_product: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_queries_per_product: default_max_queries(),
        }
    }
}

fn default_provider() -> String {
    "static".to_string()
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_queries() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    /// Simultaneous `perform_research` calls per report.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Days ahead of the reference date counted as critical lifecycle risk.
    #[serde(default = "default_risk_window_days")]
    pub risk_window_days: i64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            risk_window_days: default_risk_window_days(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_risk_window_days() -> i64 {
    365
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            filename_prefix: default_filename_prefix(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}
fn default_filename_prefix() -> String {
    "lifecycle".to_string()
}

/// Deployment-supplied additions to the built-in vendor knowledge.
///
/// `domains` maps a manufacturer keyword to extra authoritative domains;
/// `site_rules` appends identifier-prefix rows to the query builder's
/// `site:` rule table. Both merge over the built-in defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct VendorsConfig {
    #[serde(default)]
    pub domains: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub site_rules: Vec<SiteRuleConfig>,
}

/// One identifier-prefix row: identifiers matching `pattern` (anchored,
/// case-insensitive regex) get a `site:{domain}` scoped query.
#[derive(Debug, Deserialize, Clone)]
pub struct SiteRuleConfig {
    pub pattern: String,
    pub domain: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.search.provider.as_str() {
        "google" | "static" => {}
        other => anyhow::bail!(
            "Unknown search provider: '{}'. Must be google or static.",
            other
        ),
    }

    if config.search.max_queries_per_product == 0 {
        anyhow::bail!("search.max_queries_per_product must be >= 1");
    }

    if config.research.concurrency == 0 {
        anyhow::bail!("research.concurrency must be >= 1");
    }

    if config.research.risk_window_days < 0 {
        anyhow::bail!("research.risk_window_days must be >= 0");
    }

    for rule in &config.vendors.site_rules {
        regex::Regex::new(&rule.pattern)
            .with_context(|| format!("Invalid vendors.site_rules pattern: {}", rule.pattern))?;
    }

    Ok(())
}
