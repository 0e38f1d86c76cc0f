//! # EOL Harness CLI (`eolh`)
//!
//! The `eolh` binary exercises the research library from the command line:
//! preview generated queries, research a single product, or run a whole
//! report job from a JSON products file.
//!
//! ## Usage
//!
//! ```bash
//! eolh --config ./eolh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `eolh queries <id>` | Print the search queries built for a product |
//! | `eolh research <id>` | Research one product and print its record |
//! | `eolh report` | Research a products file and write the report |
//!
//! ## Examples
//!
//! ```bash
//! # Which queries would run for an identifier?
//! eolh queries MR33-HW --manufacturer "Cisco Meraki"
//!
//! # Research a single switch against the configured provider
//! GOOGLE_API_KEY=… GOOGLE_SEARCH_ENGINE_ID=… \
//!   eolh research WS-C3850-48P --manufacturer Cisco
//!
//! # Full report with progress on stderr
//! eolh report --products ./products.json --basis endOfSale
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use eol_harness::config::{load_config, Config};
use eol_harness::engine::ResearchEngine;
use eol_harness::models::Product;
use eol_harness::products::{load_products_file, InMemoryProductSource};
use eol_harness::progress::ProgressRegistry;
use eol_harness::query::QueryBuilder;
use eol_harness::report::{EolYearBasis, ReportOptions, ReportOrchestrator};
use eol_harness::search::create_search_client;
use eol_harness::writer::CsvReportWriter;

/// EOL Harness CLI — a lifecycle-date research and confidence engine for
/// hardware EOL reporting.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; with no file present, built-in defaults apply (static provider).
#[derive(Parser)]
#[command(
    name = "eolh",
    about = "EOL Harness — lifecycle-date research and confidence-scored EOL reporting",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./eolh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Print the search queries that would run for a product.
    Queries {
        /// The product identifier (e.g. `MR33-HW`).
        product_id: String,

        /// Manufacturer name, used in generic queries and classification.
        #[arg(long, default_value = "")]
        manufacturer: String,
    },

    /// Research one product and print its lifecycle record as JSON.
    Research {
        /// The product identifier.
        product_id: String,

        #[arg(long, default_value = "")]
        manufacturer: String,

        /// Optional free-form description.
        #[arg(long)]
        description: Option<String>,
    },

    /// Research every product in a JSON file and write the report.
    Report {
        /// JSON array of products: `[{"product_id", "manufacturer", ...}]`.
        #[arg(long)]
        products: PathBuf,

        /// Risk basis field: `lastDayOfSupport` or `endOfSale`.
        #[arg(long, default_value = "lastDayOfSupport")]
        basis: EolYearBasis,

        /// Override the configured output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // A missing config file falls back to defaults; a broken one is an error.
    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Queries {
            product_id,
            manufacturer,
        } => {
            let builder = QueryBuilder::from_config(&config.search, &config.vendors);
            let product = product_from_args(product_id, manufacturer, None);
            for query in builder.build(&product)? {
                println!("{}", query);
            }
        }

        Commands::Research {
            product_id,
            manufacturer,
            description,
        } => {
            let search = create_search_client(&config.search)?;
            let engine = ResearchEngine::new(search, &config);
            let product = product_from_args(product_id, manufacturer, description);

            let record = engine.perform_research(&product).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Report {
            products,
            basis,
            output_dir,
        } => {
            let batch = load_products_file(&products)?;
            if batch.is_empty() {
                anyhow::bail!("products file is empty: {}", products.display());
            }

            let search = create_search_client(&config.search)?;
            let engine = Arc::new(ResearchEngine::new(search, &config));
            let source = Arc::new(InMemoryProductSource::single_job("cli", batch));
            let progress = Arc::new(ProgressRegistry::new());
            let orchestrator = ReportOrchestrator::new(
                engine,
                source,
                Arc::new(CsvReportWriter::new()),
                progress,
                &config,
            );

            let options = ReportOptions {
                eol_year_basis: basis,
                report_id: Some(format!("rpt_{}", uuid::Uuid::new_v4().simple())),
                ..ReportOptions::default()
            };

            // Stream progress to stderr while the report runs.
            let report_id = options.report_id.clone().unwrap_or_default();
            let mut events = orchestrator.progress().subscribe_channel(&report_id);
            let printer = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    eprintln!(
                        "report {}  {}  {}%{}",
                        event.report_id,
                        event.step.as_str(),
                        event.percent_complete,
                        event
                            .current_product_id
                            .map(|id| format!("  {}", id))
                            .unwrap_or_default()
                    );
                }
            });

            let output = orchestrator.generate_report("cli", &options).await?;
            orchestrator.unregister_progress_callback(&output.report_id);
            let _ = printer.await;
            orchestrator.progress().remove(&output.report_id);

            let dir = output_dir.unwrap_or_else(|| config.report.output_dir.clone());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            let path = dir.join(&output.filename);
            std::fs::write(&path, &output.payload)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;

            println!("report {}", output.report_id);
            println!("  state: {}", output.state.as_str());
            println!("  products: {}", output.statistics.total_products);
            println!("  total quantity: {}", output.statistics.total_quantity);
            println!(
                "  critical risk: {}",
                output.statistics.critical_risk_count
            );
            println!("  written: {}", path.display());
        }
    }

    Ok(())
}

fn product_from_args(
    product_id: String,
    manufacturer: String,
    description: Option<String>,
) -> Product {
    Product {
        product_id,
        manufacturer,
        description,
        quantity: 1,
    }
}
