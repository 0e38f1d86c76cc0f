//! End-to-end tests over the public API: deterministic research, partial
//! failure tolerance, report assembly, and progress streaming against
//! stubbed collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use eol_harness::config::Config;
use eol_harness::engine::ResearchEngine;
use eol_harness::error::{ErrorKind, ReportError, SearchError};
use eol_harness::models::{LifecycleField, Product, RawHit};
use eol_harness::products::InMemoryProductSource;
use eol_harness::progress::{ProgressRegistry, ReportState};
use eol_harness::report::{EolYearBasis, ReportOptions, ReportOrchestrator};
use eol_harness::search::{SearchClient, StaticSearchClient};
use eol_harness::writer::CsvReportWriter;

fn product(id: &str, manufacturer: &str) -> Product {
    Product {
        product_id: id.to_string(),
        manufacturer: manufacturer.to_string(),
        description: None,
        quantity: 1,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn cisco_hit() -> RawHit {
    RawHit {
        source_url: "https://www.cisco.com/eos/ws-c3850.html".to_string(),
        snippet_text: "End of Sale Date: 31-Oct-2021. Last Date of Support: 31-Oct-2026."
            .to_string(),
    }
}

fn orchestrator(
    client: impl SearchClient + 'static,
    source: InMemoryProductSource,
    config: &Config,
) -> ReportOrchestrator {
    ReportOrchestrator::new(
        Arc::new(ResearchEngine::new(Arc::new(client), config)),
        Arc::new(source),
        Arc::new(CsvReportWriter::new()),
        Arc::new(ProgressRegistry::new()),
        config,
    )
}

/// A client that fails some queries and serves others, by substring.
struct MixedClient {
    fail_needles: Vec<(String, bool)>, // (needle, permanent)
    hits: Vec<(String, Vec<RawHit>)>,
    calls: AtomicU32,
}

impl MixedClient {
    fn new() -> Self {
        Self {
            fail_needles: Vec::new(),
            hits: Vec::new(),
            calls: AtomicU32::new(0),
        }
    }

    fn fail_on(mut self, needle: &str, permanent: bool) -> Self {
        self.fail_needles.push((needle.to_string(), permanent));
        self
    }

    fn serve(mut self, needle: &str, hits: Vec<RawHit>) -> Self {
        self.hits.push((needle.to_string(), hits));
        self
    }
}

#[async_trait]
impl SearchClient for MixedClient {
    fn provider(&self) -> &str {
        "mixed"
    }

    async fn search(&self, query: &str) -> Result<Vec<RawHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (needle, permanent) in &self.fail_needles {
            if query.contains(needle.as_str()) {
                return if *permanent {
                    Err(SearchError::Permanent("403".to_string()))
                } else {
                    Err(SearchError::Transient("timeout".to_string()))
                };
            }
        }
        let mut hits = Vec::new();
        for (needle, entry) in &self.hits {
            if query.contains(needle.as_str()) {
                hits.extend(entry.iter().cloned());
            }
        }
        Ok(hits)
    }
}

fn zero_retry_config() -> Config {
    let mut config = Config::default();
    config.search.max_retries = 0;
    config
}

// ───────────────────────── research engine properties ─────────────────────

#[tokio::test]
async fn research_is_deterministic_across_runs() {
    let make_engine = || {
        let client = StaticSearchClient::new()
            .with_hits("WS-C3850-48P", vec![cisco_hit()])
            .with_hits(
                "site:cisco.com",
                vec![RawHit {
                    source_url: "https://mirror.example.net/cisco-eol".to_string(),
                    snippet_text: "End of Sale: 31-Oct-2021".to_string(),
                }],
            );
        ResearchEngine::new(Arc::new(client), &Config::default())
    };

    let product = product("WS-C3850-48P", "Cisco");
    let first = make_engine().perform_research(&product).await.unwrap();
    let second = make_engine().perform_research(&product).await.unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn partial_query_failure_still_populates_record() {
    // The Meraki-scoped queries fail transiently; the generic ones succeed
    // with extractable dates. No error may surface.
    let client = MixedClient::new()
        .fail_on("site:documentation.meraki.com", false)
        .serve(
            "Cisco Meraki end of life",
            vec![RawHit {
                source_url: "https://documentation.meraki.com/MR33/eol".to_string(),
                snippet_text: "End-of-Sale Date: July 14, 2022".to_string(),
            }],
        );

    let engine = ResearchEngine::new(Arc::new(client), &zero_retry_config());
    let record = engine
        .perform_research(&product("MR33-HW", "Cisco Meraki"))
        .await
        .unwrap();

    assert!(record.research_error.is_none());
    assert_eq!(
        record.field(LifecycleField::EndOfSale).value,
        Some(date(2022, 7, 14))
    );
    assert!(record.field(LifecycleField::EndOfSale).confidence > 0);
}

#[tokio::test]
async fn all_queries_failing_annotates_the_record() {
    let client = MixedClient::new().fail_on("", true);
    let engine = ResearchEngine::new(Arc::new(client), &zero_retry_config());

    let record = engine
        .perform_research(&product("WS-C3850-48P", "Cisco"))
        .await
        .unwrap();

    assert_eq!(record.research_error, Some(ErrorKind::SearchPermanent));
    assert_eq!(record.overall_confidence, 0);
    for field in LifecycleField::ALL {
        assert_eq!(record.field(field).value, None);
    }
}

#[tokio::test]
async fn zero_hits_is_safe_and_confidence_stays_in_range() {
    let engine = ResearchEngine::new(Arc::new(StaticSearchClient::new()), &Config::default());
    let record = engine
        .perform_research(&product("JL253A", "HPE Aruba"))
        .await
        .unwrap();

    assert_eq!(record.overall_confidence, 0);
    assert!(record.is_current_product);
    for field in LifecycleField::ALL {
        assert!(record.field(field).confidence <= 100);
    }
}

#[tokio::test]
async fn vendor_site_outranks_third_party_disagreement() {
    let client = StaticSearchClient::new().with_hits(
        "PA-3020",
        vec![
            RawHit {
                source_url: "https://www.paloaltonetworks.com/services/support/eol".to_string(),
                snippet_text: "End of Sale Date: 31-Oct-2018".to_string(),
            },
            RawHit {
                source_url: "https://secondhand-firewalls.example.com/pa-3020".to_string(),
                snippet_text: "End of Sale Date: 31-Mar-2019".to_string(),
            },
        ],
    );

    let engine = ResearchEngine::new(Arc::new(client), &Config::default());
    let record = engine
        .perform_research(&product("PA-3020", "Palo Alto"))
        .await
        .unwrap();

    assert_eq!(
        record.field(LifecycleField::EndOfSale).value,
        Some(date(2018, 10, 31))
    );
    assert_eq!(record.data_source_counts.vendor_site, 1);
    assert_eq!(record.data_source_counts.third_party, 1);
}

// ───────────────────────── report orchestration ────────────────────────────

#[tokio::test]
async fn unknown_job_fails_the_report() {
    let orchestrator = orchestrator(
        StaticSearchClient::new(),
        InMemoryProductSource::new(),
        &Config::default(),
    );

    let err = orchestrator
        .generate_report("nope", &ReportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::JobNotFound(_)));
}

#[tokio::test]
async fn one_failing_product_completes_with_errors_and_full_records() {
    // 10 products; one has an identifier that cannot produce queries.
    let mut products: Vec<Product> = (0..9)
        .map(|i| product(&format!("WS-C3850-{:02}", i), "Cisco"))
        .collect();
    products.insert(4, product("///", "Cisco"));

    let client = StaticSearchClient::new().with_hits("WS-C3850", vec![cisco_hit()]);
    let orchestrator = orchestrator(
        client,
        InMemoryProductSource::single_job("job-10", products),
        &Config::default(),
    );

    let output = orchestrator
        .generate_report("job-10", &ReportOptions::default())
        .await
        .unwrap();

    assert_eq!(output.state, ReportState::CompletedWithErrors);
    assert_eq!(output.records.len(), 10);

    let failed: Vec<&eol_harness::models::LifecycleRecord> = output
        .records
        .iter()
        .filter(|r| r.research_error.is_some())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].product_id, "///");
    assert_eq!(failed[0].research_error, Some(ErrorKind::QueryGeneration));

    let populated = output
        .records
        .iter()
        .filter(|r| r.field(LifecycleField::EndOfSale).value.is_some())
        .count();
    assert_eq!(populated, 9);
}

#[tokio::test]
async fn records_come_back_in_input_order() {
    let ids = ["Z-9", "A-1", "M-5", "B-2"];
    let products: Vec<Product> = ids.iter().map(|id| product(id, "Acme")).collect();

    let orchestrator = orchestrator(
        StaticSearchClient::new(),
        InMemoryProductSource::single_job("ordered", products),
        &Config::default(),
    );

    let output = orchestrator
        .generate_report("ordered", &ReportOptions::default())
        .await
        .unwrap();

    let got: Vec<&str> = output.records.iter().map(|r| r.product_id.as_str()).collect();
    assert_eq!(got, ids);
}

#[tokio::test]
async fn statistics_cover_quantity_and_risk_window() {
    let mut p1 = product("WS-C3850-48P", "Cisco");
    p1.quantity = 10;
    let p2 = product("UNKNOWN-1", "Acme");

    // p1's last day of support (2026-10-31) is inside a 365-day window from
    // 2026-06-01; p2 has no dates at all.
    let client = StaticSearchClient::new().with_hits("WS-C3850-48P", vec![cisco_hit()]);
    let orchestrator = orchestrator(
        client,
        InMemoryProductSource::single_job("stats", vec![p1, p2]),
        &Config::default(),
    );

    let options = ReportOptions {
        reference_date: Some(date(2026, 6, 1)),
        ..ReportOptions::default()
    };
    let output = orchestrator.generate_report("stats", &options).await.unwrap();

    assert_eq!(output.state, ReportState::Completed);
    assert_eq!(output.statistics.total_products, 2);
    assert_eq!(output.statistics.total_quantity, 11);
    assert_eq!(output.statistics.critical_risk_count, 1);

    // Same job on the end-of-sale basis: 2021-10-31 is already past the
    // reference, which still counts as critical.
    let options = ReportOptions {
        reference_date: Some(date(2026, 6, 1)),
        eol_year_basis: EolYearBasis::EndOfSale,
        ..ReportOptions::default()
    };
    let output = orchestrator.generate_report("stats", &options).await.unwrap();
    assert_eq!(output.statistics.critical_risk_count, 1);
}

#[tokio::test]
async fn csv_payload_has_one_row_per_product() {
    let products = vec![product("A-1", "Acme"), product("B-2", "Acme")];
    let orchestrator = orchestrator(
        StaticSearchClient::new(),
        InMemoryProductSource::single_job("csv", products),
        &Config::default(),
    );

    let output = orchestrator
        .generate_report("csv", &ReportOptions::default())
        .await
        .unwrap();

    assert!(output.filename.ends_with(".csv"));
    assert!(output.filename.contains(&output.report_id));
    let text = String::from_utf8(output.payload).unwrap();
    assert_eq!(text.trim_end().lines().count(), 3);
}

// ───────────────────────── progress streaming ───────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_reaches_terminal_state() {
    let products: Vec<Product> = (0..6)
        .map(|i| product(&format!("WS-C3850-{:02}", i), "Cisco"))
        .collect();
    let client = StaticSearchClient::new().with_hits("WS-C3850", vec![cisco_hit()]);
    let orchestrator = orchestrator(
        client,
        InMemoryProductSource::single_job("progress", products),
        &Config::default(),
    );

    let options = ReportOptions {
        report_id: Some("rpt_progress_test".to_string()),
        ..ReportOptions::default()
    };

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    orchestrator.register_progress_callback(
        "rpt_progress_test",
        Box::new(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        }),
    );

    let output = orchestrator
        .generate_report("progress", &options)
        .await
        .unwrap();
    assert_eq!(output.report_id, "rpt_progress_test");

    let events = events.lock().unwrap();
    assert!(!events.is_empty());

    let percents: Vec<u8> = events.iter().map(|e| e.percent_complete).collect();
    let mut sorted = percents.clone();
    sorted.sort();
    assert_eq!(percents, sorted, "progress must never decrease: {:?}", percents);

    // One researching event per product, plus the step transitions.
    let researching = events
        .iter()
        .filter(|e| e.step == ReportState::Researching && e.current_product_id.is_some())
        .count();
    assert_eq!(researching, 6);

    let last = events.last().unwrap();
    assert_eq!(last.step, ReportState::Completed);
    assert_eq!(last.percent_complete, 100);
}

#[tokio::test]
async fn disconnected_consumer_skips_remaining_products() {
    // Serialize research so the cancellation flag is honored for products
    // scheduled after the first delivery failure.
    let mut config = Config::default();
    config.research.concurrency = 1;

    let products: Vec<Product> = (0..8)
        .map(|i| product(&format!("WS-C3850-{:02}", i), "Cisco"))
        .collect();
    let client = StaticSearchClient::new().with_hits("WS-C3850", vec![cisco_hit()]);
    let orchestrator = orchestrator(
        client,
        InMemoryProductSource::single_job("cancel", products),
        &config,
    );

    let options = ReportOptions {
        report_id: Some("rpt_cancel_test".to_string()),
        ..ReportOptions::default()
    };

    // Subscribe via a channel, then immediately drop the receiver: the next
    // delivery fails and the report is flagged cancelled.
    let rx = orchestrator.progress().subscribe_channel("rpt_cancel_test");
    drop(rx);

    let output = orchestrator
        .generate_report("cancel", &options)
        .await
        .unwrap();

    // Every product still has a record; the tail is annotated as skipped.
    assert_eq!(output.records.len(), 8);
    let skipped = output
        .records
        .iter()
        .filter(|r| r.research_error == Some(ErrorKind::Skipped))
        .count();
    assert!(skipped >= 1, "expected skipped records after disconnect");
    assert_eq!(output.state, ReportState::CompletedWithErrors);
}

#[tokio::test]
async fn concurrent_reports_do_not_interfere() {
    let client = StaticSearchClient::new().with_hits("WS-C3850", vec![cisco_hit()]);
    let mut source = InMemoryProductSource::new();
    source.insert_job("job-a", vec![product("WS-C3850-48P", "Cisco")]);
    source.insert_job("job-b", vec![product("WS-C3850-24T", "Cisco")]);

    let config = Config::default();
    let orchestrator = Arc::new(orchestrator(client, source, &config));

    let a = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .generate_report("job-a", &ReportOptions::default())
                .await
        })
    };
    let b = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .generate_report("job-b", &ReportOptions::default())
                .await
        })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_ne!(a.report_id, b.report_id);
    assert_eq!(a.records[0].product_id, "WS-C3850-48P");
    assert_eq!(b.records[0].product_id, "WS-C3850-24T");
}
