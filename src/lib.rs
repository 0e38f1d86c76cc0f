//! # EOL Harness
//!
//! A lifecycle-date research and confidence engine for hardware EOL
//! reporting.
//!
//! EOL Harness turns ambiguous product identifiers into normalized,
//! confidence-scored end-of-life records: it builds vendor-aware search
//! queries, extracts date-bearing phrases from the returned snippets with
//! a declarative pattern registry, classifies each source's trust tier,
//! reconciles conflicting dates across sources into 0–100 confidence
//! scores, and aggregates a batch of products into a report with streamed
//! progress.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────┐
//! │ QueryBuilder │──▶│ SearchClient   │──▶│ DateExtract │
//! │ site: rules  │   │ google/static │   │ + Classify  │
//! └──────────────┘   └───────────────┘   └──────┬──────┘
//!                                               │ candidates
//!                                               ▼
//!                  ┌────────────────┐   ┌──────────────┐
//!                  │ ReportOrch.    │◀──│ Confidence    │
//!                  │ batch+progress │   │ Scorer       │
//!                  └───────┬────────┘   └──────────────┘
//!                          ▼
//!                    ReportWriter (CSV)
//! ```
//!
//! Data flows strictly downward (product → queries → hits → candidates →
//! record → statistics); nothing calls back up except progress events.
//!
//! ## Quick Start
//!
//! ```bash
//! eolh queries MR33-HW --manufacturer "Cisco Meraki"
//! eolh research WS-C3850-48P --manufacturer Cisco
//! eolh report --products ./products.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`query`] | Search query construction |
//! | [`patterns`] | Declarative lifecycle-date pattern registry |
//! | [`extract`] | Date extraction over hit text |
//! | [`classify`] | Source trust classification |
//! | [`score`] | Multi-source confidence scoring |
//! | [`search`] | Search capability trait + retry policy |
//! | [`search_google`] | Google Custom Search transport |
//! | [`engine`] | Per-product research facade |
//! | [`progress`] | Report progress registry |
//! | [`products`] | Product source trait |
//! | [`report`] | Batch report orchestration |
//! | [`writer`] | Report writer trait + CSV default |

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod models;
pub mod patterns;
pub mod products;
pub mod progress;
pub mod query;
pub mod report;
pub mod score;
pub mod search;
pub mod search_google;
pub mod writer;
