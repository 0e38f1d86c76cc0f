//! Report progress streaming.
//!
//! An explicit, report-keyed subscriber registry with exactly three
//! operations (register, unregister, notify), replacing what would
//! otherwise be ambient global state. Notification is serialized per
//! registry, percent values are clamped monotonically non-decreasing per
//! report, and a subscriber whose delivery fails is dropped without
//! affecting the job.
//!
//! When a report that had subscribers loses its last one through delivery
//! failure (the streaming consumer went away), the report is flagged
//! cancelled; the orchestrator checks the flag before starting each
//! not-yet-scheduled product.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ProgressStreamError;

/// Lifecycle of one report request.
///
/// `Failed` is reachable only before research starts (job-level problems);
/// `CompletedWithErrors` is the success terminal when one or more products
/// failed research without failing the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Queued,
    FetchingProducts,
    Researching,
    Aggregating,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl ReportState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportState::Completed | ReportState::CompletedWithErrors | ReportState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportState::Queued => "queued",
            ReportState::FetchingProducts => "fetching_products",
            ReportState::Researching => "researching",
            ReportState::Aggregating => "aggregating",
            ReportState::Completed => "completed",
            ReportState::CompletedWithErrors => "completed_with_errors",
            ReportState::Failed => "failed",
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub report_id: String,
    pub step: ReportState,
    /// Monotonically non-decreasing within a report.
    pub percent_complete: u8,
    pub current_product_id: Option<String>,
}

/// A progress subscriber. Returning an error drops the subscription.
pub type ProgressCallback =
    Box<dyn Fn(&ProgressEvent) -> Result<(), ProgressStreamError> + Send + Sync>;

#[derive(Default)]
struct ReportChannel {
    subscribers: Vec<ProgressCallback>,
    ever_subscribed: bool,
    cancelled: bool,
    last_percent: u8,
}

/// Report-keyed progress subscriber registry.
///
/// Construct one per process (or per test) and share it between the
/// orchestrator and whatever consumes the stream.
#[derive(Default)]
pub struct ProgressRegistry {
    inner: Mutex<HashMap<String, ReportChannel>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a callback to a report's events.
    pub fn register(&self, report_id: &str, callback: ProgressCallback) {
        let mut inner = self.lock();
        let channel = inner.entry(report_id.to_string()).or_default();
        channel.subscribers.push(callback);
        channel.ever_subscribed = true;
    }

    /// Remove all subscribers for a report. Does not cancel it.
    pub fn unregister(&self, report_id: &str) {
        let mut inner = self.lock();
        if let Some(channel) = inner.get_mut(report_id) {
            channel.subscribers.clear();
        }
    }

    /// Deliver an event to every current subscriber of its report.
    ///
    /// Failed deliveries drop the subscriber; losing the last subscriber
    /// this way cancels the report.
    pub fn notify(&self, event: &ProgressEvent) {
        let mut inner = self.lock();
        let channel = inner.entry(event.report_id.clone()).or_default();

        let percent = event.percent_complete.max(channel.last_percent);
        channel.last_percent = percent;

        if channel.subscribers.is_empty() {
            return;
        }

        let delivered = ProgressEvent {
            percent_complete: percent,
            ..event.clone()
        };

        let mut dropped = 0usize;
        channel.subscribers.retain(|cb| match cb(&delivered) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(report_id = %delivered.report_id, %err, "dropping progress subscriber");
                dropped += 1;
                false
            }
        });

        if dropped > 0 && channel.subscribers.is_empty() {
            tracing::info!(report_id = %delivered.report_id, "all progress consumers gone, cancelling report");
            channel.cancelled = true;
        }
    }

    /// Flag a report so no further product research is scheduled for it.
    pub fn cancel(&self, report_id: &str) {
        self.lock()
            .entry(report_id.to_string())
            .or_default()
            .cancelled = true;
    }

    pub fn is_cancelled(&self, report_id: &str) -> bool {
        self.lock()
            .get(report_id)
            .map(|c| c.cancelled)
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, report_id: &str) -> usize {
        self.lock()
            .get(report_id)
            .map(|c| c.subscribers.len())
            .unwrap_or(0)
    }

    /// Drop all state for a finished report.
    pub fn remove(&self, report_id: &str) {
        self.lock().remove(report_id);
    }

    /// Subscribe via a channel; the stream ends when the sender is dropped.
    ///
    /// Dropping the receiver makes the next delivery fail, which counts as
    /// a disconnect for cancellation purposes.
    pub fn subscribe_channel(
        &self,
        report_id: &str,
    ) -> tokio::sync::mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.register(
            report_id,
            Box::new(move |event| {
                tx.send(event.clone())
                    .map_err(|_| ProgressStreamError("subscriber disconnected".to_string()))
            }),
        );
        rx
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ReportChannel>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
