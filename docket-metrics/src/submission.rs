//! Submission pipeline metrics
//!
//! Tracks claim submissions including:
//! - Attempt counts by outcome and upstream
//! - Submission durations by upstream
//! - Working-set sizes by record state
//! - Identity fallbacks and retries

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

/// Submission metrics collector
#[derive(Debug)]
pub struct SubmissionMetrics {
    /// Total number of submission attempts by outcome
    attempts_total: Counter<u64>,

    /// Distribution of attempt durations by upstream
    duration_seconds: Histogram<f64>,

    /// Total number of submissions delivered successfully
    submissions_delivered: Counter<u64>,

    /// Total number of submissions permanently failed
    submissions_failed: Counter<u64>,

    /// Total number of retries scheduled
    submissions_retrying: Counter<u64>,

    /// Total number of identity fallbacks
    identity_fallbacks: Counter<u64>,

    /// Distribution of attempt counts before success
    attempts_to_delivery: Histogram<u64>,

    // Local counters for working-set size tracking (shared with the
    // observable gauge callback)
    queue_pending: Arc<AtomicU64>,
    queue_in_flight: Arc<AtomicU64>,
    queue_delivered: Arc<AtomicU64>,
    queue_exhausted: Arc<AtomicU64>,
    queue_failed: Arc<AtomicU64>,
}

impl SubmissionMetrics {
    /// Create a new submission metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let attempts_total = meter
            .u64_counter("docket.submission.attempts.total")
            .with_description("Total number of submission attempts by outcome")
            .build();

        let duration_seconds = meter
            .f64_histogram("docket.submission.duration.seconds")
            .with_description("Distribution of attempt durations by upstream")
            .build();

        let submissions_delivered = meter
            .u64_counter("docket.submission.delivered.total")
            .with_description("Total number of submissions delivered successfully")
            .build();

        let submissions_failed = meter
            .u64_counter("docket.submission.failed.total")
            .with_description("Total number of submissions permanently failed")
            .build();

        let submissions_retrying = meter
            .u64_counter("docket.submission.retrying.total")
            .with_description("Total number of retries scheduled")
            .build();

        let identity_fallbacks = meter
            .u64_counter("docket.submission.fallbacks.total")
            .with_description("Total number of identity fallbacks")
            .build();

        let attempts_to_delivery = meter
            .u64_histogram("docket.submission.attempts.to.delivery")
            .with_description("Distribution of attempt counts before success")
            .build();

        let queue_pending_ref = Arc::new(AtomicU64::new(0));
        let queue_in_flight_ref = Arc::new(AtomicU64::new(0));
        let queue_delivered_ref = Arc::new(AtomicU64::new(0));
        let queue_exhausted_ref = Arc::new(AtomicU64::new(0));
        let queue_failed_ref = Arc::new(AtomicU64::new(0));

        let pending = queue_pending_ref.clone();
        let in_flight = queue_in_flight_ref.clone();
        let delivered = queue_delivered_ref.clone();
        let exhausted = queue_exhausted_ref.clone();
        let failed = queue_failed_ref.clone();

        // Register observable gauge for working-set size metrics
        // The meter keeps this alive internally via the callback
        meter
            .u64_observable_gauge("docket.submission.queue.size")
            .with_description("Current working-set size by record state")
            .with_callback(move |observer| {
                observer.observe(
                    pending.load(Ordering::Relaxed),
                    &[KeyValue::new("state", "pending")],
                );
                observer.observe(
                    in_flight.load(Ordering::Relaxed),
                    &[KeyValue::new("state", "in_flight")],
                );
                observer.observe(
                    delivered.load(Ordering::Relaxed),
                    &[KeyValue::new("state", "delivered")],
                );
                observer.observe(
                    exhausted.load(Ordering::Relaxed),
                    &[KeyValue::new("state", "exhausted_pending_fallback")],
                );
                observer.observe(
                    failed.load(Ordering::Relaxed),
                    &[KeyValue::new("state", "failed")],
                );
            })
            .build();

        Ok(Self {
            attempts_total,
            duration_seconds,
            submissions_delivered,
            submissions_failed,
            submissions_retrying,
            identity_fallbacks,
            attempts_to_delivery,
            queue_pending: queue_pending_ref,
            queue_in_flight: queue_in_flight_ref,
            queue_delivered: queue_delivered_ref,
            queue_exhausted: queue_exhausted_ref,
            queue_failed: queue_failed_ref,
        })
    }

    /// Record a submission attempt
    pub fn record_attempt(&self, outcome: &str, upstream: &str) {
        let attributes = [
            KeyValue::new("outcome", outcome.to_string()),
            KeyValue::new("upstream", upstream.to_string()),
        ];
        self.attempts_total.add(1, &attributes);
    }

    /// Record a successful delivery
    pub fn record_delivery(&self, upstream: &str, duration_secs: f64, attempts: u64) {
        let attributes = [KeyValue::new("upstream", upstream.to_string())];
        self.duration_seconds.record(duration_secs, &attributes);
        self.submissions_delivered.add(1, &[]);
        self.attempts_to_delivery.record(attempts, &[]);
        self.record_attempt("success", upstream);
    }

    /// Record a permanent failure
    pub fn record_failure(&self, upstream: &str, error_kind: &str) {
        let attributes = [KeyValue::new("error_kind", error_kind.to_string())];
        self.submissions_failed.add(1, &attributes);
        self.record_attempt("failed", upstream);
    }

    /// Record a scheduled retry
    pub fn record_retry(&self, upstream: &str) {
        self.submissions_retrying.add(1, &[]);
        self.record_attempt("retry", upstream);
    }

    /// Record an identity fallback
    pub fn record_fallback(&self) {
        self.identity_fallbacks.add(1, &[]);
    }

    /// Set absolute working-set size for a specific record state
    pub fn set_queue_size(&self, state: &str, size: u64) {
        let counter = match state {
            "pending" => &self.queue_pending,
            "in_flight" => &self.queue_in_flight,
            "delivered" => &self.queue_delivered,
            "exhausted_pending_fallback" => &self.queue_exhausted,
            "failed" => &self.queue_failed,
            _ => return,
        };

        counter.store(size, Ordering::Relaxed);
    }

    /// Get current working-set size for a record state
    #[must_use]
    pub fn get_queue_size(&self, state: &str) -> u64 {
        let counter = match state {
            "pending" => &self.queue_pending,
            "in_flight" => &self.queue_in_flight,
            "delivered" => &self.queue_delivered,
            "exhausted_pending_fallback" => &self.queue_exhausted,
            "failed" => &self.queue_failed,
            _ => return 0,
        };

        counter.load(Ordering::Relaxed)
    }
}

/// Get the OpenTelemetry meter for submission metrics
fn meter() -> Meter {
    opentelemetry::global::meter("docket.submission")
}
