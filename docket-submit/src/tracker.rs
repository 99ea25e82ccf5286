//! Job status tracking: one audit event and one metric per transition.
//!
//! The tracker is the single place lifecycle transitions are made
//! observable. It is deliberately infallible: observability must never
//! change the outcome of a submission.

use docket_common::{audit, record::SubmissionRecord};

/// Records lifecycle transitions to the audit log and metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobStatusTracker;

impl JobStatusTracker {
    /// A record was accepted and enqueued
    pub fn on_queued(record: &SubmissionRecord) {
        audit::log_submission_queued(
            &record.id().to_string(),
            record.claim_ref().as_str(),
            record.active_identity().as_str(),
            record.candidate_identities().len(),
        );
    }

    /// An attempt is being dispatched to an upstream
    pub fn on_attempt_start(record: &SubmissionRecord, upstream: &str) {
        audit::log_attempt_start(
            &record.id().to_string(),
            record.active_identity().as_str(),
            upstream,
            record.attempt_count(),
        );
    }

    /// The upstream accepted the submission
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Millisecond precision is enough for the audit log"
    )]
    pub fn on_delivered(record: &SubmissionRecord, upstream: &str, duration_secs: f64) {
        let claim_id = record
            .upstream_claim_id()
            .map_or("", |id| id.as_str());

        audit::log_submission_delivered(
            &record.id().to_string(),
            claim_id,
            record.attempt_count(),
            (duration_secs * 1000.0) as u128,
        );

        if docket_metrics::is_enabled() {
            docket_metrics::metrics().submission.record_delivery(
                upstream,
                duration_secs,
                u64::from(record.attempt_count()),
            );
        }
    }

    /// A transient failure was retried under the same identity
    pub fn on_retry_scheduled(record: &SubmissionRecord, upstream: &str, delay_secs: u64) {
        let error = record
            .last_error()
            .map_or_else(String::new, ToString::to_string);

        audit::log_retry_scheduled(
            &record.id().to_string(),
            &error,
            record.attempt_count(),
            delay_secs,
        );

        if docket_metrics::is_enabled() {
            docket_metrics::metrics().submission.record_retry(upstream);
        }
    }

    /// The current identity's options are spent
    pub fn on_exhausted(record: &SubmissionRecord, upstream: &str) {
        let kind = record
            .last_error()
            .map_or("unknown", |error| error.kind.label());

        audit::log_identity_exhausted(
            &record.id().to_string(),
            record.active_identity().as_str(),
            kind,
            record.attempt_count(),
        );

        if docket_metrics::is_enabled() {
            docket_metrics::metrics()
                .submission
                .record_attempt("exhausted", upstream);
        }
    }

    /// The record rotated to an untried identity
    pub fn on_fallback(record: &SubmissionRecord, from: &str) {
        audit::log_identity_fallback(
            &record.id().to_string(),
            from,
            record.active_identity().as_str(),
            record.tried_identities().len(),
        );

        if docket_metrics::is_enabled() {
            docket_metrics::metrics().submission.record_fallback();
        }
    }

    /// All automated options are exhausted
    pub fn on_final_failure(record: &SubmissionRecord, upstream: &str) {
        let (error, kind) = record.last_error().map_or_else(
            || (String::new(), "unknown"),
            |error| (error.to_string(), error.kind.label()),
        );

        audit::log_final_failure(
            &record.id().to_string(),
            &error,
            kind,
            record.tried_identities().len(),
        );

        if docket_metrics::is_enabled() {
            docket_metrics::metrics()
                .submission
                .record_failure(upstream, kind);
        }
    }

    /// Refresh the working-set gauges from queue counts
    pub fn on_queue_counts(pending: u64, in_flight: u64, delivered: u64, exhausted: u64, failed: u64) {
        if docket_metrics::is_enabled() {
            let metrics = &docket_metrics::metrics().submission;
            metrics.set_queue_size("pending", pending);
            metrics.set_queue_size("in_flight", in_flight);
            metrics.set_queue_size("delivered", delivered);
            metrics.set_queue_size("exhausted_pending_fallback", exhausted);
            metrics.set_queue_size("failed", failed);
        }
    }
}
