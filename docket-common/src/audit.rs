//! Audit logging for submission lifecycle events
//!
//! This module provides structured audit logging for compliance monitoring.
//! All events are logged as structured fields with configurable PII redaction.
//!
//! ## Audit Events
//!
//! - `SubmissionQueued`: Record accepted and enqueued for submission
//! - `AttemptStart`: Submission attempt dispatched to an upstream service
//! - `SubmissionDelivered`: Upstream accepted the submission
//! - `RetryScheduled`: Transient failure, next attempt scheduled
//! - `IdentityExhausted`: The current identity's options are spent
//! - `IdentityFallback`: Rotated to an untried identity key
//! - `FinalFailure`: All automated options exhausted
//!
//! ## PII Redaction
//!
//! Identity keys are person identifiers known to the upstream services and
//! can be redacted based on the `AuditConfig` to comply with privacy
//! regulations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging for submission lifecycle events
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redact identity keys from audit logs (PII protection)
    #[serde(default = "default_true")]
    pub redact_identities: bool,

    /// Redact upstream error messages from audit logs (they can echo
    /// payload fragments)
    #[serde(default)]
    pub redact_error_detail: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_identities: true,
            redact_error_detail: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Global audit configuration (thread-safe)
static AUDIT_CONFIG: std::sync::OnceLock<Arc<AuditConfig>> = std::sync::OnceLock::new();

/// Initialize audit logging with configuration
pub fn init(config: AuditConfig) {
    AUDIT_CONFIG.get_or_init(|| Arc::new(config));
}

/// Get the current audit configuration
#[must_use]
pub fn config() -> Arc<AuditConfig> {
    AUDIT_CONFIG
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(AuditConfig::default()))
}

/// Redact an identity key if redaction is enabled
///
/// Keeps the last four characters so an operator can still correlate
/// events for one identity within a log window. The suffix is taken on
/// char boundaries; identity keys are not guaranteed to be ASCII.
#[must_use]
pub fn redact_identity(identity: &str, redact: bool) -> String {
    if !redact {
        return identity.to_string();
    }

    match identity.char_indices().rev().nth(3) {
        Some((idx, _)) if idx > 0 => format!("[REDACTED]{}", &identity[idx..]),
        _ => "[REDACTED]".to_string(),
    }
}

/// Redact an error message if redaction is enabled
#[must_use]
pub fn redact_error(error: &str, redact: bool) -> String {
    if redact {
        "[REDACTED]".to_string()
    } else {
        error.to_string()
    }
}

/// Log submission queued event
///
/// Logged when a record is accepted and enqueued for its first attempt.
///
/// # Fields
/// - `submission_id`: Unique record identifier (ULID)
/// - `claim_ref`: External claim/form reference
/// - `identity`: Active identity key (redacted if configured)
/// - `candidates`: Number of candidate identities available
pub fn log_submission_queued(
    submission_id: &str,
    claim_ref: &str,
    identity: &str,
    candidates: usize,
) {
    let config = config();
    if !config.enabled {
        return;
    }

    let identity = redact_identity(identity, config.redact_identities);

    tracing::event!(
        tracing::Level::INFO,
        event = "SubmissionQueued",
        submission_id = %submission_id,
        claim_ref = %claim_ref,
        identity = %identity,
        candidates = candidates,
        "Audit: Submission queued"
    );
}

/// Log attempt start event
///
/// Logged each time an attempt is dispatched to an upstream service.
///
/// # Fields
/// - `submission_id`: Unique record identifier
/// - `identity`: Active identity key (redacted if configured)
/// - `upstream`: Name of the upstream backend
/// - `attempt`: Attempt number within the current identity series (1-based)
pub fn log_attempt_start(submission_id: &str, identity: &str, upstream: &str, attempt: u32) {
    let config = config();
    if !config.enabled {
        return;
    }

    let identity = redact_identity(identity, config.redact_identities);

    tracing::event!(
        tracing::Level::INFO,
        event = "AttemptStart",
        submission_id = %submission_id,
        identity = %identity,
        upstream = %upstream,
        attempt = attempt,
        "Audit: Submission attempt"
    );
}

/// Log submission delivered event
///
/// # Fields
/// - `submission_id`: Unique record identifier
/// - `upstream_claim_id`: Claim id assigned by the upstream service
/// - `attempt`: Final attempt number within the successful series
/// - `duration_ms`: Duration of the successful attempt in milliseconds
pub fn log_submission_delivered(
    submission_id: &str,
    upstream_claim_id: &str,
    attempt: u32,
    duration_ms: u128,
) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "SubmissionDelivered",
        submission_id = %submission_id,
        upstream_claim_id = %upstream_claim_id,
        attempt = attempt,
        duration_ms = duration_ms,
        "Audit: Submission delivered"
    );
}

/// Log retry scheduled event
///
/// Logged on a transient failure with retry budget remaining.
///
/// # Fields
/// - `submission_id`: Unique record identifier
/// - `error`: Classified error description (redacted if configured)
/// - `attempt`: Attempt number that just failed
/// - `delay_secs`: Backoff until the next attempt
pub fn log_retry_scheduled(submission_id: &str, error: &str, attempt: u32, delay_secs: u64) {
    let config = config();
    if !config.enabled {
        return;
    }

    let error = redact_error(error, config.redact_error_detail);

    tracing::event!(
        tracing::Level::WARN,
        event = "RetryScheduled",
        submission_id = %submission_id,
        error = %error,
        attempt = attempt,
        delay_secs = delay_secs,
        "Audit: Retry scheduled"
    );
}

/// Log identity exhausted event
///
/// Logged when an attempt-series ends without success: the budget ran out
/// or the error was not retryable under the same identity.
///
/// # Fields
/// - `submission_id`: Unique record identifier
/// - `identity`: Identity key whose options are spent (redacted if configured)
/// - `error_kind`: Classified kind of the terminal error
/// - `attempts`: Attempts made under this identity
pub fn log_identity_exhausted(
    submission_id: &str,
    identity: &str,
    error_kind: &str,
    attempts: u32,
) {
    let config = config();
    if !config.enabled {
        return;
    }

    let identity = redact_identity(identity, config.redact_identities);

    tracing::event!(
        tracing::Level::WARN,
        event = "IdentityExhausted",
        submission_id = %submission_id,
        identity = %identity,
        error_kind = %error_kind,
        attempts = attempts,
        "Audit: Identity exhausted"
    );
}

/// Log identity fallback event
///
/// Logged when the record rotates to an untried identity key.
///
/// # Fields
/// - `submission_id`: Unique record identifier
/// - `from`: Identity key being retired (redacted if configured)
/// - `to`: Identity key the next series runs under (redacted if configured)
/// - `tried`: Number of identities spent so far
pub fn log_identity_fallback(submission_id: &str, from: &str, to: &str, tried: usize) {
    let config = config();
    if !config.enabled {
        return;
    }

    let from = redact_identity(from, config.redact_identities);
    let to = redact_identity(to, config.redact_identities);

    tracing::event!(
        tracing::Level::WARN,
        event = "IdentityFallback",
        submission_id = %submission_id,
        from = %from,
        to = %to,
        tried = tried,
        "Audit: Identity fallback"
    );
}

/// Log final failure event
///
/// Logged when all automated options are exhausted and the record is
/// marked `Failed`.
///
/// # Fields
/// - `submission_id`: Unique record identifier
/// - `error`: Final error description (redacted if configured)
/// - `error_kind`: Classified kind of the final error
/// - `identities_tried`: Number of identities exhausted
pub fn log_final_failure(
    submission_id: &str,
    error: &str,
    error_kind: &str,
    identities_tried: usize,
) {
    let config = config();
    if !config.enabled {
        return;
    }

    let error = redact_error(error, config.redact_error_detail);

    tracing::event!(
        tracing::Level::ERROR,
        event = "FinalFailure",
        submission_id = %submission_id,
        error = %error,
        error_kind = %error_kind,
        identities_tried = identities_tried,
        "Audit: Submission failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_identity() {
        assert_eq!(redact_identity("796104437", true), "[REDACTED]4437");
        assert_eq!(redact_identity("796104437", false), "796104437");
        assert_eq!(redact_identity("abc", true), "[REDACTED]");
        assert_eq!(redact_identity("abcd", true), "[REDACTED]");
    }

    #[test]
    fn test_redact_identity_multibyte() {
        // Suffix must land on char boundaries, not byte offsets
        assert_eq!(redact_identity("日本語", true), "[REDACTED]");
        assert_eq!(redact_identity("日本語は難しい", true), "[REDACTED]は難しい");
        assert_eq!(redact_identity("Ötzi-4437", true), "[REDACTED]4437");
    }

    #[test]
    fn test_redact_error() {
        assert_eq!(redact_error("PIF in use for claimant", true), "[REDACTED]");
        assert_eq!(
            redact_error("PIF in use for claimant", false),
            "PIF in use for claimant"
        );
    }

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert!(config.enabled);
        assert!(config.redact_identities);
        assert!(!config.redact_error_detail);
    }

    #[test]
    fn test_audit_disabled() {
        // Initialize with disabled config
        init(AuditConfig {
            enabled: false,
            redact_identities: false,
            redact_error_detail: false,
        });

        // These should not panic even when disabled
        log_submission_queued("test-id", "claim-17", "796104437", 2);
        log_attempt_start("test-id", "796104437", "primary", 1);
        log_submission_delivered("test-id", "600001", 1, 1000);
        log_retry_scheduled("test-id", "gateway timeout", 1, 60);
        log_identity_exhausted("test-id", "796104437", "permanent_reject", 1);
        log_identity_fallback("test-id", "796104437", "796104438", 1);
        log_final_failure("test-id", "rejected", "permanent_reject", 2);
    }
}
