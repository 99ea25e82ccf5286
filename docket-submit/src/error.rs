//! Typed error handling for submission operations.
//!
//! This module distinguishes between:
//! - Upstream failures, as the upstream service declared them
//! - System errors (ledger I/O, missing initialization, internal errors)
//!
//! What an upstream failure *means* for the record (retry, fallback, final
//! failure) is not decided here: the [`crate::classifier::ErrorClassifier`]
//! assigns the routing kind once, at the point the error is caught.

use thiserror::Error;

use docket_common::record::SubmissionId;
use docket_ledger::LedgerError;

/// Top-level submission error type.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The upstream service failed the attempt.
    #[error("Upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    /// System-level error (ledger I/O, internal errors, etc.).
    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Failures declared by an upstream service.
///
/// These carry the upstream's own characterization of the failure; the
/// message text is preserved verbatim because busy-condition detection
/// matches on it.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream is down or unreachable.
    #[error("Upstream outage: {0}")]
    Outage(String),

    /// An intermediary timed out waiting for the upstream.
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// The upstream declared itself temporarily unavailable.
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// The upstream rejected the submission for this identity.
    #[error("Submission rejected: {0}")]
    Rejected(String),

    /// The upstream returned a fault the client cannot characterize.
    #[error("Upstream fault: {0}")]
    Fault(String),
}

impl UpstreamError {
    /// The upstream's message text, verbatim
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Outage(msg)
            | Self::GatewayTimeout(msg)
            | Self::Unavailable(msg)
            | Self::Rejected(msg)
            | Self::Fault(msg) => msg,
        }
    }
}

/// System-level errors that indicate internal problems.
#[derive(Debug, Error)]
pub enum SystemError {
    /// Record not found in the ledger.
    #[error("Record not found: {0}")]
    RecordNotFound(SubmissionId),

    /// Ledger read or write failed.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Submission processor not initialized.
    #[error("Submission processor not initialized: {0}")]
    NotInitialized(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Other internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubmitError {
    /// Returns `true` if this error came from an upstream service.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Returns `true` if this is a system error.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }
}

impl From<LedgerError> for SubmitError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::NotFound(id) => Self::System(SystemError::RecordNotFound(id)),
            other => Self::System(SystemError::Ledger(other.to_string())),
        }
    }
}
