//! Error classification for submission attempts.
//!
//! Every failed attempt is classified exactly once, at the point the error
//! is caught, into an [`ErrorKind`] that drives all downstream routing:
//! retry under the same identity, identity fallback, or final failure.
//! Nothing else in the pipeline inspects error message text.

use serde::{Deserialize, Serialize};

use docket_common::record::ErrorKind;

use crate::error::UpstreamError;

/// Classifies upstream errors into routing kinds.
///
/// Classification rules, in order:
/// 1. If the error message contains any configured busy phrase, the kind
///    is [`ErrorKind::UpstreamBusy`], regardless of the declared failure
///    kind. Some upstreams report the busy condition inside an otherwise
///    generic fault, so the phrase check runs first.
/// 2. Otherwise the declared kind decides: outages, gateway timeouts, and
///    declared unavailability are [`ErrorKind::Transient`]; explicit
///    rejections are [`ErrorKind::PermanentReject`].
/// 3. Uncharacterized faults are [`ErrorKind::Unknown`], which routes like
///    a permanent rejection. Failing closed means an unclassified error
///    can never loop through the retry budget unnoticed; the cost is that
///    a genuinely transient unclassified error skips its retries.
///
/// Phrase matching is a case-sensitive substring match: the phrases are
/// copied verbatim from upstream documentation, and the upstreams emit
/// them with stable casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorClassifier {
    /// Message fragments that identify the shared-slot busy condition
    #[serde(default = "defaults::busy_phrases")]
    pub busy_phrases: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            busy_phrases: defaults::busy_phrases(),
        }
    }
}

impl ErrorClassifier {
    /// Classify an upstream error into a routing kind
    #[must_use]
    pub fn classify(&self, error: &UpstreamError) -> ErrorKind {
        let message = error.message();

        if self
            .busy_phrases
            .iter()
            .any(|phrase| message.contains(phrase.as_str()))
        {
            return ErrorKind::UpstreamBusy;
        }

        match error {
            UpstreamError::Outage(_)
            | UpstreamError::GatewayTimeout(_)
            | UpstreamError::Unavailable(_) => ErrorKind::Transient,
            UpstreamError::Rejected(_) => ErrorKind::PermanentReject,
            UpstreamError::Fault(_) => ErrorKind::Unknown,
        }
    }
}

mod defaults {
    pub fn busy_phrases() -> Vec<String> {
        vec!["PIF in use".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_kinds() {
        let classifier = ErrorClassifier::default();

        assert_eq!(
            classifier.classify(&UpstreamError::Outage("connection refused".to_string())),
            ErrorKind::Transient
        );
        assert_eq!(
            classifier.classify(&UpstreamError::GatewayTimeout("504".to_string())),
            ErrorKind::Transient
        );
        assert_eq!(
            classifier.classify(&UpstreamError::Unavailable("maintenance window".to_string())),
            ErrorKind::Transient
        );
        assert_eq!(
            classifier.classify(&UpstreamError::Rejected("invalid claimant".to_string())),
            ErrorKind::PermanentReject
        );
    }

    #[test]
    fn test_unclassified_fault_fails_closed() {
        let classifier = ErrorClassifier::default();
        let kind = classifier.classify(&UpstreamError::Fault("something odd".to_string()));
        assert_eq!(kind, ErrorKind::Unknown);
        assert!(!kind.retries_same_identity());
    }

    #[test]
    fn test_busy_phrase_wins_over_declared_kind() {
        let classifier = ErrorClassifier::default();

        // Even a declared-transient error carrying the busy phrase is busy
        assert_eq!(
            classifier.classify(&UpstreamError::Unavailable(
                "PIF in use for this participant".to_string()
            )),
            ErrorKind::UpstreamBusy
        );
        assert_eq!(
            classifier.classify(&UpstreamError::Fault(
                "fault: PIF in use for this participant".to_string()
            )),
            ErrorKind::UpstreamBusy
        );
    }

    #[test]
    fn test_phrase_match_is_case_sensitive() {
        let classifier = ErrorClassifier::default();
        assert_eq!(
            classifier.classify(&UpstreamError::Rejected("pif in use".to_string())),
            ErrorKind::PermanentReject
        );
    }

    #[test]
    fn test_custom_phrases() {
        let classifier = ErrorClassifier {
            busy_phrases: vec!["slot locked".to_string(), "record checked out".to_string()],
        };

        assert_eq!(
            classifier.classify(&UpstreamError::Rejected(
                "record checked out by another user".to_string()
            )),
            ErrorKind::UpstreamBusy
        );
        assert_eq!(
            classifier.classify(&UpstreamError::Rejected("PIF in use".to_string())),
            ErrorKind::PermanentReject,
            "default phrases are replaced, not merged"
        );
    }
}
