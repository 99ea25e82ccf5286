//! Payload preparation: turning a claim into an upstream-ready payload.

use async_trait::async_trait;

use docket_common::{claimant::ClaimantProfile, record::ClaimReference};

use crate::error::UpstreamError;

/// An upstream-ready submission payload
#[derive(Debug, Clone)]
pub struct SubmissionPayload {
    /// Form type identifier, e.g. `21-526EZ`
    pub form_id: String,
    /// Claimant fields the upstream and notifications need
    pub claimant: ClaimantProfile,
    /// Encoded form body, opaque to the orchestrator
    pub body: Vec<u8>,
}

/// Builds the upstream payload for a claim.
///
/// Preparation runs before every attempt rather than once at enqueue:
/// a payload can embed attempt-variant data (timestamps, the identity in
/// use), and a claim stored by reference may change shape between retries
/// that are days apart. A preparation failure counts as a failed attempt
/// with no upstream call made, and is classified exactly like a
/// submission-stage failure.
#[async_trait]
pub trait PreparationService: Send + Sync + std::fmt::Debug {
    /// Build the payload for one attempt
    ///
    /// Must be side-effect-idempotent: it is called once per attempt.
    ///
    /// # Errors
    /// Returns a classifiable failure if the claim cannot be loaded,
    /// validated, or encoded.
    async fn prepare(&self, claim_ref: &ClaimReference)
    -> Result<SubmissionPayload, UpstreamError>;
}
