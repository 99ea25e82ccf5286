//! The upstream submission seam.

use async_trait::async_trait;

use docket_common::record::{IdentityKey, UpstreamClaimId};

use crate::{error::UpstreamError, prepare::SubmissionPayload};

/// Normalized response from a successful upstream submission
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Claim identifier assigned by the upstream on intake
    pub upstream_claim_id: UpstreamClaimId,
}

/// A claim-intake backend.
///
/// Implementations wrap one concrete upstream service and normalize its
/// transport-level responses into [`UpstreamResponse`] / [`UpstreamError`].
/// Which backend a processor submits to is selected by [`name`] at
/// initialization; implementations must be safe to share behind an `Arc`
/// across tasks.
///
/// [`name`]: UpstreamSubmitter::name
#[async_trait]
pub trait UpstreamSubmitter: Send + Sync + std::fmt::Debug {
    /// Submit a prepared payload under an identity key
    ///
    /// # Errors
    /// Returns the upstream's declared failure. Implementations must
    /// preserve upstream message text verbatim; busy-condition detection
    /// matches on it.
    async fn submit(
        &self,
        identity: &IdentityKey,
        payload: &SubmissionPayload,
    ) -> Result<UpstreamResponse, UpstreamError>;

    /// Stable configuration name for this backend (e.g. `"primary"`)
    fn name(&self) -> &str;
}
