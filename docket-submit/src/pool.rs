//! Identity pool: selects the next untried candidate for fallback.

use docket_common::record::{IdentityKey, SubmissionRecord};

/// Chooses the next identity to fall back to.
///
/// Selection is deterministic: the first candidate in the record's
/// declared order that has not been tried and is not currently active.
/// The candidate list is append-only, so selection order is stable even
/// when candidates are added mid-flight.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierPool;

impl IdentifierPool {
    /// Find the next untried candidate identity for a record
    ///
    /// Returns `None` when every candidate has been spent, which is the
    /// signal to fail the record. The active identity is excluded even if
    /// it has not been marked tried yet, so calling this before
    /// `mark_active_identity_tried` cannot re-select the identity that
    /// just failed.
    #[must_use]
    pub fn next_untried(record: &SubmissionRecord) -> Option<IdentityKey> {
        record
            .candidate_identities()
            .iter()
            .find(|candidate| {
                !record.tried_identities().contains(candidate)
                    && *candidate != record.active_identity()
            })
            .cloned()
    }
}
