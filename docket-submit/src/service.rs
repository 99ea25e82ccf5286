//! Service trait abstraction for submission queries
//!
//! This module provides a trait abstraction to decouple operator-facing
//! interfaces from the concrete `SubmissionProcessor` implementation.

use docket_common::record::{SubmissionId, SubmissionRecord};

use crate::processor::SubmissionProcessor;

/// Service trait for querying submission state
///
/// This trait provides an abstraction layer between operator interfaces
/// (status endpoints, admin tooling) and the submission processor. It is
/// read-only on purpose: record state only changes through the processor's
/// own lifecycle transitions, never through a query surface.
pub trait SubmissionQueryService: Send + Sync {
    /// Get the number of records in the working set
    fn queue_len(&self) -> usize;

    /// Get the working-set copy of a specific record
    ///
    /// Returns `None` if the record is not in the working set. The copy
    /// may trail the ledger by up to one dispatch cycle.
    fn get_record(&self, id: &SubmissionId) -> Option<SubmissionRecord>;

    /// List all records in the working set, optionally filtered by state
    ///
    /// `state` matches the record state's wire label (e.g. `pending`,
    /// `delivered`). An unrecognized label matches nothing.
    fn list_records(&self, state: Option<&str>) -> Vec<SubmissionRecord>;

    /// Count records in the working set by state
    ///
    /// Returns `(pending, in_flight, delivered, exhausted_pending_fallback,
    /// failed)`.
    fn stats(&self) -> (u64, u64, u64, u64, u64);
}

impl SubmissionQueryService for SubmissionProcessor {
    fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn get_record(&self, id: &SubmissionId) -> Option<SubmissionRecord> {
        self.queue.get(id)
    }

    fn list_records(&self, state: Option<&str>) -> Vec<SubmissionRecord> {
        self.queue
            .all_records()
            .into_iter()
            .filter(|record| state.is_none_or(|label| record.state().label() == label))
            .collect()
    }

    fn stats(&self) -> (u64, u64, u64, u64, u64) {
        self.queue.counts_by_state()
    }
}
