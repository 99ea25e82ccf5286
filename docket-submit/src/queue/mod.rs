//! Submission queue management

pub mod backoff;

use std::sync::Arc;

use dashmap::DashMap;

use docket_common::record::{SubmissionId, SubmissionRecord, SubmissionState};

/// In-memory working set of submission records
///
/// The queue is a cache over the ledger: the ledger is the source of
/// truth, the queue is what the scheduler iterates. Records are synced
/// into the queue after every persisted mutation.
#[derive(Debug, Clone)]
pub struct SubmissionQueue {
    /// Map of record IDs to records (lock-free concurrent access)
    pub(crate) queue: Arc<DashMap<SubmissionId, SubmissionRecord>>,
}

impl Default for SubmissionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionQueue {
    /// Create a new empty submission queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace a record in the working set
    pub fn sync(&self, record: SubmissionRecord) {
        self.queue.insert(record.id().clone(), record);
    }

    /// Get a record by id
    pub fn get(&self, id: &SubmissionId) -> Option<SubmissionRecord> {
        self.queue.get(id).map(|entry| entry.value().clone())
    }

    /// Check whether a record is in the working set
    pub fn contains(&self, id: &SubmissionId) -> bool {
        self.queue.contains_key(id)
    }

    /// Remove a record from the working set
    pub fn remove(&self, id: &SubmissionId) -> Option<SubmissionRecord> {
        self.queue.remove(id).map(|(_, record)| record)
    }

    /// Get the number of records in the working set
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the working set is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get all records in the working set
    pub fn all_records(&self) -> Vec<SubmissionRecord> {
        self.queue
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Count records per state label
    ///
    /// Returns `(pending, in_flight, delivered, exhausted, failed)`.
    pub fn counts_by_state(&self) -> (u64, u64, u64, u64, u64) {
        let mut counts = (0, 0, 0, 0, 0);
        for entry in self.queue.iter() {
            match entry.value().state() {
                SubmissionState::Pending => counts.0 += 1,
                SubmissionState::InFlight => counts.1 += 1,
                SubmissionState::Delivered => counts.2 += 1,
                SubmissionState::ExhaustedPendingFallback => counts.3 += 1,
                SubmissionState::Failed(_) => counts.4 += 1,
            }
        }
        counts
    }
}
