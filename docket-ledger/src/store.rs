//! The `RecordStore` trait: the persistence seam for submission records.

use async_trait::async_trait;

use docket_common::record::{SubmissionId, SubmissionRecord};

use crate::Result;

/// Durable storage for submission records
///
/// Records are never deleted: every record that enters the ledger reaches a
/// terminal state and stays readable as the audit trail. Implementations
/// must be safe to share behind an `Arc` across tasks.
///
/// # Optimistic concurrency
///
/// Every record carries a `version` stamp. [`RecordStore::update`] compares
/// the caller's held version with the stored one and rejects the write with
/// [`crate::LedgerError::VersionConflict`] when they differ. On success the
/// store bumps the version, both in the stored copy and in the caller's
/// record, so the caller can keep mutating the same instance.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Insert a new record
    ///
    /// # Errors
    /// Returns [`crate::LedgerError::AlreadyExists`] if a record with this
    /// id is already stored.
    async fn insert(&self, record: &SubmissionRecord) -> Result<()>;

    /// Load a record by id
    ///
    /// # Errors
    /// Returns [`crate::LedgerError::NotFound`] if no such record exists.
    async fn load(&self, id: &SubmissionId) -> Result<SubmissionRecord>;

    /// Persist a mutation, guarded by the version stamp
    ///
    /// # Errors
    /// Returns [`crate::LedgerError::VersionConflict`] if the stored record
    /// changed since the caller read it, and
    /// [`crate::LedgerError::NotFound`] if the record does not exist.
    async fn update(&self, record: &mut SubmissionRecord) -> Result<()>;

    /// List all record ids, sorted by creation time (ULID order)
    async fn list(&self) -> Result<Vec<SubmissionId>>;
}
