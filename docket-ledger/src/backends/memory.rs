use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use docket_common::record::{SubmissionId, SubmissionRecord};

use crate::{LedgerError, store::RecordStore};

/// In-memory ledger implementation
///
/// Stores records in a `HashMap` protected by an `RwLock`. Primarily
/// intended for testing, but usable for transient workloads where the
/// audit trail does not need to survive a restart.
///
/// # Capacity Management
/// The store can be configured with a maximum capacity to prevent unbounded
/// memory growth. When capacity is reached, inserts fail with an error.
///
/// # Concurrency
/// Uses an `RwLock` for interior mutability; the version check and the
/// write happen under one write lock, so updates are atomic. Locks recover
/// from poisoning by taking the inner data.
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<SubmissionId, SubmissionRecord>>>,
    /// Maximum number of records to store (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryRecordStore {
    /// Create a new empty in-memory ledger with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            capacity: None,
        }
    }

    /// Create a new in-memory ledger with a capacity limit
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            capacity: Some(capacity),
        }
    }

    /// Get the current number of records in the ledger
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the
    /// underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the ledger is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured capacity (None = unlimited)
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &SubmissionRecord) -> crate::Result<()> {
        let mut records = self.records.write()?;

        if records.contains_key(record.id()) {
            return Err(LedgerError::AlreadyExists(record.id().clone()));
        }

        if let Some(cap) = self.capacity
            && records.len() >= cap
        {
            return Err(LedgerError::Internal(format!(
                "Memory ledger capacity exceeded: {}/{cap} records",
                records.len(),
            )));
        }

        records.insert(record.id().clone(), record.clone());
        Ok(())
    }

    async fn load(&self, id: &SubmissionId) -> crate::Result<SubmissionRecord> {
        self.records
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    async fn update(&self, record: &mut SubmissionRecord) -> crate::Result<()> {
        let mut records = self.records.write()?;

        let stored = records
            .get(record.id())
            .ok_or_else(|| LedgerError::NotFound(record.id().clone()))?;

        if stored.version() != record.version() {
            return Err(LedgerError::VersionConflict {
                id: record.id().clone(),
                held: record.version(),
                stored: stored.version(),
            });
        }

        record.bump_version();
        records.insert(record.id().clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> crate::Result<Vec<SubmissionId>> {
        let mut ids: Vec<_> = self.records.read()?.keys().cloned().collect();

        // ULIDs are lexicographically sortable by creation time
        ids.sort();

        Ok(ids)
    }
}
