use std::sync::Arc;

use serde::Deserialize;

use crate::{backends::FileRecordStore, backends::MemoryRecordStore, store::RecordStore};

/// Configuration for the ledger backing store
///
/// Allows runtime selection of the store implementation through
/// configuration files.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerConfig {
    /// File-based ledger (production)
    File(FileRecordStore),
    /// Memory-based ledger (testing/development)
    ///
    /// Can optionally specify a capacity limit to prevent unbounded memory
    /// growth
    Memory(MemoryConfig),
}

/// Configuration for the memory-backed ledger
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemoryConfig {
    /// Maximum number of records to store (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::File(FileRecordStore::default())
    }
}

impl LedgerConfig {
    /// Get the filesystem path for file-backed ledgers, if applicable
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File(store) => Some(store.path()),
            Self::Memory(_) => None,
        }
    }

    /// Convert the configuration into a concrete record store
    ///
    /// For file-backed ledgers this creates the directory and fails fast on
    /// permission problems.
    ///
    /// # Errors
    /// Returns an error if file ledger initialization fails.
    pub fn into_store(self) -> crate::Result<Arc<dyn RecordStore>> {
        match self {
            Self::File(store) => {
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory(config) => Ok(config.capacity.map_or_else(
                || Arc::new(MemoryRecordStore::new()) as Arc<dyn RecordStore>,
                |capacity| Arc::new(MemoryRecordStore::with_capacity(capacity)),
            )),
        }
    }
}
