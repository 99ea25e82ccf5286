//! Durable submission-record ledger.
//!
//! Every submission record that enters the system is written here and kept
//! for good: records reach a terminal state, they are never deleted. The
//! [`store::RecordStore`] trait is the seam; the [`backends`] module holds
//! a file-backed production store and an in-memory store for testing.

pub mod backends;
pub mod config;
pub mod error;
pub mod store;

pub use backends::{FileRecordStore, MemoryRecordStore};
pub use config::{LedgerConfig, MemoryConfig};
pub use error::{LedgerError, Result, SerializationError, ValidationError};
pub use store::RecordStore;
