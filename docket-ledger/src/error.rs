//! Error types for the docket-ledger crate.
//!
//! This module provides typed error handling for ledger operations including
//! file I/O, serialization, validation, and the optimistic-concurrency
//! contract.

use std::io;

use thiserror::Error;

use docket_common::record::SubmissionId;

/// Top-level ledger error type.
///
/// All ledger operations return this error type, which categorizes failures
/// into I/O, serialization, validation, and logical errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// I/O operation failed (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Record not found in the ledger.
    #[error("Record not found: {0}")]
    NotFound(SubmissionId),

    /// Record already exists in the ledger.
    #[error("Record already exists: {0}")]
    AlreadyExists(SubmissionId),

    /// The record was modified since it was read; the caller holds a
    /// stale copy and must reload before mutating.
    #[error("Version conflict on {id}: held version {held}, stored version {stored}")]
    VersionConflict {
        id: SubmissionId,
        held: u64,
        stored: u64,
    },

    /// Ledger directory validation failed.
    #[error("Ledger validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode serialization failed.
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Bincode deserialization failed.
    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Invalid record format (corrupted data).
    #[error("Invalid record format: {0}")]
    InvalidFormat(String),
}

/// Ledger directory validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Ledger path contains parent-directory components.
    #[error("Ledger path cannot contain '..' components: {0}")]
    Traversal(String),

    /// Ledger path is not absolute.
    #[error("Ledger path must be absolute: {0}")]
    NotAbsolute(String),

    /// Ledger path points into a system directory.
    #[error("Ledger path cannot be in system directory {prefix}: {path}")]
    SystemDirectory { prefix: &'static str, path: String },

    /// Ledger path exists but is not a directory.
    #[error("Ledger path is not a directory: {0}")]
    NotDirectory(String),
}

/// Specialized `Result` type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for LedgerError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let ledger_err: LedgerError = io_err.into();
        assert!(matches!(ledger_err, LedgerError::Io(_)));
    }

    #[test]
    fn test_error_chain() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let ledger_err = LedgerError::from(io_err);

        assert!(matches!(ledger_err, LedgerError::Io(_)));
        assert!(ledger_err.to_string().contains("access denied"));
    }

    #[test]
    fn test_version_conflict_display() {
        let err = LedgerError::VersionConflict {
            id: SubmissionId::generate(),
            held: 3,
            stored: 5,
        };
        let text = err.to_string();
        assert!(text.contains("held version 3"));
        assert!(text.contains("stored version 5"));
    }
}
