use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;

use docket_common::{
    internal,
    record::{SubmissionId, SubmissionRecord},
};

use crate::{LedgerError, SerializationError, ValidationError, store::RecordStore};

/// File-based ledger implementation
///
/// Stores each submission record as one file in a directory, named by the
/// record's ULID: `{submission_id}.rec`, serialized with bincode. ULIDs
/// encode both timestamp and randomness, so filenames are globally unique
/// and lexicographically sortable by creation time.
///
/// # Security
/// - Uses atomic writes (write to temp file, then rename) to prevent
///   corruption
/// - Validates all filename components to prevent path traversal
/// - Only reads files matching the expected naming pattern (valid ULIDs)
///
/// # Atomicity
/// All writes use the "write to temp, then rename" pattern so a crash
/// mid-write never leaves a half-written record visible. Updates
/// additionally serialize through an async mutex so the version
/// compare-and-swap is atomic with respect to other updaters on this
/// store instance.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Default for FileRecordStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/docket/ledger"),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

// Custom Deserialize implementation with path validation
impl<'de> Deserialize<'de> for FileRecordStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FileRecordStoreHelper {
            path: PathBuf,
        }

        let helper = FileRecordStoreHelper::deserialize(deserializer)?;
        Self::validate_path(&helper.path).map_err(serde::de::Error::custom)?;

        Ok(Self {
            path: helper.path,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }
}

impl FileRecordStore {
    /// Create a store rooted at `path`
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous.
    pub fn new(path: PathBuf) -> crate::Result<Self> {
        Self::validate_path(&path)?;
        Ok(Self {
            path,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// The directory records are stored in
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate a ledger path for security
    ///
    /// # Security Checks
    /// - Rejects paths containing `..` (directory traversal)
    /// - Rejects paths to sensitive system directories
    /// - Ensures the path is absolute
    fn validate_path(path: &Path) -> Result<(), ValidationError> {
        for component in path.components() {
            if component == std::path::Component::ParentDir {
                return Err(ValidationError::Traversal(path.display().to_string()));
            }
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.display().to_string()));
        }

        let sensitive_prefixes = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        for prefix in &sensitive_prefixes {
            if path.starts_with(prefix) {
                return Err(ValidationError::SystemDirectory {
                    prefix,
                    path: path.display().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Initialize the file-backed ledger
    ///
    /// Creates the ledger directory if it doesn't exist and validates that
    /// the path is actually a directory. Should be called during startup to
    /// fail fast on permission issues.
    ///
    /// # Errors
    /// - If the ledger path cannot be created
    /// - If the path exists but is not a directory
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising ledger ...");

        let path = Path::new(&self.path);
        if !path.try_exists()? {
            internal!("{:#?} does not exist, creating...", self.path);
            std::fs::create_dir_all(path)?;
        } else if !path.is_dir() {
            return Err(
                ValidationError::NotDirectory(path.display().to_string()).into(),
            );
        }

        self.cleanup_temp_files()?;

        Ok(())
    }

    /// Remove orphaned `.tmp_` files from writes interrupted by a crash
    fn cleanup_temp_files(&self) -> crate::Result<()> {
        let entries = std::fs::read_dir(&self.path)?;
        let mut cleaned = 0;

        for entry in entries {
            let entry = entry?;
            let filename = entry.file_name();
            if filename.to_string_lossy().starts_with(".tmp_") {
                std::fs::remove_file(entry.path())?;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} orphaned temp files from ledger"
            );
        }

        Ok(())
    }

    fn record_path(&self, id: &SubmissionId) -> PathBuf {
        self.path.join(id.filename())
    }

    /// Atomically write a record: temp file first, then rename
    async fn write_record(&self, record: &SubmissionRecord) -> crate::Result<()> {
        let filename = record.id().filename();
        let final_path = self.path.join(&filename);
        let temp_path = self.path.join(format!(".tmp_{filename}"));

        let bytes = bincode::serde::encode_to_vec(record, bincode::config::standard())
            .map_err(SerializationError::from)?;

        fs::write(&temp_path, &bytes).await?;
        fs::rename(&temp_path, &final_path).await?;

        Ok(())
    }

    async fn read_record(&self, id: &SubmissionId) -> crate::Result<SubmissionRecord> {
        let path = self.record_path(id);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let (record, _) = bincode::serde::decode_from_slice::<SubmissionRecord, _>(
            &bytes,
            bincode::config::standard(),
        )
        .map_err(SerializationError::from)?;

        Ok(record)
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn insert(&self, record: &SubmissionRecord) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;

        let path = self.record_path(record.id());
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Err(LedgerError::AlreadyExists(record.id().clone()));
        }

        self.write_record(record).await?;

        internal!(
            level = DEBUG,
            "Inserted record {} into ledger",
            record.id()
        );

        Ok(())
    }

    async fn load(&self, id: &SubmissionId) -> crate::Result<SubmissionRecord> {
        self.read_record(id).await
    }

    async fn update(&self, record: &mut SubmissionRecord) -> crate::Result<()> {
        // Version check and write must be atomic with respect to other
        // updaters on this store.
        let _guard = self.write_lock.lock().await;

        let stored = self.read_record(record.id()).await?;

        if stored.version() != record.version() {
            return Err(LedgerError::VersionConflict {
                id: record.id().clone(),
                held: record.version(),
                stored: stored.version(),
            });
        }

        record.bump_version();
        self.write_record(record).await?;

        Ok(())
    }

    /// List all records in the ledger directory
    ///
    /// Scans for `.rec` files and parses their filenames. Temp files and
    /// anything that is not a valid ULID filename is skipped;
    /// `SubmissionId::from_filename` rejects path-traversal shapes.
    async fn list(&self) -> crate::Result<Vec<SubmissionId>> {
        let mut entries = fs::read_dir(&self.path).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name();
            let filename_str = filename.to_string_lossy();

            if !filename_str.starts_with(".tmp_")
                && let Some(id) = SubmissionId::from_filename(&filename_str)
            {
                ids.push(id);
            }
        }

        // ULIDs are lexicographically sortable by creation time
        ids.sort();

        internal!(level = DEBUG, "Found {} records in ledger", ids.len());

        Ok(ids)
    }
}
