//! Local filesystem storage implementation.
//!
//! Every write goes to a sibling temp file first and is renamed into place,
//! so a file is either the previous version or the new one. Nothing spans
//! more than one file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Record, Snapshot, SourceDescriptor, SourceTable};
use crate::storage::{MemoryLog, RecordStorage, table};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordStorage for LocalStorage {
    async fn load_log(&self, key: &str) -> Result<MemoryLog> {
        let Some(bytes) = self.read_bytes(key).await? else {
            log::info!("No memory log at {}, starting empty", key);
            return Ok(MemoryLog::new());
        };

        let rows = table::decode(&bytes, key)?;
        let row_count = rows.len();
        let log = MemoryLog::from_records(rows);
        if log.len() < row_count {
            log::warn!(
                "{}: collapsed {} duplicate rows",
                key,
                row_count - log.len()
            );
        }
        Ok(log)
    }

    async fn persist_log(&self, key: &str, log: &MemoryLog) -> Result<()> {
        let bytes = table::encode(log.records_sorted())?;
        self.write_bytes(key, &bytes).await?;
        log::debug!("Wrote {} records to {}", log.len(), key);
        Ok(())
    }

    async fn write_records(&self, key: &str, records: &[Record]) -> Result<()> {
        let bytes = table::encode(records)?;
        self.write_bytes(key, &bytes).await
    }

    async fn write_snapshot(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        self.write_json(key, snapshot).await
    }

    async fn read_snapshot(&self, key: &str) -> Result<Option<Snapshot>> {
        self.read_json(key).await
    }

    async fn load_sources(&self, key: &str) -> Result<SourceTable> {
        let bytes = self.read_bytes(key).await?.ok_or_else(|| {
            AppError::config(format!(
                "Source table not found: {}",
                self.path(key).display()
            ))
        })?;
        SourceDescriptor::parse_table(&String::from_utf8_lossy(&bytes))
    }
}
