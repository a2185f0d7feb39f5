//! File-backed persistence adapter for recordsync

use super::PersistenceAdapter;
use crate::core::{Record, Result, SyncError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// ============================================================================
// Durability / Format Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum DurabilityMode {
    /// fsync every write before it is renamed into place
    Sync,
    #[default]
    Async,
    /// Nothing reaches disk; the store lives in memory only
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum StorageFormat {
    #[default]
    Json,
    /// MessagePack for compact binary serialization
    MessagePack,
}

impl StorageFormat {
    fn extension(self) -> &'static str {
        match self {
            StorageFormat::Json => "json",
            StorageFormat::MessagePack => "msgpack",
        }
    }

    fn encode(self, records: &[Record]) -> Result<Vec<u8>> {
        match self {
            StorageFormat::Json => Ok(serde_json::to_vec_pretty(records)?),
            StorageFormat::MessagePack => Ok(rmp_serde::to_vec(records)?),
        }
    }

    fn decode(self, data: &[u8]) -> Result<Vec<Record>> {
        match self {
            StorageFormat::Json => Ok(serde_json::from_slice(data)?),
            StorageFormat::MessagePack => Ok(rmp_serde::from_slice(data)?),
        }
    }
}

// ============================================================================
// File Adapter
// ============================================================================

/// One file per key under `data_dir`, replaced atomically on every write.
pub struct FileAdapter {
    data_dir: PathBuf,
    format: StorageFormat,
    durability_mode: DurabilityMode,
}

impl FileAdapter {
    pub fn new<P: AsRef<Path>>(
        data_dir: P,
        format: StorageFormat,
        durability_mode: DurabilityMode,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| {
            SyncError::Storage(format!("Failed to create data directory: {}", e))
        })?;
        Ok(Self {
            data_dir,
            format,
            durability_mode,
        })
    }

    /// Path of the file holding `key`.
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so distinct keys
    /// always land in distinct files inside `data_dir`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut file_stem = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                file_stem.push(byte as char);
            } else {
                file_stem.push_str(&format!("%{:02X}", byte));
            }
        }
        self.data_dir
            .join(format!("{}.{}", file_stem, self.format.extension()))
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }

    fn load(path: &Path, format: StorageFormat) -> Result<Option<Vec<Record>>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(path)
            .map_err(|e| SyncError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
        format.decode(&data).map(Some)
    }

    fn store(
        dir: &Path,
        path: &Path,
        bytes: &[u8],
        durability_mode: DurabilityMode,
    ) -> Result<()> {
        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| SyncError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(bytes)
            .map_err(|e| SyncError::Storage(format!("Failed to write records: {}", e)))?;
        temp.flush()
            .map_err(|e| SyncError::Storage(format!("Failed to flush records: {}", e)))?;
        if durability_mode == DurabilityMode::Sync {
            temp.as_file()
                .sync_all()
                .map_err(|e| SyncError::Storage(format!("Failed to sync records: {}", e)))?;
        }
        temp.persist(path)
            .map_err(|e| SyncError::Storage(format!("Failed to rename records file: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceAdapter for FileAdapter {
    async fn get(&self, key: &str) -> Result<Option<Vec<Record>>> {
        let path = self.path_for(key);
        let format = self.format;
        tokio::task::spawn_blocking(move || Self::load(&path, format))
            .await
            .map_err(|e| SyncError::Storage(format!("Read task failed: {}", e)))?
    }

    async fn set(&self, key: &str, records: &[Record]) -> Result<()> {
        let bytes = self.format.encode(records)?;
        let dir = self.data_dir.clone();
        let path = self.path_for(key);
        let durability_mode = self.durability_mode;
        tokio::task::spawn_blocking(move || Self::store(&dir, &path, &bytes, durability_mode))
            .await
            .map_err(|e| SyncError::Storage(format!("Write task failed: {}", e)))?
    }
}
