use crate::core::{Record, Result, SyncError, seed_records};
use crate::storage::{DurabilityMode, FileAdapter, InMemoryAdapter, PersistenceAdapter, StorageFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Record store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Adapter key the record list lives under; also the cache key
    pub storage_key: String,

    /// Rows served while the store has never been written
    pub seed: Vec<Record>,

    /// Directory for file-backed storage; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,

    pub durability: DurabilityMode,

    pub format: StorageFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_key: "formData".to_string(),
            seed: seed_records(),
            data_dir: None,
            durability: DurabilityMode::default(),
            format: StorageFormat::default(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage key
    pub fn storage_key(mut self, key: &str) -> Self {
        self.storage_key = key.to_string();
        self
    }

    /// Set the seed rows
    pub fn seed(mut self, seed: Vec<Record>) -> Self {
        self.seed = seed;
        self
    }

    /// Persist to files under `dir`
    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    pub fn format(mut self, format: StorageFormat) -> Self {
        self.format = format;
        self
    }

    /// Parse from a JSON document; missing fields take their defaults
    ///
    /// ```
    /// # use recordsync::SyncConfig;
    /// let config = SyncConfig::from_json(r#"{"storage_key": "orders", "seed": []}"#).unwrap();
    /// assert_eq!(config.storage_key, "orders");
    /// assert!(config.seed.is_empty());
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SyncError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(SyncError::Config("storage_key must not be empty".to_string()));
        }
        if let Some(bad) = self.seed.iter().find(|r| !r.is_consistent()) {
            return Err(SyncError::Config(format!(
                "seed record {:?} has a total that does not match price * quantity",
                bad
            )));
        }
        Ok(())
    }

    /// Adapter described by this configuration
    pub fn build_adapter(&self) -> Result<Arc<dyn PersistenceAdapter>> {
        match (&self.data_dir, self.durability) {
            (Some(dir), DurabilityMode::Sync | DurabilityMode::Async) => {
                Ok(Arc::new(FileAdapter::new(dir, self.format, self.durability)?))
            }
            _ => Ok(Arc::new(InMemoryAdapter::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.storage_key, "formData");
        assert_eq!(config.seed.len(), 2);
        assert_eq!(config.data_dir, None);
        assert_eq!(config.durability, DurabilityMode::Async);
        assert_eq!(config.format, StorageFormat::Json);
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::new()
            .storage_key("orders")
            .seed(vec![])
            .data_dir("/tmp/orders")
            .durability(DurabilityMode::Sync)
            .format(StorageFormat::MessagePack);
        assert_eq!(config.storage_key, "orders");
        assert!(config.seed.is_empty());
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/orders")));
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.format, StorageFormat::MessagePack);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(SyncConfig::from_json("{"), Err(SyncError::Config(_))));
        assert!(matches!(
            SyncConfig::from_json(r#"{"storage_key": " "}"#),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            SyncConfig::from_json(r#"{"seed": [{"price": 1, "quantity": 2, "total": 5}]}"#),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_from_json_accepts_rounded_seed_totals() {
        let config =
            SyncConfig::from_json(r#"{"seed": [{"price": 0.1, "quantity": 3, "total": 0.3}]}"#)
                .unwrap();
        assert_eq!(config.seed[0].total, 0.3);
    }

    #[tokio::test]
    async fn test_build_adapter_uses_files_when_durable() {
        let temp_dir = TempDir::new().unwrap();
        let config = SyncConfig::new().data_dir(temp_dir.path());
        let adapter = config.build_adapter().unwrap();
        adapter.set("formData", &[Record::new(1.0, 2.0)]).await.unwrap();
        assert!(temp_dir.path().join("formData.json").exists());

        let in_memory = SyncConfig::new()
            .data_dir(temp_dir.path())
            .durability(DurabilityMode::None)
            .build_adapter()
            .unwrap();
        in_memory.set("other", &[]).await.unwrap();
        assert!(!temp_dir.path().join("other.json").exists());
    }
}
