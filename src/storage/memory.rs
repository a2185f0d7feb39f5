use super::PersistenceAdapter;
use crate::core::{Record, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local adapter, the analogue of browser local storage.
#[derive(Default)]
pub struct InMemoryAdapter {
    slots: RwLock<HashMap<String, Vec<Record>>>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter pre-populated with `records` under `key`
    pub fn with_records(key: &str, records: Vec<Record>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(key.to_string(), records);
        Self {
            slots: RwLock::new(slots),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.slots.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryAdapter {
    async fn get(&self, key: &str) -> Result<Option<Vec<Record>>> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, records: &[Record]) -> Result<()> {
        self.slots
            .write()
            .await
            .insert(key.to_string(), records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key() {
        let adapter = InMemoryAdapter::new();
        assert_eq!(adapter.get("formData").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let adapter = InMemoryAdapter::new();
        adapter.set("formData", &[Record::new(1.0, 1.0)]).await.unwrap();
        adapter.set("formData", &[Record::new(2.0, 3.0)]).await.unwrap();

        let stored = adapter.get("formData").await.unwrap().unwrap();
        assert_eq!(stored, vec![Record::new(2.0, 3.0)]);
        assert_eq!(adapter.keys().await, vec!["formData".to_string()]);
    }
}
