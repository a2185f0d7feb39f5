use super::PersistenceAdapter;
use crate::core::{Record, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Record list stored under one adapter key, with seed rows for a fresh store.
///
/// `fetch_all` and `append` are the fetch and write functions handed to the
/// query cache and the mutation executor. Clones share one write lock, so
/// appends from different forms never interleave their read-modify-write.
#[derive(Clone)]
pub struct RecordRepository {
    adapter: Arc<dyn PersistenceAdapter>,
    key: String,
    seed: Vec<Record>,
    write_lock: Arc<Mutex<()>>,
}

impl RecordRepository {
    pub fn new(adapter: Arc<dyn PersistenceAdapter>, key: &str, seed: Vec<Record>) -> Self {
        Self {
            adapter,
            key: key.to_string(),
            seed,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored records, or the seed rows if nothing was ever stored
    pub async fn fetch_all(&self) -> Result<Vec<Record>> {
        match self.adapter.get(&self.key).await? {
            Some(records) => Ok(records),
            None => {
                debug!(key = %self.key, "store empty, serving seed records");
                Ok(self.seed.clone())
            }
        }
    }

    /// Append `record` to the stored list
    pub async fn append(&self, record: Record) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.fetch_all().await?;
        records.push(record);
        self.adapter.set(&self.key, &records).await
    }
}
