use crate::core::{Record, Result};
use async_trait::async_trait;

/// Key-value persistence adapter - allows pluggable storage backends
///
/// Holds whole record lists under string keys. Implementations carry no domain
/// logic of their own; last write wins.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Load the list stored under `key`, or `None` if it was never written
    async fn get(&self, key: &str) -> Result<Option<Vec<Record>>>;

    /// Replace the list stored under `key`
    async fn set(&self, key: &str, records: &[Record]) -> Result<()>;
}
