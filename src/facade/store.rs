use super::form::RecordForm;
use crate::cache::QueryCache;
use crate::config::SyncConfig;
use crate::core::{Record, Result};
use crate::mutation::MutationExecutor;
use crate::storage::{PersistenceAdapter, RecordRepository};
use std::sync::Arc;
use tracing::info;

/// Process-scoped wiring of adapter, repository and query cache.
///
/// Built once at startup and shared by reference; every form opened from it
/// observes the same cache.
///
/// # Examples
///
/// ```
/// # use recordsync::{RecordStore, SyncConfig};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> recordsync::Result<()> {
/// let store = RecordStore::open(SyncConfig::default())?;
/// let mut form = store.form()?;
///
/// form.set_price(100.0);
/// form.set_quantity(2.0);
/// assert_eq!(form.total(), 200.0);
///
/// form.submit().await?;
/// assert_eq!(form.settled_rows().await?.len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct RecordStore {
    config: SyncConfig,
    repository: RecordRepository,
    cache: QueryCache<Vec<Record>>,
}

impl RecordStore {
    /// Open the store described by `config`
    pub fn open(config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let adapter = config.build_adapter()?;
        Self::with_adapter(config, adapter)
    }

    /// Open over an explicitly supplied adapter
    pub fn with_adapter(config: SyncConfig, adapter: Arc<dyn PersistenceAdapter>) -> Result<Self> {
        config.validate()?;
        let repository = RecordRepository::new(adapter, &config.storage_key, config.seed.clone());
        let cache = QueryCache::new();

        let fetch_repo = repository.clone();
        cache.register_fn(&config.storage_key, move || {
            let repo = fetch_repo.clone();
            async move { repo.fetch_all().await }
        })?;

        info!(
            key = %config.storage_key,
            data_dir = ?config.data_dir,
            durability = ?config.durability,
            "record store opened"
        );
        Ok(Self {
            config,
            repository,
            cache,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn key(&self) -> &str {
        &self.config.storage_key
    }

    pub fn cache(&self) -> &QueryCache<Vec<Record>> {
        &self.cache
    }

    pub fn repository(&self) -> &RecordRepository {
        &self.repository
    }

    /// Executor that appends through the repository
    pub fn executor(&self) -> MutationExecutor<Record> {
        let repo = self.repository.clone();
        MutationExecutor::from_fn(self.cache.clone(), self.key(), move |record| {
            let repo = repo.clone();
            async move { repo.append(record).await }
        })
    }

    /// New entry form observing this store's record list
    pub fn form(&self) -> Result<RecordForm> {
        let subscription = self.cache.subscribe(self.key())?;
        Ok(RecordForm::new(subscription, self.executor()))
    }
}
