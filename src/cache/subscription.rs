use super::entry::CacheEntry;
use super::store::QueryCache;
use crate::core::Result;

/// Observer handle for one cache key; dropping it releases the observation.
pub struct Subscription<T> {
    cache: QueryCache<T>,
    key: String,
}

impl<T> Subscription<T> {
    pub(crate) fn new(cache: QueryCache<T>, key: &str) -> Self {
        Self {
            cache,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn read(&self) -> Result<CacheEntry<T>> {
        self.cache.read(&self.key)
    }

    pub async fn settled(&self) -> Result<CacheEntry<T>> {
        self.cache.settled(&self.key).await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
