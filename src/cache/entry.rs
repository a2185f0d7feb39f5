use crate::core::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Loading,
    Success,
    Error,
}

/// Point-in-time view of one cached query.
///
/// Callers only ever hold copies; the live entry stays inside the cache store.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub key: String,
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<SyncError>,
    /// Bumped on every successful fetch, patch or `set_data`.
    pub version: u64,
    /// Marked by `invalidate`; a refetch is due on the next read.
    pub stale: bool,
    pub is_fetching: bool,
    /// Informational only. Staleness is decided by `version`, never by time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Project the cached data, keeping status and bookkeeping intact
    pub fn select<U, F>(&self, selector: F) -> CacheEntry<U>
    where
        F: FnOnce(&T) -> U,
    {
        CacheEntry {
            key: self.key.clone(),
            status: self.status,
            data: self.data.as_ref().map(selector),
            error: self.error.clone(),
            version: self.version,
            stale: self.stale,
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

impl<T: Clone + Default> CacheEntry<T> {
    /// Cached data, or `T::default()` while nothing has loaded yet
    pub fn data_or_default(&self) -> T {
        self.data.clone().unwrap_or_default()
    }
}
