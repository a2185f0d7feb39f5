// ============================================================================
// Query Cache Store
// ============================================================================

use super::entry::{CacheEntry, QueryStatus};
use super::fetcher::{FnFetcher, QueryFetcher};
use super::subscription::Subscription;
use crate::core::{Result, SyncError};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, warn};

/// Shared handle to one running fetch; every reader of the key awaits the same one.
type Flight = Shared<BoxFuture<'static, ()>>;

struct InFlight {
    id: u64,
    handle: Flight,
}

struct Slot<T> {
    status: QueryStatus,
    data: Option<T>,
    error: Option<SyncError>,
    version: u64,
    stale: bool,
    updated_at: Option<DateTime<Utc>>,
    flight: Option<InFlight>,
    subscribers: usize,
}

impl<T> Slot<T> {
    fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            data: None,
            error: None,
            version: 0,
            stale: false,
            updated_at: None,
            flight: None,
            subscribers: 0,
        }
    }

    fn needs_fetch(&self) -> bool {
        if self.flight.is_some() {
            return false;
        }
        self.stale || (self.status == QueryStatus::Loading && self.data.is_none())
    }

    fn touch(&mut self) {
        self.status = QueryStatus::Success;
        self.error = None;
        self.version += 1;
        self.updated_at = Some(Utc::now());
    }
}

impl<T: Clone> Slot<T> {
    fn snapshot(&self, key: &str) -> CacheEntry<T> {
        CacheEntry {
            key: key.to_string(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            version: self.version,
            stale: self.stale,
            is_fetching: self.flight.is_some(),
            updated_at: self.updated_at,
        }
    }
}

/// Counters for cache activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    /// In-flight fetches dropped by `invalidate`
    pub fetches_abandoned: u64,
    /// Late responses rejected by the version guard
    pub responses_discarded: u64,
    pub patches: u64,
    pub invalidations: u64,
}

struct Inner<T> {
    slots: HashMap<String, Slot<T>>,
    fetchers: HashMap<String, Arc<dyn QueryFetcher<T>>>,
    next_flight_id: u64,
    stats: CacheStats,
}

/// Keyed cache of asynchronous query results.
///
/// Cloning yields another handle to the same store. All state sits behind one
/// non-async mutex that is never held across an `.await`, so a `patch` followed
/// by `invalidate` is observed by readers in exactly that order.
///
/// # Examples
///
/// ```
/// # use recordsync::QueryCache;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> recordsync::Result<()> {
/// let cache: QueryCache<Vec<u32>> = QueryCache::new();
/// cache.register_fn("numbers", || async { Ok(vec![1, 2, 3]) })?;
///
/// let entry = cache.settled("numbers").await?;
/// assert_eq!(entry.data, Some(vec![1, 2, 3]));
///
/// cache.patch("numbers", |mut numbers| {
///     numbers.push(4);
///     numbers
/// })?;
/// assert_eq!(cache.read("numbers")?.data, Some(vec![1, 2, 3, 4]));
/// # Ok(())
/// # }
/// ```
pub struct QueryCache<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                fetchers: HashMap::new(),
                next_flight_id: 1,
                stats: CacheStats::default(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<T>>> {
        Ok(self.inner.lock()?)
    }

    /// Drop one subscriber; the entry goes away with the last one
    pub(crate) fn release(&self, key: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!(key, "cache lock poisoned; subscriber not released");
            return;
        };
        let last = match inner.slots.get_mut(key) {
            Some(slot) => {
                slot.subscribers = slot.subscribers.saturating_sub(1);
                slot.subscribers == 0
            }
            None => false,
        };
        if last {
            inner.slots.remove(key);
            debug!(key, "last subscriber gone, entry discarded");
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.slots.get(key).map(|slot| slot.subscribers))
            .unwrap_or(0)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        Ok(self.lock()?.stats.clone())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.slots.keys().cloned().collect())
    }
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Register the fetch function behind `key`, replacing any previous one
    pub fn register<F>(&self, key: &str, fetcher: F) -> Result<()>
    where
        F: QueryFetcher<T> + 'static,
    {
        self.lock()?
            .fetchers
            .insert(key.to_string(), Arc::new(fetcher));
        Ok(())
    }

    /// Register an async closure as the fetch function behind `key`
    pub fn register_fn<F, Fut>(&self, key: &str, fetch: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.register(key, FnFetcher(fetch))
    }

    /// Current entry for `key`.
    ///
    /// Creates the entry in `Loading` state on first access and starts a fetch
    /// whenever one is due (first access, or after `invalidate`). Readers that
    /// arrive while a fetch is running share it instead of starting another.
    pub fn read(&self, key: &str) -> Result<CacheEntry<T>> {
        let (entry, _) = self.read_with_flight(key)?;
        Ok(entry)
    }

    /// Read `key` and wait for any fetch in progress to land.
    pub async fn settled(&self, key: &str) -> Result<CacheEntry<T>> {
        loop {
            let (entry, flight) = self.read_with_flight(key)?;
            match flight {
                Some(flight) => flight.await,
                None => return Ok(entry),
            }
        }
    }

    /// Invalidate `key` and wait for the refetch
    pub async fn refetch(&self, key: &str) -> Result<CacheEntry<T>> {
        self.invalidate(key)?;
        self.settled(key).await
    }

    /// Current entry without scheduling a fetch
    pub fn peek(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
        Ok(self.lock()?.slots.get(key).map(|slot| slot.snapshot(key)))
    }

    /// Observe `key`; the entry lives until the last subscription is dropped.
    pub fn subscribe(&self, key: &str) -> Result<Subscription<T>> {
        {
            let mut inner = self.lock()?;
            if !inner.fetchers.contains_key(key) && !inner.slots.contains_key(key) {
                return Err(SyncError::UnknownQuery(key.to_string()));
            }
            inner
                .slots
                .entry(key.to_string())
                .or_insert_with(Slot::loading)
                .subscribers += 1;
        }
        let subscription = Subscription::new(self.clone(), key);
        self.read(key)?;
        Ok(subscription)
    }

    /// Apply `updater` to the cached data in place and bump the version.
    ///
    /// Returns `false` without doing anything when `key` has no entry or the
    /// entry holds no data yet. `updater` runs under the cache lock and must not
    /// call back into the cache.
    pub fn patch<F>(&self, key: &str, updater: F) -> Result<bool>
    where
        F: FnOnce(T) -> T,
    {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let Some(slot) = inner.slots.get_mut(key) else {
            return Ok(false);
        };
        let Some(data) = slot.data.take() else {
            return Ok(false);
        };
        slot.data = Some(updater(data));
        slot.touch();
        inner.stats.patches += 1;
        debug!(key, version = slot.version, "entry patched");
        Ok(true)
    }

    /// Replace the cached data outright, creating the entry if needed
    pub fn set_data(&self, key: &str, data: T) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let slot = inner
            .slots
            .entry(key.to_string())
            .or_insert_with(Slot::loading);
        slot.data = Some(data);
        slot.touch();
        inner.stats.patches += 1;
        Ok(())
    }

    /// Mark `key` stale. Cached data stays readable until the refetch lands;
    /// a fetch already running for the key is abandoned.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if let Some(slot) = inner.slots.get_mut(key) {
            slot.stale = true;
            if let Some(flight) = slot.flight.take() {
                inner.stats.fetches_abandoned += 1;
                debug!(key, flight = flight.id, "in-flight fetch abandoned");
            }
            inner.stats.invalidations += 1;
        }
        Ok(())
    }

    pub fn invalidate_all(&self) -> Result<()> {
        let keys = self.keys()?;
        for key in keys {
            self.invalidate(&key)?;
        }
        Ok(())
    }

    fn read_with_flight(&self, key: &str) -> Result<(CacheEntry<T>, Option<Flight>)> {
        let weak = Arc::downgrade(&self.inner);
        let (entry, flight, launched) = {
            let mut guard = self.lock()?;
            let launched = guard.begin_fetch_if_due(key, weak)?;
            let slot = guard
                .slots
                .get(key)
                .ok_or_else(|| SyncError::UnknownQuery(key.to_string()))?;
            let flight = slot.flight.as_ref().map(|f| f.handle.clone());
            (slot.snapshot(key), flight, launched)
        };
        if let Some(launched) = launched {
            drive(key, launched);
        }
        Ok((entry, flight))
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn begin_fetch_if_due(
        &mut self,
        key: &str,
        cache: Weak<Mutex<Inner<T>>>,
    ) -> Result<Option<Flight>> {
        let fetcher = self.fetchers.get(key).cloned();
        if fetcher.is_none() && !self.slots.contains_key(key) {
            return Err(SyncError::UnknownQuery(key.to_string()));
        }

        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(Slot::loading);
        let Some(fetcher) = fetcher else {
            return Ok(None);
        };
        if !slot.needs_fetch() {
            return Ok(None);
        }

        let id = self.next_flight_id;
        self.next_flight_id += 1;
        let started_at = slot.version;
        let owned_key = key.to_string();
        let handle = async move {
            let result = fetcher.fetch().await;
            if let Some(cache) = cache.upgrade() {
                settle(&cache, &owned_key, id, started_at, result);
            }
        }
        .boxed()
        .shared();

        slot.flight = Some(InFlight {
            id,
            handle: handle.clone(),
        });
        self.stats.fetches_started += 1;
        debug!(key, flight = id, version = started_at, "fetch started");
        Ok(Some(handle))
    }
}

/// Hand a new flight to the ambient runtime. Without one, the flight runs
/// when someone awaits it through `settled`.
fn drive(key: &str, flight: Flight) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(flight);
        }
        Err(_) => debug!(key, "no runtime, fetch deferred until awaited"),
    }
}

fn settle<T>(
    cache: &Mutex<Inner<T>>,
    key: &str,
    id: u64,
    started_at: u64,
    result: Result<T>,
) {
    let Ok(mut guard) = cache.lock() else {
        warn!(key, "cache lock poisoned, fetch result dropped");
        return;
    };
    let inner = &mut *guard;
    let Some(slot) = inner.slots.get_mut(key) else {
        inner.stats.responses_discarded += 1;
        debug!(key, flight = id, "entry gone before fetch landed");
        return;
    };

    let is_current = slot.flight.as_ref().is_some_and(|f| f.id == id);
    if !is_current || slot.version > started_at {
        if is_current {
            slot.flight = None;
        }
        inner.stats.responses_discarded += 1;
        debug!(
            key,
            flight = id,
            started_at,
            version = slot.version,
            "stale fetch response discarded"
        );
        return;
    }

    slot.flight = None;
    slot.stale = false;
    match result {
        Ok(data) => {
            slot.data = Some(data);
            slot.touch();
            inner.stats.fetches_succeeded += 1;
            debug!(key, version = slot.version, "fetch landed");
        }
        Err(err) => {
            let err = match err {
                SyncError::Fetch(_) => err,
                other => SyncError::Fetch(other.to_string()),
            };
            warn!(key, error = %err, "fetch failed, keeping last known data");
            slot.status = QueryStatus::Error;
            slot.error = Some(err);
            inner.stats.fetches_failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Cache whose fetcher answers with whatever the test sends next.
    fn scripted_cache() -> (QueryCache<Vec<u32>>, mpsc::UnboundedSender<Result<Vec<u32>>>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = QueryCache::new();
        let counter = calls.clone();
        cache
            .register_fn("numbers", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let rx = rx.clone();
                async move {
                    match rx.lock().await.recv().await {
                        Some(response) => response,
                        None => Err(SyncError::Fetch("script exhausted".into())),
                    }
                }
            })
            .unwrap();
        (cache, tx, calls)
    }

    async fn wait_for_discard(cache: &QueryCache<Vec<u32>>, expected: u64) {
        while cache.stats().unwrap().responses_discarded < expected {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_read_unknown_key() {
        let cache: QueryCache<Vec<u32>> = QueryCache::new();
        let err = cache.read("missing").unwrap_err();
        assert_eq!(err, SyncError::UnknownQuery("missing".into()));
    }

    #[tokio::test]
    async fn test_first_read_is_loading_then_success() {
        let (cache, tx, _) = scripted_cache();

        let first = cache.read("numbers").unwrap();
        assert!(first.is_loading());
        assert!(first.is_fetching);
        assert_eq!(first.version, 0);

        tx.send(Ok(vec![1, 2])).unwrap();
        let settled = cache.settled("numbers").await.unwrap();
        assert!(settled.is_success());
        assert_eq!(settled.data, Some(vec![1, 2]));
        assert_eq!(settled.version, 1);
        assert!(!settled.is_fetching);
        assert!(settled.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let (cache, tx, calls) = scripted_cache();

        for _ in 0..5 {
            cache.read("numbers").unwrap();
        }
        tx.send(Ok(vec![1])).unwrap();
        cache.settled("numbers").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate("numbers").unwrap();
        for _ in 0..5 {
            let entry = cache.read("numbers").unwrap();
            assert_eq!(entry.data, Some(vec![1]));
        }
        tx.send(Ok(vec![1, 2])).unwrap();
        let entry = cache.settled("numbers").await.unwrap();
        assert_eq!(entry.data, Some(vec![1, 2]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().unwrap().fetches_started, 2);
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_last_data_and_does_not_retry() {
        let (cache, tx, calls) = scripted_cache();
        tx.send(Ok(vec![7])).unwrap();
        cache.settled("numbers").await.unwrap();

        cache.invalidate("numbers").unwrap();
        tx.send(Err(SyncError::Storage("disk unplugged".into()))).unwrap();
        let failed = cache.settled("numbers").await.unwrap();
        assert!(failed.is_error());
        assert_eq!(failed.data, Some(vec![7]));
        assert_eq!(failed.version, 1);
        assert!(matches!(failed.error, Some(SyncError::Fetch(_))));

        cache.read("numbers").unwrap();
        cache.read("numbers").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.invalidate("numbers").unwrap();
        tx.send(Ok(vec![7, 8])).unwrap();
        let recovered = cache.settled("numbers").await.unwrap();
        assert!(recovered.is_success());
        assert_eq!(recovered.error, None);
        assert_eq!(recovered.data, Some(vec![7, 8]));
    }

    #[tokio::test]
    async fn test_patch_missing_entry_is_noop() {
        let (cache, _tx, _) = scripted_cache();
        assert!(!cache.patch("numbers", |v| v).unwrap());

        // Entry exists but nothing has loaded yet.
        cache.read("numbers").unwrap();
        assert!(!cache.patch("numbers", |v| v).unwrap());
        assert_eq!(cache.peek("numbers").unwrap().unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_patch_then_invalidate_keeps_patched_data_visible() {
        let (cache, tx, _) = scripted_cache();
        tx.send(Ok(vec![1])).unwrap();
        cache.settled("numbers").await.unwrap();

        assert!(cache.patch("numbers", |mut v| { v.push(2); v }).unwrap());
        cache.invalidate("numbers").unwrap();

        let entry = cache.read("numbers").unwrap();
        assert_eq!(entry.data, Some(vec![1, 2]));
        assert_eq!(entry.version, 2);
        assert!(entry.stale);
        assert!(entry.is_fetching);

        tx.send(Ok(vec![1, 2, 3])).unwrap();
        let entry = cache.settled("numbers").await.unwrap();
        assert_eq!(entry.data, Some(vec![1, 2, 3]));
        assert!(!entry.stale);
        assert_eq!(entry.version, 3);
    }

    #[tokio::test]
    async fn test_late_response_older_than_patch_is_discarded() {
        let (cache, tx, _) = scripted_cache();
        tx.send(Ok(vec![1])).unwrap();
        cache.settled("numbers").await.unwrap();

        cache.invalidate("numbers").unwrap();
        cache.read("numbers").unwrap(); // fetch starts at version 1
        cache.patch("numbers", |mut v| { v.push(2); v }).unwrap();

        tx.send(Ok(vec![9])).unwrap();
        wait_for_discard(&cache, 1).await;

        let entry = cache.peek("numbers").unwrap().unwrap();
        assert_eq!(entry.data, Some(vec![1, 2]));
        assert_eq!(entry.version, 2);
        assert!(!entry.is_fetching);
    }

    #[tokio::test]
    async fn test_invalidate_abandons_running_fetch() {
        let (cache, tx, calls) = scripted_cache();
        tx.send(Ok(vec![1])).unwrap();
        cache.settled("numbers").await.unwrap();

        cache.invalidate("numbers").unwrap();
        cache.read("numbers").unwrap();
        while calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        cache.invalidate("numbers").unwrap();
        assert_eq!(cache.stats().unwrap().fetches_abandoned, 1);

        tx.send(Ok(vec![0])).unwrap();
        tx.send(Ok(vec![1, 2])).unwrap();
        let entry = cache.settled("numbers").await.unwrap();
        assert_eq!(entry.data, Some(vec![1, 2]));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().unwrap().responses_discarded, 1);
    }

    #[tokio::test]
    async fn test_subscriptions_are_reference_counted() {
        let (cache, tx, _) = scripted_cache();
        tx.send(Ok(vec![4])).unwrap();

        let first = cache.subscribe("numbers").unwrap();
        let second = cache.subscribe("numbers").unwrap();
        assert_eq!(cache.subscriber_count("numbers"), 2);
        assert_eq!(first.settled().await.unwrap().data, Some(vec![4]));

        drop(first);
        assert!(cache.peek("numbers").unwrap().is_some());
        assert_eq!(second.read().unwrap().data, Some(vec![4]));

        drop(second);
        assert_eq!(cache.peek("numbers").unwrap(), None);
        assert_eq!(cache.subscriber_count("numbers"), 0);
    }

    #[tokio::test]
    async fn test_set_data_without_fetcher() {
        let cache: QueryCache<Vec<u32>> = QueryCache::new();
        cache.set_data("local", vec![3]).unwrap();

        let entry = cache.read("local").unwrap();
        assert!(entry.is_success());
        assert_eq!(entry.version, 1);

        // Stale but nothing to refetch with: data stays as set.
        cache.invalidate("local").unwrap();
        let entry = cache.settled("local").await.unwrap();
        assert_eq!(entry.data, Some(vec![3]));
        assert!(entry.stale);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache: QueryCache<Vec<u32>> = QueryCache::new();
        cache.set_data("a", vec![]).unwrap();
        cache.set_data("b", vec![]).unwrap();
        cache.invalidate_all().unwrap();

        assert!(cache.peek("a").unwrap().unwrap().stale);
        assert!(cache.peek("b").unwrap().unwrap().stale);
        assert_eq!(cache.stats().unwrap().invalidations, 2);
    }

    #[test]
    fn test_fetch_without_runtime_runs_when_awaited() {
        let (cache, tx, calls) = scripted_cache();
        tx.send(Ok(vec![5])).unwrap();

        let mut settled = tokio_test::task::spawn(cache.settled("numbers"));
        let entry = tokio_test::assert_ready!(settled.poll()).unwrap();
        assert_eq!(entry.data, Some(vec![5]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
