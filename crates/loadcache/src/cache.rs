//! LoadCache: single-flight cache for one expensive value

use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cached::Cached;
use crate::error::LoadError;
use crate::listeners::{FlushListener, Listeners};
use crate::persist::PersistenceManager;
use crate::stats::CacheStats;
use crate::traits::{AutoFlush, Loader};

type SharedLoad<T> = Shared<BoxFuture<'static, Result<Cached<T>, LoadError>>>;

/// Cache holding one value produced by a loader.
///
/// Concurrent `get` calls while the value is missing share a single loader
/// invocation. Cloning the cache shares the same state.
pub struct LoadCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for LoadCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    /// Produces fresh values
    loader: Arc<dyn Loader<T>>,

    /// Optional staleness policy
    auto_flush: Option<Arc<dyn AutoFlush<T>>>,

    /// Optional persistence wiring
    persistence: Option<Persistence<T>>,

    /// Stored value and invalidation generation
    state: Mutex<State<T>>,

    /// After-flush listeners
    listeners: Arc<Listeners>,

    /// Cache statistics
    stats: CacheStats,
}

struct State<T> {
    slot: Slot<T>,

    /// Bumped on every invalidation; loads and armed flushes carry the
    /// generation they started in and are ignored once it moved on
    generation: u64,
}

enum Slot<T> {
    Empty,
    Loading(SharedLoad<T>),
    Ready(Cached<T>),
}

struct Persistence<T> {
    manager: Arc<dyn PersistenceManager<T>>,
    key: String,
}

impl<T> Clone for Persistence<T> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            key: self.key.clone(),
        }
    }
}

impl<T> Persistence<T> {
    fn load(&self) -> Option<Cached<T>> {
        match self.manager.load(&self.key) {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read persisted value");
                None
            }
        }
    }

    fn store(&self, value: &Cached<T>) {
        if let Err(e) = self.manager.store(&self.key, value) {
            warn!(key = %self.key, error = %e, "Failed to persist value");
        }
    }

    fn remove(&self) {
        if let Err(e) = self.manager.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to remove persisted value");
        }
    }
}

/// Builder for [`LoadCache`]
pub struct LoadCacheBuilder<T> {
    loader: Arc<dyn Loader<T>>,
    auto_flush: Option<Arc<dyn AutoFlush<T>>>,
    persistence: Option<Persistence<T>>,
}

impl<T> LoadCacheBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Use `auto_flush` to decide when values go stale
    pub fn auto_flush(mut self, auto_flush: Arc<dyn AutoFlush<T>>) -> Self {
        self.auto_flush = Some(auto_flush);
        self
    }

    /// Persist values through `manager` under `key`
    pub fn persistence(
        mut self,
        manager: Arc<dyn PersistenceManager<T>>,
        key: impl Into<String>,
    ) -> Self {
        self.persistence = Some(Persistence {
            manager,
            key: key.into(),
        });
        self
    }

    /// Build the cache; nothing is loaded until the first `get`
    pub fn build(self) -> LoadCache<T> {
        LoadCache {
            inner: Arc::new(Inner {
                loader: self.loader,
                auto_flush: self.auto_flush,
                persistence: self.persistence,
                state: Mutex::new(State {
                    slot: Slot::Empty,
                    generation: 0,
                }),
                listeners: Arc::new(Listeners::default()),
                stats: CacheStats::new(),
            }),
        }
    }
}

impl<T> LoadCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start configuring a cache around `loader`
    pub fn builder<L>(loader: L) -> LoadCacheBuilder<T>
    where
        L: Loader<T> + 'static,
    {
        LoadCacheBuilder {
            loader: Arc::new(loader),
            auto_flush: None,
            persistence: None,
        }
    }

    /// Get the current value, loading it if missing.
    ///
    /// Callers arriving while a load is in flight wait for that same load.
    /// A failed load is reported to every waiter and leaves the cache empty.
    pub async fn get(&self) -> Result<Cached<T>, LoadError> {
        let load = {
            let mut state = self.inner.state.lock();
            match &state.slot {
                Slot::Ready(cached) => {
                    self.inner.stats.record_hit();
                    return Ok(cached.clone());
                }
                Slot::Loading(load) => {
                    self.inner.stats.record_miss();
                    load.clone()
                }
                Slot::Empty => {
                    self.inner.stats.record_miss();
                    let load = Inner::load(Arc::downgrade(&self.inner), state.generation)
                        .boxed()
                        .shared();
                    state.slot = Slot::Loading(load.clone());
                    load
                }
            }
        };
        load.await
    }

    /// The stored value, without loading
    pub fn peek(&self) -> Option<Cached<T>> {
        match &self.inner.state.lock().slot {
            Slot::Ready(cached) => Some(cached.clone()),
            _ => None,
        }
    }

    /// Whether a load is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self.inner.state.lock().slot, Slot::Loading(_))
    }

    /// Invalidate the stored value.
    ///
    /// Removes the persisted copy, tells the auto-flush policy and then wakes
    /// every listener. The next `get` loads again.
    pub fn flush(&self) {
        self.inner.invalidate(None);
    }

    /// Register interest in invalidations; dropping the handle deregisters it
    pub fn on_flush(&self) -> FlushListener {
        self.inner.listeners.register()
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }
}

enum Restore<T> {
    Hit(Cached<T>),
    Rejected,
    Miss,
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The load shared by concurrent getters.
    ///
    /// Only holds a weak reference while suspended so an abandoned load
    /// stored in `state` never keeps the cache alive.
    async fn load(weak: Weak<Self>, generation: u64) -> Result<Cached<T>, LoadError> {
        let (loader, auto_flush, persistence) = {
            let inner = weak.upgrade().ok_or(LoadError::Dropped)?;
            (
                Arc::clone(&inner.loader),
                inner.auto_flush.clone(),
                inner.persistence.clone(),
            )
        };

        let restore = match &persistence {
            Some(persistence) => Self::restore(persistence, auto_flush.as_deref()).await,
            None => Restore::Miss,
        };

        let rejected = matches!(restore, Restore::Rejected);
        let cached = match restore {
            Restore::Hit(cached) => {
                let inner = weak.upgrade().ok_or(LoadError::Dropped)?;
                inner.stats.record_restore();
                debug!("Adopted persisted value");
                cached
            }
            Restore::Rejected | Restore::Miss => {
                if let Some(inner) = weak.upgrade() {
                    if rejected {
                        inner.stats.record_rejected_restore();
                    }
                    inner.stats.record_load();
                }

                debug!(generation, "Invoking loader");
                let result = loader.load().await;
                let inner = weak.upgrade().ok_or(LoadError::Dropped)?;
                match result {
                    Ok(value) => {
                        let cached = Cached::loaded(value);
                        if let Some(persistence) = &persistence {
                            persistence.store(&cached);
                        }
                        cached
                    }
                    Err(e) => {
                        debug!(error = %e, "Loader failed");
                        inner.fail(generation);
                        return Err(e);
                    }
                }
            }
        };

        let inner = weak.upgrade().ok_or(LoadError::Dropped)?;
        inner.commit(generation, &cached);
        Ok(cached)
    }

    async fn restore(
        persistence: &Persistence<T>,
        auto_flush: Option<&dyn AutoFlush<T>>,
    ) -> Restore<T> {
        let Some(cached) = persistence.load() else {
            return Restore::Miss;
        };
        match auto_flush {
            Some(auto_flush) if auto_flush.is_expired(&cached).await => {
                debug!(key = %persistence.key, "Persisted value expired");
                Restore::Rejected
            }
            _ => Restore::Hit(cached),
        }
    }

    fn commit(self: &Arc<Self>, generation: u64, cached: &Cached<T>) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(generation, "Discarding value loaded before a flush");
                return;
            }
            state.slot = Slot::Ready(cached.clone());
        }

        if let Some(auto_flush) = &self.auto_flush {
            let weak = Arc::downgrade(self);
            auto_flush.fetched(
                cached,
                Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate(Some(generation));
                    }
                }),
            );
        }
    }

    fn fail(&self, generation: u64) {
        self.stats.record_load_failure();
        let mut state = self.state.lock();
        if state.generation == generation && matches!(state.slot, Slot::Loading(_)) {
            state.slot = Slot::Empty;
        }
    }
}

impl<T> Inner<T> {
    /// Invalidate the stored value; with `expected`, only if the value still
    /// belongs to that generation
    fn invalidate(&self, expected: Option<u64>) -> bool {
        let generation = {
            let mut state = self.state.lock();
            if expected.is_some_and(|g| g != state.generation) {
                return false;
            }
            state.generation += 1;
            state.slot = Slot::Empty;
            state.generation
        };

        if let Some(persistence) = &self.persistence {
            persistence.remove();
        }
        if let Some(auto_flush) = &self.auto_flush {
            auto_flush.flushed();
        }
        self.stats.record_flush();
        debug!(generation, listeners = self.listeners.len(), "Flushed");

        self.listeners.notify_all();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached::Origin;
    use crate::persist::JsonPersistence;
    use crate::traits::Invalidate;
    use async_trait::async_trait;
    use cachestore::MemoryBackend;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_loader(calls: Arc<AtomicUsize>) -> impl Loader<String> + 'static {
        move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, LoadError>(format!("value {}", n))
            }
        }
    }

    #[derive(Default)]
    struct ManualFlush {
        expired: AtomicBool,
        armed: Mutex<Vec<Invalidate>>,
        flushed: AtomicUsize,
    }

    impl ManualFlush {
        fn fire_latest(&self) {
            let cb = self.armed.lock().pop().expect("nothing armed");
            cb();
        }
    }

    #[async_trait]
    impl AutoFlush<String> for ManualFlush {
        async fn is_expired(&self, _value: &Cached<String>) -> bool {
            self.expired.load(Ordering::SeqCst)
        }

        fn fetched(&self, _value: &Cached<String>, on_invalidate: Invalidate) {
            self.armed.lock().push(on_invalidate);
        }

        fn flushed(&self) {
            self.flushed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_sequential_gets_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = LoadCache::builder(counting_loader(calls.clone())).build();

        assert_eq!(cache.get().await.unwrap().value(), "value 1");
        assert_eq!(cache.get().await.unwrap().value(), "value 1");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().loads(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_gets_single_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = LoadCache::builder(counting_loader(calls.clone())).build();

        let results = futures::future::join_all((0..10).map(|_| cache.get())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap().value(), "value 1");
        }
    }

    #[tokio::test]
    async fn test_flush_reloads_and_notifies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = LoadCache::builder(counting_loader(calls.clone())).build();
        let listener = cache.on_flush();

        cache.get().await.unwrap();
        cache.flush();
        assert!(cache.peek().is_none());

        tokio::time::timeout(Duration::from_secs(1), listener.notified())
            .await
            .unwrap();
        assert_eq!(cache.get().await.unwrap().value(), "value 2");
        assert_eq!(cache.stats().flushes(), 1);
    }

    #[tokio::test]
    async fn test_dropped_listener_deregisters() {
        let cache = LoadCache::builder(counting_loader(Arc::new(AtomicUsize::new(0)))).build();
        let first = cache.on_flush();
        let _second = cache.on_flush();
        assert_eq!(cache.listener_count(), 2);

        drop(first);
        assert_eq!(cache.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_leaves_cache_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = {
            let calls = calls.clone();
            move || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(LoadError::from_source("first attempt fails"))
                    } else {
                        Ok("recovered".to_string())
                    }
                }
            }
        };
        let cache = LoadCache::builder(loader).build();

        assert!(matches!(cache.get().await, Err(LoadError::Source(_))));
        assert!(!cache.is_loading());
        assert_eq!(cache.get().await.unwrap().value(), "recovered");
        assert_eq!(cache.stats().load_failures(), 1);
    }

    #[tokio::test]
    async fn test_flush_during_load_discards_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = LoadCache::builder(counting_loader(calls.clone())).build();

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get().await }
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.flush();

        // The waiter still receives the value, but it is not stored.
        assert_eq!(pending.await.unwrap().unwrap().value(), "value 1");
        assert!(cache.peek().is_none());
        assert_eq!(cache.get().await.unwrap().value(), "value 2");
    }

    #[tokio::test]
    async fn test_auto_flush_invalidates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manual = Arc::new(ManualFlush::default());
        let cache = LoadCache::builder(counting_loader(calls.clone()))
            .auto_flush(manual.clone())
            .build();
        let listener = cache.on_flush();

        cache.get().await.unwrap();
        manual.fire_latest();

        listener.notified().await;
        assert_eq!(manual.flushed.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get().await.unwrap().value(), "value 2");
    }

    #[tokio::test]
    async fn test_stale_invalidation_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manual = Arc::new(ManualFlush::default());
        let cache = LoadCache::builder(counting_loader(calls.clone()))
            .auto_flush(manual.clone())
            .build();

        cache.get().await.unwrap();
        let stale = manual.armed.lock().pop().unwrap();
        cache.flush();
        cache.get().await.unwrap();

        stale();
        assert_eq!(cache.peek().unwrap().value(), "value 2");
        assert_eq!(cache.stats().flushes(), 1);
    }

    #[tokio::test]
    async fn test_persisted_value_skips_loader() {
        let backend = Arc::new(MemoryBackend::new());
        let first_calls = Arc::new(AtomicUsize::new(0));
        let first = LoadCache::builder(counting_loader(first_calls.clone()))
            .persistence(Arc::new(JsonPersistence::<String>::new(backend.clone())), "k")
            .build();
        first.get().await.unwrap();

        let second_calls = Arc::new(AtomicUsize::new(0));
        let second = LoadCache::builder(counting_loader(second_calls.clone()))
            .persistence(Arc::new(JsonPersistence::<String>::new(backend.clone())), "k")
            .build();
        let cached = second.get().await.unwrap();

        assert_eq!(cached.value(), "value 1");
        assert_eq!(cached.origin(), Origin::Persistence);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.stats().restores(), 1);
    }

    #[tokio::test]
    async fn test_expired_persisted_value_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let first = LoadCache::builder(counting_loader(Arc::new(AtomicUsize::new(0))))
            .persistence(Arc::new(JsonPersistence::<String>::new(backend.clone())), "k")
            .build();
        first.get().await.unwrap();

        let manual = Arc::new(ManualFlush::default());
        manual.expired.store(true, Ordering::SeqCst);
        let calls = Arc::new(AtomicUsize::new(0));
        let second = LoadCache::builder(counting_loader(calls.clone()))
            .auto_flush(manual.clone())
            .persistence(Arc::new(JsonPersistence::<String>::new(backend.clone())), "k")
            .build();
        let cached = second.get().await.unwrap();

        assert_eq!(cached.origin(), Origin::Loader);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.stats().rejected_restores(), 1);
    }

    #[tokio::test]
    async fn test_flush_removes_persisted_value() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = LoadCache::builder(counting_loader(Arc::new(AtomicUsize::new(0))))
            .persistence(Arc::new(JsonPersistence::<String>::new(backend.clone())), "k")
            .build();

        cache.get().await.unwrap();
        assert_eq!(backend.len(), 1);

        cache.flush();
        assert!(backend.is_empty());
    }
}
