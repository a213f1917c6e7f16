//! Resolution cache
//!
//! Memoizes resolved output per (bundle, config, merge mode, context fingerprint).
//! Each (bundle, config, mode) triple gets its own bounded store, created on first
//! write. The store type is injectable through [`EvictionStore`]; [`LruStore`] is the
//! default.

use crate::context::{fingerprint, Context};
use crate::error::EngineError;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Default per-store capacity
pub const DEFAULT_MAX_ENTRIES: usize = 250;

/// Which read produced a cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeMode {
    Merged,
    Ranked,
}

impl MergeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMode::Merged => "merged",
            MergeMode::Ranked => "ranked",
        }
    }
}

/// Cached resolution output. Shared with callers; never mutated after insertion.
#[derive(Debug, Clone)]
pub enum Resolved {
    Merged(Arc<Value>),
    Ranked(Arc<Vec<Value>>),
}

impl Resolved {
    pub fn mode(&self) -> MergeMode {
        match self {
            Resolved::Merged(_) => MergeMode::Merged,
            Resolved::Ranked(_) => MergeMode::Ranked,
        }
    }
}

/// Composite cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub bundle: String,
    pub config: String,
    pub mode: MergeMode,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(bundle: &str, config: &str, mode: MergeMode, context: &Context) -> Self {
        Self {
            bundle: bundle.to_string(),
            config: config.to_string(),
            mode,
            fingerprint: fingerprint(context),
        }
    }
}

/// Bounded key/value store with its own eviction policy
pub trait EvictionStore<V>: Send {
    fn get(&mut self, key: &str) -> Option<V>;
    fn put(&mut self, key: String, value: V);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Least-recently-used store
pub struct LruStore<V> {
    inner: LruCache<String, V>,
}

impl<V> LruStore<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: LruCache::new(capacity),
        }
    }
}

impl<V: Clone + Send> EvictionStore<V> for LruStore<V> {
    fn get(&mut self, key: &str) -> Option<V> {
        self.inner.get(key).cloned()
    }

    fn put(&mut self, key: String, value: V) {
        self.inner.put(key, value);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Builds a store for one (bundle, config, mode) triple
pub type StoreFactory = dyn Fn(NonZeroUsize) -> Box<dyn EvictionStore<Resolved>> + Send + Sync;

/// Cache contract used by the engine
pub trait ResolutionCache: Send + Sync {
    /// `Ok(None)` is a plain miss. `Err(UnknownCacheData)` means nothing has been
    /// cached for the bundle/config pair at all.
    fn get(&self, key: &CacheKey) -> Result<Option<Resolved>, EngineError>;

    fn put(&self, key: CacheKey, value: Resolved);

    /// Drop every entry for a (bundle, config) pair, all modes
    fn invalidate(&self, bundle: &str, config: &str);

    /// Total cached entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type ModeStores = HashMap<MergeMode, Box<dyn EvictionStore<Resolved>>>;

/// Nested bundle -> config -> mode -> bounded store
pub struct BoundedCache {
    max_entries: NonZeroUsize,
    factory: Arc<StoreFactory>,
    stores: Mutex<HashMap<String, HashMap<String, ModeStores>>>,
}

impl BoundedCache {
    /// LRU-backed cache. A zero capacity falls back to the default.
    pub fn new(max_entries: usize) -> Self {
        Self::with_store_factory(
            max_entries,
            Arc::new(|capacity: NonZeroUsize| {
                Box::new(LruStore::<Resolved>::new(capacity)) as Box<dyn EvictionStore<Resolved>>
            }),
        )
    }

    pub fn with_store_factory(max_entries: usize, factory: Arc<StoreFactory>) -> Self {
        let max_entries = NonZeroUsize::new(max_entries)
            .or(NonZeroUsize::new(DEFAULT_MAX_ENTRIES))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            max_entries,
            factory,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries.get()
    }
}

impl Default for BoundedCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ResolutionCache for BoundedCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Resolved>, EngineError> {
        let mut stores = self.stores.lock();
        let modes = stores
            .get_mut(&key.bundle)
            .and_then(|configs| configs.get_mut(&key.config))
            .ok_or_else(|| EngineError::UnknownCacheData {
                bundle: key.bundle.clone(),
                config: key.config.clone(),
            })?;
        Ok(modes
            .get_mut(&key.mode)
            .and_then(|store| store.get(&key.fingerprint))
            .filter(|value| value.mode() == key.mode))
    }

    fn put(&self, key: CacheKey, value: Resolved) {
        let mut stores = self.stores.lock();
        let store = stores
            .entry(key.bundle)
            .or_default()
            .entry(key.config)
            .or_default()
            .entry(key.mode)
            .or_insert_with(|| (self.factory)(self.max_entries));
        store.put(key.fingerprint, value);
    }

    fn invalidate(&self, bundle: &str, config: &str) {
        let mut stores = self.stores.lock();
        if let Some(configs) = stores.get_mut(bundle) {
            if configs.remove(config).is_some() {
                debug!(bundle, config, "Invalidated cached resolutions");
            }
        }
    }

    fn len(&self) -> usize {
        self.stores
            .lock()
            .values()
            .flat_map(|configs| configs.values())
            .flat_map(|modes| modes.values())
            .map(|store| store.len())
            .sum()
    }
}

/// Cache that stores nothing
#[derive(Debug, Default, Clone)]
pub struct NoopCache;

impl ResolutionCache for NoopCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<Resolved>, EngineError> {
        Ok(None)
    }

    fn put(&self, _key: CacheKey, _value: Resolved) {}

    fn invalidate(&self, _bundle: &str, _config: &str) {}

    fn len(&self) -> usize {
        0
    }
}
