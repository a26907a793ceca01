//! Dependency-tracked cache with single-flight recomputation.
//!
//! The cache maps an opaque fingerprint to a previously computed value and
//! re-runs a caller-supplied factory when the entry is absent or has been
//! invalidated. While the factory runs it may register [`CacheDependency`]
//! handles; firing a handle invalidates exactly the entry it was registered
//! against, so invalidation precision matches the real data-flow graph
//! instead of a coarse "invalidate everything" policy.

mod dependency;

pub use dependency::CacheDependency;

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::errors::{HostError, HostResult};
use crate::fingerprint::Fingerprint;
use dependency::InvalidationToken;

/// Bounds required of a cache key: stable equality and hash semantics,
/// cheap to clone, printable for diagnostics.
pub trait CacheKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<K> CacheKey for K where K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// Type-erased cached value. Typed access goes through the generic
/// forwarding getters on [`Cache`].
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// The cache most hosts want: keyed by input fingerprints.
pub type BuildCache = Cache<Fingerprint>;

/// One completed generation of an entry: the value, the dependencies the
/// factory declared while producing it, and the validity token those
/// dependencies fire into.
struct EntryData {
    value: CachedValue,
    deps: Vec<Arc<CacheDependency>>,
    token: Arc<InvalidationToken>,
}

/// Per-key slot. The mutex is held across factory execution; that is the
/// single-flight blocking point and the only place the cache blocks.
struct Slot {
    data: Mutex<Option<EntryData>>,
}

impl Slot {
    fn empty() -> Arc<Self> {
        Arc::new(Slot {
            data: Mutex::new(None),
        })
    }
}

/// Activity counters, updated with relaxed atomics.
#[derive(Default)]
struct InnerStats {
    hits: AtomicUsize,
    misses: AtomicUsize,
    recomputes: AtomicUsize,
    evictions: AtomicUsize,
}

/// Snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from a valid entry.
    pub hits: usize,
    /// Lookups that found no entry at all.
    pub misses: usize,
    /// Lookups that found an invalidated entry and re-ran the factory.
    pub recomputes: usize,
    /// Entries removed for memory bounds.
    pub evictions: usize,
}

/// Scoped view handed to a factory for the duration of one invocation.
///
/// Dependencies registered through [`monitor`] become the entry's complete
/// dependency set when the factory returns; the previous generation's set
/// is discarded wholesale.
///
/// [`monitor`]: CacheContext::monitor
pub struct CacheContext<'a, K> {
    key: &'a K,
    token: &'a Arc<InvalidationToken>,
    deps: Vec<Arc<CacheDependency>>,
}

impl<K> CacheContext<'_, K> {
    /// The key of the entry being built.
    pub fn key(&self) -> &K {
        self.key
    }

    /// Attach `dependency` to the entry being built. May be called any
    /// number of times during the factory's execution.
    pub fn monitor(&mut self, dependency: Arc<CacheDependency>) {
        dependency.attach(self.token);
        self.deps.push(dependency);
    }
}

/// Dependency-tracked, single-flight cache keyed by `K`.
///
/// Values are type-erased so one cache instance can serve heterogeneous
/// build results; the typed getters forward through a downcast. At most one
/// factory runs per key at a time: concurrent `get` calls for the same key
/// block on the in-flight computation and share its result.
///
/// A factory must not request its own key from the same cache; doing so
/// deadlocks on the per-key lock.
pub struct Cache<K = Fingerprint> {
    entries: DashMap<K, Arc<Slot>>,
    capacity: Option<usize>,
    stats: InnerStats,
}

impl<K: CacheKey> Cache<K> {
    /// Unbounded cache.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Cache with the given sizing configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Cache {
            entries: DashMap::new(),
            capacity: config.capacity,
            stats: InnerStats::default(),
        }
    }

    /// Return the cached value for `key`, running `factory` if the entry is
    /// absent or invalidated.
    ///
    /// The factory runs at most once per call and its registered
    /// dependencies replace the entry's previous dependency set. A failed
    /// factory leaves prior state untouched and retriable.
    pub fn get<T, F>(&self, key: K, factory: F) -> HostResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut CacheContext<'_, K>) -> HostResult<T>,
    {
        self.get_with(key, |ctx, _previous: Option<Arc<T>>| factory(ctx))
    }

    /// Incremental variant of [`get`]: the factory also receives the stale
    /// previous value (if any) so it can recompute incrementally rather
    /// than from scratch.
    ///
    /// [`get`]: Cache::get
    pub fn get_with<T, F>(&self, key: K, factory: F) -> HostResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut CacheContext<'_, K>, Option<Arc<T>>) -> HostResult<T>,
    {
        let value = self.get_raw(key.clone(), |ctx, previous| {
            let previous = previous.and_then(|v| v.downcast::<T>().ok());
            factory(ctx, previous).map(|v| Arc::new(v) as CachedValue)
        })?;
        value.downcast::<T>().map_err(|_| HostError::TypeMismatch {
            key: format!("{key:?}"),
            requested: std::any::type_name::<T>(),
        })
    }

    /// Untyped get; the typed getters forward here.
    pub fn get_raw<F>(&self, key: K, factory: F) -> HostResult<CachedValue>
    where
        F: FnOnce(&mut CacheContext<'_, K>, Option<CachedValue>) -> HostResult<CachedValue>,
    {
        let slot = self.slot(&key);
        let mut data = slot.data.lock();

        if let Some(entry) = data.as_ref() {
            if !entry.token.is_stale() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                trace!("cache hit for {key:?}");
                return Ok(entry.value.clone());
            }
            self.stats.recomputes.fetch_add(1, Ordering::Relaxed);
            trace!("cache entry for {key:?} invalidated, recomputing");
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            trace!("cache miss for {key:?}");
        }

        // The fresh token exists before the factory runs, so a fire landing
        // mid-computation marks it and forces revalidation on the very next
        // access while the result stored below stays observable.
        let previous = data.take();
        let token = Arc::new(InvalidationToken::default());
        let mut ctx = CacheContext {
            key: &key,
            token: &token,
            deps: Vec::new(),
        };
        let previous_value = previous.as_ref().map(|e| e.value.clone());

        match factory(&mut ctx, previous_value) {
            Ok(value) => {
                debug!(
                    "cache entry for {key:?} built with {} dependencies",
                    ctx.deps.len()
                );
                *data = Some(EntryData {
                    value: value.clone(),
                    deps: ctx.deps,
                    token,
                });
                drop(data);
                self.enforce_capacity(&key);
                Ok(value)
            }
            Err(err) => {
                // Failed factories leave prior state untouched and
                // retriable; a slot this call created is removed again.
                *data = previous;
                let vacated = data.is_none();
                drop(data);
                if vacated {
                    self.entries.remove_if(&key, |_, slot| {
                        slot.data.try_lock().is_some_and(|d| d.is_none())
                    });
                }
                Err(err)
            }
        }
    }

    /// Remove the entry for `key`, if any. Purely a memory-bound measure:
    /// the next `get` recomputes, and dependency handles attached to the
    /// removed generation go inert rather than firing into a later one.
    pub fn evict(&self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some((_, slot)) => {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                if let Some(dropped) = slot.data.try_lock().and_then(|mut d| d.take()) {
                    trace!(
                        "evicted cache entry for {key:?}, dropping {} dependencies",
                        dropped.deps.len()
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of resident entries, valid or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            recomputes: self.stats.recomputes.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, key: &K) -> Arc<Slot> {
        self.entries
            .entry(key.clone())
            .or_insert_with(Slot::empty)
            .clone()
    }

    /// Shed entries once the soft capacity bound is exceeded, invalidated
    /// entries first and never the entry just written.
    fn enforce_capacity(&self, just_written: &K) {
        let Some(capacity) = self.capacity else {
            return;
        };
        let over = self.entries.len().saturating_sub(capacity);
        if over == 0 {
            return;
        }

        let mut stale = Vec::new();
        let mut valid = Vec::new();
        for entry in self.entries.iter() {
            if entry.key() == just_written {
                continue;
            }
            let is_stale = entry
                .value()
                .data
                .try_lock()
                .is_some_and(|d| d.as_ref().map_or(true, |e| e.token.is_stale()));
            if is_stale {
                stale.push(entry.key().clone());
            } else {
                valid.push(entry.key().clone());
            }
        }

        for key in stale.into_iter().chain(valid).take(over) {
            self.evict(&key);
        }
    }
}

impl<K: CacheKey> Default for Cache<K> {
    fn default() -> Self {
        Self::new()
    }
}
