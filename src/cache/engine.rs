//! Storage Engine Module
//!
//! Bounded key/value store with per-entry TTL, backed by moka. This is the
//! layer the hooks decorate: it owns eviction, expiry and capacity
//! accounting, and exposes them through a small builder and handle.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::notification::RemovalCause;
use moka::sync::Cache;
use tracing::debug;

use crate::cache::entry::{CacheEntry, VariableTtl};
use crate::cache::stats::{CacheStats, StatsCounter};
use crate::error::EngineError;

// == Deletion Cause ==
/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionCause {
    /// Removed by a direct delete call
    Explicit,
    /// Overwritten by a newer value for the same key
    Replaced,
    /// Evicted to respect the capacity bound
    Evicted,
    /// Its TTL elapsed
    Expired,
}

impl From<RemovalCause> for DeletionCause {
    fn from(cause: RemovalCause) -> Self {
        match cause {
            RemovalCause::Explicit => Self::Explicit,
            RemovalCause::Replaced => Self::Replaced,
            RemovalCause::Size => Self::Evicted,
            RemovalCause::Expired => Self::Expired,
        }
    }
}

/// Callback receiving every entry the engine drops.
pub type DeletionListener<K, V> = Arc<dyn Fn(&K, &V, DeletionCause) + Send + Sync>;

/// Callback estimating the capacity an entry consumes.
pub type CostFn<K, V> = Arc<dyn Fn(&K, &V) -> u32 + Send + Sync>;

// == Engine Builder ==
/// Collects storage settings before the engine is built.
pub struct EngineBuilder<K, V> {
    max_capacity: u64,
    initial_capacity: Option<usize>,
    collect_stats: bool,
    deletion_listener: Option<DeletionListener<K, V>>,
    cost: Option<CostFn<K, V>>,
}

impl<K, V> EngineBuilder<K, V> {
    /// Creates a builder for an engine holding at most `max_capacity` units.
    ///
    /// Without a cost function every entry costs one unit.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidCapacity` when `max_capacity` is zero.
    pub fn new(max_capacity: u64) -> Result<Self, EngineError> {
        if max_capacity == 0 {
            return Err(EngineError::InvalidCapacity(max_capacity));
        }

        Ok(Self {
            max_capacity,
            initial_capacity: None,
            collect_stats: false,
            deletion_listener: None,
            cost: None,
        })
    }

    /// Pre-allocates room for `capacity` entries.
    pub fn initial_capacity(&mut self, capacity: usize) -> &mut Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Enables hit, miss and eviction counters.
    pub fn collect_stats(&mut self) -> &mut Self {
        self.collect_stats = true;
        self
    }

    /// Installs the deletion listener, replacing any earlier one.
    pub fn deletion_listener<F>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(&K, &V, DeletionCause) + Send + Sync + 'static,
    {
        self.deletion_listener = Some(Arc::new(listener));
        self
    }

    /// Installs the cost function, replacing any earlier one.
    pub fn cost<F>(&mut self, cost: F) -> &mut Self
    where
        F: Fn(&K, &V) -> u32 + Send + Sync + 'static,
    {
        self.cost = Some(Arc::new(cost));
        self
    }

    /// Returns the configured maximum capacity.
    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    // == Build ==
    /// Finalizes the settings into a live engine.
    pub fn build(&self) -> Engine<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let stats = self.collect_stats.then(|| Arc::new(StatsCounter::default()));

        let mut builder = Cache::builder()
            .max_capacity(self.max_capacity)
            .expire_after(VariableTtl);

        if let Some(capacity) = self.initial_capacity {
            builder = builder.initial_capacity(capacity);
        }

        if let Some(cost) = self.cost.clone() {
            builder =
                builder.weigher(move |key: &K, entry: &CacheEntry<V>| cost(key, &entry.value));
        }

        if stats.is_some() || self.deletion_listener.is_some() {
            let listener = self.deletion_listener.clone();
            let counter = stats.clone();
            builder = builder.eviction_listener(
                move |key: Arc<K>, entry: CacheEntry<V>, cause: RemovalCause| {
                    if let (Some(counter), RemovalCause::Size) = (&counter, cause) {
                        counter.record_eviction();
                    }
                    if let Some(listener) = &listener {
                        listener(&*key, &entry.value, cause.into());
                    }
                },
            );
        }

        debug!(
            "Storage engine built: max_capacity={}, initial_capacity={:?}, stats={}",
            self.max_capacity, self.initial_capacity, self.collect_stats
        );

        Engine {
            inner: builder.build(),
            max_capacity: self.max_capacity,
            cost: self.cost.clone(),
            stats,
        }
    }
}

impl<K, V> fmt::Debug for EngineBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("max_capacity", &self.max_capacity)
            .field("initial_capacity", &self.initial_capacity)
            .field("collect_stats", &self.collect_stats)
            .field("deletion_listener", &self.deletion_listener.is_some())
            .field("cost", &self.cost.is_some())
            .finish()
    }
}

// == Engine ==
/// Handle to a live storage engine. Cloning shares the same storage.
pub struct Engine<K, V> {
    inner: Cache<K, CacheEntry<V>>,
    max_capacity: u64,
    cost: Option<CostFn<K, V>>,
    stats: Option<Arc<StatsCounter>>,
}

impl<K, V> Engine<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Get ==
    /// Returns the value stored for `key`, if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.inner.get(key).map(|entry| entry.value);

        if let Some(stats) = &self.stats {
            match value {
                Some(_) => stats.record_hit(),
                None => stats.record_miss(),
            }
        }

        value
    }

    // == Peek ==
    /// Returns the value stored for `key` without touching the counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value)
    }

    // == Has ==
    /// Returns true if `key` is present and not expired.
    pub fn has(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`, replacing any previous value.
    ///
    /// Returns false when the entry alone would exceed the capacity.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> bool {
        if !self.admits(&key, &value) {
            return false;
        }

        self.inner.insert(key, CacheEntry::new(value, ttl));
        true
    }

    // == Set If Absent ==
    /// Stores `value` under `key` for `ttl` unless the key is already present.
    ///
    /// Returns true only if this call inserted the entry.
    pub fn set_if_absent(&self, key: K, value: V, ttl: Duration) -> bool {
        if !self.admits(&key, &value) {
            return false;
        }

        self.inner
            .entry(key)
            .or_insert_with(|| CacheEntry::new(value, ttl))
            .is_fresh()
    }

    // == Delete ==
    /// Removes `key`; the deletion listener sees `DeletionCause::Explicit`.
    pub fn delete(&self, key: &K) {
        self.inner.invalidate(key);
    }

    // == Delete By Func ==
    /// Removes every entry for which `predicate` returns true.
    pub fn delete_by_func<F>(&self, predicate: F)
    where
        F: Fn(&K, &V) -> bool,
    {
        for (key, entry) in self.inner.iter() {
            if predicate(&*key, &entry.value) {
                self.inner.invalidate(key.as_ref());
            }
        }
    }

    // == Range ==
    /// Visits entries until `visitor` returns false.
    pub fn range<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for (key, entry) in self.inner.iter() {
            if !visitor(&*key, &entry.value) {
                break;
            }
        }
    }

    // == Entry Count ==
    /// Returns the number of live entries after applying pending
    /// evictions and expirations.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    // == Stats ==
    /// Returns current statistics; counters stay at zero unless the engine
    /// was built with `collect_stats`.
    pub fn stats(&self) -> CacheStats {
        let total_entries = self.entry_count();
        match &self.stats {
            Some(stats) => stats.snapshot(total_entries),
            None => CacheStats {
                total_entries,
                ..CacheStats::default()
            },
        }
    }

    fn admits(&self, key: &K, value: &V) -> bool {
        match &self.cost {
            Some(cost) => u64::from(cost(key, value)) <= self.max_capacity,
            None => true,
        }
    }
}

impl<K, V> Clone for Engine<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            max_capacity: self.max_capacity,
            cost: self.cost.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<K, V> fmt::Debug for Engine<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("max_capacity", &self.max_capacity)
            .field("stats", &self.stats.is_some())
            .finish_non_exhaustive()
    }
}
