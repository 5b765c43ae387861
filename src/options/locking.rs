//! Locking Option Groups
//!
//! Reader/writer locking built only from lifecycle handlers: the lock is
//! taken in a before-hook and released in the matching after-hook (or miss
//! hook), so the delegated engine call runs while it is held.
//!
//! Guards taken by a before-hook are parked in a per-thread table until the
//! matching release on the same thread drops them. A release with no parked
//! guard does nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};
use tracing::{trace, warn};

use crate::cache::DeletionCause;
use crate::options::{
    with_after_explicit_delete_handler, with_after_load_handler, with_after_store_handler,
    with_before_explicit_delete_handler, with_before_load_handler, with_before_store_handler,
    with_delete_miss_handler, with_load_miss_handler, OptionGroup,
};

// == Held Guards ==
enum HeldGuard {
    Shared(ArcRwLockReadGuard<RawRwLock, ()>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, ()>),
}

thread_local! {
    // (lock address, guard), most recent last
    static HELD: RefCell<Vec<(usize, HeldGuard)>> = const { RefCell::new(Vec::new()) };
}

// == Hook Lock ==
/// A reader/writer lock whose acquire and release live in different
/// callbacks of the same call.
pub(crate) struct HookLock {
    lock: Arc<RwLock<()>>,
}

impl HookLock {
    pub(crate) fn new() -> Self {
        Self {
            lock: Arc::new(RwLock::new(())),
        }
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.lock) as usize
    }

    fn park(&self, guard: HeldGuard) {
        let id = self.id();
        HELD.with(|held| held.borrow_mut().push((id, guard)));
    }

    /// Takes back the most recent guard of the requested mode this thread
    /// holds on this lock.
    fn unpark(&self, exclusive: bool) -> Option<HeldGuard> {
        let id = self.id();
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            let position = held.iter().rposition(|(owner, guard)| {
                *owner == id && matches!(guard, HeldGuard::Exclusive(_)) == exclusive
            })?;
            Some(held.remove(position).1)
        })
    }

    pub(crate) fn lock_shared(&self) {
        self.park(HeldGuard::Shared(self.lock.read_arc()));
    }

    pub(crate) fn unlock_shared(&self) {
        match self.unpark(false) {
            Some(guard) => drop(guard),
            None => warn!("Shared release without a matching acquire ignored"),
        }
    }

    pub(crate) fn lock_exclusive(&self) {
        self.park(HeldGuard::Exclusive(self.lock.write_arc()));
    }

    pub(crate) fn unlock_exclusive(&self) {
        match self.unpark(true) {
            Some(guard) => drop(guard),
            None => warn!("Exclusive release without a matching acquire ignored"),
        }
    }

    /// Returns true if nobody holds the lock in any mode.
    #[cfg(test)]
    pub(crate) fn is_free(&self) -> bool {
        self.lock.try_write().is_some()
    }
}

impl fmt::Debug for HookLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookLock")
            .field("locked", &self.lock.is_locked())
            .finish()
    }
}

// == Single Lock ==
/// One reader/writer lock for the whole cache.
///
/// Reads (`get`, `has`) share the lock; writes (`set`, `set_if_absent`,
/// `delete`) hold it exclusively.
pub fn with_mutex<K, V>() -> OptionGroup<K, V>
where
    K: 'static,
    V: 'static,
{
    let lock = Arc::new(HookLock::new());

    let before_load = lock.clone();
    let after_load = lock.clone();
    let load_miss = lock.clone();
    let before_store = lock.clone();
    let after_store = lock.clone();
    let before_delete = lock.clone();
    let after_delete = lock.clone();
    let delete_miss = lock;

    OptionGroup::new()
        .with(with_before_load_handler(move |_: &K| before_load.lock_shared()))
        .with(with_after_load_handler(move |_: &K| after_load.unlock_shared()))
        .with(with_load_miss_handler(move |_: &K| load_miss.unlock_shared()))
        .with(with_before_store_handler(move |_: &K| before_store.lock_exclusive()))
        .with(with_after_store_handler(move |_: &K, _: &V, _: bool| {
            after_store.unlock_exclusive()
        }))
        .with(with_before_explicit_delete_handler(move |_: &K| {
            before_delete.lock_exclusive()
        }))
        .with(with_after_explicit_delete_handler(
            move |_: &K, _: &V, _: DeletionCause| after_delete.unlock_exclusive(),
        ))
        .with(with_delete_miss_handler(move |_: &K| delete_miss.unlock_exclusive()))
}

// == Shard Table ==
/// Lazily filled map from shard id to lock. Entries are never removed.
struct ShardTable<S> {
    locks: Mutex<HashMap<S, Arc<HookLock>>>,
}

impl<S: Hash + Eq> ShardTable<S> {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the lock for `shard`, creating it atomically on first use.
    fn get_or_create(&self, shard: S) -> Arc<HookLock> {
        self.locks
            .lock()
            .entry(shard)
            .or_insert_with(|| Arc::new(HookLock::new()))
            .clone()
    }

    /// Returns the lock for `shard` only if it already exists.
    fn get(&self, shard: &S) -> Option<Arc<HookLock>> {
        self.locks.lock().get(shard).cloned()
    }

    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

// == Sharded Lock ==
/// A table of reader/writer locks, one per shard of the keyspace.
///
/// `sharder` maps each key to its shard. Before-hooks create the shard lock
/// on first use and acquire it; after-hooks release it only if the shard is
/// already in the table, and do nothing otherwise.
pub struct ShardedMutex<K, S> {
    sharder: Arc<dyn Fn(&K) -> S + Send + Sync>,
    table: Arc<ShardTable<S>>,
}

impl<K, S> ShardedMutex<K, S>
where
    K: 'static,
    S: Hash + Eq + Send + 'static,
{
    /// Creates the table, pre-warming the shards of `seed_keys`.
    pub fn new<F, I>(sharder: F, seed_keys: I) -> Self
    where
        F: Fn(&K) -> S + Send + Sync + 'static,
        I: IntoIterator<Item = K>,
    {
        let table = ShardTable::new();
        for key in seed_keys {
            table.get_or_create(sharder(&key));
        }

        Self {
            sharder: Arc::new(sharder),
            table: Arc::new(table),
        }
    }

    /// Returns the number of shard locks created so far.
    pub fn shard_count(&self) -> usize {
        self.table.len()
    }

    /// Returns true if the shard of `key` already has a lock.
    pub fn is_warm(&self, key: &K) -> bool {
        self.table.get(&(self.sharder)(key)).is_some()
    }

    fn acquire(&self) -> impl Fn(&K, bool) + Send + Sync + 'static {
        let sharder = self.sharder.clone();
        let table = self.table.clone();
        move |key: &K, exclusive: bool| {
            let lock = table.get_or_create(sharder(key));
            if exclusive {
                lock.lock_exclusive();
            } else {
                lock.lock_shared();
            }
        }
    }

    fn release(&self) -> impl Fn(&K, bool) + Send + Sync + 'static {
        let sharder = self.sharder.clone();
        let table = self.table.clone();
        move |key: &K, exclusive: bool| match table.get(&sharder(key)) {
            Some(lock) if exclusive => lock.unlock_exclusive(),
            Some(lock) => lock.unlock_shared(),
            None => trace!("Release skipped: shard has no lock"),
        }
    }

    /// Expresses the table as lifecycle handler registrations.
    pub fn options<V: 'static>(&self) -> OptionGroup<K, V> {
        let acquire = Arc::new(self.acquire());
        let release = Arc::new(self.release());

        let before_load = acquire.clone();
        let after_load = release.clone();
        let load_miss = release.clone();
        let before_store = acquire.clone();
        let after_store = release.clone();
        let before_delete = acquire;
        let after_delete = release.clone();
        let delete_miss = release;

        OptionGroup::new()
            .with(with_before_load_handler(move |key: &K| before_load(key, false)))
            .with(with_after_load_handler(move |key: &K| after_load(key, false)))
            .with(with_load_miss_handler(move |key: &K| load_miss(key, false)))
            .with(with_before_store_handler(move |key: &K| before_store(key, true)))
            .with(with_after_store_handler(move |key: &K, _: &V, _: bool| {
                after_store(key, true)
            }))
            .with(with_before_explicit_delete_handler(move |key: &K| {
                before_delete(key, true)
            }))
            .with(with_after_explicit_delete_handler(
                move |key: &K, _: &V, _: DeletionCause| after_delete(key, true),
            ))
            .with(with_delete_miss_handler(move |key: &K| delete_miss(key, true)))
    }
}

impl<K, S> Clone for ShardedMutex<K, S> {
    fn clone(&self) -> Self {
        Self {
            sharder: self.sharder.clone(),
            table: self.table.clone(),
        }
    }
}

impl<K, S> fmt::Debug for ShardedMutex<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMutex").finish_non_exhaustive()
    }
}

/// Sharded reader/writer locking; see [`ShardedMutex`].
pub fn with_sharded_mutex<K, V, S, F, I>(sharder: F, seed_keys: I) -> OptionGroup<K, V>
where
    K: 'static,
    V: 'static,
    S: Hash + Eq + Send + 'static,
    F: Fn(&K) -> S + Send + Sync + 'static,
    I: IntoIterator<Item = K>,
{
    ShardedMutex::new(sharder, seed_keys).options()
}
