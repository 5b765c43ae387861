//! Hooked Cache Module
//!
//! Runs the registered lifecycle handlers around every call into the
//! storage engine.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::cache::{CacheStats, DeletionCause, Engine};
use crate::error::{BuildError, Result};
use crate::hooks::Handlers;
use crate::options::{CacheOption, Configuration};

// == Hooked Cache ==
/// A storage engine decorated with lifecycle handlers.
///
/// Handlers run synchronously on the caller's thread, immediately before and
/// after the delegated engine call. The cache adds no locking of its own;
/// install `with_mutex` or `with_sharded_mutex` for that. Cloning shares
/// both the storage and the handlers.
pub struct HookedCache<K, V> {
    engine: Engine<K, V>,
    handlers: Arc<Handlers<K, V>>,
}

impl<K, V> HookedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Build ==
    /// Builds a cache holding at most `max_capacity` units, applying
    /// `options` in order.
    ///
    /// # Errors
    /// - `BuildError::Engine` if `max_capacity` is zero
    /// - `BuildError::Option` for the first option that fails; later ones
    ///   are not applied
    /// - `BuildError::OnStart` for the first failing on-start handler; the
    ///   built engine is dropped
    pub fn build<I>(max_capacity: u64, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = CacheOption<K, V>>,
    {
        let mut config = Configuration::new(max_capacity)?;

        for (index, option) in options.into_iter().enumerate() {
            if let Err(source) = option.apply(&mut config) {
                warn!("Cache build aborted: option #{} failed: {}", index, source);
                return Err(BuildError::Option { index, source });
            }
        }

        let Configuration { builder, handlers } = config;
        debug!("Options applied: {:?}", handlers);

        let engine = builder.build();

        if !handlers.on_start.is_empty() {
            if let Err(err) = handlers.on_start.run(&engine) {
                warn!("Cache build rolled back: {}", err);
                return Err(err);
            }
        }

        info!("Hooked cache built: max_capacity={}", max_capacity);

        Ok(Self {
            engine,
            handlers: Arc::new(handlers),
        })
    }

    // == Has ==
    /// Returns true if `key` is present.
    ///
    /// Runs before-load and after-load, whatever the result.
    pub fn has(&self, key: &K) -> bool {
        self.handlers.before_load.call(key);

        let found = self.engine.has(key);

        self.handlers.after_load.call(key);
        found
    }

    // == Get ==
    /// Returns the value stored for `key`.
    ///
    /// Runs before-load, then after-load on a hit. A miss skips after-load
    /// and runs the load-miss handlers instead.
    pub fn get(&self, key: &K) -> Option<V> {
        self.handlers.before_load.call(key);

        let Some(value) = self.engine.get(key) else {
            trace!("Get miss: after-load skipped");
            self.handlers.load_miss.call(key);
            return None;
        };

        self.handlers.after_load.call(key);
        Some(value)
    }

    // == Set ==
    /// Stores `value` under `key`; the TTL first passes through the shift
    /// pipeline.
    ///
    /// After-store always runs and receives the engine's result.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> bool {
        self.handlers.before_store.call(&key);

        let ttl = self.handlers.shift_ttl.shift(&key, &value, ttl);
        let stored = self.engine.set(key.clone(), value.clone(), ttl);

        self.handlers.after_store.call_with(&key, &value, stored);
        stored
    }

    // == Set If Absent ==
    /// Stores `value` under `key` unless the key is already present.
    ///
    /// After-store always runs and receives the engine's result.
    pub fn set_if_absent(&self, key: K, value: V, ttl: Duration) -> bool {
        self.handlers.before_store.call(&key);

        let ttl = self.handlers.shift_ttl.shift(&key, &value, ttl);
        let stored = self.engine.set_if_absent(key.clone(), value.clone(), ttl);

        self.handlers.after_store.call_with(&key, &value, stored);
        stored
    }

    // == Delete ==
    /// Removes `key`.
    ///
    /// Runs before-delete, then looks the key up. If it is absent the
    /// delete-miss handlers run and the engine is not asked to delete
    /// anything. Otherwise after-delete sees the current value with
    /// `DeletionCause::Explicit`, and only then is the entry removed.
    ///
    /// The lookup reads the engine directly: no load handlers run (so a
    /// lock group does not take its read lock on top of the write lock held
    /// for the delete) and the hit/miss counters are left alone.
    pub fn delete(&self, key: &K) {
        self.handlers.before_explicit_delete.call(key);

        let Some(value) = self.engine.peek(key) else {
            trace!("Delete miss: nothing to remove");
            self.handlers.delete_miss.call(key);
            return;
        };

        self.handlers
            .after_explicit_delete
            .call_with(key, &value, DeletionCause::Explicit);
        self.engine.delete(key);
    }

    // == Delete By Func ==
    /// Removes every entry matching `predicate`. No handlers run.
    pub fn delete_by_func<F>(&self, predicate: F)
    where
        F: Fn(&K, &V) -> bool,
    {
        self.engine.delete_by_func(predicate);
    }

    // == Range ==
    /// Visits entries until `visitor` returns false. No handlers run.
    pub fn range<F>(&self, visitor: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.engine.range(visitor);
    }

    // == Stats ==
    /// Returns the engine's statistics.
    pub fn stats(&self) -> CacheStats {
        self.engine.stats()
    }

    /// Returns the number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.engine.entry_count()
    }

    /// Returns the underlying engine, bypassing every handler.
    pub fn engine(&self) -> &Engine<K, V> {
        &self.engine
    }
}

impl<K, V> Clone for HookedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<K, V> fmt::Debug for HookedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedCache")
            .field("engine", &self.engine)
            .field("handlers", &self.handlers)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OptionError;
    use crate::options::{
        with_after_explicit_delete_handler, with_after_load_handler, with_after_store_handler,
        with_before_explicit_delete_handler, with_before_load_handler, with_before_store_handler,
        with_delete_miss_handler, with_load_miss_handler, with_on_start_handler,
        with_shift_ttl_handler, with_statistics,
    };
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    const TTL: Duration = Duration::from_secs(60);

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn recorder(log: &Log) -> impl Fn(String) + Send + Sync + 'static {
        let log = log.clone();
        move |entry| log.lock().unwrap().push(entry)
    }

    /// Records every lifecycle point into `log`.
    fn recording_options(log: &Log) -> Vec<CacheOption<String, u32>> {
        let (a, b, c, d) = (recorder(log), recorder(log), recorder(log), recorder(log));
        let (e, f, g, h) = (recorder(log), recorder(log), recorder(log), recorder(log));
        vec![
            with_before_load_handler(move |k: &String| a(format!("before_load:{k}"))),
            with_after_load_handler(move |k: &String| b(format!("after_load:{k}"))),
            with_load_miss_handler(move |k: &String| c(format!("load_miss:{k}"))),
            with_before_store_handler(move |k: &String| d(format!("before_store:{k}"))),
            with_after_store_handler(move |k: &String, v: &u32, ok: bool| {
                e(format!("after_store:{k}:{v}:{ok}"))
            }),
            with_before_explicit_delete_handler(move |k: &String| {
                f(format!("before_delete:{k}"))
            }),
            with_after_explicit_delete_handler(move |k: &String, v: &u32, c: DeletionCause| {
                g(format!("after_delete:{k}:{v}:{c:?}"))
            }),
            with_delete_miss_handler(move |k: &String| h(format!("delete_miss:{k}"))),
        ]
    }

    fn recording_cache(log: &Log) -> HookedCache<String, u32> {
        HookedCache::build(100, recording_options(log)).unwrap()
    }

    #[test]
    fn test_build_without_options() {
        let cache = HookedCache::<String, u32>::build(100, Vec::new()).unwrap();

        assert!(cache.set("k".to_string(), 1, TTL));
        assert_eq!(cache.get(&"k".to_string()), Some(1));
    }

    #[test]
    fn test_build_rejects_zero_capacity() {
        let result = HookedCache::<String, u32>::build(0, Vec::new());
        assert!(matches!(result, Err(BuildError::Engine(_))));
    }

    #[test]
    fn test_get_hit_runs_both_load_hooks() {
        let log = log();
        let cache = recording_cache(&log);
        cache.engine().set("x".to_string(), 1, TTL);

        assert_eq!(cache.get(&"x".to_string()), Some(1));
        assert_eq!(entries(&log), vec!["before_load:x", "after_load:x"]);
    }

    #[test]
    fn test_get_miss_skips_after_load() {
        let log = log();
        let cache = recording_cache(&log);

        assert_eq!(cache.get(&"x".to_string()), None);
        assert_eq!(entries(&log), vec!["before_load:x", "load_miss:x"]);
    }

    #[test]
    fn test_has_runs_after_load_regardless_of_result() {
        let log = log();
        let cache = recording_cache(&log);

        assert!(!cache.has(&"x".to_string()));
        cache.engine().set("x".to_string(), 1, TTL);
        assert!(cache.has(&"x".to_string()));

        assert_eq!(
            entries(&log),
            vec!["before_load:x", "after_load:x", "before_load:x", "after_load:x"]
        );
    }

    #[test]
    fn test_set_if_absent_reports_failure_to_after_store() {
        let log = log();
        let cache = recording_cache(&log);

        assert!(cache.set_if_absent("x".to_string(), 1, TTL));
        assert!(!cache.set_if_absent("x".to_string(), 2, TTL));

        assert_eq!(
            entries(&log),
            vec![
                "before_store:x",
                "after_store:x:1:true",
                "before_store:x",
                "after_store:x:2:false",
            ]
        );
        assert_eq!(cache.engine().peek(&"x".to_string()), Some(1));
    }

    #[test]
    fn test_delete_present_key() {
        let log = log();
        let cache = recording_cache(&log);
        cache.engine().set("x".to_string(), 7, TTL);

        cache.delete(&"x".to_string());

        assert_eq!(
            entries(&log),
            vec!["before_delete:x", "after_delete:x:7:Explicit"]
        );
        assert!(!cache.engine().has(&"x".to_string()));
    }

    #[test]
    fn test_delete_absent_key_short_circuits() {
        let log = log();
        let cache = recording_cache(&log);

        cache.delete(&"x".to_string());

        assert_eq!(entries(&log), vec!["before_delete:x", "delete_miss:x"]);
    }

    #[test]
    fn test_after_delete_runs_before_engine_delete() {
        let engine_slot: Arc<Mutex<Option<Engine<String, u32>>>> = Arc::new(Mutex::new(None));
        let still_present = Arc::new(Mutex::new(None));

        let slot = engine_slot.clone();
        let capture = engine_slot.clone();
        let observed = still_present.clone();
        let cache = HookedCache::build(
            100,
            vec![
                with_on_start_handler(move |engine: &Engine<String, u32>| {
                    *capture.lock().unwrap() = Some(engine.clone());
                    Ok(())
                }),
                with_after_explicit_delete_handler(move |k: &String, _: &u32, _: DeletionCause| {
                    let present = slot.lock().unwrap().as_ref().map(|e| e.has(k));
                    *observed.lock().unwrap() = present;
                }),
            ],
        )
        .unwrap();

        cache.engine().set("x".to_string(), 1, TTL);
        cache.delete(&"x".to_string());

        assert_eq!(*still_present.lock().unwrap(), Some(true));
        assert!(!cache.engine().has(&"x".to_string()));
    }

    #[test]
    fn test_bulk_operations_bypass_hooks() {
        let log = log();
        let cache = recording_cache(&log);
        for i in 0..5 {
            cache.engine().set(format!("k{i}"), i, TTL);
        }

        let mut seen = 0;
        cache.range(|_, _| {
            seen += 1;
            true
        });
        cache.delete_by_func(|_, value| *value < 3);

        assert_eq!(seen, 5);
        assert_eq!(cache.entry_count(), 2);
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_shift_ttl_applies_in_registration_order() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let first = applied.clone();
        let second = applied.clone();

        let cache = HookedCache::build(
            100,
            vec![
                with_shift_ttl_handler(move |_: &String, _: &u32, ttl: Duration| {
                    first.lock().unwrap().push(ttl);
                    ttl * 3
                }),
                with_shift_ttl_handler(move |_: &String, _: &u32, ttl: Duration| {
                    second.lock().unwrap().push(ttl);
                    ttl - Duration::from_secs(1)
                }),
            ],
        )
        .unwrap();

        cache.set("x".to_string(), 1, Duration::from_secs(2));

        assert_eq!(
            *applied.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(6)]
        );
    }

    #[test]
    fn test_failing_option_stops_pipeline() {
        let log = log();
        let late = log.clone();

        let result = HookedCache::<String, u32>::build(
            100,
            vec![
                with_statistics(),
                CacheOption::new(|_| Err(OptionError::Invalid("bad option".to_string()))),
                CacheOption::new(move |_| {
                    late.lock().unwrap().push("applied".to_string());
                    Ok(())
                }),
            ],
        );

        match result {
            Err(BuildError::Option { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected option failure, got {other:?}"),
        }
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_on_start_sees_built_engine() {
        let cache = HookedCache::<String, u32>::build(
            100,
            vec![with_on_start_handler(|engine: &Engine<String, u32>| {
                engine.set("warm".to_string(), 1, TTL);
                Ok(())
            })],
        )
        .unwrap();

        assert_eq!(cache.get(&"warm".to_string()), Some(1));
    }

    #[test]
    fn test_second_on_start_failure_aborts_build() {
        let log = log();
        let first = log.clone();
        let third = log.clone();

        let result = HookedCache::<String, u32>::build(
            100,
            vec![
                with_on_start_handler(move |_: &Engine<String, u32>| {
                    first.lock().unwrap().push("first".to_string());
                    Ok(())
                }),
                with_on_start_handler(|_: &Engine<String, u32>| Err("schema mismatch".into())),
                with_on_start_handler(move |_: &Engine<String, u32>| {
                    third.lock().unwrap().push("third".to_string());
                    Ok(())
                }),
            ],
        );

        match result {
            Err(BuildError::OnStart { index, source }) => {
                assert_eq!(index, 1);
                assert_eq!(source.to_string(), "schema mismatch");
            }
            other => panic!("expected on-start failure, got {other:?}"),
        }
        // The first handler's effects stay; nothing is undone.
        assert_eq!(entries(&log), vec!["first"]);
    }
}
