//! Options Module
//!
//! Configuration mutators applied in order while a hooked cache is built.
//! An option either adjusts the storage engine builder or registers a
//! lifecycle handler.

mod locking;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{DeletionCause, Engine, EngineBuilder};
use crate::error::{EngineError, HookError, OptionError};
use crate::hooks::Handlers;

pub use locking::{with_mutex, with_sharded_mutex, ShardedMutex};

// == Configuration ==
/// Build-time state: the engine builder plus the handlers registered so far.
pub struct Configuration<K, V> {
    /// Storage settings passed through to the engine
    pub builder: EngineBuilder<K, V>,
    /// Handlers composed so far
    pub handlers: Handlers<K, V>,
}

impl<K, V> Configuration<K, V> {
    /// Starts an empty configuration for an engine of `max_capacity`.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidCapacity` when `max_capacity` is zero.
    pub fn new(max_capacity: u64) -> Result<Self, EngineError> {
        Ok(Self {
            builder: EngineBuilder::new(max_capacity)?,
            handlers: Handlers::new(),
        })
    }
}

impl<K, V> fmt::Debug for Configuration<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("builder", &self.builder)
            .field("handlers", &self.handlers)
            .finish()
    }
}

type ApplyFn<K, V> = Box<dyn FnOnce(&mut Configuration<K, V>) -> Result<(), OptionError>>;

// == Cache Option ==
/// A single configuration step.
pub struct CacheOption<K, V> {
    apply: ApplyFn<K, V>,
}

impl<K, V> CacheOption<K, V> {
    /// Wraps any closure that mutates a configuration.
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Configuration<K, V>) -> Result<(), OptionError> + 'static,
    {
        Self {
            apply: Box::new(apply),
        }
    }

    /// Applies the option to `config`.
    ///
    /// # Errors
    /// Forwards whatever the option reports.
    pub fn apply(self, config: &mut Configuration<K, V>) -> Result<(), OptionError> {
        (self.apply)(config)
    }
}

impl<K, V> fmt::Debug for CacheOption<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOption").finish_non_exhaustive()
    }
}

// == Option Group ==
/// An ordered bundle of options, usable wherever one option is.
pub struct OptionGroup<K, V> {
    options: Vec<CacheOption<K, V>>,
}

impl<K, V> OptionGroup<K, V> {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self {
            options: Vec::new(),
        }
    }

    /// Adds `option` at the end of the group.
    pub fn with(mut self, option: CacheOption<K, V>) -> Self {
        self.options.push(option);
        self
    }

    /// Returns the number of options in the group.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns true if the group holds no option.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Applies every option in order, stopping at the first failure.
    ///
    /// # Errors
    /// Forwards the first option error.
    pub fn apply(self, config: &mut Configuration<K, V>) -> Result<(), OptionError> {
        for option in self.options {
            option.apply(config)?;
        }
        Ok(())
    }
}

impl<K, V> Default for OptionGroup<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for OptionGroup<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionGroup")
            .field("len", &self.options.len())
            .finish()
    }
}

impl<K: 'static, V: 'static> From<OptionGroup<K, V>> for CacheOption<K, V> {
    fn from(group: OptionGroup<K, V>) -> Self {
        CacheOption::new(move |config| group.apply(config))
    }
}

impl<K, V> FromIterator<CacheOption<K, V>> for OptionGroup<K, V> {
    fn from_iter<I: IntoIterator<Item = CacheOption<K, V>>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

impl<K, V> IntoIterator for OptionGroup<K, V> {
    type Item = CacheOption<K, V>;
    type IntoIter = std::vec::IntoIter<CacheOption<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.into_iter()
    }
}

// == Storage Options ==

/// Enables hit, miss and eviction counters on the engine.
pub fn with_statistics<K: 'static, V: 'static>() -> CacheOption<K, V> {
    CacheOption::new(|config| {
        config.builder.collect_stats();
        Ok(())
    })
}

/// Pre-allocates room for `initial_capacity` entries.
pub fn with_initial_capacity<K, V>(initial_capacity: usize) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
{
    CacheOption::new(move |config| {
        config.builder.initial_capacity(initial_capacity);
        Ok(())
    })
}

/// Installs the engine's deletion listener, which sees every removal
/// including evictions and expirations.
pub fn with_deletion_listener<K, V, F>(listener: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K, &V, DeletionCause) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.builder.deletion_listener(listener);
        Ok(())
    })
}

/// Installs the function estimating how much capacity an entry uses.
pub fn with_cost_estimates<K, V, F>(coster: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K, &V) -> u32 + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.builder.cost(coster);
        Ok(())
    })
}

// == Handler Options ==

/// Adds a TTL shifter; it receives the TTL produced by earlier shifters.
pub fn with_shift_ttl_handler<K, V, F>(shifter: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K, &V, Duration) -> Duration + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.shift_ttl.append(Arc::new(shifter));
        Ok(())
    })
}

/// Adds a handler run before `get` and `has`.
pub fn with_before_load_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.before_load.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a handler run after `has`, and after `get` on a hit.
pub fn with_after_load_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.after_load.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a handler run when `get` misses.
pub fn with_load_miss_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.load_miss.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a handler run before `set` and `set_if_absent`.
pub fn with_before_store_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.before_store.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a handler run after `set` and `set_if_absent` with the write result.
pub fn with_after_store_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K, &V, bool) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.after_store.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a handler run at the start of every `delete`.
pub fn with_before_explicit_delete_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.before_explicit_delete.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a handler run by `delete` with the value about to be removed.
pub fn with_after_explicit_delete_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K, &V, DeletionCause) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.after_explicit_delete.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a handler run when `delete` finds nothing to remove.
pub fn with_delete_miss_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&K) + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.delete_miss.append(Arc::new(handler));
        Ok(())
    })
}

/// Adds a check run once against the built engine; the first failure
/// aborts the build.
pub fn with_on_start_handler<K, V, F>(handler: F) -> CacheOption<K, V>
where
    K: 'static,
    V: 'static,
    F: Fn(&Engine<K, V>) -> Result<(), HookError> + Send + Sync + 'static,
{
    CacheOption::new(move |config| {
        config.handlers.on_start.append(Arc::new(handler));
        Ok(())
    })
}

/// Merges a whole handler set after the handlers registered so far.
pub fn with_handlers<K: 'static, V: 'static>(handlers: Handlers<K, V>) -> CacheOption<K, V> {
    CacheOption::new(move |config| {
        let current = std::mem::take(&mut config.handlers);
        config.handlers = current.join(handlers);
        Ok(())
    })
}
