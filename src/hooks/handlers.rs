//! Handler Set Module
//!
//! One handler chain per lifecycle point of the hooked cache.

use std::fmt;

use crate::cache::Engine;
use crate::error::HookError;
use crate::hooks::chain::{
    DeleteHandler, HandlerChain, KeyHandler, OnStartHandler, ShiftTtlHandler, StoreHandler,
};

// == Handlers ==
/// The full set of lifecycle hooks.
///
/// Every field starts empty and grows by composition while options are
/// applied. Once the cache is built the set never changes.
pub struct Handlers<K, V> {
    /// Adjusts the TTL of every stored value
    pub shift_ttl: HandlerChain<ShiftTtlHandler<K, V>>,
    /// Runs before `get` and `has` consult the engine
    pub before_load: HandlerChain<KeyHandler<K>>,
    /// Runs after `has`, and after `get` on a hit
    pub after_load: HandlerChain<KeyHandler<K>>,
    /// Runs after `get` on a miss, in place of `after_load`
    pub load_miss: HandlerChain<KeyHandler<K>>,
    /// Runs before `set` and `set_if_absent`
    pub before_store: HandlerChain<KeyHandler<K>>,
    /// Runs after `set` and `set_if_absent` with the write result
    pub after_store: HandlerChain<StoreHandler<K, V>>,
    /// Runs first in `delete`
    pub before_explicit_delete: HandlerChain<KeyHandler<K>>,
    /// Runs in `delete` with the value about to be removed
    pub after_explicit_delete: HandlerChain<DeleteHandler<K, V>>,
    /// Runs in `delete` when the key is absent, in place of
    /// `after_explicit_delete`
    pub delete_miss: HandlerChain<KeyHandler<K>>,
    /// Validates the freshly built engine
    pub on_start: HandlerChain<OnStartHandler<K, V>>,
}

impl<K, V> Handlers<K, V> {
    /// Creates a set with no handlers.
    pub fn new() -> Self {
        Self {
            shift_ttl: HandlerChain::new(),
            before_load: HandlerChain::new(),
            after_load: HandlerChain::new(),
            load_miss: HandlerChain::new(),
            before_store: HandlerChain::new(),
            after_store: HandlerChain::new(),
            before_explicit_delete: HandlerChain::new(),
            after_explicit_delete: HandlerChain::new(),
            delete_miss: HandlerChain::new(),
            on_start: HandlerChain::new(),
        }
    }

    /// Combines two sets slot by slot; handlers of `self` run first.
    pub fn join(self, other: Self) -> Self {
        Self {
            shift_ttl: self.shift_ttl.join(other.shift_ttl),
            before_load: self.before_load.join(other.before_load),
            after_load: self.after_load.join(other.after_load),
            load_miss: self.load_miss.join(other.load_miss),
            before_store: self.before_store.join(other.before_store),
            after_store: self.after_store.join(other.after_store),
            before_explicit_delete: self
                .before_explicit_delete
                .join(other.before_explicit_delete),
            after_explicit_delete: self
                .after_explicit_delete
                .join(other.after_explicit_delete),
            delete_miss: self.delete_miss.join(other.delete_miss),
            on_start: self.on_start.join(other.on_start),
        }
    }

    /// Returns true if no lifecycle point has a handler.
    pub fn is_empty(&self) -> bool {
        self.shift_ttl.is_empty()
            && self.before_load.is_empty()
            && self.after_load.is_empty()
            && self.load_miss.is_empty()
            && self.before_store.is_empty()
            && self.after_store.is_empty()
            && self.before_explicit_delete.is_empty()
            && self.after_explicit_delete.is_empty()
            && self.delete_miss.is_empty()
            && self.on_start.is_empty()
    }
}

impl<K, V> Default for Handlers<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for Handlers<K, V> {
    fn clone(&self) -> Self {
        Self {
            shift_ttl: self.shift_ttl.clone(),
            before_load: self.before_load.clone(),
            after_load: self.after_load.clone(),
            load_miss: self.load_miss.clone(),
            before_store: self.before_store.clone(),
            after_store: self.after_store.clone(),
            before_explicit_delete: self.before_explicit_delete.clone(),
            after_explicit_delete: self.after_explicit_delete.clone(),
            delete_miss: self.delete_miss.clone(),
            on_start: self.on_start.clone(),
        }
    }
}

impl<K, V> fmt::Debug for Handlers<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("shift_ttl", &self.shift_ttl.len())
            .field("before_load", &self.before_load.len())
            .field("after_load", &self.after_load.len())
            .field("load_miss", &self.load_miss.len())
            .field("before_store", &self.before_store.len())
            .field("after_store", &self.after_store.len())
            .field("before_explicit_delete", &self.before_explicit_delete.len())
            .field("after_explicit_delete", &self.after_explicit_delete.len())
            .field("delete_miss", &self.delete_miss.len())
            .field("on_start", &self.on_start.len())
            .finish()
    }
}

/// On-start handler that accepts any engine.
pub fn default_on_start<K, V>(_engine: &Engine<K, V>) -> Result<(), HookError> {
    Ok(())
}
