//! Handler Chain Module
//!
//! Fuses any number of callbacks of one shape into a single ordered chain.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Engine;
use crate::error::{BuildError, HookError, Result};

// == Handler Shapes ==
/// Callback taking only the key.
pub type KeyHandler<K> = dyn Fn(&K) + Send + Sync;

/// Callback run after a store; receives the write result.
pub type StoreHandler<K, V> = dyn Fn(&K, &V, bool) + Send + Sync;

/// Callback run after an explicit delete; receives the removed value.
pub type DeleteHandler<K, V> = dyn Fn(&K, &V, crate::cache::DeletionCause) + Send + Sync;

/// Callback adjusting the TTL of a value about to be stored.
pub type ShiftTtlHandler<K, V> = dyn Fn(&K, &V, Duration) -> Duration + Send + Sync;

/// Callback validating a freshly built engine.
pub type OnStartHandler<K, V> =
    dyn Fn(&Engine<K, V>) -> std::result::Result<(), HookError> + Send + Sync;

// == Handler Chain ==
/// Ordered list of handlers for one lifecycle point.
///
/// An empty chain stands for "no handler". Invoking a chain calls every
/// handler in registration order on the caller's thread.
pub struct HandlerChain<F: ?Sized> {
    handlers: Vec<Arc<F>>,
}

impl<F: ?Sized> HandlerChain<F> {
    // == Constructor ==
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Creates a chain holding exactly `handler`.
    pub fn from_handler(handler: Arc<F>) -> Self {
        Self {
            handlers: vec![handler],
        }
    }

    // == Join ==
    /// Combines two chains, running all of `self` before all of `other`.
    ///
    /// Joining with an empty chain returns the other side unchanged.
    pub fn join(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }

        let mut handlers = self.handlers;
        handlers.extend(other.handlers);
        Self { handlers }
    }

    /// Appends `handler` at the end of the chain.
    pub fn append(&mut self, handler: Arc<F>) {
        let chain = std::mem::take(self);
        *self = chain.join(Self::from_handler(handler));
    }

    /// Returns true if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Iterates the handlers in invocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<F>> {
        self.handlers.iter()
    }
}

impl<K> HandlerChain<KeyHandler<K>> {
    /// Invokes every handler with `key`.
    pub fn call(&self, key: &K) {
        for handler in &self.handlers {
            handler(key);
        }
    }
}

impl<K, V, X: Copy> HandlerChain<dyn Fn(&K, &V, X) + Send + Sync> {
    /// Invokes every handler with `key`, `value` and `extra`.
    pub fn call_with(&self, key: &K, value: &V, extra: X) {
        for handler in &self.handlers {
            handler(key, value, extra);
        }
    }
}

impl<K, V> HandlerChain<ShiftTtlHandler<K, V>> {
    /// Runs the TTL pipeline: each shifter receives the output of the
    /// previous one. An empty chain returns `ttl` unchanged.
    pub fn shift(&self, key: &K, value: &V, ttl: Duration) -> Duration {
        self.handlers
            .iter()
            .fold(ttl, |ttl, shifter| shifter(key, value, ttl))
    }
}

impl<K, V> HandlerChain<OnStartHandler<K, V>> {
    /// Runs on-start handlers in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns `BuildError::OnStart` naming the failing handler. Handlers
    /// that already ran are not undone.
    pub fn run(&self, engine: &Engine<K, V>) -> Result<()> {
        for (index, handler) in self.handlers.iter().enumerate() {
            handler(engine).map_err(|source| BuildError::OnStart { index, source })?;
        }
        Ok(())
    }
}

impl<F: ?Sized> Default for HandlerChain<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Clone for HandlerChain<F> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for HandlerChain<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("len", &self.handlers.len())
            .finish()
    }
}
