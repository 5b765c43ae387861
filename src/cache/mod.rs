//! Cache Module
//!
//! The bounded TTL storage engine and the hooked cache decorating it.

mod engine;
mod entry;
mod hooked;
mod stats;


// Re-export public types
pub use engine::{CostFn, DeletionCause, DeletionListener, Engine, EngineBuilder};
pub use entry::CacheEntry;
pub use hooked::HookedCache;
pub use stats::CacheStats;
