//! Hooked Cache - lifecycle hooks around a bounded TTL cache
//!
//! Every read, write and delete runs registered before/after handlers around
//! the call into the storage engine. Handlers are registered through options,
//! and the bundled lock strategies are built from nothing but handlers.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use hooked_cache::options::{with_sharded_mutex, with_statistics};
//! use hooked_cache::HookedCache;
//!
//! let cache = HookedCache::<String, u64>::build(
//!     1000,
//!     vec![
//!         with_statistics(),
//!         with_sharded_mutex(|key: &String| key.len() % 16, Vec::new()).into(),
//!     ],
//! )
//! .unwrap();
//!
//! cache.set("answer".to_string(), 42, Duration::from_secs(60));
//! assert_eq!(cache.get(&"answer".to_string()), Some(42));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod options;

pub use cache::HookedCache;
pub use config::Config;
pub use error::BuildError;
