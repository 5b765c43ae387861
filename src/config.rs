//! Configuration Module
//!
//! Loads the load-driver settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

// == Lock Strategy ==
/// Which locking option group the driver installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStrategy {
    /// No locking beyond the engine's own
    None,
    /// One reader/writer lock for the whole cache
    Single,
    /// One reader/writer lock per shard
    Sharded,
}

impl FromStr for LockStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "single" => Ok(Self::Single),
            "sharded" => Ok(Self::Sharded),
            other => Err(format!("unknown lock strategy: {other}")),
        }
    }
}

/// Driver configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_capacity: u64,
    /// Pre-allocated entries, 0 leaves the engine default
    pub initial_capacity: usize,
    /// TTL in seconds for every stored entry
    pub default_ttl: u64,
    /// Locking option group to install
    pub lock_strategy: LockStrategy,
    /// Number of shards for the sharded strategy
    pub shard_count: usize,
    /// Number of worker threads
    pub workers: usize,
    /// Operations issued by each worker
    pub operations: usize,
    /// Whether the engine collects hit/miss/eviction counters
    pub collect_stats: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `INITIAL_CAPACITY` - Pre-allocated entries (default: 0)
    /// - `DEFAULT_TTL` - Entry TTL in seconds (default: 300)
    /// - `LOCK_STRATEGY` - `none`, `single` or `sharded` (default: sharded)
    /// - `SHARD_COUNT` - Shards for the sharded strategy (default: 16)
    /// - `WORKERS` - Worker threads (default: 4)
    /// - `OPERATIONS` - Operations per worker (default: 10000)
    /// - `COLLECT_STATS` - Collect statistics (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_capacity: parse_var("MAX_CAPACITY").unwrap_or(defaults.max_capacity),
            initial_capacity: parse_var("INITIAL_CAPACITY").unwrap_or(defaults.initial_capacity),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            lock_strategy: parse_var("LOCK_STRATEGY").unwrap_or(defaults.lock_strategy),
            shard_count: parse_var("SHARD_COUNT").unwrap_or(defaults.shard_count),
            workers: parse_var("WORKERS").unwrap_or(defaults.workers),
            operations: parse_var("OPERATIONS").unwrap_or(defaults.operations),
            collect_stats: parse_var("COLLECT_STATS").unwrap_or(defaults.collect_stats),
        }
    }

    /// Returns the entry TTL as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            initial_capacity: 0,
            default_ttl: 300,
            lock_strategy: LockStrategy::Sharded,
            shard_count: 16,
            workers: 4,
            operations: 10_000,
            collect_stats: true,
        }
    }
}
