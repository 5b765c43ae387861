//! Hooked Cache load driver
//!
//! Builds a hooked cache from environment configuration, hammers it from
//! several threads and prints the resulting statistics as JSON.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hooked_cache::cache::CacheStats;
use hooked_cache::config::{Config, LockStrategy};
use hooked_cache::options::{
    with_after_store_handler, with_initial_capacity, with_mutex, with_sharded_mutex,
    with_statistics, CacheOption,
};
use hooked_cache::HookedCache;

/// Final report printed to stdout.
#[derive(Debug, Serialize)]
struct Report {
    config: Config,
    elapsed_ms: u128,
    rejected_writes: u64,
    stats: CacheStats,
    hit_rate: f64,
}

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hooked_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_capacity={}, lock_strategy={:?}, workers={}, operations={}",
        config.max_capacity, config.lock_strategy, config.workers, config.operations
    );

    let rejected = Arc::new(AtomicU64::new(0));
    let cache = HookedCache::build(config.max_capacity, options(&config, rejected.clone()))
        .context("failed to build cache")?;

    let started = Instant::now();
    thread::scope(|scope| {
        for worker in 0..config.workers {
            let cache = &cache;
            let config = &config;
            scope.spawn(move || run_worker(cache, config, worker));
        }
    });
    let elapsed = started.elapsed();

    let stats = cache.stats();
    info!(
        "Workload finished in {:?}: hits={}, misses={}, evictions={}",
        elapsed, stats.hits, stats.misses, stats.evictions
    );

    let report = Report {
        hit_rate: stats.hit_rate(),
        elapsed_ms: elapsed.as_millis(),
        rejected_writes: rejected.load(Ordering::Relaxed),
        stats,
        config,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Translates the configuration into cache options.
fn options(config: &Config, rejected: Arc<AtomicU64>) -> Vec<CacheOption<String, u64>> {
    let mut options = Vec::new();

    if config.collect_stats {
        options.push(with_statistics());
    }
    if config.initial_capacity > 0 {
        options.push(with_initial_capacity(config.initial_capacity));
    }

    match config.lock_strategy {
        LockStrategy::None => {}
        LockStrategy::Single => options.push(with_mutex().into()),
        LockStrategy::Sharded => {
            let shards = config.shard_count.max(1) as u64;
            let sharder = move |key: &String| shard_of(key, shards);
            options.push(with_sharded_mutex(sharder, Vec::new()).into());
        }
    }

    options.push(with_after_store_handler(move |_: &String, _: &u64, stored: bool| {
        if !stored {
            rejected.fetch_add(1, Ordering::Relaxed);
        }
    }));

    options
}

fn shard_of(key: &str, shards: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() % shards
}

/// Issues a fixed mix of operations: 70% gets, 20% sets, 10% deletes.
fn run_worker(cache: &HookedCache<String, u64>, config: &Config, worker: usize) {
    let keyspace = config.max_capacity.saturating_mul(2).max(1);
    let ttl = config.ttl();

    for i in 0..config.operations {
        let n = (worker as u64 * 7919 + i as u64 * 31) % keyspace;
        let key = format!("key-{n}");

        match i % 10 {
            0..=6 => {
                cache.get(&key);
            }
            7 | 8 => {
                cache.set(key, n, ttl);
            }
            _ => cache.delete(&key),
        }
    }

    debug!("Worker {} finished", worker);
}
