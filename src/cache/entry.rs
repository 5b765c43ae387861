//! Cache Entry Module
//!
//! Defines the stored form of a value together with its own TTL, and the
//! expiry policy that hands that TTL to the storage engine.

use std::time::{Duration, Instant};

use moka::Expiry;

// == Cache Entry ==
/// A stored value with its per-entry time-to-live.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Time-to-live measured from the last write
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - How long the entry lives after this write
    pub fn new(value: V, ttl: Duration) -> Self {
        Self { value, ttl }
    }
}

// == Variable TTL ==
/// Expiry policy reading the TTL carried by each entry.
///
/// Both creation and overwrite restart the clock with the TTL of the new
/// entry; reads never extend it.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct VariableTtl;

impl<K, V> Expiry<K, CacheEntry<V>> for VariableTtl {
    fn expire_after_create(
        &self,
        _key: &K,
        entry: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        entry: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("test_value", Duration::from_secs(60));

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_expiry_uses_entry_ttl_on_create() {
        let entry = CacheEntry::new(1u32, Duration::from_millis(250));
        let ttl = VariableTtl.expire_after_create(&"key", &entry, Instant::now());

        assert_eq!(ttl, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_expiry_resets_on_update() {
        let entry = CacheEntry::new(1u32, Duration::from_secs(5));
        let ttl = VariableTtl.expire_after_update(
            &"key",
            &entry,
            Instant::now(),
            Some(Duration::from_millis(10)),
        );

        assert_eq!(ttl, Some(Duration::from_secs(5)));
    }
}
