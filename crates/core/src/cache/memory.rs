//! Bounded in-process hot tier.
//!
//! Entries are evicted least-recently-used first: `get` promotes an entry,
//! `contains` does not. Without intervening reads this evicts the
//! earliest-inserted key. Expired entries are dropped lazily on read and
//! proactively by [`MemoryTier::purge_expired`].

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;

use super::CacheEntry;

/// Process-local cache of entries keyed by fingerprint.
///
/// All operations are synchronous; the lock is never held across an await.
#[derive(Debug)]
pub struct MemoryTier {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryTier {
    /// Create a tier holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    /// Get a live entry, promoting it. Expired entries are removed and reported absent.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        if entries.peek(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.pop(key);
            tracing::debug!(fingerprint = key, "memory tier entry expired on read");
            return None;
        }
        entries.get(key).cloned()
    }

    /// Insert or replace an entry.
    ///
    /// Returns the key evicted to make room, if any.
    pub fn put(&self, key: impl Into<String>, entry: CacheEntry) -> Option<String> {
        let key = key.into();
        let mut entries = self.entries.lock();
        match entries.push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => {
                tracing::debug!(evicted = %evicted, "memory tier at capacity, evicted entry");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Bump hit count and access time of a resident entry without promoting it.
    pub fn record_hit(&self, key: &str, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.lock().peek_mut(key) {
            entry.hit_count += 1;
            entry.last_accessed_at = now;
        }
    }

    /// Whether the key is resident, without affecting recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Remove every entry whose expiry has passed.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub(crate) fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn make_entry(key: &str, ttl: Duration) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            fingerprint: key.to_string(),
            original_query: key.to_string(),
            normalized_query: key.to_string(),
            state: "CA".to_string(),
            city: "Fresno".to_string(),
            result: json!({ "services": [key] }),
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            hit_count: 1,
            last_accessed_at: now,
        }
    }

    #[test]
    fn test_put_and_get() {
        let tier = MemoryTier::new(10);
        tier.put("k1", make_entry("k1", Duration::hours(1)));
        let entry = tier.get("k1").unwrap();
        assert_eq!(entry.fingerprint, "k1");
        assert!(tier.get("missing").is_none());
    }

    #[test]
    fn test_overflow_evicts_earliest_inserted() {
        let tier = MemoryTier::new(100);
        for i in 0..100 {
            let key = format!("key-{i}");
            assert!(tier.put(key.clone(), make_entry(&key, Duration::hours(1))).is_none());
        }
        assert_eq!(tier.len(), 100);

        let evicted = tier.put("key-100", make_entry("key-100", Duration::hours(1)));
        assert_eq!(evicted.as_deref(), Some("key-0"));
        assert_eq!(tier.len(), 100);
        assert!(!tier.contains("key-0"));
        assert!(tier.contains("key-1"));
        assert!(tier.contains("key-100"));
    }

    #[test]
    fn test_get_promotes_entry() {
        let tier = MemoryTier::new(2);
        tier.put("a", make_entry("a", Duration::hours(1)));
        tier.put("b", make_entry("b", Duration::hours(1)));
        assert!(tier.get("a").is_some());

        let evicted = tier.put("c", make_entry("c", Duration::hours(1)));
        assert_eq!(evicted.as_deref(), Some("b"));
        assert!(tier.contains("a"));
    }

    #[test]
    fn test_replace_same_key_is_not_eviction() {
        let tier = MemoryTier::new(2);
        tier.put("a", make_entry("a", Duration::hours(1)));
        assert!(tier.put("a", make_entry("a", Duration::hours(2))).is_none());
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_get_drops_expired_entry() {
        let tier = MemoryTier::new(10);
        tier.put("old", make_entry("old", Duration::hours(1)));
        let later = Utc::now() + Duration::hours(2);
        assert!(tier.get_at("old", later).is_none());
        assert!(tier.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let tier = MemoryTier::new(10);
        tier.put("short", make_entry("short", Duration::minutes(5)));
        tier.put("long", make_entry("long", Duration::hours(5)));

        let removed = tier.purge_expired_at(Utc::now() + Duration::hours(1));
        assert_eq!(removed, 1);
        assert!(!tier.contains("short"));
        assert!(tier.contains("long"));
    }

    #[test]
    fn test_record_hit() {
        let tier = MemoryTier::new(10);
        tier.put("k", make_entry("k", Duration::hours(1)));
        let now = Utc::now();
        tier.record_hit("k", now);
        let entry = tier.get("k").unwrap();
        assert_eq!(entry.hit_count, 2);
        assert_eq!(entry.last_accessed_at, now);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let tier = MemoryTier::new(0);
        tier.put("a", make_entry("a", Duration::hours(1)));
        assert_eq!(tier.put("b", make_entry("b", Duration::hours(1))).as_deref(), Some("a"));
        assert_eq!(tier.len(), 1);
    }
}
