use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use super::types::{DetectionMethod, DetectionResult};

/// Longest normalized key, in characters
pub const MAX_KEY_LENGTH: usize = 100;

#[derive(Debug, Clone)]
struct CachedDecision {
    result: DetectionResult,
    created_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Detection decisions keyed by normalized message text
///
/// Entries older than the TTL are never returned. Once the cache grows past
/// `max_entries` it drops expired entries, then the oldest ones.
#[derive(Debug)]
pub struct DecisionCache {
    entries: DashMap<String, CachedDecision>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DecisionCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, message: &str) -> Option<DetectionResult> {
        let key = normalize_key(message);
        if key.is_empty() {
            return None;
        }

        let found = self
            .entries
            .get(&key)
            .map(|entry| (entry.created_at.elapsed() < self.ttl, entry.result.clone()));

        match found {
            Some((true, result)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Detection cache hit");
                Some(result.with_method(DetectionMethod::Cached))
            }
            Some((false, _)) => {
                self.entries
                    .remove_if(&key, |_, entry| entry.created_at.elapsed() >= self.ttl);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, message: &str, result: &DetectionResult) {
        let key = normalize_key(message);
        if key.is_empty() {
            return;
        }

        self.entries.insert(
            key,
            CachedDecision {
                result: result.clone(),
                created_at: Instant::now(),
            },
        );

        if self.entries.len() > self.max_entries {
            self.prune();
        }
    }

    /// Drops expired entries, then the oldest until within bounds
    pub fn prune(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.created_at.elapsed() < self.ttl);

        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess > 0 {
            let mut by_age: Vec<(String, Instant)> = self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.created_at))
                .collect();
            by_age.sort_by_key(|(_, created_at)| *created_at);
            for (key, _) in by_age.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }

        debug!(
            before,
            after = self.entries.len(),
            "Pruned detection cache"
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

/// Lowercases, strips punctuation, collapses whitespace and truncates
pub fn normalize_key(message: &str) -> String {
    let cleaned: String = message
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_KEY_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision() -> DetectionResult {
        DetectionResult::respond(0.65, "greeting")
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Hello, Steve!!!"), "hello steve");
        assert_eq!(normalize_key("  hello \t  steve "), "hello steve");
        assert_eq!(normalize_key(&"a".repeat(250)).len(), MAX_KEY_LENGTH);
        assert_eq!(normalize_key("?!..."), "");
    }

    #[test]
    fn test_hit_on_equivalent_message() {
        let cache = DecisionCache::new(Duration::from_secs(60), 10);
        cache.insert("Hello, Steve!!!", &decision());

        let hit = cache.get("hello steve").unwrap();
        assert_eq!(hit.method, DetectionMethod::Cached);
        assert_eq!(hit.confidence, 0.65);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_miss_is_counted() {
        let cache = DecisionCache::new(Duration::from_secs(60), 10);
        assert!(cache.get("anything").is_none());
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 0,
                misses: 1,
                size: 0
            }
        );
    }

    #[test]
    fn test_expired_entry_is_not_returned() {
        let cache = DecisionCache::new(Duration::from_millis(20), 10);
        cache.insert("hello", &decision());
        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get("hello").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let cache = DecisionCache::new(Duration::from_secs(60), 2);
        cache.insert("first", &decision());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("second", &decision());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("third", &decision());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn test_empty_key_is_not_cached() {
        let cache = DecisionCache::new(Duration::from_secs(60), 10);
        cache.insert("!!!", &decision());
        assert!(cache.is_empty());
    }
}
