//! Result cache in front of the blender.

use parking_lot::RwLock;
use pipeline::RecommendationResult;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cache key for one (user, N) request
pub fn cache_key(user_id: &str, n: usize) -> String {
    format!("recommendations:{}:{}", user_id, n)
}

pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<RecommendationResult>;
    fn put(&self, key: &str, value: RecommendationResult, ttl: Duration);
    fn remove(&self, key: &str);
    /// Drop every entry
    fn flush(&self);
}

/// Process-local cache; expired entries are dropped on the next write
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, (Instant, RecommendationResult)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<RecommendationResult> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|(expires_at, _)| Instant::now() < *expires_at)
            .map(|(_, value)| value.clone())
    }

    fn put(&self, key: &str, value: RecommendationResult, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, (expires_at, _)| now < *expires_at);
        entries.insert(key.to_string(), (now + ttl, value));
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn flush(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::RecommendationType;

    fn result(user: &str) -> RecommendationResult {
        RecommendationResult::ranked(
            user,
            true,
            RecommendationType::Personalized,
            vec![("a".to_string(), 1.0)],
        )
    }

    #[test]
    fn test_key_format() {
        assert_eq!(cache_key("C001", 5), "recommendations:C001:5");
        assert_ne!(cache_key("C001", 5), cache_key("C001", 10));
    }

    #[test]
    fn test_put_get_flush() {
        let cache = InMemoryCache::new();
        let key = cache_key("u1", 3);
        assert!(cache.get(&key).is_none());

        cache.put(&key, result("u1"), Duration::from_secs(60));
        assert_eq!(cache.get(&key), Some(result("u1")));

        cache.put(&cache_key("u2", 3), result("u2"), Duration::from_secs(60));
        cache.remove(&key);
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 1);

        cache.flush();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let cache = InMemoryCache::new();
        cache.put("k", result("u1"), Duration::ZERO);
        assert!(cache.get("k").is_none());

        // the next write evicts it
        cache.put("other", result("u2"), Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
    }
}
