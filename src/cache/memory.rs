//! In-memory cache implementation using moka

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_CAPACITY: u64 = 10_000;
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Entries are stored as JSON strings so the cache can hold any
/// serializable type behind one value type.
#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// In-memory cache using moka's async cache with TTL expiration.
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a cache with custom capacity and TTL.
    ///
    /// Expiration uses the cache-wide time-to-live; the per-call TTL on
    /// `set` is capped by this value.
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .support_invalidation_closures()
            .build();

        Self { cache, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Glob-style matching: `*` matches any sequence, `?` one character.
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern_chars: Vec<char> = pattern.chars().collect();
        let key_chars: Vec<char> = key.chars().collect();
        Self::glob_match(&pattern_chars, &key_chars, 0, 0)
    }

    fn glob_match(pattern: &[char], key: &[char], pi: usize, ki: usize) -> bool {
        if pi == pattern.len() {
            return ki == key.len();
        }

        match pattern[pi] {
            '*' => {
                if Self::glob_match(pattern, key, pi + 1, ki) {
                    return true;
                }
                ki < key.len() && Self::glob_match(pattern, key, pi, ki + 1)
            }
            '?' => ki < key.len() && Self::glob_match(pattern, key, pi + 1, ki + 1),
            p => ki < key.len() && key[ki] == p && Self::glob_match(pattern, key, pi + 1, ki + 1),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let entry = CacheEntry::new(value)?;
        self.cache.insert(key.to_string(), entry).await;
        // Expiration is governed by the cache-wide time_to_live.
        let _ = ttl;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        // Full scan; acceptable at the capacities we run with.
        let keys_to_delete: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys_to_delete {
            self.cache.invalidate(&key).await;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();

        cache
            .set("quota:usage:1", &7i64, Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<i64> = cache.get("quota:usage:1").await.unwrap();
        assert_eq!(result, Some(7));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new();
        let result: Option<String> = cache.get("missing").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();

        cache
            .set("key1", &"value1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.delete("key1").await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set("quota:usage:1", &1i64, ttl).await.unwrap();
        cache.set("quota:usage:2", &2i64, ttl).await.unwrap();
        cache.set("settings:maintenance", &false, ttl).await.unwrap();

        cache.delete_pattern("quota:usage:*").await.unwrap();

        let one: Option<i64> = cache.get("quota:usage:1").await.unwrap();
        let two: Option<i64> = cache.get("quota:usage:2").await.unwrap();
        let flag: Option<bool> = cache.get("settings:maintenance").await.unwrap();

        assert_eq!(one, None);
        assert_eq!(two, None);
        assert_eq!(flag, Some(false));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set("a", &1i64, ttl).await.unwrap();
        cache.set("b", &2i64, ttl).await.unwrap();
        cache.clear().await.unwrap();

        let a: Option<i64> = cache.get("a").await.unwrap();
        let b: Option<i64> = cache.get("b").await.unwrap();
        assert_eq!(a, None);
        assert_eq!(b, None);
    }

    #[tokio::test]
    async fn test_complex_types() {
        let cache = MemoryCache::new();

        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Usage {
            used: i64,
            limit: Option<i64>,
        }

        let usage = Usage {
            used: 3,
            limit: Some(10),
        };

        cache
            .set("quota:1", &usage, Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<Usage> = cache.get("quota:1").await.unwrap();
        assert_eq!(result, Some(usage));
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let ttl = Duration::from_millis(10);
        let cache = MemoryCache::with_capacity_and_ttl(100, ttl);

        cache.set("short", &"lived".to_string(), ttl).await.unwrap();
        let present: Option<String> = cache.get("short").await.unwrap();
        assert_eq!(present, Some("lived".to_string()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.cache.run_pending_tasks().await;

        let gone: Option<String> = cache.get("short").await.unwrap();
        assert_eq!(gone, None);
    }

    #[test]
    fn test_pattern_matches() {
        assert!(MemoryCache::pattern_matches("quota:*", "quota:123"));
        assert!(MemoryCache::pattern_matches("*", "anything"));
        assert!(!MemoryCache::pattern_matches("quota:*", "posts:123"));

        assert!(MemoryCache::pattern_matches("user:?:plan", "user:1:plan"));
        assert!(!MemoryCache::pattern_matches("user:?:plan", "user:10:plan"));

        assert!(MemoryCache::pattern_matches("exact", "exact"));
        assert!(!MemoryCache::pattern_matches("exact", "exactx"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            #[test]
            fn roundtrip_preserves_value(
                key in "[a-z]{1,10}",
                value in "[a-z]{1,100}"
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let cache = MemoryCache::new();
                    cache.set(&key, &value, Duration::from_secs(60)).await.unwrap();
                    let result: Option<String> = cache.get(&key).await.unwrap();
                    prop_assert_eq!(result, Some(value));
                    Ok(())
                })?;
            }

            #[test]
            fn prefix_pattern_only_deletes_matching(
                suffix in "[a-z]{1,8}",
                other in "[a-z]{1,8}"
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let cache = MemoryCache::new();
                    let ttl = Duration::from_secs(60);
                    let matched = format!("posts:{}", suffix);
                    let unmatched = format!("teams:{}", other);

                    cache.set(&matched, &1i64, ttl).await.unwrap();
                    cache.set(&unmatched, &2i64, ttl).await.unwrap();
                    cache.delete_pattern("posts:*").await.unwrap();

                    let m: Option<i64> = cache.get(&matched).await.unwrap();
                    let u: Option<i64> = cache.get(&unmatched).await.unwrap();
                    prop_assert_eq!(m, None);
                    prop_assert_eq!(u, Some(2));
                    Ok(())
                })?;
            }
        }
    }
}
