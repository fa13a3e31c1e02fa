//! Degrade-open response cache.
//!
//! [`CacheLayer`] never surfaces an error: store failures are logged at `warn`
//! and read as a miss (or a no-op for writes).

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docsearch_core::traits::CacheStore;
use docsearch_core::types::{SearchFilters, SearchResponse, SearchType};
use docsearch_core::Result;

pub const SEARCH_KEY_PREFIX: &str = "search:";

#[derive(Serialize)]
struct KeyMaterial<'a> {
    query: &'a str,
    filters: &'a SearchFilters,
    search_type: SearchType,
}

/// `search:` + blake3 hex of the canonical JSON of `{query, filters, search_type}`.
///
/// `SearchFilters` serializes its fields in declaration order and omits unset
/// ones, so equal inputs always produce the same key.
pub fn cache_key(query: &str, filters: &SearchFilters, search_type: SearchType) -> String {
    let material = KeyMaterial { query, filters, search_type };
    let json = serde_json::to_vec(&material).unwrap_or_else(|_| query.as_bytes().to_vec());
    format!("{SEARCH_KEY_PREFIX}{}", blake3::hash(&json).to_hex())
}

#[derive(Clone)]
pub struct CacheLayer {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl CacheLayer {
    pub fn new(store: Option<Arc<dyn CacheStore>>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn disabled() -> Self {
        Self { store: None, ttl: Duration::ZERO }
    }

    pub async fn get(&self, key: &str) -> Option<SearchResponse> {
        let store = self.store.as_ref()?;
        let bytes = match store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(resp) => Some(resp),
            Err(e) => {
                tracing::warn!(key, error = %e, "cached payload unreadable, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, response: &SearchResponse) {
        let Some(store) = &self.store else {
            return;
        };
        let bytes = match serde_json::to_vec(response) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache payload serialization failed");
                return;
            }
        };
        if let Err(e) = store.set_with_ttl(key, bytes, self.ttl).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.invalidate_prefix(prefix).await {
            tracing::warn!(prefix, error = %e, "cache invalidation failed");
        }
    }
}

/// Process-local TTL map.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.entries.lock().insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        self.entries.lock().retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trip_and_expiry() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("search:a", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("search:a").await.unwrap(), Some(b"v".to_vec()));

        cache.set_with_ttl("search:b", b"w".to_vec(), Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("search:b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn prefix_invalidation_keeps_other_keys() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set_with_ttl("search:1", vec![1], ttl).await.unwrap();
        cache.set_with_ttl("other:1", vec![2], ttl).await.unwrap();
        cache.invalidate_prefix(SEARCH_KEY_PREFIX).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("other:1").await.unwrap().is_some());
    }

    #[test]
    fn key_is_deterministic_and_input_sensitive() {
        let filters = SearchFilters { sources: Some(vec!["mdn".into()]), ..Default::default() };
        let a = cache_key("rest api", &filters, SearchType::Hybrid);
        let b = cache_key("rest api", &filters.clone(), SearchType::Hybrid);
        assert_eq!(a, b);
        assert!(a.starts_with(SEARCH_KEY_PREFIX));
        assert_ne!(a, cache_key("rest api", &filters, SearchType::Keyword));
        assert_ne!(a, cache_key("rest api", &SearchFilters::default(), SearchType::Hybrid));
    }

    #[test]
    fn key_ignores_filter_construction_order() {
        let mut first = SearchFilters::default();
        first.technologies = Some(vec!["rust".into()]);
        first.difficulty = Some(vec![2]);
        let mut second = SearchFilters::default();
        second.difficulty = Some(vec![2]);
        second.technologies = Some(vec!["rust".into()]);
        assert_eq!(cache_key("q", &first, SearchType::Hybrid), cache_key("q", &second, SearchType::Hybrid));
    }
}
