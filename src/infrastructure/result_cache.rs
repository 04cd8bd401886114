//! Short-lived result cache
//!
//! Entries expire lazily: nothing sweeps the map, a `get` at or after an
//! entry's expiry removes it and reports a miss.

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Snapshot of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub keys: Vec<String>,
    pub estimated_size_bytes: usize,
}

/// Keyed TTL cache, shared through an `Arc`
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> ResultCache<V>
where
    V: Clone + Serialize + Debug + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write guard; a concurrent `set` may have refreshed it
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                debug!("Cache entry expired: {}", key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store `value` under `key`. A zero `ttl` stores an already expired entry.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let expires_at = Instant::now() + ttl;
        debug!("Cache set: {} (ttl {:?})", key, ttl);
        self.entries
            .write()
            .await
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Remove one key, or everything when `key` is `None`. Returns the number removed.
    pub async fn clear(&self, key: Option<&str>) -> usize {
        let mut entries = self.entries.write().await;
        match key {
            Some(key) => usize::from(entries.remove(key).is_some()),
            None => {
                let removed = entries.len();
                entries.clear();
                removed
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();

        let estimated_size_bytes = entries
            .iter()
            .map(|(key, entry)| key.len() + estimate_size(&entry.value))
            .sum();

        CacheStats {
            entries: entries.len(),
            keys,
            estimated_size_bytes,
        }
    }
}

fn estimate_size<V: Serialize + Debug>(value: &V) -> usize {
    match serde_json::to_vec(value) {
        Ok(bytes) => bytes.len(),
        Err(_) => format!("{value:?}").len(),
    }
}
