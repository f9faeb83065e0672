use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use spine_core::{AnalyticsError, Result};

use crate::types::{ClusterResult, ForecastResult};

/// Results that record when they were computed.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for ClusterResult {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for ForecastResult {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Bounded LRU cache of engine results with an optional TTL.
///
/// Entries older than the TTL (measured from the result's own timestamp)
/// are dropped on read. Hits are returned as stored, original timestamp
/// included.
pub struct ResultCache<V> {
    name: &'static str,
    entries: Mutex<LruCache<String, V>>,
    ttl: Option<Duration>,
    enabled: bool,
}

impl<V: Clone + Timestamped> ResultCache<V> {
    pub fn new(name: &'static str, capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            enabled: true,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled(name: &'static str) -> Self {
        let mut cache = Self::new(name, 1, None);
        cache.enabled = false;
        cache
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        if !self.enabled {
            return Ok(None);
        }
        let mut entries = self.lock()?;
        let expired = match entries.get(key) {
            None => {
                debug!(cache = self.name, key, "cache miss");
                return Ok(None);
            }
            Some(value) => self.is_expired(value),
        };

        if expired {
            debug!(cache = self.name, key, "cache entry expired");
            entries.pop(key);
            return Ok(None);
        }

        debug!(cache = self.name, key, "cache hit");
        Ok(entries.get(key).cloned())
    }

    pub fn insert(&self, key: String, value: V) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let mut entries = self.lock()?;
        if let Some((evicted, _)) = entries.push(key.clone(), value) {
            if evicted != key {
                debug!(cache = self.name, key = %evicted, "evicted least recently used entry");
            }
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, value: &V) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now().signed_duration_since(value.timestamp()) > ttl,
            None => false,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, V>>> {
        self.entries
            .lock()
            .map_err(|e| AnalyticsError::LockPoisoned(format!("{} cache: {}", self.name, e)))
    }
}

/// Deterministic, order-sensitive cache key: SHA-256 over the input length,
/// the input values and the serialized request configuration.
pub fn cache_key<C: Serialize + ?Sized>(values: &[f64], shape: usize, config: &C) -> String {
    let mut hasher = Sha256::new();
    hasher.update((shape as u64).to_le_bytes());
    hasher.update((values.len() as u64).to_le_bytes());
    for v in values {
        hasher.update(v.to_bits().to_le_bytes());
    }
    // Serializing plain config structs does not fail; an empty body still
    // yields a stable key.
    hasher.update(serde_json::to_vec(config).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}
