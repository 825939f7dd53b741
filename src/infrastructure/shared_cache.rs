//! Shared Read-Model Cache
//!
//! Process-wide key/value cache with per-entry expiration, backed by DashMap
//! for concurrent access without external locking.

use crate::domain::ports::Disposable;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached value and its bookkeeping.
///
/// Entries are never mutated after insertion: an update replaces the
/// whole entry.
#[derive(Clone)]
pub struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    /// When the entry was stored
    pub inserted_at: Instant,
    /// When the entry stops being served
    pub expires_at: Instant,
}

impl CacheEntry {
    fn new(value: Arc<dyn Any + Send + Sync>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            inserted_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether the entry is past its expiration at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("inserted_at", &self.inserted_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// DashMap-backed shared cache.
///
/// Values are stored type-erased; `get` hands back a clone of the stored
/// value when the requested type matches.
pub struct SharedCache {
    name: String,
    entries: Arc<DashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl SharedCache {
    /// Create a new cache whose entries expire after `default_ttl`.
    pub fn new(name: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            entries: Arc::new(DashMap::new()),
            default_ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get an unexpired value.
    ///
    /// Returns `None` when the key is absent, expired, or holds a value of
    /// another type. Expired entries are evicted on the way.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let value = {
            let entry = self.entries.get(key)?;
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        };

        match value {
            Some(value) => value.downcast_ref::<T>().cloned(),
            None => {
                // Only evict if nobody replaced it in the meantime
                self.entries.remove_if(key, |_, e| e.is_expired(now));
                None
            }
        }
    }

    /// Store a value with the default expiration, replacing any previous entry.
    pub fn insert<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value with an explicit expiration, replacing any previous entry.
    pub fn insert_with_ttl<T>(&self, key: impl Into<String>, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .insert(key.into(), CacheEntry::new(Arc::new(value), ttl));
    }

    /// Remove an entry.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Inspect the bookkeeping of an entry, expired or not.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove all entries past their expiration.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Start the background eviction task.
    ///
    /// Reads already ignore expired entries; this only bounds memory.
    /// The task stops once the cache has been dropped.
    pub fn start_gc(&self, interval: Duration) {
        let entries = Arc::downgrade(&self.entries);
        let name = self.name.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                let Some(entries) = entries.upgrade() else {
                    break;
                };

                let now = Instant::now();
                let before = entries.len();
                entries.retain(|_, entry| !entry.is_expired(now));
                let removed = before.saturating_sub(entries.len());

                if removed > 0 {
                    tracing::debug!(cache = %name, "cache GC removed {} expired entries", removed);
                }
            }
        });
    }
}

impl Disposable for SharedCache {
    fn dispose(&self) -> anyhow::Result<()> {
        let count = self.entries.len();
        self.entries.clear();
        tracing::debug!(cache = %self.name, "cache disposed, dropped {} entries", count);
        Ok(())
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
