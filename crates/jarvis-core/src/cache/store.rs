//! Two-tier cache facade with tag indexing.
//!
//! Reads go ephemeral first, then durable; a durable hit warms the
//! ephemeral tier for the entry's remaining lifetime. Backend failures are
//! logged and degrade to a miss or a no-op.

use super::memory::MemoryCache;
use super::sqlite::SqliteCache;
use super::traits::{BackendStats, CacheBackend, CacheEntry};
use crate::config::{CacheConfig, CacheDefaults};
use crate::db::Database;
use crate::error::{JarvisError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Which tiers a clear operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearScope {
    #[default]
    All,
    Ephemeral,
    Durable,
}

impl FromStr for ClearScope {
    type Err = JarvisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ClearScope::All),
            "ephemeral" | "memory" => Ok(ClearScope::Ephemeral),
            "durable" | "database" => Ok(ClearScope::Durable),
            other => Err(JarvisError::validation(
                "scope",
                format!("unknown cache scope '{}'", other),
            )),
        }
    }
}

/// Number of entries affected in each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounts {
    pub ephemeral: usize,
    pub durable: usize,
}

impl CacheCounts {
    pub fn total(&self) -> usize {
        self.ephemeral + self.durable
    }
}

/// Snapshot of cache usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub hit_rate: f64,
    pub ephemeral: Option<BackendStats>,
    pub durable: Option<BackendStats>,
}

/// Keyed get/set store over an ephemeral and an optional durable tier.
pub struct CacheStore {
    ephemeral: Arc<dyn CacheBackend>,
    durable: Option<Arc<dyn CacheBackend>>,
    default_ttl: Duration,
    enabled: AtomicBool,
    /// Serializes tag-index read-modify-write cycles.
    tag_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStore {
    /// Create a store over explicit backends.
    pub fn new(
        ephemeral: Arc<dyn CacheBackend>,
        durable: Option<Arc<dyn CacheBackend>>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            ephemeral,
            durable,
            default_ttl: config.default_ttl,
            enabled: AtomicBool::new(config.enabled),
            tag_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Memory tier plus a SQLite tier on `db`.
    pub fn with_database(db: Database, config: &CacheConfig) -> Result<Self> {
        let durable: Arc<dyn CacheBackend> = Arc::new(SqliteCache::new(db)?);
        Ok(Self::new(
            Arc::new(MemoryCache::new(config.memory_capacity)),
            Some(durable),
            config,
        ))
    }

    /// Memory tier only.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(Arc::new(MemoryCache::new(config.memory_capacity)), None, config)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Stop serving and storing entries. The ephemeral tier is dropped.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        let cleared = self.degrade("clear", self.ephemeral.clear(None), 0);
        debug!("Cache disabled, dropped {} ephemeral entries", cleared);
    }

    fn backends(&self) -> impl Iterator<Item = &Arc<dyn CacheBackend>> {
        std::iter::once(&self.ephemeral).chain(self.durable.iter())
    }

    fn degrade<T>(&self, op: &str, result: Result<T>, fallback: T) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                let err = JarvisError::CacheBackend {
                    message: format!("{} failed: {}", op, e),
                };
                warn!("{}", err);
                fallback
            }
        }
    }

    /// Full live entry for `key`, if any tier has one.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        if !self.is_enabled() {
            return None;
        }

        if let Some(entry) = self.degrade("ephemeral get", self.ephemeral.get_entry(key), None) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry);
        }

        if let Some(durable) = &self.durable {
            if let Some(entry) = self.degrade("durable get", durable.get_entry(key), None) {
                self.degrade("ephemeral warm", self.ephemeral.put_entry(&entry), ());
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Payload for `key`, if live.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_entry(key).map(|entry| entry.payload)
    }

    /// Typed read. A payload that doesn't deserialize counts as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.get(key)?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Cached payload for {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store `payload` under `key` for `ttl`. Returns `false` on a zero TTL.
    pub fn set(&self, key: &str, payload: Value, ttl: Duration) -> bool {
        match CacheEntry::new(key, payload, ttl) {
            Some(entry) => self.put(entry),
            None => false,
        }
    }

    /// Store with the default TTL.
    pub fn set_default(&self, key: &str, payload: Value) -> bool {
        self.set(key, payload, self.default_ttl)
    }

    /// Look up `keys`, filling the misses from `generate`.
    ///
    /// `generate` is called once with the missing keys, and only if there
    /// are any. Generated values are stored with the default TTL; pairs for
    /// keys that were not asked for are dropped.
    pub fn prefetch<F>(&self, keys: &[&str], generate: F) -> BTreeMap<String, Value>
    where
        F: FnOnce(&[String]) -> Vec<(String, Value)>,
    {
        let mut found = BTreeMap::new();
        let mut missing: Vec<String> = Vec::new();
        for key in keys {
            match self.get(key) {
                Some(payload) => {
                    found.insert(key.to_string(), payload);
                }
                None => {
                    if !missing.iter().any(|m| m.as_str() == *key) {
                        missing.push(key.to_string());
                    }
                }
            }
        }
        if missing.is_empty() {
            return found;
        }

        for (key, payload) in generate(&missing) {
            if !missing.contains(&key) {
                debug!("Prefetch ignored unrequested key {}", key);
                continue;
            }
            self.set_default(&key, payload.clone());
            found.insert(key, payload);
        }
        found
    }

    /// Store `payload` and record `key` under each tag.
    pub fn cache_with_tags(&self, key: &str, payload: Value, ttl: Duration, tags: &[&str]) -> bool {
        match CacheEntry::new(key, payload, ttl) {
            Some(entry) => self.put(entry.with_tags(tags.iter().copied())),
            None => false,
        }
    }

    /// Store a prepared entry in every tier and update its tag indexes.
    pub fn put(&self, entry: CacheEntry) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let mut stored = false;
        for backend in self.backends() {
            let op = format!("{} set", backend.kind().as_str());
            stored |= self.degrade(&op, backend.put_entry(&entry).map(|_| true), false);
        }
        if !stored {
            return false;
        }
        self.writes.fetch_add(1, Ordering::Relaxed);

        if !entry.tags.is_empty() {
            let index_ttl = entry
                .remaining_ttl(entry.created_at)
                .saturating_mul(2);
            for tag in &entry.tags {
                self.add_to_tag_index(tag, &entry.key, index_ttl);
            }
        }
        true
    }

    fn tag_index_key(tag: &str) -> String {
        format!("{}{}", CacheDefaults::TAG_INDEX_PREFIX, tag)
    }

    fn read_tag_index(&self, index_key: &str) -> Vec<String> {
        self.get_entry(index_key)
            .and_then(|entry| serde_json::from_value(entry.payload).ok())
            .unwrap_or_default()
    }

    fn add_to_tag_index(&self, tag: &str, key: &str, ttl: Duration) {
        let index_key = Self::tag_index_key(tag);
        let _guard = match self.tag_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let (mut keys, remaining) = match self.get_entry(&index_key) {
            Some(existing) => (
                serde_json::from_value::<Vec<String>>(existing.payload.clone()).unwrap_or_default(),
                existing.remaining_ttl(Utc::now()),
            ),
            None => (Vec::new(), Duration::ZERO),
        };
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
        // The index must outlive every key it lists, not just the newest.
        let ttl = ttl.max(remaining);

        // Index entries are never tagged themselves.
        if let Some(index) = CacheEntry::new(&index_key, Value::from(keys), ttl) {
            for backend in self.backends() {
                self.degrade("tag index set", backend.put_entry(&index), ());
            }
        }
    }

    /// Live `(key, payload)` pairs recorded under `tag`.
    pub fn get_by_tag(&self, tag: &str) -> Vec<(String, Value)> {
        let index_key = Self::tag_index_key(tag);
        self.read_tag_index(&index_key)
            .into_iter()
            .filter_map(|key| self.get(&key).map(|payload| (key, payload)))
            .collect()
    }

    /// Delete every key recorded under `tag`, then the index itself.
    ///
    /// Returns the number of keys removed from at least one tier.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let index_key = Self::tag_index_key(tag);
        let _guard = match self.tag_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut removed = 0;
        for key in self.read_tag_index(&index_key) {
            if key == index_key {
                continue;
            }
            if self.delete(&key).total() > 0 {
                removed += 1;
            }
        }
        self.delete(&index_key);
        debug!("Invalidated tag '{}': {} entries", tag, removed);
        removed
    }

    /// Delete `key` from every tier.
    pub fn delete(&self, key: &str) -> CacheCounts {
        let ephemeral = self.degrade("ephemeral delete", self.ephemeral.remove(key), false);
        let durable = self
            .durable
            .as_ref()
            .map(|d| self.degrade("durable delete", d.remove(key), false))
            .unwrap_or(false);
        CacheCounts {
            ephemeral: ephemeral as usize,
            durable: durable as usize,
        }
    }

    /// Remove entries from the selected tiers, optionally only those created before `older_than`.
    pub fn clear(&self, scope: ClearScope, older_than: Option<DateTime<Utc>>) -> CacheCounts {
        let mut counts = CacheCounts::default();
        if matches!(scope, ClearScope::All | ClearScope::Ephemeral) {
            counts.ephemeral = self.degrade("ephemeral clear", self.ephemeral.clear(older_than), 0);
        }
        if matches!(scope, ClearScope::All | ClearScope::Durable) {
            if let Some(durable) = &self.durable {
                counts.durable = self.degrade("durable clear", durable.clear(older_than), 0);
            }
        }
        counts
    }

    /// Purge expired entries from every tier.
    pub fn sweep_expired(&self) -> CacheCounts {
        let ephemeral = self.degrade("ephemeral sweep", self.ephemeral.purge_expired(), 0);
        let durable = self
            .durable
            .as_ref()
            .map(|d| self.degrade("durable sweep", d.purge_expired(), 0))
            .unwrap_or(0);
        CacheCounts { ephemeral, durable }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            enabled: self.is_enabled(),
            hits,
            misses,
            writes: self.writes.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            ephemeral: self.degrade("ephemeral stats", self.ephemeral.stats().map(Some), None),
            durable: self
                .durable
                .as_ref()
                .and_then(|d| self.degrade("durable stats", d.stats().map(Some), None)),
        }
    }
}
