//! In-process cache tier backed by mini-moka.

use super::traits::{BackendKind, BackendStats, CacheBackend, CacheEntry};
use crate::error::Result;
use chrono::{DateTime, Utc};
use mini_moka::sync::Cache;
use tracing::debug;

/// Ephemeral cache backend.
///
/// mini-moka bounds the capacity; per-entry expiry is checked against
/// `expires_at` since entries carry individual TTLs.
pub struct MemoryCache {
    entries: Cache<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    fn keys_matching(&self, predicate: impl Fn(&CacheEntry) -> bool) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl CacheBackend for MemoryCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Ephemeral
    }

    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        match self.entries.get(&key) {
            Some(entry) if entry.is_live() => Ok(Some(entry)),
            Some(_) => {
                debug!("Memory cache entry expired: {}", key);
                self.entries.invalidate(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        self.entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        let existed = self.entries.contains_key(&key);
        self.entries.invalidate(&key);
        Ok(existed)
    }

    fn clear(&self, older_than: Option<DateTime<Utc>>) -> Result<usize> {
        let keys = match older_than {
            Some(cutoff) => self.keys_matching(|entry| entry.created_at < cutoff),
            None => self.keys_matching(|_| true),
        };
        for key in &keys {
            self.entries.invalidate(key);
        }
        Ok(keys.len())
    }

    fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let keys = self.keys_matching(|entry| !entry.is_live_at(now));
        for key in &keys {
            self.entries.invalidate(key);
        }
        if !keys.is_empty() {
            debug!("Purged {} expired memory cache entries", keys.len());
        }
        Ok(keys.len())
    }

    fn stats(&self) -> Result<BackendStats> {
        let now = Utc::now();
        let mut stats = BackendStats {
            kind: BackendKind::Ephemeral,
            live_entries: 0,
            expired_entries: 0,
            payload_bytes: 0,
        };
        for entry in self.entries.iter() {
            let entry = entry.value();
            if entry.is_live_at(now) {
                stats.live_entries += 1;
            } else {
                stats.expired_entries += 1;
            }
            stats.payload_bytes += entry.payload.to_string().len() as u64;
        }
        Ok(stats)
    }
}
