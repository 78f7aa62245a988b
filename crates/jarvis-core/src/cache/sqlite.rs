//! SQLite-based durable cache tier.

use super::traits::{BackendKind, BackendStats, CacheBackend, CacheEntry};
use crate::db::Database;
use crate::error::{JarvisError, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::debug;

/// Durable cache backend.
///
/// Rows are keyed by the SHA-256 of the cache key so arbitrary key lengths
/// fit a fixed-width primary key. Timestamps are stored as Unix milliseconds.
pub struct SqliteCache {
    db: Database,
}

impl SqliteCache {
    /// Create the cache tables on `db` if they don't exist.
    pub fn new(db: Database) -> Result<Self> {
        let cache = Self { db };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jarvis_cache (
                key_hash TEXT PRIMARY KEY,
                cache_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                source_tag TEXT,
                model_tag TEXT,
                token_count INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jarvis_cache_expires
                ON jarvis_cache(expires_at);

            CREATE INDEX IF NOT EXISTS idx_jarvis_cache_created
                ON jarvis_cache(created_at);
            "#,
        )
        .map_err(|e| JarvisError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn key_hash(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<(CacheEntry, String, String)> {
        let payload: String = row.get("payload")?;
        let tags: String = row.get("tags")?;
        let entry = CacheEntry {
            key: row.get("cache_key")?,
            payload: serde_json::Value::Null,
            created_at: millis_to_datetime(row.get("created_at")?),
            expires_at: millis_to_datetime(row.get("expires_at")?),
            tags: BTreeSet::new(),
            source_tag: row.get("source_tag")?,
            model_tag: row.get("model_tag")?,
            token_count: row.get::<_, i64>("token_count")?.max(0) as u32,
        };
        Ok((entry, payload, tags))
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl CacheBackend for SqliteCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Durable
    }

    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let hash = Self::key_hash(key);
        let conn = self.db.lock()?;

        let row = conn
            .query_row(
                "SELECT cache_key, payload, source_tag, model_tag, token_count, tags, expires_at, created_at
                 FROM jarvis_cache WHERE key_hash = ?1",
                params![hash],
                Self::row_to_entry,
            )
            .optional()?;

        let Some((mut entry, payload, tags)) = row else {
            return Ok(None);
        };

        if !entry.is_live() {
            conn.execute("DELETE FROM jarvis_cache WHERE key_hash = ?1", params![hash])?;
            debug!("Durable cache entry expired: {}", key);
            return Ok(None);
        }

        entry.payload = serde_json::from_str(&payload)?;
        entry.tags = serde_json::from_str(&tags)?;
        Ok(Some(entry))
    }

    fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        let payload = serde_json::to_string(&entry.payload)?;
        let tags = serde_json::to_string(&entry.tags)?;
        let conn = self.db.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO jarvis_cache
             (key_hash, cache_key, payload, source_tag, model_tag, token_count, tags, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                Self::key_hash(&entry.key),
                entry.key,
                payload,
                entry.source_tag,
                entry.model_tag,
                entry.token_count as i64,
                tags,
                entry.expires_at.timestamp_millis(),
                entry.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let removed = conn.execute(
            "DELETE FROM jarvis_cache WHERE key_hash = ?1",
            params![Self::key_hash(key)],
        )?;
        Ok(removed > 0)
    }

    fn clear(&self, older_than: Option<DateTime<Utc>>) -> Result<usize> {
        let conn = self.db.lock()?;
        let removed = match older_than {
            Some(cutoff) => conn.execute(
                "DELETE FROM jarvis_cache WHERE created_at < ?1",
                params![cutoff.timestamp_millis()],
            )?,
            None => conn.execute("DELETE FROM jarvis_cache", [])?,
        };
        Ok(removed)
    }

    fn purge_expired(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let removed = conn.execute(
            "DELETE FROM jarvis_cache WHERE expires_at <= ?1",
            params![Utc::now().timestamp_millis()],
        )?;
        if removed > 0 {
            debug!("Purged {} expired durable cache entries", removed);
        }
        Ok(removed)
    }

    fn stats(&self) -> Result<BackendStats> {
        let conn = self.db.lock()?;
        let now = Utc::now().timestamp_millis();
        let (live, expired, bytes): (i64, i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN expires_at > ?1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(LENGTH(payload)), 0)
             FROM jarvis_cache",
            params![now],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(BackendStats {
            kind: BackendKind::Durable,
            live_entries: live as usize,
            expired_entries: expired as usize,
            payload_bytes: bytes as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_cache() -> (SqliteCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("cache.db")).unwrap();
        (SqliteCache::new(db).unwrap(), temp_dir)
    }

    #[test]
    fn test_round_trip_keeps_labels() {
        let (cache, _temp) = create_test_cache();
        let entry = CacheEntry::new("completion:abc", json!({"text": "hi"}), Duration::from_secs(60))
            .unwrap()
            .with_tags(["answers"])
            .with_source_tag("completion")
            .with_model_tag("llama-3.3-70b-versatile")
            .with_token_count(12);
        cache.put_entry(&entry).unwrap();

        let loaded = cache.get_entry("completion:abc").unwrap().unwrap();
        assert_eq!(loaded.payload, json!({"text": "hi"}));
        assert!(loaded.tags.contains("answers"));
        assert_eq!(loaded.model_tag.as_deref(), Some("llama-3.3-70b-versatile"));
        assert_eq!(loaded.token_count, 12);
        assert_eq!(
            loaded.expires_at.timestamp_millis(),
            entry.expires_at.timestamp_millis()
        );
    }

    #[test]
    fn test_overwrite_same_key() {
        let (cache, _temp) = create_test_cache();
        for value in [1, 2] {
            let entry = CacheEntry::new("k", json!(value), Duration::from_secs(60)).unwrap();
            cache.put_entry(&entry).unwrap();
        }
        assert_eq!(cache.get_entry("k").unwrap().unwrap().payload, json!(2));
        assert_eq!(cache.stats().unwrap().live_entries, 1);
    }

    #[test]
    fn test_expired_read_deletes_row() {
        let (cache, _temp) = create_test_cache();
        let created = Utc::now() - ChronoDuration::seconds(120);
        let entry = CacheEntry::new_at("old", json!(1), Duration::from_secs(60), created).unwrap();
        cache.put_entry(&entry).unwrap();

        assert_eq!(cache.stats().unwrap().expired_entries, 1);
        assert!(cache.get_entry("old").unwrap().is_none());
        assert_eq!(cache.stats().unwrap().expired_entries, 0);
    }

    #[test]
    fn test_clear_and_purge() {
        let (cache, _temp) = create_test_cache();
        let created = Utc::now() - ChronoDuration::seconds(120);
        cache
            .put_entry(&CacheEntry::new_at("old", json!(1), Duration::from_secs(60), created).unwrap())
            .unwrap();
        cache
            .put_entry(&CacheEntry::new("new", json!(2), Duration::from_secs(60)).unwrap())
            .unwrap();

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.clear(Some(Utc::now() - ChronoDuration::seconds(60))).unwrap(), 0);
        assert_eq!(cache.clear(None).unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.db");
        {
            let cache = SqliteCache::new(Database::open(&path).unwrap()).unwrap();
            let entry = CacheEntry::new("k", json!("v"), Duration::from_secs(60)).unwrap();
            cache.put_entry(&entry).unwrap();
        }
        let cache = SqliteCache::new(Database::open(&path).unwrap()).unwrap();
        assert_eq!(cache.get_entry("k").unwrap().unwrap().payload, json!("v"));
    }
}
