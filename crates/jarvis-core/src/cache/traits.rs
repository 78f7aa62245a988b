//! Cache backend trait and types.

use crate::error::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

/// Which tier a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Ephemeral,
    Durable,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ephemeral => "ephemeral",
            BackendKind::Durable => "durable",
        }
    }
}

/// A cached payload with its lifetime and labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Producer label, e.g. `completion` or `search`.
    #[serde(default)]
    pub source_tag: Option<String>,
    #[serde(default)]
    pub model_tag: Option<String>,
    #[serde(default)]
    pub token_count: u32,
}

impl CacheEntry {
    /// Build an entry that lives for `ttl` starting now.
    ///
    /// Returns `None` when `ttl` is zero or too large to represent.
    pub fn new(key: impl Into<String>, payload: Value, ttl: Duration) -> Option<Self> {
        Self::new_at(key, payload, ttl, Utc::now())
    }

    /// Build an entry that lives for `ttl` starting at `created_at`.
    pub fn new_at(
        key: impl Into<String>,
        payload: Value,
        ttl: Duration,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        if ttl.is_zero() {
            return None;
        }
        let ttl = ChronoDuration::from_std(ttl).ok()?;
        let expires_at = created_at.checked_add_signed(ttl)?;
        if expires_at <= created_at {
            return None;
        }
        Some(Self {
            key: key.into(),
            payload,
            created_at,
            expires_at,
            tags: BTreeSet::new(),
            source_tag: None,
            model_tag: None,
            token_count: 0,
        })
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_source_tag(mut self, source: impl Into<String>) -> Self {
        self.source_tag = Some(source.into());
        self
    }

    pub fn with_model_tag(mut self, model: impl Into<String>) -> Self {
        self.model_tag = Some(model.into());
        self
    }

    pub fn with_token_count(mut self, tokens: u32) -> Self {
        self.token_count = tokens;
        self
    }

    /// An entry is live iff `now < expires_at`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_live(&self) -> bool {
        self.is_live_at(Utc::now())
    }

    /// Lifetime left at `now`, zero once expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Per-backend statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStats {
    pub kind: BackendKind,
    pub live_entries: usize,
    pub expired_entries: usize,
    /// Approximate payload size in bytes.
    pub payload_bytes: u64,
}

/// Storage tier behind [`super::CacheStore`].
///
/// All operations are synchronous to match rusqlite's API. Implementations
/// must delete an expired entry when a read encounters it.
pub trait CacheBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Get a live entry by key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry, overwriting any entry with the same key.
    fn put_entry(&self, entry: &CacheEntry) -> Result<()>;

    /// Delete a key. Returns whether an entry was removed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Delete every entry, or only those created before `older_than`.
    ///
    /// Returns the number of entries removed.
    fn clear(&self, older_than: Option<DateTime<Utc>>) -> Result<usize>;

    /// Remove expired entries. Returns the number removed.
    fn purge_expired(&self) -> Result<usize>;

    fn stats(&self) -> Result<BackendStats>;
}
