//! Search result types and the provider trait.

use crate::config::SearchDefaults;
use crate::error::{JarvisError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Search backends the aggregator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SearchSource {
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
    #[serde(rename = "wikipedia")]
    Wikipedia,
    #[serde(rename = "news")]
    News,
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "stackoverflow")]
    StackOverflow,
}

impl SearchSource {
    pub const ALL: [SearchSource; 5] = [
        SearchSource::DuckDuckGo,
        SearchSource::Wikipedia,
        SearchSource::News,
        SearchSource::GitHub,
        SearchSource::StackOverflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::DuckDuckGo => "duckduckgo",
            SearchSource::Wikipedia => "wikipedia",
            SearchSource::News => "news",
            SearchSource::GitHub => "github",
            SearchSource::StackOverflow => "stackoverflow",
        }
    }

    /// Human-readable label used in prompts and rendered source lists.
    pub fn label(&self) -> &'static str {
        match self {
            SearchSource::DuckDuckGo => "DuckDuckGo",
            SearchSource::Wikipedia => "Wikipedia",
            SearchSource::News => "News",
            SearchSource::GitHub => "GitHub",
            SearchSource::StackOverflow => "StackOverflow",
        }
    }
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SearchSource {
    type Err = JarvisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "ddg" | "duckduckgo" => Ok(SearchSource::DuckDuckGo),
            "wiki" | "wikipedia" => Ok(SearchSource::Wikipedia),
            "news" | "newsapi" => Ok(SearchSource::News),
            "github" | "gh" => Ok(SearchSource::GitHub),
            "stackoverflow" | "stack" | "stackexchange" | "so" => Ok(SearchSource::StackOverflow),
            _ => Err(JarvisError::validation(
                "sources",
                format!("unknown search source '{}'", s),
            )),
        }
    }
}

/// Coarse classification of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    General,
    Encyclopedia,
    News,
    Code,
    Technical,
}

/// One normalized search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: SearchSource,
    pub kind: ResultKind,
    /// Static source confidence in `[0, 1]`.
    pub confidence: f32,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl SearchResult {
    pub fn new(
        source: SearchSource,
        kind: ResultKind,
        confidence: f32,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: String::new(),
            snippet: String::new(),
            url: String::new(),
            source,
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            fetched_at,
            extra: BTreeMap::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Per-call search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub limit: usize,
    /// Providers to query, in merge order.
    pub sources: Vec<SearchSource>,
    pub force_fresh: bool,
    /// Per-provider deadline.
    pub timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: SearchDefaults::RESULT_LIMIT,
            sources: vec![SearchSource::DuckDuckGo, SearchSource::Wikipedia],
            force_fresh: false,
            timeout: SearchDefaults::PROVIDER_TIMEOUT,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sources(mut self, sources: Vec<SearchSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_force_fresh(mut self, force_fresh: bool) -> Self {
        self.force_fresh = force_fresh;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A web search backend.
///
/// Implementations issue one request and parse the raw response into
/// [`SearchResult`]s in the backend's own relevance order.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn source(&self) -> SearchSource;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
