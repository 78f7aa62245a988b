//! Concurrent multi-provider search with merge, dedup and caching.

use super::types::{SearchOptions, SearchProvider, SearchResult, SearchSource};
use crate::cache::{fingerprint, CacheStore};
use crate::config::SearchConfig;
use crate::error::JarvisError;
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fans a query out to registered providers and merges their results.
pub struct SearchAggregator {
    providers: BTreeMap<SearchSource, Arc<dyn SearchProvider>>,
    cache: Arc<CacheStore>,
    cache_ttl: Duration,
}

impl SearchAggregator {
    /// Register `providers`. A later provider for the same source replaces an earlier one.
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        cache: Arc<CacheStore>,
        config: &SearchConfig,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.source(), provider))
            .collect();
        Self {
            providers,
            cache,
            cache_ttl: config.cache_ttl,
        }
    }

    pub fn registered_sources(&self) -> Vec<SearchSource> {
        self.providers.keys().copied().collect()
    }

    pub fn is_registered(&self, source: SearchSource) -> bool {
        self.providers.contains_key(&source)
    }

    /// Cache key for a query over `sources`.
    ///
    /// Source order is part of the key since it decides merge order and
    /// which duplicate survives.
    pub fn cache_key(query: &str, limit: usize, sources: &[SearchSource]) -> String {
        let sources = sources
            .iter()
            .map(SearchSource::as_str)
            .collect::<Vec<_>>()
            .join(",");
        fingerprint("search", &[query, &limit.to_string(), &sources])
    }

    /// Search the requested sources. Never fails.
    ///
    /// Results keep the requested provider order (and each provider's own
    /// order), drop empty and repeated URLs (first occurrence wins) and are
    /// cut to `options.limit`. Failing or slow providers contribute nothing.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() || options.limit == 0 {
            return Vec::new();
        }

        let cache_key = Self::cache_key(query, options.limit, &options.sources);
        if !options.force_fresh {
            if let Some(cached) = self.cache.get_as::<Vec<SearchResult>>(&cache_key) {
                debug!("Search cache hit for '{}'", query);
                return cached;
            }
        }

        let mut requested = Vec::new();
        for source in &options.sources {
            if requested.contains(source) {
                continue;
            }
            if self.is_registered(*source) {
                requested.push(*source);
            } else {
                debug!("Search source {} is not registered, skipping", source);
            }
        }

        let started = Instant::now();
        let batches = join_all(
            requested
                .iter()
                .map(|source| self.query_provider(*source, query, options)),
        )
        .await;
        let results = merge_results(batches, options.limit);

        info!(
            "Search for '{}' returned {} results from {} providers in {:?}",
            query,
            results.len(),
            requested.len(),
            started.elapsed()
        );

        if !results.is_empty() {
            match serde_json::to_value(&results) {
                Ok(payload) => {
                    self.cache
                        .cache_with_tags(&cache_key, payload, self.cache_ttl, &["search"]);
                }
                Err(e) => warn!("Search results could not be cached: {}", e),
            }
        }

        results
    }

    async fn query_provider(
        &self,
        source: SearchSource,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<SearchResult> {
        let Some(provider) = self.providers.get(&source) else {
            return Vec::new();
        };

        match tokio::time::timeout(options.timeout, provider.search(query, options.limit)).await {
            Ok(Ok(results)) => {
                debug!("{} returned {} results", source, results.len());
                results
            }
            Ok(Err(e)) => {
                let err = JarvisError::AggregatorProvider {
                    provider: source.label().to_string(),
                    message: e.to_string(),
                };
                warn!("{}", err);
                Vec::new()
            }
            Err(_) => {
                let err = JarvisError::AggregatorProvider {
                    provider: source.label().to_string(),
                    message: format!("timed out after {:?}", options.timeout),
                };
                warn!("{}", err);
                Vec::new()
            }
        }
    }
}

/// Concatenate batches in order, skipping empty or already-seen URLs.
pub fn merge_results(batches: Vec<Vec<SearchResult>>, limit: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for result in batches.into_iter().flatten() {
        if merged.len() >= limit {
            break;
        }
        if result.url.trim().is_empty() || !seen.insert(result.url.clone()) {
            continue;
        }
        merged.push(result);
    }

    merged
}
