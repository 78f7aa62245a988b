//! Concrete search providers.
//!
//! Each provider exposes a pure `parse_*` function over the raw JSON body
//! so parsing can be exercised without the network.

mod duckduckgo;
mod github;
mod news;
mod stackoverflow;
mod wikipedia;

pub use duckduckgo::{parse_duckduckgo, DuckDuckGoProvider};
pub use github::{parse_github, GitHubProvider};
pub use news::{parse_news, NewsProvider};
pub use stackoverflow::{parse_stackoverflow, StackOverflowProvider};
pub use wikipedia::{parse_wikipedia, WikipediaProvider};

use super::types::SearchProvider;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::network::HttpClient;
use std::sync::Arc;
use tracing::info;

/// Build every provider the configuration allows.
///
/// News is skipped without an API key.
pub fn default_providers(config: &SearchConfig) -> Result<Vec<Arc<dyn SearchProvider>>> {
    let http = HttpClient::with_timeout(config.provider_timeout)?;

    let mut providers: Vec<Arc<dyn SearchProvider>> = vec![
        Arc::new(DuckDuckGoProvider::new(http.clone())),
        Arc::new(WikipediaProvider::new(http.clone())),
        Arc::new(GitHubProvider::new(http.clone())),
        Arc::new(StackOverflowProvider::new(http.clone())),
    ];

    match config.news_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => providers.push(Arc::new(NewsProvider::new(http, key))),
        None => info!("News search disabled: no API key configured"),
    }

    Ok(providers)
}
