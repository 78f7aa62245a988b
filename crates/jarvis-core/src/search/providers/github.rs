//! GitHub repository search.

use crate::config::SearchDefaults;
use crate::error::Result;
use crate::network::HttpClient;
use crate::search::types::{ResultKind, SearchProvider, SearchResult, SearchSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const CONFIDENCE: f32 = 0.85;

pub struct GitHubProvider {
    http: HttpClient,
    endpoint: String,
}

impl GitHubProvider {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            endpoint: SearchDefaults::GITHUB_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for GitHubProvider {
    fn source(&self) -> SearchSource {
        SearchSource::GitHub
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let body = self
            .http
            .get_json(
                &self.endpoint,
                &[
                    ("q", query.to_string()),
                    ("sort", "stars".into()),
                    ("order", "desc".into()),
                    ("per_page", SearchDefaults::GITHUB_PER_PAGE.to_string()),
                ],
                &[("Accept", "application/vnd.github.v3+json")],
            )
            .await?;
        let mut results = parse_github(&body, Utc::now());
        results.truncate(limit);
        Ok(results)
    }
}

pub fn parse_github(body: &Value, fetched_at: DateTime<Utc>) -> Vec<SearchResult> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let name = item.get("full_name").and_then(Value::as_str)?;
            let url = item.get("html_url").and_then(Value::as_str)?;
            let description = item
                .get("description")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .unwrap_or("GitHub repository");

            Some(
                SearchResult::new(SearchSource::GitHub, ResultKind::Code, CONFIDENCE, fetched_at)
                    .title(name)
                    .snippet(description)
                    .url(url)
                    .extra("stars", item.get("stargazers_count").cloned().unwrap_or(Value::Null))
                    .extra("language", item.get("language").cloned().unwrap_or(Value::Null))
                    .extra("forks", item.get("forks_count").cloned().unwrap_or(Value::Null)),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_repositories() {
        let body = json!({
            "total_count": 2,
            "items": [
                {
                    "full_name": "rust-lang/rust",
                    "description": "Empowering everyone to build reliable software.",
                    "html_url": "https://github.com/rust-lang/rust",
                    "stargazers_count": 100000,
                    "language": "Rust",
                    "forks_count": 12000
                },
                {
                    "full_name": "someone/empty",
                    "description": null,
                    "html_url": "https://github.com/someone/empty",
                    "stargazers_count": 1,
                    "language": null,
                    "forks_count": 0
                }
            ]
        });
        let results = parse_github(&body, Utc::now());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].extra["stars"], json!(100000));
        assert_eq!(results[0].extra["language"], json!("Rust"));
        assert_eq!(results[1].snippet, "GitHub repository");
        assert_eq!(results[1].kind, ResultKind::Code);
    }
}
