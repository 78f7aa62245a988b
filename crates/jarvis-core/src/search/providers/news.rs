//! NewsAPI `everything` search.

use crate::config::SearchDefaults;
use crate::error::Result;
use crate::network::HttpClient;
use crate::search::types::{ResultKind, SearchProvider, SearchResult, SearchSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const CONFIDENCE: f32 = 0.8;

pub struct NewsProvider {
    http: HttpClient,
    endpoint: String,
    api_key: String,
}

impl NewsProvider {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: SearchDefaults::NEWS_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for NewsProvider {
    fn source(&self) -> SearchSource {
        SearchSource::News
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let body = self
            .http
            .get_json(
                &self.endpoint,
                &[
                    ("q", query.to_string()),
                    ("apiKey", self.api_key.clone()),
                    ("pageSize", SearchDefaults::NEWS_PAGE_SIZE.to_string()),
                    ("sortBy", "relevancy".into()),
                    ("language", "en".into()),
                ],
                &[],
            )
            .await?;
        let mut results = parse_news(&body, Utc::now());
        results.truncate(limit);
        Ok(results)
    }
}

pub fn parse_news(body: &Value, fetched_at: DateTime<Utc>) -> Vec<SearchResult> {
    let Some(articles) = body.get("articles").and_then(Value::as_array) else {
        return Vec::new();
    };

    articles
        .iter()
        .map(|article| {
            let text = |key: &str| article.get(key).and_then(Value::as_str).unwrap_or_default();
            let mut result =
                SearchResult::new(SearchSource::News, ResultKind::News, CONFIDENCE, fetched_at)
                    .title(text("title"))
                    .snippet(text("description"))
                    .url(text("url"))
                    .extra(
                        "publisher",
                        article
                            .pointer("/source/name")
                            .and_then(Value::as_str)
                            .unwrap_or("News"),
                    );
            if let Some(published) = article.get("publishedAt").and_then(Value::as_str) {
                result = result.extra("published_at", published);
            }
            result
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_articles() {
        let body = json!({
            "status": "ok",
            "articles": [
                {
                    "source": {"id": null, "name": "The Verge"},
                    "title": "Rust 2.0 announced",
                    "description": "Not really.",
                    "url": "https://example.com/rust",
                    "publishedAt": "2024-04-01T00:00:00Z"
                },
                {"title": "No source", "url": "https://example.com/b"}
            ]
        });
        let results = parse_news(&body, Utc::now());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].extra["publisher"], json!("The Verge"));
        assert_eq!(results[0].extra["published_at"], json!("2024-04-01T00:00:00Z"));
        assert_eq!(results[1].extra["publisher"], json!("News"));
        assert_eq!(results[1].snippet, "");
    }

    #[test]
    fn test_parse_error_body() {
        let body = json!({"status": "error", "code": "apiKeyInvalid"});
        assert!(parse_news(&body, Utc::now()).is_empty());
    }
}
