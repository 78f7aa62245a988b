//! DuckDuckGo Instant Answer API.

use crate::config::SearchDefaults;
use crate::error::Result;
use crate::network::HttpClient;
use crate::search::types::{ResultKind, SearchProvider, SearchResult, SearchSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const ABSTRACT_CONFIDENCE: f32 = 0.75;
const RELATED_CONFIDENCE: f32 = 0.6;

pub struct DuckDuckGoProvider {
    http: HttpClient,
    endpoint: String,
}

impl DuckDuckGoProvider {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            endpoint: SearchDefaults::DUCKDUCKGO_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn source(&self) -> SearchSource {
        SearchSource::DuckDuckGo
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let body = self
            .http
            .get_json(
                &self.endpoint,
                &[
                    ("q", query.to_string()),
                    ("format", "json".into()),
                    ("no_html", "1".into()),
                    ("skip_disambig", "1".into()),
                ],
                &[],
            )
            .await?;
        let mut results = parse_duckduckgo(&body, Utc::now());
        results.truncate(limit);
        Ok(results)
    }
}

/// Abstract first (when present), then related topics that carry both text and URL.
pub fn parse_duckduckgo(body: &Value, fetched_at: DateTime<Utc>) -> Vec<SearchResult> {
    let mut results = Vec::new();

    let abstract_text = body.get("AbstractText").and_then(Value::as_str).unwrap_or("");
    if !abstract_text.is_empty() {
        let heading = body
            .get("Heading")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty());
        let url = body
            .get("AbstractURL")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(String::from)
            .unwrap_or_else(|| {
                format!(
                    "https://duckduckgo.com/?q={}",
                    urlencoding::encode(heading.unwrap_or_default())
                )
            });

        results.push(
            SearchResult::new(
                SearchSource::DuckDuckGo,
                ResultKind::General,
                ABSTRACT_CONFIDENCE,
                fetched_at,
            )
            .title(heading.unwrap_or("DuckDuckGo Result"))
            .snippet(abstract_text)
            .url(url),
        );
    }

    let topics = body
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for topic in topics {
        let (Some(text), Some(url)) = (
            topic.get("Text").and_then(Value::as_str),
            topic.get("FirstURL").and_then(Value::as_str),
        ) else {
            continue;
        };
        results.push(
            SearchResult::new(
                SearchSource::DuckDuckGo,
                ResultKind::General,
                RELATED_CONFIDENCE,
                fetched_at,
            )
            .title(text)
            .snippet(text)
            .url(url)
            .extra("related", true),
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_abstract_and_related() {
        let body = json!({
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a general-purpose programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "RelatedTopics": [
                {"Text": "Cargo - package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Category group", "Topics": []},
                {"Text": "No url here"}
            ]
        });
        let results = parse_duckduckgo(&body, Utc::now());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust (programming language)");
        assert_eq!(results[0].confidence, ABSTRACT_CONFIDENCE);
        assert_eq!(results[1].url, "https://duckduckgo.com/Cargo");
        assert_eq!(results[1].confidence, RELATED_CONFIDENCE);
        assert_eq!(results[1].extra.get("related"), Some(&json!(true)));
    }

    #[test]
    fn test_parse_abstract_without_url_falls_back_to_search_link() {
        let body = json!({"Heading": "Tony Stark", "AbstractText": "Fictional.", "AbstractURL": ""});
        let results = parse_duckduckgo(&body, Utc::now());
        assert_eq!(results[0].url, "https://duckduckgo.com/?q=Tony%20Stark");
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_duckduckgo(&json!({}), Utc::now()).is_empty());
    }
}
