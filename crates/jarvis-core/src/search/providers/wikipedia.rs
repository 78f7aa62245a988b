//! Wikipedia intro extracts via the MediaWiki query API.

use crate::config::SearchDefaults;
use crate::error::Result;
use crate::network::HttpClient;
use crate::search::types::{truncate_chars, ResultKind, SearchProvider, SearchResult, SearchSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const CONFIDENCE: f32 = 0.95;

pub struct WikipediaProvider {
    http: HttpClient,
    endpoint: String,
}

impl WikipediaProvider {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            endpoint: SearchDefaults::WIKIPEDIA_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for WikipediaProvider {
    fn source(&self) -> SearchSource {
        SearchSource::Wikipedia
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let body = self
            .http
            .get_json(
                &self.endpoint,
                &[
                    ("action", "query".into()),
                    ("format", "json".into()),
                    ("prop", "extracts|info".into()),
                    ("exintro", "1".into()),
                    ("explaintext", "1".into()),
                    ("inprop", "url".into()),
                    ("redirects", "1".into()),
                    ("titles", query.to_string()),
                ],
                &[],
            )
            .await?;
        let mut results = parse_wikipedia(&body, Utc::now());
        results.truncate(limit);
        Ok(results)
    }
}

/// One result per page with a non-empty extract. Missing pages are skipped.
pub fn parse_wikipedia(body: &Value, fetched_at: DateTime<Utc>) -> Vec<SearchResult> {
    let Some(pages) = body.pointer("/query/pages").and_then(Value::as_object) else {
        return Vec::new();
    };

    pages
        .values()
        .filter_map(|page| {
            let title = page.get("title").and_then(Value::as_str)?;
            let extract = page
                .get("extract")
                .and_then(Value::as_str)
                .filter(|e| !e.trim().is_empty())?;
            let url = page
                .get("fullurl")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| {
                    format!(
                        "{}{}",
                        SearchDefaults::WIKIPEDIA_ARTICLE_BASE,
                        urlencoding::encode(&title.replace(' ', "_"))
                    )
                });

            Some(
                SearchResult::new(
                    SearchSource::Wikipedia,
                    ResultKind::Encyclopedia,
                    CONFIDENCE,
                    fetched_at,
                )
                .title(title)
                .snippet(truncate_chars(extract, SearchDefaults::SNIPPET_MAX_CHARS))
                .url(url),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pages() {
        let body = json!({
            "query": {"pages": {
                "123": {"pageid": 123, "title": "Iron Man", "extract": "Iron Man is a superhero."},
                "-1": {"ns": 0, "title": "Nonexistent", "missing": ""}
            }}
        });
        let results = parse_wikipedia(&body, Utc::now());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Iron Man");
        assert_eq!(results[0].url, "https://en.wikipedia.org/wiki/Iron_Man");
        assert_eq!(results[0].kind, ResultKind::Encyclopedia);
        assert_eq!(results[0].snippet, "Iron Man is a superhero.");
    }

    #[test]
    fn test_long_extract_truncated() {
        let extract = "a".repeat(400);
        let body = json!({"query": {"pages": {"1": {
            "title": "Long", "extract": extract, "fullurl": "https://en.wikipedia.org/wiki/Long"
        }}}});
        let results = parse_wikipedia(&body, Utc::now());
        assert_eq!(results[0].snippet.chars().count(), 303);
        assert!(results[0].snippet.ends_with("..."));
        assert_eq!(results[0].url, "https://en.wikipedia.org/wiki/Long");
    }
}
