//! StackExchange search scoped to Stack Overflow.

use crate::config::SearchDefaults;
use crate::error::Result;
use crate::network::HttpClient;
use crate::search::types::{ResultKind, SearchProvider, SearchResult, SearchSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

const CONFIDENCE: f32 = 0.8;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^<>]*>").unwrap());

pub struct StackOverflowProvider {
    http: HttpClient,
    endpoint: String,
}

impl StackOverflowProvider {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            endpoint: SearchDefaults::STACKEXCHANGE_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for StackOverflowProvider {
    fn source(&self) -> SearchSource {
        SearchSource::StackOverflow
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let body = self
            .http
            .get_json(
                &self.endpoint,
                &[
                    ("order", "desc".into()),
                    ("sort", "relevance".into()),
                    ("intitle", query.to_string()),
                    ("site", "stackoverflow".into()),
                    ("pagesize", SearchDefaults::STACKEXCHANGE_PAGE_SIZE.to_string()),
                ],
                &[],
            )
            .await?;
        let mut results = parse_stackoverflow(&body, Utc::now());
        results.truncate(limit);
        Ok(results)
    }
}

/// Decode the handful of entities the StackExchange API emits in titles.
fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub fn parse_stackoverflow(body: &Value, fetched_at: DateTime<Utc>) -> Vec<SearchResult> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let title = item.get("title").and_then(Value::as_str)?;
            let link = item.get("link").and_then(Value::as_str)?;
            let snippet = item
                .get("excerpt")
                .and_then(Value::as_str)
                .map(|e| decode_entities(&TAG.replace_all(e, "")))
                .unwrap_or_else(|| "StackOverflow question".to_string());

            Some(
                SearchResult::new(
                    SearchSource::StackOverflow,
                    ResultKind::Technical,
                    CONFIDENCE,
                    fetched_at,
                )
                .title(decode_entities(title))
                .snippet(snippet)
                .url(link)
                .extra("score", item.get("score").cloned().unwrap_or(Value::Null))
                .extra("answers", item.get("answer_count").cloned().unwrap_or(Value::Null))
                .extra("views", item.get("view_count").cloned().unwrap_or(Value::Null)),
            )
        })
        .collect()
}
