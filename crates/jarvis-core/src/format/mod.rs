//! Answer formatting: a style pass over the text, then an encoding pass.
//!
//! Formatting is a pure function of its inputs. The same completion,
//! context and options always produce byte-identical output.

mod encode;
mod style;

pub use encode::{escape_html, Encoding};
pub use style::{greeting, ResponseStyle};

use crate::completion::CompletionResult;
use crate::config::PipelineDefaults;
use crate::pipeline::QueryAnalysis;
use crate::search::{ResultKind, SearchResult, SearchSource};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// Caller-selected formatting options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub style: ResponseStyle,
    pub encoding: Encoding,
    /// Maximum styled text length in characters, before encoding.
    pub max_length: usize,
    pub include_sources: bool,
    pub include_metadata: bool,
    /// Language code used for the greeting (`uz`, `en`, `ru`).
    pub language: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            style: ResponseStyle::Jarvis,
            encoding: Encoding::PlainText,
            max_length: PipelineDefaults::MAX_ANSWER_CHARS,
            include_sources: true,
            include_metadata: true,
            language: "uz".to_string(),
        }
    }
}

/// What the formatter knows about how the answer was produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatContext<'a> {
    pub analysis: Option<&'a QueryAnalysis>,
    pub sources: &'a [SearchResult],
}

/// A source reference shown alongside the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
    pub source: SearchSource,
    pub kind: ResultKind,
    pub confidence: f32,
}

impl From<&SearchResult> for SourceRef {
    fn from(result: &SearchResult) -> Self {
        let title = if result.title.trim().is_empty() {
            result.source.label().to_string()
        } else {
            result.title.clone()
        };
        Self {
            title,
            url: result.url.clone(),
            source: result.source,
            kind: result.kind,
            confidence: result.confidence,
        }
    }
}

/// Final answer handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedAnswer {
    pub content: String,
    pub sources: Vec<SourceRef>,
    pub metadata: BTreeMap<String, Value>,
    pub style: ResponseStyle,
    pub encoding: Encoding,
}

/// Turns a [`CompletionResult`] into a [`FormattedAnswer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(
        &self,
        result: &CompletionResult,
        context: &FormatContext<'_>,
        options: &FormatOptions,
    ) -> FormattedAnswer {
        let styled = options.style.apply(&result.text, &options.language);
        let text = truncate_with_marker(&styled, options.max_length);

        let sources = if options.include_sources {
            source_refs(context.sources)
        } else {
            Vec::new()
        };

        let metadata = if options.include_metadata {
            metadata(result, context.analysis)
        } else {
            BTreeMap::new()
        };

        let content = encode::encode(
            options.encoding,
            &text,
            &sources,
            &metadata,
            options.style.as_str(),
        );

        FormattedAnswer {
            content,
            sources,
            metadata,
            style: options.style,
            encoding: options.encoding,
        }
    }
}

fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

fn source_refs(results: &[SearchResult]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    results
        .iter()
        .map(SourceRef::from)
        .filter(|source| {
            let key = if source.url.is_empty() {
                format!("{}|{}", source.title, source.source.as_str())
            } else {
                source.url.clone()
            };
            seen.insert(key)
        })
        .collect()
}

fn metadata(result: &CompletionResult, analysis: Option<&QueryAnalysis>) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    map.insert("model".to_string(), json!(result.model));
    map.insert("tokens_used".to_string(), json!(result.tokens_used));
    map.insert("elapsed_ms".to_string(), json!(result.elapsed_ms.round() as u64));
    map.insert("cached".to_string(), json!(result.served_from_cache));
    map.insert("finish_reason".to_string(), json!(result.finish_reason.as_str()));
    map.insert("speed_rating".to_string(), json!(result.speed_rating.as_str()));
    map.insert("provider".to_string(), json!(result.provider));

    if let Some(analysis) = analysis {
        map.insert("analysis.type".to_string(), json!(analysis.query_type));
        map.insert("analysis.category".to_string(), json!(analysis.category));
        map.insert("analysis.complexity".to_string(), json!(analysis.complexity));
        map.insert("analysis.sentiment".to_string(), json!(analysis.sentiment));
        map.insert("analysis.language".to_string(), json!(analysis.language));
        map.insert("analysis.topics".to_string(), json!(analysis.topics));
    }

    map
}
