//! Pipeline input/output types.

use crate::completion::{CompletionResult, SpeedRating};
use crate::config::{PipelineDefaults, SearchDefaults};
use crate::error::{JarvisError, Result};
use crate::format::{FormatOptions, FormattedAnswer};
use crate::search::{SearchResult, SearchSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Externally computed classification of the user's message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryAnalysis {
    #[serde(rename = "type")]
    pub query_type: String,
    pub category: String,
    pub complexity: String,
    pub sentiment: String,
    pub language: String,
    pub topics: Vec<String>,
    pub needs_web_search: bool,
    pub needs_local_data: bool,
}

impl Default for QueryAnalysis {
    fn default() -> Self {
        Self {
            query_type: "general".into(),
            category: "general".into(),
            complexity: "simple".into(),
            sentiment: "neutral".into(),
            language: "en".into(),
            topics: Vec::new(),
            needs_web_search: false,
            needs_local_data: false,
        }
    }
}

/// Kind of portfolio record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalRecordKind {
    Project,
    Blog,
    Skill,
    Personal,
}

impl LocalRecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            LocalRecordKind::Project => "Project",
            LocalRecordKind::Blog => "Blog",
            LocalRecordKind::Skill => "Skill",
            LocalRecordKind::Personal => "Personal",
        }
    }
}

/// A portfolio item that can be quoted in the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub kind: LocalRecordKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// One prior exchange in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
}

/// Request-scoped identity, passed explicitly instead of global session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub session_id: String,
    /// Caller identity (client IP or API consumer), used for analytics.
    pub caller: Option<String>,
    pub debug: bool,
}

impl RequestContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            caller: None,
            debug: false,
        }
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// Per-request overrides for [`super::ResponsePipeline::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// `false` bypasses cache reads and forces fresh search and completion.
    pub use_cache: bool,
    /// Deadline for the whole run.
    pub timeout: Duration,
    pub sources: Vec<SearchSource>,
    pub search_limit: usize,
    pub format: FormatOptions,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            use_cache: true,
            timeout: PipelineDefaults::REQUEST_TIMEOUT,
            sources: vec![SearchSource::DuckDuckGo, SearchSource::Wikipedia],
            search_limit: SearchDefaults::RESULT_LIMIT,
            format: FormatOptions::default(),
        }
    }
}

impl GenerateOptions {
    /// Clamp the sampling temperature into the pipeline's accepted band.
    pub fn clamped_temperature(&self, default: f32) -> Result<f32> {
        let temperature = self.temperature.unwrap_or(default);
        if !temperature.is_finite() {
            return Err(JarvisError::validation("temperature", "must be a finite number"));
        }
        Ok(temperature.clamp(
            PipelineDefaults::MIN_TEMPERATURE,
            PipelineDefaults::MAX_TEMPERATURE,
        ))
    }

    pub fn clamped_max_tokens(&self, default: u32) -> u32 {
        self.max_tokens.unwrap_or(default).clamp(
            PipelineDefaults::MIN_MAX_TOKENS,
            PipelineDefaults::MAX_MAX_TOKENS,
        )
    }
}

/// Summary of how an answer was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub tokens_used: u32,
    pub model: String,
    /// The whole answer came from the answer cache.
    pub cache_hit: bool,
    /// The completion text came from the completion cache.
    #[serde(default)]
    pub completion_cache_hit: bool,
    pub elapsed_ms: f64,
    pub search_results: usize,
    pub local_records: usize,
    pub speed_rating: SpeedRating,
}

/// Output of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedAnswer {
    pub answer: FormattedAnswer,
    pub metadata: AnswerMetadata,
}

/// What the answer cache stores: enough to re-format without any external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub completion: CompletionResult,
    pub sources: Vec<SearchResult>,
    #[serde(default)]
    pub local_records: usize,
}

/// States of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    CacheCheck,
    GatherContext,
    BuildPrompt,
    Complete,
    Format,
    StoreCache,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "start",
            PipelineStage::CacheCheck => "cache_check",
            PipelineStage::GatherContext => "gather_context",
            PipelineStage::BuildPrompt => "build_prompt",
            PipelineStage::Complete => "complete",
            PipelineStage::Format => "format",
            PipelineStage::StoreCache => "store_cache",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
