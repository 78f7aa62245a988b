//! JARVIS Core - response generation for a portfolio assistant.
//!
//! Turns a user message plus an externally computed query analysis into a
//! formatted answer: a two-tier cache, concurrent web search across
//! pluggable providers, a chat-completion client with retry and model
//! fallback, and a pure formatter. No HTTP surface lives here; see the
//! `jarvis-server` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use jarvis_core::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> jarvis_core::Result<()> {
//!     let db = Database::open("data/jarvis.db")?;
//!     let cache = Arc::new(CacheStore::with_database(db.clone(), &CacheConfig::default())?);
//!
//!     let config = CompletionConfig::with_api_key(std::env::var("GROQ_API_KEY").unwrap_or_default());
//!     let provider = Arc::new(ChatCompletionsProvider::new(config.clone())?);
//!     let completion = Arc::new(CompletionClient::new(provider, cache.clone(), config)?);
//!
//!     let pipeline = ResponsePipeline::new(cache, completion, PipelineConfig::default())?
//!         .with_recorder(Arc::new(SqliteRecorder::new(db)?));
//!
//!     let answer = pipeline
//!         .generate(
//!             "Who are you?",
//!             &QueryAnalysis::default(),
//!             &[],
//!             &GenerateOptions::default(),
//!             &RequestContext::new("session-1"),
//!         )
//!         .await?;
//!     println!("{}", answer.answer.content);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod network;
pub mod pipeline;
pub mod search;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStore, ClearScope};
pub use completion::{
    ChatCompletionsProvider, ChatProvider, CompletionClient, CompletionRequest, CompletionResult,
};
pub use config::{CacheConfig, CompletionConfig, PipelineConfig, SearchConfig};
pub use db::Database;
pub use error::{JarvisError, Result};
pub use format::{Encoding, FormatOptions, FormattedAnswer, ResponseFormatter, ResponseStyle};
pub use pipeline::{
    ConversationTurn, GenerateOptions, GeneratedAnswer, InteractionRecorder, LearningRecord,
    LocalDataSource, QueryAnalysis, RequestContext, ResponsePipeline, SqliteRecorder,
    StaticLocalData,
};
pub use search::{SearchAggregator, SearchOptions, SearchResult, SearchSource};
