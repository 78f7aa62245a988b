//! LLM chat completions.
//!
//! [`CompletionClient`] owns the retry/fallback/caching policy and talks to a
//! [`ChatProvider`]; [`ChatCompletionsProvider`] is the HTTP implementation.
//! The [`tasks`] presets build requests for translation, summaries, code
//! help and keyword extraction.

mod client;
mod provider;
mod sanitize;
pub mod tasks;
mod types;

pub use client::CompletionClient;
pub use provider::{parse_chat_response, ChatCall, ChatCompletionsProvider, ChatProvider, ChatReply};
pub use sanitize::sanitize_completion;
pub use tasks::{
    code_assist_request, keywords_request, summarize_request, translate_request, Keyword,
    KeywordReport,
};
pub use types::{
    CompletionRequest, CompletionRequestBuilder, CompletionResult, FinishReason, SpeedRating,
};
