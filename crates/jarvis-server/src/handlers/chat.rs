//! Chat handler.

use super::shared::{
    get_bool_param, get_f64_param, get_model_param, get_positive_param, get_sources_param,
    get_str_param, get_typed_param, require_str_param,
};
use crate::handler::Caller;
use crate::server::AppState;
use jarvis_core::{
    ConversationTurn, Encoding, GenerateOptions, QueryAnalysis, RequestContext, ResponseStyle,
    Result,
};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

pub async fn chat(state: &AppState, params: &Value, caller: &Caller) -> Result<Value> {
    let message = require_str_param(params, "message", "message")?;
    let session_id = get_str_param(params, "session_id", "sessionId")
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
        .or_else(|| caller.session_id.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let supplied_analysis = get_typed_param::<QueryAnalysis>(params, "analysis", "analysis")?;
    let supplied_context =
        get_typed_param::<Vec<ConversationTurn>>(params, "context", "context")?.unwrap_or_default();
    let options = generate_options(state, params, supplied_analysis.as_ref())?;
    let analysis = supplied_analysis.unwrap_or_default();

    let context = conversation_context(state, &session_id, supplied_context);

    let mut request = RequestContext::new(session_id.clone());
    request.caller = caller.address.clone();
    request.debug = state.debug;

    let generated = state
        .pipeline
        .generate(&message, &analysis, &context, &options, &request)
        .await?;

    Ok(json!({
        "success": true,
        "response": generated.answer,
        "metadata": generated.metadata,
        "session_id": session_id,
    }))
}

/// Stored turns for the session, oldest first, followed by the supplied ones.
fn conversation_context(
    state: &AppState,
    session_id: &str,
    supplied: Vec<ConversationTurn>,
) -> Vec<ConversationTurn> {
    let limit = state.pipeline.config().max_history_turns;
    let mut turns = match state.pipeline.recorder() {
        Some(recorder) => recorder
            .recent_turns(session_id, limit)
            .unwrap_or_else(|e| {
                warn!("Failed to load history for session {}: {}", session_id, e);
                Vec::new()
            }),
        None => Vec::new(),
    };
    turns.extend(supplied);
    turns
}

fn generate_options(
    state: &AppState,
    params: &Value,
    analysis: Option<&QueryAnalysis>,
) -> Result<GenerateOptions> {
    let mut options = GenerateOptions::default();

    options.model = get_model_param(params, &state.pipeline.completion().available_models())?;
    options.temperature = get_f64_param(params, "temperature", "temperature").map(|t| t as f32);
    options.max_tokens = get_positive_param(params, "max_tokens", "maxTokens")?
        .map(|n| n.min(u32::MAX as u64) as u32);
    options.use_cache = !get_bool_param(params, "force_fresh", "forceFresh").unwrap_or(false);
    if let Some(ms) = get_positive_param(params, "timeout_ms", "timeoutMs")? {
        options.timeout = Duration::from_millis(ms);
    }
    if let Some(sources) = get_sources_param(params)? {
        options.sources = sources;
    }
    if let Some(limit) = get_positive_param(params, "search_limit", "searchLimit")? {
        options.search_limit = limit as usize;
    }

    let format = &mut options.format;
    if let Some(style) = get_str_param(params, "style", "style") {
        format.style = ResponseStyle::parse(style);
    }
    if let Some(encoding) = get_str_param(params, "encoding", "encoding") {
        format.encoding = Encoding::parse(encoding);
    }
    match get_str_param(params, "language", "language").filter(|l| !l.is_empty()) {
        Some(language) => format.language = language.to_string(),
        None => {
            if let Some(analysis) = analysis {
                format.language = analysis.language.clone();
            }
        }
    }
    if let Some(include) = get_bool_param(params, "include_sources", "includeSources") {
        format.include_sources = include;
    }
    if let Some(include) = get_bool_param(params, "include_metadata", "includeMetadata") {
        format.include_metadata = include;
    }
    if let Some(max_length) = get_positive_param(params, "max_length", "maxLength")? {
        format.max_length = max_length as usize;
    }

    Ok(options)
}
