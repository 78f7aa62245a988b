//! Single-shot task handlers: translation, summaries, code help, keywords.

use super::shared::{
    get_bool_param, get_f64_param, get_model_param, get_positive_param, get_str_param,
    require_str_param,
};
use crate::server::AppState;
use jarvis_core::completion::{
    code_assist_request, keywords_request, summarize_request, translate_request,
    CompletionRequestBuilder, KeywordReport,
};
use jarvis_core::config::TaskDefaults;
use jarvis_core::{CompletionResult, Result};
use serde_json::{json, Value};

/// Apply the shared `model` / `force_fresh` options and run the request.
async fn complete(
    state: &AppState,
    params: &Value,
    mut builder: CompletionRequestBuilder,
) -> Result<CompletionResult> {
    let completion = state.pipeline.completion();
    if let Some(model) = get_model_param(params, &completion.available_models())? {
        builder = builder.model(model);
    }
    if get_bool_param(params, "force_fresh", "forceFresh").unwrap_or(false) {
        builder = builder.use_cache(false);
    }
    let request = builder.build_with(completion.config())?;
    completion.complete(&request).await
}

fn metadata(result: &CompletionResult) -> Value {
    json!({
        "model": result.model,
        "tokens_used": result.tokens_used,
        "elapsed_ms": result.elapsed_ms,
        "speed_rating": result.speed_rating,
        "cached": result.served_from_cache,
    })
}

pub async fn translate(state: &AppState, params: &Value) -> Result<Value> {
    let text = require_str_param(params, "text", "text")?;
    let target = require_str_param(params, "target_lang", "targetLang")?;
    let source = get_str_param(params, "source_lang", "sourceLang");

    let builder = translate_request(&text, &target, source)?;
    let result = complete(state, params, builder).await?;

    Ok(json!({
        "success": true,
        "action": "translate",
        "original_text": text,
        "translated_text": result.text,
        "source_lang": source.unwrap_or("auto"),
        "target_lang": target,
        "metadata": metadata(&result),
    }))
}

pub async fn summarize(state: &AppState, params: &Value) -> Result<Value> {
    let text = require_str_param(params, "text", "text")?;
    let ratio = get_f64_param(params, "ratio", "ratio").unwrap_or(TaskDefaults::SUMMARIZE_RATIO);

    let builder = summarize_request(&text, ratio)?;
    let result = complete(state, params, builder).await?;

    let original_length = text.trim().chars().count();
    let summary_length = result.text.chars().count();
    let compression = if original_length == 0 {
        0.0
    } else {
        (summary_length as f64 / original_length as f64 * 10_000.0).round() / 100.0
    };

    Ok(json!({
        "success": true,
        "action": "summarize",
        "original_length": original_length,
        "summary_length": summary_length,
        "compression_ratio": compression,
        "summary": result.text,
        "metadata": metadata(&result),
    }))
}

pub async fn code_assist(state: &AppState, params: &Value) -> Result<Value> {
    let query = require_str_param(params, "query", "query")?;
    let language = get_str_param(params, "language", "language");
    let context = get_str_param(params, "context", "context");

    let builder = code_assist_request(&query, language, context)?;
    let result = complete(state, params, builder).await?;

    Ok(json!({
        "success": true,
        "action": "code_assist",
        "query": query,
        "language": language.filter(|l| !l.trim().is_empty()),
        "code": result.text,
        "metadata": metadata(&result),
    }))
}

pub async fn keywords(state: &AppState, params: &Value) -> Result<Value> {
    let text = require_str_param(params, "text", "text")?;
    let max = get_positive_param(params, "max_keywords", "maxKeywords")?
        .map(|n| n.min(TaskDefaults::KEYWORDS_MAX as u64) as usize)
        .unwrap_or(TaskDefaults::KEYWORDS_DEFAULT);

    let builder = keywords_request(&text, max)?;
    let result = complete(state, params, builder).await?;
    let report = KeywordReport::parse(&result.text)?.truncate(max);

    Ok(json!({
        "success": true,
        "action": "keywords",
        "keywords": report.keywords,
        "summary": report.summary,
        "metadata": metadata(&result),
    }))
}
