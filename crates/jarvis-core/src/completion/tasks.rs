//! Single-shot task presets: translation, summarization, code help and
//! keyword extraction.
//!
//! Each preset fixes the system prompt, temperature and token budget for one
//! job and returns a [`CompletionRequestBuilder`], so callers can still pick
//! a model or bypass the cache before building. The caller's text always
//! travels in the user prompt, which is part of the completion cache key in
//! full; the system prompt only contributes its first characters.

use super::types::{CompletionRequest, CompletionRequestBuilder};
use crate::config::{PipelineDefaults, TaskDefaults};
use crate::error::{JarvisError, Result};
use serde::{Deserialize, Serialize};

fn non_blank<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(JarvisError::validation(field, "must not be empty"));
    }
    Ok(value)
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Translate `text` into `target_lang`.
///
/// `source_lang` of `None`, blank or `"auto"` leaves detection to the model.
pub fn translate_request(
    text: &str,
    target_lang: &str,
    source_lang: Option<&str>,
) -> Result<CompletionRequestBuilder> {
    let text = non_blank("text", text)?;
    let target = non_blank("target_lang", target_lang)?;
    let chars = text.chars().count();
    if chars > TaskDefaults::TRANSLATE_MAX_CHARS {
        return Err(JarvisError::validation(
            "text",
            format!(
                "{} characters exceeds the {} character limit",
                chars,
                TaskDefaults::TRANSLATE_MAX_CHARS
            ),
        ));
    }

    let source = source_lang
        .map(str::trim)
        .filter(|lang| !lang.is_empty() && !lang.eq_ignore_ascii_case("auto"))
        .unwrap_or("the detected source language");

    let system_prompt = format!(
        "You are a professional translator. Translate the given text from {source} to {target}.\n\
         \n\
         GUIDELINES:\n\
         1. Preserve the meaning, tone and intent of the original\n\
         2. Keep line breaks, lists and other formatting intact\n\
         3. Render idioms with natural equivalents instead of word for word\n\
         4. Leave names, code and URLs untranslated\n\
         5. Use terminology suited to the subject matter\n\
         \n\
         Provide only the translation without additional commentary."
    );

    Ok(CompletionRequest::builder(text)
        .system_prompt(system_prompt)
        .temperature(TaskDefaults::TRANSLATE_TEMPERATURE)
        .max_tokens(TaskDefaults::TRANSLATE_MAX_TOKENS))
}

/// Token budget for a summary of `chars` characters at `ratio`.
pub fn summary_token_budget(chars: usize, ratio: f64) -> u32 {
    let budget = (chars as f64 * ratio).round() as u32;
    budget.clamp(PipelineDefaults::MIN_MAX_TOKENS, PipelineDefaults::MAX_MAX_TOKENS)
}

/// Summarize `text` to roughly `ratio` of its length.
///
/// `ratio` is clamped to [0.1, 1.0]. Only the leading part of very long
/// texts is sent.
pub fn summarize_request(text: &str, ratio: f64) -> Result<CompletionRequestBuilder> {
    let text = non_blank("text", text)?;
    if !ratio.is_finite() {
        return Err(JarvisError::validation("ratio", "must be a finite number"));
    }
    let ratio = ratio.clamp(TaskDefaults::SUMMARIZE_MIN_RATIO, TaskDefaults::SUMMARIZE_MAX_RATIO);

    let chars = text.chars().count();
    if chars < TaskDefaults::SUMMARIZE_MIN_CHARS {
        return Err(JarvisError::validation(
            "text",
            format!(
                "at least {} characters are required, got {}",
                TaskDefaults::SUMMARIZE_MIN_CHARS,
                chars
            ),
        ));
    }

    let percent = (ratio * 100.0).round() as u32;
    let system_prompt = format!(
        "You are a summarization expert. Condense the given text while keeping its main ideas, \
         key facts, conclusions and the context needed to follow them.\n\
         \n\
         SUMMARY RATIO: aim for approximately {percent}% of the original length.\n\
         \n\
         GUIDELINES:\n\
         - Use bullet points for distinct key points\n\
         - Keep important figures and statistics\n\
         - Stay faithful to the source and add nothing new\n\
         - Match the tone of the original"
    );

    Ok(
        CompletionRequest::builder(clip(text, TaskDefaults::SUMMARIZE_INPUT_CHARS))
            .system_prompt(system_prompt)
            .temperature(TaskDefaults::SUMMARIZE_TEMPERATURE)
            .max_tokens(summary_token_budget(chars, ratio)),
    )
}

/// Programming help for `query`, optionally focused on `language` and
/// grounded in extra `context` such as a code snippet.
pub fn code_assist_request(
    query: &str,
    language: Option<&str>,
    context: Option<&str>,
) -> Result<CompletionRequestBuilder> {
    let query = non_blank("query", query)?;
    let language = language
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(TaskDefaults::CODE_LANGUAGE);

    let system_prompt = format!(
        "You are an expert coding assistant specializing in {language}.\n\
         \n\
         SPECIALIZATIONS:\n\
         - Code generation and explanation\n\
         - Debugging and error resolution\n\
         - Performance optimization\n\
         - Best practices and design patterns\n\
         - API integration\n\
         \n\
         GUIDELINES:\n\
         1. Give complete, runnable examples\n\
         2. Explain the code clearly and concisely\n\
         3. Include error handling\n\
         4. Mention alternatives where they matter\n\
         5. Follow {language} conventions"
    );

    let user_prompt = match context.map(str::trim).filter(|ctx| !ctx.is_empty()) {
        Some(ctx) => format!("{query}\n\nADDITIONAL CONTEXT:\n{ctx}"),
        None => query.to_string(),
    };

    Ok(CompletionRequest::builder(user_prompt)
        .system_prompt(system_prompt)
        .temperature(TaskDefaults::CODE_TEMPERATURE)
        .max_tokens(TaskDefaults::CODE_MAX_TOKENS))
}

/// Ask for the `max_keywords` most relevant keywords of `text` as JSON.
///
/// Parse the reply with [`KeywordReport::parse`].
pub fn keywords_request(text: &str, max_keywords: usize) -> Result<CompletionRequestBuilder> {
    let text = non_blank("text", text)?;
    let max_keywords = max_keywords.clamp(1, TaskDefaults::KEYWORDS_MAX);

    let system_prompt = format!(
        "Extract the {max_keywords} most important keywords and key phrases from the given text.\n\
         \n\
         REQUIREMENTS:\n\
         1. Include both single words and key phrases\n\
         2. Rank them by relevance\n\
         3. Score relevance between 0 and 1\n\
         4. Categorize each by type (person, place, organization, concept, technology)\n\
         \n\
         Respond with JSON only, using this structure:\n\
         {{\"keywords\": [{{\"keyword\": \"example\", \"type\": \"concept\", \"relevance\": 0.95, \
         \"frequency\": 5, \"context\": \"where it appears\"}}], \
         \"summary\": \"brief summary of the main topics\"}}"
    );

    Ok(
        CompletionRequest::builder(clip(text, TaskDefaults::KEYWORDS_INPUT_CHARS))
            .system_prompt(system_prompt)
            .temperature(TaskDefaults::KEYWORDS_TEMPERATURE)
            .max_tokens(TaskDefaults::KEYWORDS_MAX_TOKENS),
    )
}

/// One extracted keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub relevance: f64,
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub context: String,
}

/// Parsed keyword extraction reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordReport {
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub summary: String,
}

impl KeywordReport {
    /// Parse the JSON object in a completion. Prose or code fences around
    /// the object are ignored. Keywords come back most relevant first.
    pub fn parse(completion: &str) -> Result<Self> {
        let object = match (completion.find('{'), completion.rfind('}')) {
            (Some(start), Some(end)) if start < end => &completion[start..=end],
            _ => {
                return Err(JarvisError::Json {
                    message: "completion contains no JSON object".to_string(),
                    source: None,
                })
            }
        };

        let mut report: KeywordReport = serde_json::from_str(object)?;
        report.keywords.retain(|k| !k.keyword.trim().is_empty());
        report
            .keywords
            .sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        Ok(report)
    }

    /// Keep at most `max` keywords.
    pub fn truncate(mut self, max: usize) -> Self {
        self.keywords.truncate(max);
        self
    }
}
