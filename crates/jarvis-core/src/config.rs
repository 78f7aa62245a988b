//! Centralized configuration for the JARVIS core.
//!
//! Numeric defaults live here as named constants. Runtime configuration
//! structs start from these constants and are validated once at startup.

use crate::error::{JarvisError, Result};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "JARVIS";
    pub const USER_AGENT: &'static str = "JARVIS-Portfolio-AI/5.0";
    pub const DB_FILE_NAME: &'static str = "jarvis.db";
}

/// Defaults for the chat-completions provider.
pub struct CompletionDefaults;

impl CompletionDefaults {
    pub const ENDPOINT: &'static str = "https://api.groq.com/openai/v1/chat/completions";
    pub const MODEL: &'static str = "llama-3.3-70b-versatile";
    pub const BACKUP_MODEL: &'static str = "mixtral-8x7b-32768";
    pub const MAX_TOKENS: u32 = 1500;
    pub const TEMPERATURE: f32 = 0.7;
    pub const TOP_P: f32 = 0.9;
    pub const FREQUENCY_PENALTY: f32 = 0.1;
    pub const PRESENCE_PENALTY: f32 = 0.1;
    pub const RETRY_BUDGET: u32 = 2;
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const BACKOFF_UNIT: Duration = Duration::from_secs(1);
    pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
    pub const CACHE_TTL: Duration = Duration::from_secs(3600);
    /// Characters of the system prompt that participate in the cache key.
    pub const CACHE_KEY_SYSTEM_CHARS: usize = 500;
    pub const AVAILABLE_MODELS: [&'static str; 4] = [
        "llama-3.3-70b-versatile",
        "mixtral-8x7b-32768",
        "gemma2-9b-it",
        "llama-3.2-1b-preview",
    ];
}

/// Defaults for the search aggregator and its providers.
pub struct SearchDefaults;

impl SearchDefaults {
    pub const RESULT_LIMIT: usize = 5;
    pub const MAX_RESULT_LIMIT: usize = 20;
    pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
    pub const CACHE_TTL: Duration = Duration::from_secs(3600);
    pub const SNIPPET_MAX_CHARS: usize = 300;
    pub const DUCKDUCKGO_URL: &'static str = "https://api.duckduckgo.com/";
    pub const WIKIPEDIA_URL: &'static str = "https://en.wikipedia.org/w/api.php";
    pub const WIKIPEDIA_ARTICLE_BASE: &'static str = "https://en.wikipedia.org/wiki/";
    pub const NEWS_URL: &'static str = "https://newsapi.org/v2/everything";
    pub const NEWS_PAGE_SIZE: u32 = 5;
    pub const GITHUB_URL: &'static str = "https://api.github.com/search/repositories";
    pub const GITHUB_PER_PAGE: u32 = 3;
    pub const STACKEXCHANGE_URL: &'static str = "https://api.stackexchange.com/2.3/search";
    pub const STACKEXCHANGE_PAGE_SIZE: u32 = 3;
}

/// Defaults for the response pipeline.
pub struct PipelineDefaults;

impl PipelineDefaults {
    pub const MAX_PROMPT_CHARS: usize = 4000;
    pub const MAX_LOCAL_RECORDS: usize = 5;
    pub const MAX_SEARCH_SNIPPETS: usize = 5;
    pub const MAX_HISTORY_TURNS: usize = 5;
    pub const MAX_MESSAGE_BYTES: usize = 5000;
    pub const MIN_TEMPERATURE: f32 = 0.1;
    pub const MAX_TEMPERATURE: f32 = 1.0;
    pub const MIN_MAX_TOKENS: u32 = 100;
    pub const MAX_MAX_TOKENS: u32 = 4000;
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    pub const ANSWER_CACHE_TTL: Duration = Duration::from_secs(3600);
    pub const ANALYTICS_QUERY_CHARS: usize = 500;
    pub const LEARNING_RESPONSE_CHARS: usize = 1000;
    pub const MAX_ANSWER_CHARS: usize = 2000;
}

/// Defaults for the single-shot task presets.
pub struct TaskDefaults;

impl TaskDefaults {
    pub const TRANSLATE_MAX_CHARS: usize = 4000;
    pub const TRANSLATE_TEMPERATURE: f32 = 0.3;
    pub const TRANSLATE_MAX_TOKENS: u32 = 1000;
    pub const SUMMARIZE_MIN_CHARS: usize = 100;
    pub const SUMMARIZE_INPUT_CHARS: usize = 5000;
    pub const SUMMARIZE_RATIO: f64 = 0.3;
    pub const SUMMARIZE_MIN_RATIO: f64 = 0.1;
    pub const SUMMARIZE_MAX_RATIO: f64 = 1.0;
    pub const SUMMARIZE_TEMPERATURE: f32 = 0.2;
    pub const CODE_LANGUAGE: &'static str = "multiple programming languages";
    pub const CODE_TEMPERATURE: f32 = 0.3;
    pub const CODE_MAX_TOKENS: u32 = 1500;
    pub const KEYWORDS_INPUT_CHARS: usize = 4000;
    pub const KEYWORDS_DEFAULT: usize = 10;
    pub const KEYWORDS_MAX: usize = 50;
    pub const KEYWORDS_TEMPERATURE: f32 = 0.1;
    pub const KEYWORDS_MAX_TOKENS: u32 = 800;
}

/// Defaults for the two-tier cache.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
    pub const MEMORY_CAPACITY: u64 = 10_000;
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
    pub const TAG_INDEX_PREFIX: &'static str = "tag:";
}

/// Defaults for per-caller request rate limiting.
pub struct RateLimitDefaults;

impl RateLimitDefaults {
    pub const MAX_REQUESTS: u32 = 20;
    pub const WINDOW: Duration = Duration::from_secs(60);
}

/// Runtime configuration for [`crate::completion::CompletionClient`] and its provider.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub endpoint: String,
    pub default_model: String,
    pub backup_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Retries after the first attempt.
    pub retry_budget: u32,
    pub timeout: Duration,
    pub backoff_unit: Duration,
    pub max_backoff: Duration,
    pub cache_ttl: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: CompletionDefaults::ENDPOINT.to_string(),
            default_model: CompletionDefaults::MODEL.to_string(),
            backup_model: CompletionDefaults::BACKUP_MODEL.to_string(),
            temperature: CompletionDefaults::TEMPERATURE,
            max_tokens: CompletionDefaults::MAX_TOKENS,
            top_p: CompletionDefaults::TOP_P,
            frequency_penalty: CompletionDefaults::FREQUENCY_PENALTY,
            presence_penalty: CompletionDefaults::PRESENCE_PENALTY,
            retry_budget: CompletionDefaults::RETRY_BUDGET,
            timeout: CompletionDefaults::REQUEST_TIMEOUT,
            backoff_unit: CompletionDefaults::BACKOFF_UNIT,
            max_backoff: CompletionDefaults::MAX_BACKOFF,
            cache_ttl: CompletionDefaults::CACHE_TTL,
        }
    }
}

impl CompletionConfig {
    /// Config with the given API key and every other field defaulted.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Whether an API key has been supplied.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(config_err("completion endpoint must not be empty"));
        }
        if self.default_model.trim().is_empty() {
            return Err(config_err("default model must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(config_err("temperature must be within [0, 1]"));
        }
        if self.max_tokens == 0 {
            return Err(config_err("max_tokens must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(config_err("completion timeout must be positive"));
        }
        if self.cache_ttl.is_zero() {
            return Err(config_err("completion cache TTL must be positive"));
        }
        Ok(())
    }
}

/// Runtime configuration for the search providers.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub provider_timeout: Duration,
    pub cache_ttl: Duration,
    /// NewsAPI key; the news provider is only registered when present.
    pub news_api_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: SearchDefaults::RESULT_LIMIT,
            provider_timeout: SearchDefaults::PROVIDER_TIMEOUT,
            cache_ttl: SearchDefaults::CACHE_TTL,
            news_api_key: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 || self.default_limit > SearchDefaults::MAX_RESULT_LIMIT {
            return Err(config_err(format!(
                "search limit must be within 1..={}",
                SearchDefaults::MAX_RESULT_LIMIT
            )));
        }
        if self.provider_timeout.is_zero() {
            return Err(config_err("search provider timeout must be positive"));
        }
        Ok(())
    }
}

/// Runtime configuration for [`crate::pipeline::ResponsePipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_prompt_chars: usize,
    pub max_local_records: usize,
    pub max_search_snippets: usize,
    pub max_history_turns: usize,
    pub max_message_bytes: usize,
    pub web_search_enabled: bool,
    pub answer_cache_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: PipelineDefaults::MAX_PROMPT_CHARS,
            max_local_records: PipelineDefaults::MAX_LOCAL_RECORDS,
            max_search_snippets: PipelineDefaults::MAX_SEARCH_SNIPPETS,
            max_history_turns: PipelineDefaults::MAX_HISTORY_TURNS,
            max_message_bytes: PipelineDefaults::MAX_MESSAGE_BYTES,
            web_search_enabled: true,
            answer_cache_ttl: PipelineDefaults::ANSWER_CACHE_TTL,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_prompt_chars == 0 {
            return Err(config_err("max_prompt_chars must be positive"));
        }
        if self.max_message_bytes == 0 {
            return Err(config_err("max_message_bytes must be positive"));
        }
        if self.answer_cache_ttl.is_zero() {
            return Err(config_err("answer cache TTL must be positive"));
        }
        Ok(())
    }
}

/// Runtime configuration for [`crate::cache::CacheStore`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub memory_capacity: u64,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: CacheDefaults::DEFAULT_TTL,
            memory_capacity: CacheDefaults::MEMORY_CAPACITY,
            enabled: true,
        }
    }
}

fn config_err(message: impl Into<String>) -> JarvisError {
    JarvisError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs_validate() {
        assert!(CompletionConfig::default().validate().is_ok());
        assert!(SearchConfig::default().validate().is_ok());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_completion_config_rejects_bad_temperature() {
        let config = CompletionConfig {
            temperature: 1.5,
            ..CompletionConfig::default()
        };
        assert!(matches!(config.validate(), Err(JarvisError::Config { .. })));
    }

    #[test]
    fn test_search_config_limit_bounds() {
        let config = SearchConfig {
            default_limit: 21,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_presence() {
        assert!(!CompletionConfig::default().has_api_key());
        assert!(CompletionConfig::with_api_key("gsk_test").has_api_key());
    }
}
