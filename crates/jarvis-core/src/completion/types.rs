//! Completion request/result types.

use crate::error::{JarvisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

impl FinishReason {
    /// Map a provider `finish_reason` string. Unknown values count as `Stop`.
    pub fn from_provider(value: Option<&str>) -> Self {
        match value {
            Some("length") => FinishReason::Length,
            Some("error") | Some("content_filter") => FinishReason::Error,
            _ => FinishReason::Stop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::Error => "error",
        }
    }
}

/// Generation throughput bucket derived from tokens per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedRating {
    UltraFast,
    VeryFast,
    Fast,
    Moderate,
    Slow,
    Unknown,
}

impl SpeedRating {
    pub fn from_throughput(tokens: u32, elapsed_ms: f64) -> Self {
        if tokens == 0 {
            return SpeedRating::Unknown;
        }
        let elapsed_secs = elapsed_ms / 1000.0;
        if elapsed_secs <= 0.0 {
            return SpeedRating::UltraFast;
        }
        let tokens_per_sec = tokens as f64 / elapsed_secs;
        if tokens_per_sec > 200.0 {
            SpeedRating::UltraFast
        } else if tokens_per_sec > 100.0 {
            SpeedRating::VeryFast
        } else if tokens_per_sec > 50.0 {
            SpeedRating::Fast
        } else if tokens_per_sec > 20.0 {
            SpeedRating::Moderate
        } else {
            SpeedRating::Slow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedRating::UltraFast => "ultra_fast",
            SpeedRating::VeryFast => "very_fast",
            SpeedRating::Fast => "fast",
            SpeedRating::Moderate => "moderate",
            SpeedRating::Slow => "slow",
            SpeedRating::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SpeedRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, immutable completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    system_prompt: String,
    user_prompt: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    use_cache: bool,
    retry_budget: u32,
    timeout: Duration,
}

impl CompletionRequest {
    pub fn builder(user_prompt: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder::new(user_prompt)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for [`CompletionRequest`]. Unset fields take the client defaults
/// supplied to [`CompletionRequestBuilder::build_with`].
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    system_prompt: String,
    user_prompt: String,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    use_cache: bool,
    retry_budget: Option<u32>,
    timeout: Option<Duration>,
}

impl CompletionRequestBuilder {
    fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: String::new(),
            user_prompt: user_prompt.into(),
            model: None,
            temperature: None,
            max_tokens: None,
            use_cache: true,
            retry_budget: None,
            timeout: None,
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn retry_budget(mut self, retries: u32) -> Self {
        self.retry_budget = Some(retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate and build, filling unset fields from `defaults`.
    pub fn build_with(self, defaults: &crate::config::CompletionConfig) -> Result<CompletionRequest> {
        let request = CompletionRequest {
            system_prompt: self.system_prompt,
            user_prompt: self.user_prompt,
            model: self.model.unwrap_or_else(|| defaults.default_model.clone()),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            use_cache: self.use_cache,
            retry_budget: self.retry_budget.unwrap_or(defaults.retry_budget),
            timeout: self.timeout.unwrap_or(defaults.timeout),
        };

        if request.user_prompt.trim().is_empty() {
            return Err(JarvisError::validation("user_prompt", "must not be empty"));
        }
        if request.model.trim().is_empty() {
            return Err(JarvisError::validation("model", "must not be empty"));
        }
        if !request.temperature.is_finite() || !(0.0..=1.0).contains(&request.temperature) {
            return Err(JarvisError::validation(
                "temperature",
                format!("{} is outside [0, 1]", request.temperature),
            ));
        }
        if request.max_tokens == 0 {
            return Err(JarvisError::validation("max_tokens", "must be positive"));
        }
        if request.timeout.is_zero() {
            return Err(JarvisError::validation("timeout", "must be positive"));
        }
        Ok(request)
    }

    /// Validate and build against the stock defaults.
    pub fn build(self) -> Result<CompletionRequest> {
        self.build_with(&crate::config::CompletionConfig::default())
    }
}

/// Normalized completion output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub tokens_used: u32,
    /// Model that actually produced the text.
    pub model: String,
    pub finish_reason: FinishReason,
    pub elapsed_ms: f64,
    #[serde(default)]
    pub served_from_cache: bool,
    pub speed_rating: SpeedRating,
    #[serde(default)]
    pub provider: String,
}

impl CompletionResult {
    /// Copy marked as a cache hit.
    pub fn as_cached(&self) -> Self {
        Self {
            served_from_cache: true,
            elapsed_ms: 0.0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_defaults() {
        let request = CompletionRequest::builder("hello")
            .system_prompt("You are JARVIS")
            .build()
            .unwrap();
        assert_eq!(request.model(), "llama-3.3-70b-versatile");
        assert_eq!(request.max_tokens(), 1500);
        assert_eq!(request.retry_budget(), 2);
        assert!(request.use_cache());
        assert_eq!(request.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(CompletionRequest::builder("  ").build().is_err());
        assert!(CompletionRequest::builder("hi").temperature(1.2).build().is_err());
        assert!(CompletionRequest::builder("hi").temperature(f32::NAN).build().is_err());
        assert!(CompletionRequest::builder("hi").max_tokens(0).build().is_err());
        assert!(CompletionRequest::builder("hi")
            .timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_speed_rating_buckets() {
        assert_eq!(SpeedRating::from_throughput(0, 100.0), SpeedRating::Unknown);
        assert_eq!(SpeedRating::from_throughput(500, 1000.0), SpeedRating::UltraFast);
        assert_eq!(SpeedRating::from_throughput(150, 1000.0), SpeedRating::VeryFast);
        assert_eq!(SpeedRating::from_throughput(60, 1000.0), SpeedRating::Fast);
        assert_eq!(SpeedRating::from_throughput(30, 1000.0), SpeedRating::Moderate);
        assert_eq!(SpeedRating::from_throughput(20, 1000.0), SpeedRating::Slow);
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_provider(Some("length")), FinishReason::Length);
        assert_eq!(FinishReason::from_provider(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_provider(None), FinishReason::Stop);
        assert_eq!(
            FinishReason::from_provider(Some("content_filter")),
            FinishReason::Error
        );
    }
}
