//! Completion client: caching, retry with backoff and model fallback.

use super::provider::{ChatCall, ChatProvider};
use super::sanitize::sanitize_completion;
use super::types::{CompletionRequest, CompletionResult, FinishReason, SpeedRating};
use crate::cache::{fingerprint, CacheEntry, CacheStore};
use crate::config::{CompletionConfig, CompletionDefaults};
use crate::error::{JarvisError, Result};
use crate::network::{retry_async, RetryConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Wraps a [`ChatProvider`] with the retry, fallback and caching policy.
pub struct CompletionClient {
    provider: Arc<dyn ChatProvider>,
    cache: Arc<CacheStore>,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        cache: Arc<CacheStore>,
        config: CompletionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Models callers may request.
    pub fn available_models(&self) -> Vec<&'static str> {
        CompletionDefaults::AVAILABLE_MODELS.to_vec()
    }

    /// Cache key for a request.
    pub fn cache_key(request: &CompletionRequest) -> String {
        let system: String = request
            .system_prompt()
            .chars()
            .take(CompletionDefaults::CACHE_KEY_SYSTEM_CHARS)
            .collect();
        let temperature = format!("{:.3}", request.temperature());
        fingerprint(
            "completion",
            &[&system, request.user_prompt(), request.model(), &temperature],
        )
    }

    fn model_for_attempt(&self, request: &CompletionRequest, attempt: u32) -> String {
        if attempt >= 1
            && !self.config.backup_model.is_empty()
            && request.model() != self.config.backup_model
        {
            self.config.backup_model.clone()
        } else {
            request.model().to_string()
        }
    }

    /// Run a completion.
    ///
    /// Makes up to `retry_budget + 1` attempts; attempts after the first use
    /// the backup model. Permanent provider errors stop immediately and are
    /// returned as-is, otherwise exhaustion yields
    /// [`JarvisError::ExhaustedRetries`] wrapping the last failure.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let cache_key = Self::cache_key(request);

        if request.use_cache() {
            if let Some(cached) = self.cache.get_as::<CompletionResult>(&cache_key) {
                debug!("Completion cache hit for model {}", request.model());
                return Ok(cached.as_cached());
            }
        }

        let retry = RetryConfig::from_budget(
            request.retry_budget(),
            self.config.backoff_unit,
            self.config.max_backoff,
        );

        let (outcome, stats) = retry_async(
            &retry,
            |attempt| self.attempt(request, attempt),
            JarvisError::is_retryable,
        )
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                return Err(JarvisError::ExhaustedRetries {
                    attempts: stats.attempts,
                    last: Box::new(e),
                })
            }
        };

        if request.use_cache() {
            let entry = serde_json::to_value(&result)
                .ok()
                .and_then(|payload| CacheEntry::new(&cache_key, payload, self.config.cache_ttl));
            match entry {
                Some(entry) => {
                    self.cache.put(
                        entry
                            .with_source_tag("completion")
                            .with_model_tag(&result.model)
                            .with_token_count(result.tokens_used),
                    );
                }
                None => warn!("Completion result for {} could not be cached", result.model),
            }
        }

        Ok(result)
    }

    async fn attempt(&self, request: &CompletionRequest, attempt: u32) -> Result<CompletionResult> {
        let model = self.model_for_attempt(request, attempt);
        let call = ChatCall {
            model: model.clone(),
            system_prompt: request.system_prompt().to_string(),
            user_prompt: request.user_prompt().to_string(),
            temperature: request.temperature(),
            max_tokens: request.max_tokens(),
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(request.timeout(), self.provider.chat(&call)).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(
                    attempt,
                    model = %model,
                    latency_ms = elapsed_ms,
                    status = ?provider_status(&e),
                    "Completion attempt failed: {}",
                    e
                );
                return Err(e);
            }
            Err(_) => {
                warn!(attempt, model = %model, latency_ms = elapsed_ms, "Completion attempt timed out");
                return Err(JarvisError::Timeout(request.timeout()));
            }
        };

        let text = sanitize_completion(&reply.content);
        if text.is_empty() {
            warn!(attempt, model = %model, latency_ms = elapsed_ms, status = 200, "Empty completion");
            return Err(JarvisError::EmptyCompletion { model });
        }

        info!(
            attempt,
            model = %model,
            latency_ms = elapsed_ms,
            status = 200,
            tokens = reply.total_tokens,
            "Completion succeeded"
        );

        Ok(CompletionResult {
            text,
            tokens_used: reply.total_tokens,
            model,
            finish_reason: FinishReason::from_provider(reply.finish_reason.as_deref()),
            elapsed_ms,
            served_from_cache: false,
            speed_rating: SpeedRating::from_throughput(reply.total_tokens, elapsed_ms),
            provider: self.provider.name().to_string(),
        })
    }

    /// Check that the configured key is accepted by the provider.
    ///
    /// Sends a tiny uncached request with no retries.
    pub async fn validate_api_key(&self) -> Result<()> {
        let request = CompletionRequest::builder("ping")
            .max_tokens(5)
            .use_cache(false)
            .retry_budget(0)
            .build_with(&self.config)?;
        self.complete(&request).await.map(|_| ())
    }
}

fn provider_status(err: &JarvisError) -> Option<u16> {
    match err {
        JarvisError::TransientProvider { status, .. } => *status,
        JarvisError::PermanentProvider { status, .. } => Some(*status),
        JarvisError::RateLimited { .. } => Some(429),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::provider::ChatReply;
    use crate::config::CacheConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider that fails `failures` times before answering.
    struct FlakyProvider {
        failures: u32,
        error: fn() -> JarvisError,
        calls: AtomicU32,
        models: Mutex<Vec<String>>,
    }

    impl FlakyProvider {
        fn new(failures: u32, error: fn() -> JarvisError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
                models: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn chat(&self, call: &ChatCall) -> Result<ChatReply> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.models.lock().unwrap().push(call.model.clone());
            if n < self.failures {
                return Err((self.error)());
            }
            Ok(ChatReply {
                content: "<b>Certainly</b>,   Sir.".into(),
                total_tokens: 40,
                finish_reason: Some("stop".into()),
                model: None,
            })
        }
    }

    fn transient() -> JarvisError {
        JarvisError::TransientProvider {
            message: "overloaded".into(),
            status: Some(503),
        }
    }

    fn permanent() -> JarvisError {
        JarvisError::PermanentProvider {
            message: "Invalid API Key".into(),
            status: 401,
            kind: "invalid_request_error".into(),
        }
    }

    fn client_for(provider: Arc<FlakyProvider>) -> CompletionClient {
        let cache = Arc::new(CacheStore::in_memory(&CacheConfig::default()));
        CompletionClient::new(provider, cache, CompletionConfig::with_api_key("test")).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::builder("Who are you?")
            .system_prompt("You are JARVIS")
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_with_backup_model() {
        let provider = Arc::new(FlakyProvider::new(2, transient));
        let client = client_for(provider.clone());

        let result = client.complete(&request()).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.text, "Certainly, Sir.");
        assert_eq!(result.model, "mixtral-8x7b-32768");
        assert!(!result.served_from_cache);
        let models = provider.models.lock().unwrap().clone();
        assert_eq!(
            models,
            vec![
                "llama-3.3-70b-versatile",
                "mixtral-8x7b-32768",
                "mixtral-8x7b-32768"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let provider = Arc::new(FlakyProvider::new(u32::MAX, permanent));
        let client = client_for(provider.clone());

        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, JarvisError::PermanentProvider { status: 401, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_served_from_cache() {
        let provider = Arc::new(FlakyProvider::new(0, transient));
        let client = client_for(provider.clone());

        let first = client.complete(&request()).await.unwrap();
        let second = client.complete(&request()).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(second.served_from_cache);
        assert_eq!(second.elapsed_ms, 0.0);
        assert_eq!(second.text, first.text);
    }

    #[tokio::test(start_paused = true)]
    async fn test_use_cache_false_bypasses_cache() {
        let provider = Arc::new(FlakyProvider::new(0, transient));
        let client = client_for(provider.clone());
        let request = CompletionRequest::builder("Who are you?")
            .use_cache(false)
            .build()
            .unwrap();

        client.complete(&request).await.unwrap();
        client.complete(&request).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_key_uses_system_prefix() {
        let long_a = format!("{}{}", "x".repeat(500), "tail A");
        let long_b = format!("{}{}", "x".repeat(500), "tail B");
        let a = CompletionRequest::builder("q").system_prompt(long_a).build().unwrap();
        let b = CompletionRequest::builder("q").system_prompt(long_b).build().unwrap();
        assert_eq!(CompletionClient::cache_key(&a), CompletionClient::cache_key(&b));

        let c = CompletionRequest::builder("q").temperature(0.2).build().unwrap();
        let d = CompletionRequest::builder("q").temperature(0.3).build().unwrap();
        assert_ne!(CompletionClient::cache_key(&c), CompletionClient::cache_key(&d));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_retryable() {
        struct SlowProvider;

        #[async_trait]
        impl ChatProvider for SlowProvider {
            fn name(&self) -> &str {
                "slow"
            }
            async fn chat(&self, _call: &ChatCall) -> Result<ChatReply> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(JarvisError::Other("unreachable".into()))
            }
        }

        let cache = Arc::new(CacheStore::in_memory(&CacheConfig::default()));
        let client =
            CompletionClient::new(Arc::new(SlowProvider), cache, CompletionConfig::with_api_key("k"))
                .unwrap();
        let request = CompletionRequest::builder("hi")
            .timeout(Duration::from_millis(100))
            .retry_budget(1)
            .build()
            .unwrap();

        match client.complete(&request).await.unwrap_err() {
            JarvisError::ExhaustedRetries { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, JarvisError::Timeout(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
