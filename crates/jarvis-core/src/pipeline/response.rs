//! The response pipeline: cache, context, prompt, completion, format.

use super::prompt::PromptBuilder;
use super::recorder::{InteractionRecorder, LearningRecord, RunRecord};
use super::sources::LocalDataSource;
use super::types::{
    AnswerMetadata, CachedAnswer, ConversationTurn, GenerateOptions, GeneratedAnswer,
    LocalRecord, PipelineStage, QueryAnalysis, RequestContext,
};
use crate::cache::{fingerprint, CacheStore};
use crate::completion::{CompletionClient, CompletionRequest, CompletionResult};
use crate::config::PipelineConfig;
use crate::error::{JarvisError, Result};
use crate::format::{FormatContext, ResponseFormatter};
use crate::search::{SearchAggregator, SearchOptions, SearchResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a successful run plus the raw completion used for recording.
struct RunOutput {
    answer: GeneratedAnswer,
    completion: CompletionResult,
}

/// Turns a user message into a formatted answer.
///
/// Collaborators are injected at construction; search, local data and
/// recording are optional and skipped when absent.
pub struct ResponsePipeline {
    cache: Arc<CacheStore>,
    completion: Arc<CompletionClient>,
    search: Option<Arc<SearchAggregator>>,
    local: Option<Arc<dyn LocalDataSource>>,
    recorder: Option<Arc<dyn InteractionRecorder>>,
    prompt: PromptBuilder,
    formatter: ResponseFormatter,
    config: PipelineConfig,
}

impl ResponsePipeline {
    pub fn new(
        cache: Arc<CacheStore>,
        completion: Arc<CompletionClient>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache,
            completion,
            search: None,
            local: None,
            recorder: None,
            prompt: PromptBuilder::new(&config),
            formatter: ResponseFormatter::new(),
            config,
        })
    }

    pub fn with_search(mut self, search: Arc<SearchAggregator>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_local_data(mut self, local: Arc<dyn LocalDataSource>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn InteractionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_prompt_builder(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn completion(&self) -> &Arc<CompletionClient> {
        &self.completion
    }

    pub fn search(&self) -> Option<&Arc<SearchAggregator>> {
        self.search.as_ref()
    }

    pub fn recorder(&self) -> Option<&Arc<dyn InteractionRecorder>> {
        self.recorder.as_ref()
    }

    /// Answer-cache key for a request.
    pub fn answer_cache_key(
        message: &str,
        analysis: &QueryAnalysis,
        context: &[ConversationTurn],
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let analysis = serde_json::to_string(analysis)?;
        let context = serde_json::to_string(context)?;
        let temperature = format!("{:.3}", temperature);
        let max_tokens = max_tokens.to_string();
        Ok(fingerprint(
            "answer",
            &[message, &analysis, &context, model, &temperature, &max_tokens],
        ))
    }

    /// Generate an answer for `message`.
    ///
    /// Input is validated before any external call. The whole run is bounded
    /// by `options.timeout`; on expiry in-flight work is dropped and
    /// [`JarvisError::Timeout`] is returned.
    pub async fn generate(
        &self,
        message: &str,
        analysis: &QueryAnalysis,
        context: &[ConversationTurn],
        options: &GenerateOptions,
        request: &RequestContext,
    ) -> Result<GeneratedAnswer> {
        let started = Instant::now();
        self.validate(message, options)?;
        let message = message.trim();
        self.enter(PipelineStage::Start, request);

        let outcome = match tokio::time::timeout(
            options.timeout,
            self.run(message, analysis, context, options, request, started),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(JarvisError::Timeout(options.timeout)),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(output) => {
                self.enter(PipelineStage::Done, request);
                info!(
                    session_id = %request.session_id,
                    cache_hit = output.answer.metadata.cache_hit,
                    tokens = output.answer.metadata.tokens_used,
                    elapsed_ms,
                    "Answer generated with {}",
                    output.answer.metadata.model
                );
                self.record_success(message, analysis, request, &output, elapsed_ms);
                Ok(output.answer)
            }
            Err(e) => {
                self.enter(PipelineStage::Failed, request);
                warn!(session_id = %request.session_id, elapsed_ms, "Pipeline failed: {}", e);
                self.record_failure(message, options, request, &e, elapsed_ms);
                Err(e)
            }
        }
    }

    fn validate(&self, message: &str, options: &GenerateOptions) -> Result<()> {
        if message.trim().is_empty() {
            return Err(JarvisError::validation("message", "must not be empty"));
        }
        if message.len() > self.config.max_message_bytes {
            return Err(JarvisError::validation(
                "message",
                format!("exceeds {} bytes", self.config.max_message_bytes),
            ));
        }
        if let Some(t) = options.temperature {
            if !t.is_finite() {
                return Err(JarvisError::validation("temperature", "must be a finite number"));
            }
        }
        if options.timeout.is_zero() {
            return Err(JarvisError::validation("timeout", "must be positive"));
        }
        if options.format.max_length == 0 {
            return Err(JarvisError::validation("max_length", "must be positive"));
        }
        Ok(())
    }

    async fn run(
        &self,
        message: &str,
        analysis: &QueryAnalysis,
        context: &[ConversationTurn],
        options: &GenerateOptions,
        request: &RequestContext,
        started: Instant,
    ) -> Result<RunOutput> {
        let defaults = self.completion.config();
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| defaults.default_model.clone());
        let temperature = options.clamped_temperature(defaults.temperature)?;
        let max_tokens = options.clamped_max_tokens(defaults.max_tokens);

        self.enter(PipelineStage::CacheCheck, request);
        let cache_key =
            Self::answer_cache_key(message, analysis, context, &model, temperature, max_tokens)?;
        if options.use_cache {
            if let Some(cached) = self.cache.get_as::<CachedAnswer>(&cache_key) {
                debug!(session_id = %request.session_id, "Answer cache hit");
                return Ok(self.answer_from_cache(cached, analysis, options, started));
            }
        }

        self.enter(PipelineStage::GatherContext, request);
        let (sources, records) = tokio::join!(
            self.gather_search(message, analysis, options),
            self.gather_local(message, analysis),
        );

        self.enter(PipelineStage::BuildPrompt, request);
        let system_prompt = self.prompt.build(analysis, &records, &sources, context);

        self.enter(PipelineStage::Complete, request);
        let completion_request = CompletionRequest::builder(message)
            .system_prompt(system_prompt)
            .model(model)
            .temperature(temperature)
            .max_tokens(max_tokens)
            .use_cache(options.use_cache)
            .build_with(defaults)?;
        let completion = self.completion.complete(&completion_request).await?;

        self.enter(PipelineStage::Format, request);
        let format_context = FormatContext {
            analysis: Some(analysis),
            sources: &sources,
        };
        let formatted = self.formatter.format(&completion, &format_context, &options.format);

        self.enter(PipelineStage::StoreCache, request);
        let cached = CachedAnswer {
            completion: completion.clone(),
            sources,
            local_records: records.len(),
        };
        match serde_json::to_value(&cached) {
            Ok(payload) => {
                let category_tag = format!("category:{}", analysis.category);
                self.cache.cache_with_tags(
                    &cache_key,
                    payload,
                    self.config.answer_cache_ttl,
                    &["answers", &category_tag],
                );
            }
            Err(e) => warn!("Answer could not be cached: {}", e),
        }

        let metadata = AnswerMetadata {
            tokens_used: completion.tokens_used,
            model: completion.model.clone(),
            cache_hit: false,
            completion_cache_hit: completion.served_from_cache,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            search_results: cached.sources.len(),
            local_records: cached.local_records,
            speed_rating: completion.speed_rating,
        };

        Ok(RunOutput {
            answer: GeneratedAnswer {
                answer: formatted,
                metadata,
            },
            completion,
        })
    }

    fn answer_from_cache(
        &self,
        cached: CachedAnswer,
        analysis: &QueryAnalysis,
        options: &GenerateOptions,
        started: Instant,
    ) -> RunOutput {
        let completion = cached.completion.as_cached();
        let format_context = FormatContext {
            analysis: Some(analysis),
            sources: &cached.sources,
        };
        let formatted = self.formatter.format(&completion, &format_context, &options.format);
        let metadata = AnswerMetadata {
            tokens_used: completion.tokens_used,
            model: completion.model.clone(),
            cache_hit: true,
            completion_cache_hit: true,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            search_results: cached.sources.len(),
            local_records: cached.local_records,
            speed_rating: completion.speed_rating,
        };
        RunOutput {
            answer: GeneratedAnswer {
                answer: formatted,
                metadata,
            },
            completion,
        }
    }

    async fn gather_search(
        &self,
        message: &str,
        analysis: &QueryAnalysis,
        options: &GenerateOptions,
    ) -> Vec<SearchResult> {
        if !analysis.needs_web_search || !self.config.web_search_enabled {
            return Vec::new();
        }
        let Some(search) = &self.search else {
            return Vec::new();
        };
        let search_options = SearchOptions::default()
            .with_limit(options.search_limit)
            .with_sources(options.sources.clone())
            .with_force_fresh(!options.use_cache);
        search.search(message, &search_options).await
    }

    async fn gather_local(&self, message: &str, analysis: &QueryAnalysis) -> Vec<LocalRecord> {
        if !analysis.needs_local_data {
            return Vec::new();
        }
        let Some(local) = &self.local else {
            return Vec::new();
        };
        match local
            .fetch(message, analysis, self.config.max_local_records)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("Local data unavailable, continuing without it: {}", e);
                Vec::new()
            }
        }
    }

    fn enter(&self, stage: PipelineStage, request: &RequestContext) {
        debug!(session_id = %request.session_id, %stage, "Pipeline stage");
    }

    fn record_success(
        &self,
        message: &str,
        analysis: &QueryAnalysis,
        request: &RequestContext,
        output: &RunOutput,
        elapsed_ms: f64,
    ) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let metadata = &output.answer.metadata;
        let cache_hit = metadata.cache_hit || metadata.completion_cache_hit;
        let run = RunRecord {
            session_id: request.session_id.clone(),
            caller: request.caller.clone(),
            query: message.to_string(),
            response: Some(output.completion.text.clone()),
            elapsed_ms,
            tokens_used: output.completion.tokens_used,
            model: output.completion.model.clone(),
            source: if cache_hit { "cache" } else { "completion" }.to_string(),
            cache_hit,
            error: None,
        };
        if let Err(e) = recorder.record_run(&run) {
            warn!("Failed to record analytics: {}", e);
        }

        if !cache_hit {
            let learning = LearningRecord {
                query: message.to_string(),
                response: output.completion.text.clone(),
                category: analysis.category.clone(),
                quality_score: 1.0,
            };
            if let Err(e) = recorder.record_learning(&learning) {
                warn!("Failed to record learning data: {}", e);
            }
        }
    }

    fn record_failure(
        &self,
        message: &str,
        options: &GenerateOptions,
        request: &RequestContext,
        error: &JarvisError,
        elapsed_ms: f64,
    ) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let run = RunRecord {
            session_id: request.session_id.clone(),
            caller: request.caller.clone(),
            query: message.to_string(),
            response: None,
            elapsed_ms,
            tokens_used: 0,
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.completion.config().default_model.clone()),
            source: "error".to_string(),
            cache_hit: false,
            error: Some(error.to_string()),
        };
        if let Err(e) = recorder.record_run(&run) {
            warn!("Failed to record analytics: {}", e);
        }
    }
}
