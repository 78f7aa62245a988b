//! End-to-end tests for the response pipeline with stub providers.

use async_trait::async_trait;
use chrono::Utc;
use jarvis_core::completion::{ChatCall, ChatReply};
use jarvis_core::pipeline::{LocalRecord, LocalRecordKind, SqliteRecorder};
use jarvis_core::search::{ResultKind, SearchProvider};
use jarvis_core::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Chat provider that fails `failures` times, then echoes a fixed answer.
struct StubChat {
    failures: u32,
    delay: Duration,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl StubChat {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            failures: 0,
            delay,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for StubChat {
    fn name(&self) -> &str {
        "stub"
    }

    async fn chat(&self, call: &ChatCall) -> Result<ChatReply> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(call.system_prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if n < self.failures {
            return Err(JarvisError::TransientProvider {
                message: "service unavailable".into(),
                status: Some(503),
            });
        }
        Ok(ChatReply {
            content: "I am JARVIS, at your service.".into(),
            total_tokens: 64,
            finish_reason: Some("stop".into()),
            model: Some(call.model.clone()),
        })
    }
}

struct StubSearch {
    calls: AtomicU32,
}

#[async_trait]
impl SearchProvider for StubSearch {
    fn source(&self) -> SearchSource {
        SearchSource::Wikipedia
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![SearchResult::new(
            SearchSource::Wikipedia,
            ResultKind::Encyclopedia,
            0.95,
            Utc::now(),
        )
        .title(format!("About {}", query))
        .snippet("Fictional AI assistant")
        .url("https://en.wikipedia.org/wiki/J.A.R.V.I.S.")])
    }
}

struct FailingLocal;

#[async_trait]
impl LocalDataSource for FailingLocal {
    async fn fetch(&self, _: &str, _: &QueryAnalysis, _: usize) -> Result<Vec<LocalRecord>> {
        Err(JarvisError::Other("records unavailable".into()))
    }
}

struct Harness {
    pipeline: ResponsePipeline,
    chat: Arc<StubChat>,
    search: Arc<StubSearch>,
    recorder: Arc<SqliteRecorder>,
    cache: Arc<CacheStore>,
}

fn harness(chat: Arc<StubChat>) -> Harness {
    let db = Database::open_in_memory().unwrap();
    let cache = Arc::new(CacheStore::with_database(db.clone(), &CacheConfig::default()).unwrap());
    let completion = Arc::new(
        CompletionClient::new(chat.clone(), cache.clone(), CompletionConfig::with_api_key("test"))
            .unwrap(),
    );
    let search = Arc::new(StubSearch {
        calls: AtomicU32::new(0),
    });
    let aggregator = Arc::new(SearchAggregator::new(
        vec![search.clone() as Arc<dyn SearchProvider>],
        cache.clone(),
        &SearchConfig::default(),
    ));
    let recorder = Arc::new(SqliteRecorder::new(db).unwrap());
    let local = StaticLocalData::new(vec![LocalRecord {
        kind: LocalRecordKind::Project,
        title: "JARVIS assistant".into(),
        description: "Portfolio chatbot backend".into(),
    }]);

    let pipeline = ResponsePipeline::new(cache.clone(), completion, PipelineConfig::default())
        .unwrap()
        .with_search(aggregator)
        .with_local_data(Arc::new(local))
        .with_recorder(recorder.clone());

    Harness {
        pipeline,
        chat,
        search,
        recorder,
        cache,
    }
}

fn analysis() -> QueryAnalysis {
    QueryAnalysis {
        query_type: "question".into(),
        category: "personal".into(),
        needs_web_search: true,
        needs_local_data: true,
        ..QueryAnalysis::default()
    }
}

fn options() -> GenerateOptions {
    GenerateOptions {
        sources: vec![SearchSource::Wikipedia],
        ..GenerateOptions::default()
    }
}

#[tokio::test]
async fn test_second_identical_request_is_a_cache_hit() {
    let h = harness(StubChat::new(0));
    let ctx = RequestContext::new("s1");

    let first = h
        .pipeline
        .generate("Who is JARVIS?", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();
    assert!(!first.metadata.cache_hit);
    assert_eq!(first.metadata.search_results, 1);
    assert_eq!(first.metadata.local_records, 1);
    assert!(first.answer.content.starts_with("Sir, I am JARVIS"));

    let second = h
        .pipeline
        .generate("Who is JARVIS?", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();
    assert!(second.metadata.cache_hit);
    assert_eq!(second.answer.content, first.answer.content);
    assert_eq!(second.answer.metadata["cached"], serde_json::json!(true));

    assert_eq!(h.chat.calls(), 1);
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_completion_cache_hit_is_not_an_answer_cache_hit() {
    let h = harness(StubChat::new(0));
    let ctx = RequestContext::new("s1");

    let first = h
        .pipeline
        .generate("Who is JARVIS?", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();
    assert!(!first.metadata.cache_hit);
    assert!(!first.metadata.completion_cache_hit);

    // Drop cached answers only; searches and completions stay cached
    assert_eq!(h.cache.invalidate_tag("answers"), 1);

    let second = h
        .pipeline
        .generate("Who is JARVIS?", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();
    assert!(!second.metadata.cache_hit);
    assert!(second.metadata.completion_cache_hit);
    assert_eq!(h.chat.calls(), 1);

    let third = h
        .pipeline
        .generate("Who is JARVIS?", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();
    assert!(third.metadata.cache_hit);
    assert!(third.metadata.completion_cache_hit);
}

#[tokio::test]
async fn test_prompt_carries_gathered_context() {
    let h = harness(StubChat::new(0));
    let history = vec![ConversationTurn {
        query: "Hello".into(),
        response: "Good evening, Sir.".into(),
    }];

    h.pipeline
        .generate("Who is JARVIS?", &analysis(), &history, &options(), &RequestContext::new("s"))
        .await
        .unwrap();

    let prompts = h.chat.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("- [Project] JARVIS assistant: Portfolio chatbot backend"));
    assert!(prompt.contains("- [Wikipedia] About Who is JARVIS?: Fictional AI assistant"));
    assert!(prompt.contains("JARVIS: Good evening, Sir."));
    assert!(prompt.chars().count() <= PipelineConfig::default().max_prompt_chars);
}

#[tokio::test]
async fn test_skips_search_when_not_needed() {
    let h = harness(StubChat::new(0));
    let plain = QueryAnalysis::default();

    let answer = h
        .pipeline
        .generate("Tell me a joke", &plain, &[], &options(), &RequestContext::new("s"))
        .await
        .unwrap();

    assert_eq!(answer.metadata.search_results, 0);
    assert_eq!(answer.metadata.local_records, 0);
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_message_rejected_before_any_call() {
    let h = harness(StubChat::new(0));

    let err = h
        .pipeline
        .generate("   ", &analysis(), &[], &options(), &RequestContext::new("s"))
        .await
        .unwrap_err();

    assert!(matches!(err, JarvisError::Validation { ref field, .. } if field == "message"));
    assert_eq!(h.chat.calls(), 0);
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);

    let oversized = "x".repeat(PipelineConfig::default().max_message_bytes + 1);
    assert!(h
        .pipeline
        .generate(&oversized, &analysis(), &[], &options(), &RequestContext::new("s"))
        .await
        .is_err());
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_then_succeeds() {
    let h = harness(StubChat::new(2));

    let answer = h
        .pipeline
        .generate("Status report", &analysis(), &[], &options(), &RequestContext::new("s"))
        .await
        .unwrap();

    assert_eq!(h.chat.calls(), 3);
    assert_eq!(answer.metadata.model, CompletionConfig::default().backup_model);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_are_recorded() {
    let h = harness(StubChat::new(u32::MAX));

    let err = h
        .pipeline
        .generate("Status report", &analysis(), &[], &options(), &RequestContext::new("s9"))
        .await
        .unwrap_err();

    assert!(matches!(err, JarvisError::ExhaustedRetries { attempts: 3, .. }));
    assert_eq!(h.chat.calls(), 3);
    assert_eq!(h.recorder.run_count("s9").unwrap(), 1);
    assert!(h.recorder.recent_turns("s9", 5).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_whole_run_bounded_by_timeout() {
    let h = harness(StubChat::slow(Duration::from_secs(600)));
    let options = GenerateOptions {
        timeout: Duration::from_secs(2),
        ..options()
    };

    let started = tokio::time::Instant::now();
    let err = h
        .pipeline
        .generate("Status report", &analysis(), &[], &options, &RequestContext::new("s"))
        .await
        .unwrap_err();

    assert!(matches!(err, JarvisError::Timeout(d) if d == Duration::from_secs(2)));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_local_data_failure_is_not_fatal() {
    let db = Database::open_in_memory().unwrap();
    let cache = Arc::new(CacheStore::with_database(db, &CacheConfig::default()).unwrap());
    let chat = StubChat::new(0);
    let completion = Arc::new(
        CompletionClient::new(chat.clone(), cache.clone(), CompletionConfig::with_api_key("test"))
            .unwrap(),
    );
    let pipeline = ResponsePipeline::new(cache, completion, PipelineConfig::default())
        .unwrap()
        .with_local_data(Arc::new(FailingLocal));

    let answer = pipeline
        .generate("About me", &analysis(), &[], &options(), &RequestContext::new("s"))
        .await
        .unwrap();
    assert_eq!(answer.metadata.local_records, 0);
    assert_eq!(chat.calls(), 1);
}

#[tokio::test]
async fn test_recorder_sees_fresh_and_cached_runs() {
    let h = harness(StubChat::new(0));
    let ctx = RequestContext::new("session-r").with_caller("10.0.0.1");

    for _ in 0..2 {
        h.pipeline
            .generate("Who built you?", &analysis(), &[], &options(), &ctx)
            .await
            .unwrap();
    }

    assert_eq!(h.recorder.run_count("session-r").unwrap(), 2);
    let turns = h.recorder.recent_turns("session-r", 5).unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].query, "Who built you?");
    assert_eq!(turns[0].response, "I am JARVIS, at your service.");

    // Learning is written for fresh answers only
    let summary = h.recorder.learning_summary("Who built you?").unwrap().unwrap();
    assert_eq!(summary.usage_count, 1);
    assert_eq!(summary.category, "personal");
}

#[tokio::test]
async fn test_force_fresh_and_tag_invalidation() {
    let h = harness(StubChat::new(0));
    let ctx = RequestContext::new("s");

    h.pipeline
        .generate("Ping", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();

    let fresh = GenerateOptions {
        use_cache: false,
        ..options()
    };
    let answer = h
        .pipeline
        .generate("Ping", &analysis(), &[], &fresh, &ctx)
        .await
        .unwrap();
    assert!(!answer.metadata.cache_hit);
    assert_eq!(h.chat.calls(), 2);

    // Dropping cached answers and completions forces a provider call
    assert!(h.cache.invalidate_tag("category:personal") >= 1);
    h.cache.clear(ClearScope::All, None);
    let answer = h
        .pipeline
        .generate("Ping", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();
    assert!(!answer.metadata.cache_hit);
    assert_eq!(h.chat.calls(), 3);
}

#[tokio::test]
async fn test_cached_answer_reformatted_with_current_options() {
    let h = harness(StubChat::new(0));
    let ctx = RequestContext::new("s");

    h.pipeline
        .generate("Ping", &analysis(), &[], &options(), &ctx)
        .await
        .unwrap();

    let html = GenerateOptions {
        format: FormatOptions {
            encoding: Encoding::Html,
            style: ResponseStyle::Raw,
            ..FormatOptions::default()
        },
        ..options()
    };
    let answer = h
        .pipeline
        .generate("Ping", &analysis(), &[], &html, &ctx)
        .await
        .unwrap();
    assert!(answer.metadata.cache_hit);
    assert!(answer.answer.content.starts_with("<div class=\"jarvis-response\">"));
    assert_eq!(h.chat.calls(), 1);
}
