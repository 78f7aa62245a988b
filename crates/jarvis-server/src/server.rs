//! HTTP server implementation using Axum.

use crate::handler::{
    error_response, handle_cache_clear, handle_cache_invalidate, handle_cache_stats, handle_chat,
    handle_code, handle_health, handle_keywords, handle_learn, handle_models, handle_search,
    handle_summarize, handle_translate,
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use jarvis_core::config::RateLimitDefaults;
use jarvis_core::{CacheStore, Database, JarvisError, ResponsePipeline};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Response pipeline with its cache, search and recorder
    pub pipeline: Arc<ResponsePipeline>,
    /// Shared database handle, used for health checks
    pub db: Database,
    /// Per-caller request limiter for `/api/*`
    pub limiter: DefaultKeyedRateLimiter<String>,
    /// Include error chains in responses
    pub debug: bool,
}

impl AppState {
    pub fn new(pipeline: Arc<ResponsePipeline>, db: Database, debug: bool) -> Self {
        Self {
            pipeline,
            db,
            limiter: RateLimiter::keyed(quota(
                RateLimitDefaults::MAX_REQUESTS,
                RateLimitDefaults::WINDOW,
            )),
            debug,
        }
    }

    /// Replace the default limiter with `max_requests` per `window`.
    pub fn with_rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.limiter = RateLimiter::keyed(quota(max_requests, window));
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        self.pipeline.cache()
    }
}

/// `max_requests` per `window`, refilled evenly, with the full allowance as burst.
fn quota(max_requests: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window / burst.get())
        .map(|q| q.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_minute(burst))
}

/// Identity used for rate limiting: the peer IP.
///
/// Client-supplied headers are not trusted here, so rotating session ids
/// from one address shares a single bucket.
fn caller_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let key = caller_key(&request);
    match state.limiter.check_key(&key) {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            debug!("Rate limit exceeded for {}", key);
            let err = JarvisError::RateLimited {
                service: "jarvis-server".to_string(),
                retry_after_secs: Some(wait.as_secs().max(1)),
            };
            error_response(&err, state.debug)
        }
    }
}

/// Build the router. Exposed separately so tests can drive it without a socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Configure CORS for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/search", post(handle_search))
        .route("/api/cache/clear", post(handle_cache_clear))
        .route("/api/cache/invalidate", post(handle_cache_invalidate))
        .route("/api/cache/stats", get(handle_cache_stats))
        .route("/api/models", get(handle_models))
        .route("/api/learn", post(handle_learn))
        .route("/api/translate", post(handle_translate))
        .route("/api/summarize", post(handle_summarize))
        .route("/api/code", post(handle_code))
        .route("/api/keywords", post(handle_keywords))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(handle_health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(state);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Bind to the address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

/// Periodically purge expired cache entries from both tiers.
pub fn spawn_cache_sweeper(cache: Arc<CacheStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = cache.sweep_expired();
            if purged.total() > 0 {
                debug!(
                    "Swept {} expired cache entries ({} ephemeral, {} durable)",
                    purged.total(),
                    purged.ephemeral,
                    purged.durable
                );
            }
        }
    })
}

/// Periodically drop limiter buckets that have fully refilled.
pub fn spawn_limiter_cleanup(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let before = state.limiter.len();
            state.limiter.retain_recent();
            state.limiter.shrink_to_fit();
            let after = state.limiter.len();
            if after < before {
                debug!("Dropped {} idle rate limit buckets", before - after);
            }
        }
    })
}
