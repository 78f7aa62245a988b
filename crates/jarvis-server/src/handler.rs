//! Axum entry points.
//!
//! Each handler extracts the request, calls the matching domain function in
//! [`crate::handlers`] and wraps the outcome in the JSON envelope.

use crate::handlers;
use crate::server::AppState;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jarvis_core::{JarvisError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};

/// Header carrying the caller's session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    #[serde(default)]
    pub deep: bool,
}

/// Caller identity taken from the request, used for analytics and sessions.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub session_id: Option<String>,
    pub address: Option<String>,
}

impl Caller {
    fn from_parts(headers: &HeaderMap, connect: Option<ConnectInfo<SocketAddr>>) -> Self {
        Self {
            session_id: headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|s| !s.trim().is_empty())
                .map(String::from),
            address: connect.map(|ConnectInfo(addr)| addr.ip().to_string()),
        }
    }
}

/// Build the error envelope for `err`.
///
/// The error chain is only exposed when the server runs in debug mode.
pub(crate) fn error_response(err: &JarvisError, debug: bool) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut body = json!({
        "category": err.category(),
        "message": err.to_string(),
    });
    if debug {
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = std::error::Error::source(cause);
        }
        body["detail"] = json!({ "debug": format!("{:?}", err), "chain": chain });
    }

    let mut response = (status, Json(json!({"success": false, "error": body}))).into_response();
    if let JarvisError::RateLimited {
        retry_after_secs: Some(secs),
        ..
    } = err
    {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

fn respond(state: &AppState, endpoint: &str, result: Result<Value>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => {
            if e.status_code() >= 500 {
                error!("{} failed: {}", endpoint, e);
            } else {
                warn!("{} rejected: {}", endpoint, e);
            }
            error_response(&e, state.debug)
        }
    }
}

/// Health check endpoint.
pub async fn handle_health(
    State(state): State<Arc<AppState>>,
    query: Option<Query<HealthQuery>>,
) -> impl IntoResponse {
    let deep = query.map(|Query(q)| q.deep).unwrap_or(false);
    Json(handlers::status::health(&state, deep).await)
}

pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    let caller = Caller::from_parts(&headers, connect);
    let result = handlers::chat::chat(&state, &params, &caller).await;
    respond(&state, "chat", result)
}

pub async fn handle_search(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::search::search(&state, &params).await;
    respond(&state, "search", result)
}

pub async fn handle_cache_clear(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::cache::clear(&state, &params);
    respond(&state, "cache clear", result)
}

pub async fn handle_cache_invalidate(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::cache::invalidate(&state, &params);
    respond(&state, "cache invalidate", result)
}

pub async fn handle_cache_stats(State(state): State<Arc<AppState>>) -> Response {
    let result = handlers::cache::stats(&state);
    respond(&state, "cache stats", result)
}

pub async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    let result = handlers::status::models(&state);
    respond(&state, "models", result)
}

pub async fn handle_learn(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::learning::learn(&state, &params);
    respond(&state, "learn", result)
}

pub async fn handle_translate(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::tasks::translate(&state, &params).await;
    respond(&state, "translate", result)
}

pub async fn handle_summarize(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::tasks::summarize(&state, &params).await;
    respond(&state, "summarize", result)
}

pub async fn handle_code(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::tasks::code_assist(&state, &params).await;
    respond(&state, "code assist", result)
}

pub async fn handle_keywords(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Response {
    let result = handlers::tasks::keywords(&state, &params).await;
    respond(&state, "keywords", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status_and_retry_after() {
        let err = JarvisError::RateLimited {
            service: "jarvis-server".into(),
            retry_after_secs: Some(7),
        };
        let response = error_response(&err, false);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");

        let response = error_response(&JarvisError::validation("message", "empty"), false);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_caller_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("abc"));
        let addr: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let caller = Caller::from_parts(&headers, Some(ConnectInfo(addr)));
        assert_eq!(caller.session_id.as_deref(), Some("abc"));
        assert_eq!(caller.address.as_deref(), Some("10.0.0.5"));

        let caller = Caller::from_parts(&HeaderMap::new(), None);
        assert!(caller.session_id.is_none());
        assert!(caller.address.is_none());
    }
}
