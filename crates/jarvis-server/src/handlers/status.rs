//! Health and model listing.

use crate::server::AppState;
use jarvis_core::Result;
use serde_json::{json, Value};
use tracing::warn;

/// Component status. `deep` additionally validates the completion API key.
pub async fn health(state: &AppState, deep: bool) -> Value {
    let mut healthy = true;

    let database = match state.db.ping() {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            warn!("Database health check failed: {}", e);
            healthy = false;
            format!("error: {}", e)
        }
    };

    let cache = if state.cache().is_enabled() {
        "enabled"
    } else {
        "disabled"
    };

    let web_search = match state.pipeline.search() {
        Some(search) => json!({
            "enabled": state.pipeline.config().web_search_enabled,
            "sources": search
                .registered_sources()
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>(),
        }),
        None => json!({"enabled": false, "sources": []}),
    };

    let completion = state.pipeline.completion();
    let completion_status = if !completion.config().has_api_key() {
        healthy = false;
        "unconfigured"
    } else if deep {
        match completion.validate_api_key().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!("API key validation failed: {}", e);
                healthy = false;
                "error"
            }
        }
    } else {
        "configured"
    };

    json!({
        "status": if healthy { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "components": {
            "database": database,
            "cache": cache,
            "web_search": web_search,
            "completion": completion_status,
        },
    })
}

pub fn models(state: &AppState) -> Result<Value> {
    let completion = state.pipeline.completion();
    Ok(json!({
        "success": true,
        "models": completion.available_models(),
        "default_model": completion.config().default_model,
        "backup_model": completion.config().backup_model,
    }))
}
