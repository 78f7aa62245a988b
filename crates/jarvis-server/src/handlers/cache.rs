//! Cache maintenance handlers.

use super::shared::{get_bool_param, get_str_param, require_str_param};
use crate::server::AppState;
use chrono::{DateTime, Utc};
use jarvis_core::{ClearScope, JarvisError, Result};
use serde_json::{json, Value};
use tracing::info;

pub fn clear(state: &AppState, params: &Value) -> Result<Value> {
    if !get_bool_param(params, "confirm", "confirm").unwrap_or(false) {
        return Err(JarvisError::validation(
            "confirm",
            "clearing the cache requires confirm=true",
        ));
    }

    let scope = match get_str_param(params, "scope", "scope") {
        Some(scope) => scope.parse()?,
        None => ClearScope::All,
    };
    let older_than = get_str_param(params, "older_than", "olderThan")
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| JarvisError::validation("older_than", e.to_string()))
        })
        .transpose()?;

    let cleared = state.cache().clear(scope, older_than);
    info!("Cleared {} cache entries ({:?})", cleared.total(), scope);

    Ok(json!({
        "success": true,
        "scope": scope,
        "cleared": {
            "ephemeral": cleared.ephemeral,
            "durable": cleared.durable,
            "total": cleared.total(),
        },
    }))
}

pub fn invalidate(state: &AppState, params: &Value) -> Result<Value> {
    let tag = require_str_param(params, "tag", "tag")?;
    let removed = state.cache().invalidate_tag(&tag);
    info!("Invalidated {} cache entries tagged '{}'", removed, tag);
    Ok(json!({
        "success": true,
        "tag": tag,
        "removed": removed,
    }))
}

pub fn stats(state: &AppState) -> Result<Value> {
    Ok(json!({
        "success": true,
        "stats": state.cache().stats(),
    }))
}
