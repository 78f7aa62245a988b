//! Web search handler.

use super::shared::{
    get_bool_param, get_i64_param, get_positive_param, get_sources_param, require_str_param,
};
use crate::server::AppState;
use jarvis_core::config::SearchDefaults;
use jarvis_core::{JarvisError, Result, SearchOptions};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub async fn search(state: &AppState, params: &Value) -> Result<Value> {
    let search = state.pipeline.search().ok_or_else(|| JarvisError::Config {
        message: "web search is disabled".to_string(),
    })?;

    let query = require_str_param(params, "query", "query")?;
    let limit = get_i64_param(params, "limit", "limit")
        .map(|n| n.clamp(1, SearchDefaults::MAX_RESULT_LIMIT as i64) as usize)
        .unwrap_or(SearchDefaults::RESULT_LIMIT);

    let mut options = SearchOptions::default()
        .with_limit(limit)
        .with_force_fresh(get_bool_param(params, "force_fresh", "forceFresh").unwrap_or(false));
    if let Some(sources) = get_sources_param(params)? {
        options = options.with_sources(sources);
    }
    if let Some(ms) = get_positive_param(params, "timeout_ms", "timeoutMs")? {
        options = options.with_timeout(Duration::from_millis(ms));
    }

    let results = search.search(&query, &options).await;

    let mut distribution: BTreeMap<&str, usize> = BTreeMap::new();
    for result in &results {
        *distribution.entry(result.source.as_str()).or_default() += 1;
    }

    Ok(json!({
        "success": true,
        "query": query,
        "result_count": results.len(),
        "source_distribution": distribution,
        "results": results,
    }))
}
