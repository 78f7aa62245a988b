//! Learning feedback handler.

use super::shared::{get_f64_param, get_str_param, require_str_param};
use crate::server::AppState;
use jarvis_core::{JarvisError, LearningRecord, Result};
use serde_json::{json, Value};

pub fn learn(state: &AppState, params: &Value) -> Result<Value> {
    let recorder = state.pipeline.recorder().ok_or_else(|| JarvisError::Config {
        message: "no interaction recorder configured".to_string(),
    })?;

    let quality = get_f64_param(params, "quality", "quality")
        .filter(|q| q.is_finite())
        .map(|q| q.clamp(0.0, 1.0))
        .unwrap_or(1.0);
    let record = LearningRecord {
        query: require_str_param(params, "query", "query")?,
        response: require_str_param(params, "response", "response")?,
        category: get_str_param(params, "category", "category")
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("general")
            .to_string(),
        quality_score: quality,
    };
    recorder.record_learning(&record)?;

    Ok(json!({
        "success": true,
        "query": record.query,
        "category": record.category,
        "quality": quality,
    }))
}
