//! Shared handler utilities used across endpoints.

use jarvis_core::{JarvisError, Result, SearchSource};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required, non-blank string parameter or return an error.
pub(crate) fn require_str_param(params: &Value, snake: &str, camel: &str) -> Result<String> {
    get_str_param(params, snake, camel)
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
        .ok_or_else(|| {
            JarvisError::validation(snake, format!("Missing required parameter: {}", snake))
        })
}

/// Extract an optional bool parameter, supporting both snake_case and camelCase.
pub(crate) fn get_bool_param(params: &Value, snake: &str, camel: &str) -> Option<bool> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_bool())
}

/// Extract an optional i64 parameter, supporting both snake_case and camelCase.
pub(crate) fn get_i64_param(params: &Value, snake: &str, camel: &str) -> Option<i64> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_i64())
}

/// Extract an optional f64 parameter, supporting both snake_case and camelCase.
pub(crate) fn get_f64_param(params: &Value, snake: &str, camel: &str) -> Option<f64> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_f64())
}

/// Extract a positive integer parameter. Zero and negative values are rejected.
pub(crate) fn get_positive_param(params: &Value, snake: &str, camel: &str) -> Result<Option<u64>> {
    match get_i64_param(params, snake, camel) {
        None => Ok(None),
        Some(n) if n > 0 => Ok(Some(n as u64)),
        Some(n) => Err(JarvisError::validation(
            snake,
            format!("must be positive, got {}", n),
        )),
    }
}

/// Optional `model` parameter, checked against `available`.
pub(crate) fn get_model_param(params: &Value, available: &[&str]) -> Result<Option<String>> {
    match get_str_param(params, "model", "model").filter(|m| !m.is_empty()) {
        None => Ok(None),
        Some(model) if available.contains(&model) => Ok(Some(model.to_string())),
        Some(model) => Err(JarvisError::validation(
            "model",
            format!("unknown model '{}', expected one of {}", model, available.join(", ")),
        )),
    }
}

/// Deserialize an optional structured parameter.
pub(crate) fn get_typed_param<T: DeserializeOwned>(
    params: &Value,
    snake: &str,
    camel: &str,
) -> Result<Option<T>> {
    match params.get(snake).or_else(|| params.get(camel)) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| JarvisError::validation(snake, e.to_string())),
    }
}

/// Parse a list of search source names. Unknown names are a validation error.
pub(crate) fn get_sources_param(params: &Value) -> Result<Option<Vec<SearchSource>>> {
    let Some(names) = get_typed_param::<Vec<String>>(params, "sources", "sources")? else {
        return Ok(None);
    };
    let mut sources = Vec::with_capacity(names.len());
    for name in names {
        let source: SearchSource = name.parse()?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(Some(sources))
}
