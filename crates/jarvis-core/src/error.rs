//! Error types for the JARVIS core.
//!
//! Every public operation returns [`Result`]. Cache backend and search
//! provider failures are built as errors so they can be logged uniformly,
//! but the components that own them degrade instead of returning them.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the JARVIS core.
#[derive(Debug, Error)]
pub enum JarvisError {
    // Completion provider errors
    #[error("Provider error ({status:?}): {message}")]
    TransientProvider {
        message: String,
        status: Option<u16>,
    },

    #[error("Provider rejected request ({status}): {message} (type: {kind})")]
    PermanentProvider {
        message: String,
        status: u16,
        kind: String,
    },

    #[error("Provider returned an empty completion for model {model}")]
    EmptyCompletion { model: String },

    #[error("All {attempts} attempts failed; last error: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<JarvisError>,
    },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    // Degradation-only errors
    #[error("Cache backend error: {message}")]
    CacheBackend { message: String },

    #[error("Search provider {provider} failed: {message}")]
    AggregatorProvider { provider: String, message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for JARVIS operations.
pub type Result<T> = std::result::Result<T, JarvisError>;

impl From<serde_json::Error> for JarvisError {
    fn from(err: serde_json::Error) -> Self {
        JarvisError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for JarvisError {
    fn from(err: rusqlite::Error) -> Self {
        JarvisError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for JarvisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JarvisError::Timeout(Duration::from_secs(0))
        } else {
            JarvisError::Network {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl JarvisError {
    /// Shorthand for a validation failure on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        JarvisError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable snake_case category used in API responses and logs.
    pub fn category(&self) -> &'static str {
        match self {
            JarvisError::TransientProvider { .. } => "provider_transient",
            JarvisError::PermanentProvider { .. } => "provider_permanent",
            JarvisError::EmptyCompletion { .. } => "empty_completion",
            JarvisError::ExhaustedRetries { .. } => "exhausted_retries",
            JarvisError::Network { .. } => "network",
            JarvisError::Timeout(_) => "timeout",
            JarvisError::RateLimited { .. } => "rate_limited",
            JarvisError::CacheBackend { .. } => "cache_backend",
            JarvisError::AggregatorProvider { .. } => "search_provider",
            JarvisError::Database { .. } => "database",
            JarvisError::Json { .. } => "serialization",
            JarvisError::Config { .. } => "config",
            JarvisError::Validation { .. } => "validation",
            JarvisError::Io(_) => "io",
            JarvisError::Other(_) => "internal",
        }
    }

    /// HTTP status code to report for this error.
    ///
    /// Upstream failures map to the 5xx gateway range, caller mistakes to 4xx.
    pub fn status_code(&self) -> u16 {
        match self {
            JarvisError::Validation { .. } => 400,
            JarvisError::RateLimited { .. } => 429,
            JarvisError::Timeout(_) => 504,
            JarvisError::TransientProvider { .. }
            | JarvisError::PermanentProvider { .. }
            | JarvisError::EmptyCompletion { .. }
            | JarvisError::ExhaustedRetries { .. }
            | JarvisError::Network { .. }
            | JarvisError::AggregatorProvider { .. } => 502,
            JarvisError::Config { .. } => 503,
            _ => 500,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JarvisError::TransientProvider { .. }
                | JarvisError::EmptyCompletion { .. }
                | JarvisError::Network { .. }
                | JarvisError::Timeout(_)
                | JarvisError::RateLimited { .. }
        )
    }

    /// Number of attempts behind this error, 1 unless retries were exhausted.
    pub fn attempts(&self) -> u32 {
        match self {
            JarvisError::ExhaustedRetries { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}
