//! Network utilities for HTTP operations and retries.
//!
//! - Retry logic with exponential backoff
//! - HTTP client with status classification

mod client;
mod retry;

pub use client::{extract_domain, status_error, HttpClient};
pub use retry::{retry_async, RetryConfig, RetryStats};
