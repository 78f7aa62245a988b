//! Shared HTTP client.
//!
//! Wraps reqwest with the application user agent and maps HTTP status codes
//! onto the error taxonomy: 408/429/5xx are transient, other 4xx permanent.

use crate::config::AppConfig;
use crate::error::{JarvisError, Result};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client used by the completion provider and search providers.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| JarvisError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Get a reference to the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// GET `url` with query parameters and extra headers, decoding a JSON body.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = Self::send(request, url).await?;
        let response = Self::check_response_status(response, url).await?;
        Ok(response.json::<Value>().await?)
    }

    /// POST a JSON body with bearer authentication. The response is
    /// returned unchecked so the caller can decode provider error bodies.
    pub async fn post_json_bearer<T: serde::Serialize>(
        &self,
        url: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        let request = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(body);
        Self::send(request, url).await
    }

    async fn send(request: RequestBuilder, url: &str) -> Result<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                JarvisError::Timeout(Duration::ZERO)
            } else {
                JarvisError::Network {
                    message: format!("Request to {} failed: {}", extract_domain(url), e),
                    cause: std::error::Error::source(&e).map(|s| s.to_string()),
                }
            }
        })
    }

    async fn check_response_status(response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        debug!("{} returned HTTP {}", extract_domain(url), status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            return Err(JarvisError::RateLimited {
                service: extract_domain(url),
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, truncate_body(&body), "http_error"))
    }

    /// Check if a status code indicates a retryable error.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429) || status.is_server_error()
    }

    /// Check if a status code indicates a permanent failure.
    pub fn is_permanent_failure(status: StatusCode) -> bool {
        status.is_client_error() && !Self::is_retryable_status(status)
    }
}

/// Classify a non-success status into a transient or permanent provider error.
pub fn status_error(status: StatusCode, message: impl Into<String>, kind: &str) -> JarvisError {
    let message = message.into();
    if HttpClient::is_retryable_status(status) || !HttpClient::is_permanent_failure(status) {
        JarvisError::TransientProvider {
            message,
            status: Some(status.as_u16()),
        }
    } else {
        JarvisError::PermanentProvider {
            message,
            status: status.as_u16(),
            kind: kind.to_string(),
        }
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://api.groq.com/openai/v1/chat/completions"),
            "api.groq.com"
        );
        assert_eq!(extract_domain("not a url"), "unknown");
    }

    #[test]
    fn test_retryable_status_codes() {
        assert!(HttpClient::is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(HttpClient::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(HttpClient::is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(HttpClient::is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!HttpClient::is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_permanent_failure_status_codes() {
        assert!(HttpClient::is_permanent_failure(StatusCode::BAD_REQUEST));
        assert!(HttpClient::is_permanent_failure(StatusCode::UNAUTHORIZED));
        assert!(HttpClient::is_permanent_failure(StatusCode::NOT_FOUND));
        assert!(!HttpClient::is_permanent_failure(StatusCode::TOO_MANY_REQUESTS));
        assert!(!HttpClient::is_permanent_failure(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_status_error_classification() {
        let err = status_error(StatusCode::UNAUTHORIZED, "Invalid API Key", "invalid_request_error");
        assert!(matches!(err, JarvisError::PermanentProvider { status: 401, .. }));
        assert!(!err.is_retryable());

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "overloaded", "server_error");
        assert!(matches!(err, JarvisError::TransientProvider { status: Some(503), .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(client.default_timeout(), Duration::from_secs(5));
    }
}
