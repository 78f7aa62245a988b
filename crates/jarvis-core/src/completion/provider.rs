//! Chat-completions provider seam and its OpenAI-compatible implementation.

use crate::config::CompletionConfig;
use crate::error::{JarvisError, Result};
use crate::network::{status_error, HttpClient};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// One provider call, already resolved to a concrete model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCall {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw provider reply before sanitizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub total_tokens: u32,
    pub finish_reason: Option<String>,
    /// Model reported by the provider, if any.
    pub model: Option<String>,
}

/// A chat-completions backend.
///
/// Implementations perform exactly one request per call; retries and model
/// fallback belong to [`super::CompletionClient`].
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider label used in logs and result metadata.
    fn name(&self) -> &str;

    async fn chat(&self, call: &ChatCall) -> Result<ChatReply>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    stream: bool,
}

/// OpenAI-compatible `/chat/completions` client (Groq by default).
pub struct ChatCompletionsProvider {
    http: HttpClient,
    config: CompletionConfig,
}

impl ChatCompletionsProvider {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        if !config.has_api_key() {
            return Err(JarvisError::Config {
                message: "completion API key is not configured".into(),
            });
        }
        let http = HttpClient::with_timeout(config.timeout)?;
        Ok(Self { http, config })
    }

    fn body<'a>(&self, call: &'a ChatCall) -> ChatBody<'a> {
        let mut messages = Vec::with_capacity(2);
        if !call.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &call.system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &call.user_prompt,
        });

        ChatBody {
            model: &call.model,
            messages,
            temperature: call.temperature,
            max_tokens: call.max_tokens,
            top_p: self.config.top_p,
            frequency_penalty: self.config.frequency_penalty,
            presence_penalty: self.config.presence_penalty,
            stream: false,
        }
    }
}

#[async_trait]
impl ChatProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn chat(&self, call: &ChatCall) -> Result<ChatReply> {
        let response = self
            .http
            .post_json_bearer(&self.config.endpoint, &self.config.api_key, &self.body(call))
            .await?;

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(JarvisError::TransientProvider {
                    message: format!("Invalid JSON response: {}", e),
                    status: Some(status.as_u16()),
                })
            }
            Err(_) => Value::Null,
        };

        parse_chat_response(status, &body)
    }
}

/// Decode a chat-completions response body.
pub fn parse_chat_response(status: StatusCode, body: &Value) -> Result<ChatReply> {
    if !status.is_success() {
        let error = body.get("error");
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown API error");
        let kind = error
            .and_then(|e| e.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(status_error(status, message, kind));
    }

    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| JarvisError::TransientProvider {
            message: "Response has no choices".into(),
            status: Some(status.as_u16()),
        })?;

    Ok(ChatReply {
        content: choice
            .pointer("/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        total_tokens: body
            .pointer("/usage/total_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(String::from),
        model: body.get("model").and_then(Value::as_str).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let body = json!({
            "model": "llama-3.3-70b-versatile",
            "choices": [{"message": {"role": "assistant", "content": "Hello, Sir."}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
        });
        let reply = parse_chat_response(StatusCode::OK, &body).unwrap();
        assert_eq!(reply.content, "Hello, Sir.");
        assert_eq!(reply.total_tokens, 25);
        assert_eq!(reply.finish_reason.as_deref(), Some("stop"));
        assert_eq!(reply.model.as_deref(), Some("llama-3.3-70b-versatile"));
    }

    #[test]
    fn test_parse_missing_content_is_empty() {
        let body = json!({"choices": [{"message": {"role": "assistant"}}]});
        let reply = parse_chat_response(StatusCode::OK, &body).unwrap();
        assert!(reply.content.is_empty());
        assert_eq!(reply.total_tokens, 0);
    }

    #[test]
    fn test_parse_no_choices_is_transient() {
        let err = parse_chat_response(StatusCode::OK, &json!({"choices": []})).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_auth_error_is_permanent() {
        let body = json!({"error": {"message": "Invalid API Key", "type": "invalid_request_error"}});
        let err = parse_chat_response(StatusCode::UNAUTHORIZED, &body).unwrap_err();
        match err {
            JarvisError::PermanentProvider { status, kind, message } => {
                assert_eq!(status, 401);
                assert_eq!(kind, "invalid_request_error");
                assert_eq!(message, "Invalid API Key");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_server_error_is_transient() {
        let err = parse_chat_response(StatusCode::SERVICE_UNAVAILABLE, &Value::Null).unwrap_err();
        assert!(matches!(err, JarvisError::TransientProvider { status: Some(503), .. }));
    }

    #[test]
    fn test_body_omits_empty_system_prompt() {
        let provider = ChatCompletionsProvider::new(CompletionConfig::with_api_key("k")).unwrap();
        let call = ChatCall {
            model: "m".into(),
            system_prompt: String::new(),
            user_prompt: "hi".into(),
            temperature: 0.5,
            max_tokens: 10,
        };
        let body = serde_json::to_value(provider.body(&call)).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["top_p"], json!(0.9f32));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        assert!(matches!(
            ChatCompletionsProvider::new(CompletionConfig::default()),
            Err(JarvisError::Config { .. })
        ));
    }
}
