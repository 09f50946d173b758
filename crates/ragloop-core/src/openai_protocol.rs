// OpenAI Protocol LLM Driver
//
// Implementation of the OpenAI chat completion protocol (streaming, text only).
// Works with any OpenAI-compatible endpoint.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::llm_drivers::{
    LlmCallConfig, LlmCompletionMetadata, LlmDriver, LlmMessage, LlmMessageRole,
    LlmResponseStream, LlmStreamEvent,
};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI Protocol LLM Driver
///
/// `LlmDriver` for OpenAI-compatible APIs with streaming responses.
///
/// # Example
///
/// ```ignore
/// use ragloop_core::OpenAIProtocolLlmDriver;
///
/// let driver = OpenAIProtocolLlmDriver::new("your-api-key");
/// // or with custom endpoint
/// let driver = OpenAIProtocolLlmDriver::with_base_url("your-api-key", "http://localhost:11434/v1/chat/completions");
/// ```
#[derive(Clone)]
pub struct OpenAIProtocolLlmDriver {
    client: Client,
    api_key: String,
    api_url: String,
}

impl OpenAIProtocolLlmDriver {
    /// Create a new driver with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Create a new driver with a custom API URL (for OpenAI-compatible APIs)
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    /// Get the API URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn convert_role(role: LlmMessageRole) -> &'static str {
        match role {
            LlmMessageRole::System => "system",
            LlmMessageRole::User => "user",
            LlmMessageRole::Assistant => "assistant",
        }
    }

    fn convert_message(msg: &LlmMessage) -> OpenAiMessage {
        OpenAiMessage {
            role: Self::convert_role(msg.role).to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Translate one server-sent event into a stream event
fn convert_event(data: &str, model: &str, total_tokens: &AtomicU32) -> LlmStreamEvent {
    if data == "[DONE]" {
        return LlmStreamEvent::Done(LlmCompletionMetadata {
            total_tokens: Some(total_tokens.load(Ordering::Relaxed)),
            model: Some(model.to_string()),
            finish_reason: Some("stop".to_string()),
        });
    }

    let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => return LlmStreamEvent::Error(format!("Failed to parse chunk: {}", e)),
    };

    let Some(choice) = chunk.choices.first() else {
        return LlmStreamEvent::TextDelta(String::new());
    };

    if let Some(content) = &choice.delta.content {
        total_tokens.fetch_add(1, Ordering::Relaxed);
        return LlmStreamEvent::TextDelta(content.clone());
    }

    if let Some(finish_reason) = &choice.finish_reason {
        return LlmStreamEvent::Done(LlmCompletionMetadata {
            total_tokens: Some(total_tokens.load(Ordering::Relaxed)),
            model: Some(model.to_string()),
            finish_reason: Some(finish_reason.clone()),
        });
    }

    LlmStreamEvent::TextDelta(String::new())
}

#[async_trait]
impl LlmDriver for OpenAIProtocolLlmDriver {
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        let request = OpenAiRequest {
            model: config.model.clone(),
            messages: messages.iter().map(Self::convert_message).collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: true,
        };

        tracing::debug!(
            model = %config.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::llm(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::llm(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let event_stream = response.bytes_stream().eventsource();

        let model = config.model.clone();
        let total_tokens = Arc::new(AtomicU32::new(0));

        let converted_stream: LlmResponseStream = Box::pin(event_stream.map(move |result| {
            Ok(match result {
                Ok(event) => convert_event(&event.data, &model, &total_tokens),
                Err(e) => LlmStreamEvent::Error(format!("Stream error: {}", e)),
            })
        }));

        Ok(converted_stream)
    }
}

impl std::fmt::Debug for OpenAIProtocolLlmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProtocolLlmDriver")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_drivers::collect_stream;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn call_config() -> LlmCallConfig {
        LlmCallConfig {
            model: "gpt-4.1-mini".to_string(),
            temperature: Some(0.3),
            max_tokens: None,
        }
    }

    fn sse_body(deltas: &[&str]) -> String {
        let mut body = String::new();
        for delta in deltas {
            let chunk = serde_json::json!({
                "choices": [{"delta": {"content": delta}, "finish_reason": null}]
            });
            body.push_str(&format!("data: {}\n\n", chunk));
        }
        body.push_str("data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n");
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let driver = OpenAIProtocolLlmDriver::new("sk-secret");
        let debug = format!("{:?}", driver);
        assert!(debug.contains("OpenAIProtocolLlmDriver"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_driver_with_base_url() {
        let driver = OpenAIProtocolLlmDriver::with_base_url(
            "test-key",
            "https://custom.api.com/v1/completions",
        );
        assert_eq!(driver.api_url(), "https://custom.api.com/v1/completions");
    }

    #[test]
    fn test_convert_event_done_marker() {
        let tokens = AtomicU32::new(4);
        match convert_event("[DONE]", "m", &tokens) {
            LlmStreamEvent::Done(meta) => {
                assert_eq!(meta.total_tokens, Some(4));
                assert_eq!(meta.model.as_deref(), Some("m"));
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_event_malformed_chunk() {
        let tokens = AtomicU32::new(0);
        assert!(matches!(
            convert_event("{not json", "m", &tokens),
            LlmStreamEvent::Error(_)
        ));
    }

    #[tokio::test]
    async fn test_streams_text_deltas_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4.1-mini",
                "stream": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body(&["Hello", " there"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let driver = OpenAIProtocolLlmDriver::with_base_url(
            "test-key",
            format!("{}/v1/chat/completions", server.uri()),
        );
        let stream = driver
            .chat_completion_stream(vec![LlmMessage::user("Hi")], &call_config())
            .await
            .unwrap();

        let mut deltas = Vec::new();
        let response = collect_stream(stream, |d| deltas.push(d.to_string()))
            .await
            .unwrap();

        assert_eq!(response.text, "Hello there");
        assert_eq!(deltas, vec!["Hello", " there"]);
        assert_eq!(response.metadata.total_tokens, Some(2));
    }

    #[tokio::test]
    async fn test_http_error_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let driver = OpenAIProtocolLlmDriver::with_base_url("bad-key", server.uri());
        let result = driver
            .chat_completion(vec![LlmMessage::user("Hi")], &call_config())
            .await;

        match result {
            Err(AgentError::Llm(msg)) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("invalid api key"));
            }
            other => panic!("expected Llm error, got {:?}", other),
        }
    }
}
