// LLM Driver Abstractions
//
// This module encapsulates the LLM port:
// - LlmDriver trait and types for provider-agnostic LLM interactions
// - Driver factory for OpenAI-compatible endpoints
// - Message types for LLM calls
//
// IMPORTANT: The factory does NOT read environment variables. The caller resolves
// the API key (the CLI reads it from the environment) and passes it via ProviderConfig.

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::message::{Message, MessageRole};
use crate::openai_protocol::OpenAIProtocolLlmDriver;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

// ============================================================================
// LlmDriver Trait
// ============================================================================

/// Type alias for the LLM response stream
pub type LlmResponseStream = Pin<Box<dyn Stream<Item = Result<LlmStreamEvent>> + Send>>;

/// Events emitted during LLM streaming
#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    /// Text delta (incremental content)
    TextDelta(String),
    /// Streaming completed
    Done(LlmCompletionMetadata),
    /// Error during streaming
    Error(String),
}

/// Metadata about LLM completion
#[derive(Debug, Clone, Default)]
pub struct LlmCompletionMetadata {
    /// Total tokens used
    pub total_tokens: Option<u32>,
    /// Model used
    pub model: Option<String>,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// Trait for LLM drivers
///
/// Implementations handle provider-specific API calls and response parsing.
/// The stream is finite and not restartable.
#[async_trait]
pub trait LlmDriver: Send + Sync {
    /// Call the LLM with streaming response
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream>;

    /// Call the LLM without streaming (convenience method)
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        let stream = self.chat_completion_stream(messages, config).await?;
        collect_stream(stream, |_| {}).await
    }
}

/// Implement LlmDriver for Box<dyn LlmDriver> to allow dynamic dispatch
#[async_trait]
impl LlmDriver for Box<dyn LlmDriver> {
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        (**self).chat_completion_stream(messages, config).await
    }

    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        (**self).chat_completion(messages, config).await
    }
}

/// Drain a response stream into a single response, handing every text delta
/// to `on_delta` as it arrives.
pub async fn collect_stream(
    mut stream: LlmResponseStream,
    mut on_delta: impl FnMut(&str) + Send,
) -> Result<LlmResponse> {
    let mut text = String::new();
    let mut metadata = LlmCompletionMetadata::default();

    while let Some(event) = stream.next().await {
        match event? {
            LlmStreamEvent::TextDelta(delta) => {
                if !delta.is_empty() {
                    on_delta(&delta);
                    text.push_str(&delta);
                }
            }
            LlmStreamEvent::Done(meta) => metadata = meta,
            LlmStreamEvent::Error(err) => return Err(AgentError::llm(err)),
        }
    }

    Ok(LlmResponse { text, metadata })
}

// ============================================================================
// Message Types
// ============================================================================

/// Message format for LLM calls (provider-agnostic)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: LlmMessageRole,
    pub content: String,
}

impl LlmMessage {
    /// Create a message with text content
    pub fn text(role: LlmMessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(LlmMessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(LlmMessageRole::User, content)
    }
}

/// Message role for LLM calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMessageRole {
    System,
    User,
    Assistant,
}

impl From<&Message> for LlmMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            MessageRole::System => LlmMessageRole::System,
            MessageRole::User => LlmMessageRole::User,
            MessageRole::Assistant => LlmMessageRole::Assistant,
        };

        LlmMessage {
            role,
            content: msg.content.clone(),
        }
    }
}

// ============================================================================
// Configuration and Response Types
// ============================================================================

/// Configuration for an LLM call
#[derive(Debug, Clone)]
pub struct LlmCallConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&AgentConfig> for LlmCallConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Response from an LLM call (non-streaming)
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub metadata: LlmCompletionMetadata,
}

// ============================================================================
// Driver Factory
// ============================================================================

/// Configuration for creating an LLM driver
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// API key for authentication
    pub api_key: Option<String>,
    /// Chat completions URL override (OpenAI-compatible endpoints)
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Boxed LLM driver for dynamic dispatch
pub type BoxedLlmDriver = Box<dyn LlmDriver>;

/// Create an OpenAI-compatible LLM driver
pub fn create_driver(config: &ProviderConfig) -> Result<BoxedLlmDriver> {
    let api_key = config
        .api_key
        .as_ref()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AgentError::config("API key is required. Set OPENAI_API_KEY."))?;

    let driver = match &config.base_url {
        Some(url) => OpenAIProtocolLlmDriver::with_base_url(api_key, url),
        None => OpenAIProtocolLlmDriver::new(api_key),
    };
    Ok(Box::new(driver))
}

// ============================================================================
// Tests
// ============================================================================
