// In-memory port implementations for testing and examples
//
// These mocks stand in for the external capabilities the agents depend on:
// - MockLlmDriver: returns queued responses and logs every call
// - MockRetriever: returns queued retrieval outcomes
// - MockWebSearch: returns queued search outcomes

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AgentError, Result};
use crate::llm_drivers::{
    LlmCallConfig, LlmCompletionMetadata, LlmDriver, LlmMessage, LlmResponseStream,
    LlmStreamEvent,
};
use crate::traits::{Passage, Retriever, SearchHit, WebSearch};

// ============================================================================
// MockLlmDriver - Returns predefined responses
// ============================================================================

/// A queued mock LLM reply
#[derive(Debug, Clone)]
pub enum MockLlmResponse {
    /// Reply with this text, streamed as word-sized deltas
    Text(String),
    /// Fail the call with this message
    Error(String),
}

impl MockLlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// Mock LLM driver for testing
///
/// Responses are consumed in order; once the queue is exhausted every call
/// returns a fixed fallback text.
#[derive(Clone, Default)]
pub struct MockLlmDriver {
    responses: Arc<RwLock<Vec<MockLlmResponse>>>,
    call_index: Arc<RwLock<usize>>,
    call_log: Arc<RwLock<Vec<Vec<LlmMessage>>>>,
}

impl MockLlmDriver {
    /// Create a new mock LLM driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver with a prepared response queue
    pub fn with_responses(responses: Vec<MockLlmResponse>) -> Self {
        Self {
            responses: Arc::new(RwLock::new(responses)),
            ..Self::default()
        }
    }

    /// Add a response to the queue
    pub async fn add_response(&self, response: MockLlmResponse) {
        self.responses.write().await.push(response);
    }

    /// Messages of every call so far
    pub async fn calls(&self) -> Vec<Vec<LlmMessage>> {
        self.call_log.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.call_log.read().await.len()
    }
}

#[async_trait]
impl LlmDriver for MockLlmDriver {
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        self.call_log.write().await.push(messages);

        let mut index = self.call_index.write().await;
        let response = self
            .responses
            .read()
            .await
            .get(*index)
            .cloned()
            .unwrap_or_else(|| MockLlmResponse::text("Mock response (no more responses configured)"));
        *index += 1;
        drop(index);

        let text = match response {
            MockLlmResponse::Text(text) => text,
            MockLlmResponse::Error(message) => return Err(AgentError::llm(message)),
        };

        // Split into chunks that keep their whitespace so the joined text is exact
        let mut events: Vec<Result<LlmStreamEvent>> = text
            .split_inclusive(' ')
            .map(|chunk| Ok(LlmStreamEvent::TextDelta(chunk.to_string())))
            .collect();
        events.push(Ok(LlmStreamEvent::Done(LlmCompletionMetadata {
            total_tokens: Some(events.len() as u32),
            model: Some(config.model.clone()),
            finish_reason: Some("stop".to_string()),
        })));

        Ok(Box::pin(futures::stream::iter(events)))
    }
}

// ============================================================================
// MockRetriever - Returns predefined passages
// ============================================================================

/// A queued retrieval outcome
#[derive(Debug, Clone)]
pub enum MockRetrieval {
    Passages(Vec<Passage>),
    Error(String),
}

/// Mock retriever for testing
///
/// Outcomes are consumed in order; the last outcome repeats once the queue
/// runs out (an empty queue always returns no passages).
#[derive(Clone, Default)]
pub struct MockRetriever {
    outcomes: Arc<RwLock<Vec<MockRetrieval>>>,
    queries: Arc<RwLock<Vec<String>>>,
}

impl MockRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return these passages
    pub fn with_passages(passages: Vec<Passage>) -> Self {
        Self::with_outcomes(vec![MockRetrieval::Passages(passages)])
    }

    pub fn with_outcomes(outcomes: Vec<MockRetrieval>) -> Self {
        Self {
            outcomes: Arc::new(RwLock::new(outcomes)),
            queries: Arc::default(),
        }
    }

    /// Queries received so far
    pub async fn queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.queries.read().await.len()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        let call = {
            let mut queries = self.queries.write().await;
            queries.push(query.to_string());
            queries.len() - 1
        };

        let outcomes = self.outcomes.read().await;
        match outcomes.get(call).or_else(|| outcomes.last()) {
            Some(MockRetrieval::Passages(passages)) => Ok(passages.clone()),
            Some(MockRetrieval::Error(message)) => Err(AgentError::retrieval(message.clone())),
            None => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// MockWebSearch - Returns predefined hits
// ============================================================================

/// Mock web search for testing
#[derive(Clone, Default)]
pub struct MockWebSearch {
    hits: Vec<SearchHit>,
    failure: Option<String>,
    queries: Arc<RwLock<Vec<String>>>,
}

impl MockWebSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    /// A search that always fails with this message
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub async fn queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.queries.write().await.push(query.to_string());
        match &self.failure {
            Some(message) => Err(AgentError::web_search(message.clone())),
            None => Ok(self.hits.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmCallConfig {
        LlmCallConfig {
            model: "mock".into(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_mock_llm_returns_queued_responses_in_order() {
        let llm = MockLlmDriver::with_responses(vec![
            MockLlmResponse::text("first answer"),
            MockLlmResponse::error("rate limited"),
        ]);

        let first = llm
            .chat_completion(vec![LlmMessage::user("a")], &config())
            .await
            .unwrap();
        assert_eq!(first.text, "first answer");

        let second = llm
            .chat_completion(vec![LlmMessage::user("b")], &config())
            .await;
        assert!(matches!(second, Err(AgentError::Llm(m)) if m == "rate limited"));

        let third = llm
            .chat_completion(vec![LlmMessage::user("c")], &config())
            .await
            .unwrap();
        assert!(third.text.starts_with("Mock response"));
        assert_eq!(llm.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_mock_retriever_repeats_last_outcome() {
        let retriever = MockRetriever::with_outcomes(vec![
            MockRetrieval::Error("index offline".into()),
            MockRetrieval::Passages(vec![Passage::new("p")]),
        ]);

        assert!(retriever.retrieve("q").await.is_err());
        assert_eq!(retriever.retrieve("q").await.unwrap().len(), 1);
        assert_eq!(retriever.retrieve("q").await.unwrap().len(), 1);
        assert_eq!(retriever.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_mock_web_search() {
        let search = MockWebSearch::failing("timeout");
        assert!(search.search("news").await.is_err());
        assert_eq!(search.queries().await, vec!["news"]);
    }
}
