// Port traits for pluggable evidence sources
//
// The agents depend on these capabilities only through the traits:
// - Retriever: document search (vector store, keyword index, mocks)
// - WebSearch: web search API (Tavily, mocks)
//
// The LLM port lives in `llm_drivers` (LlmDriver).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Retriever - For document search
// ============================================================================

/// A retrieved passage of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text
    pub content: String,

    /// Where the passage came from (file name, URL, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Trait for document retrievers
///
/// Returns passages ordered by relevance. An empty result and an error are
/// both treated as "no evidence" by the agents.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>>;
}

// ============================================================================
// WebSearch - For web search
// ============================================================================

/// A single web search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
}

/// Trait for web search providers
///
/// A missing provider (no API key) is modelled by not having an instance at
/// all, never by an implementation that always fails.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}
