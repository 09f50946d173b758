// Conversational Agent Core
//
// This crate provides the orchestration core of a retrieval-augmented chat
// assistant: agents that decide where evidence comes from, a bounded
// retrieval retry loop, the conversation/session data model and a
// human-in-the-loop revision workflow for drafts.
//
// Key design decisions:
// - Uses traits (Retriever, WebSearch, LlmDriver) for pluggable backends
// - Agents never mutate sessions; they return an AgentResponse the caller commits
// - Port failures are converted into evidence/answer text inside the agents
// - The conversation store is an explicit value, not a global
// - The revision workflow is an enum-staged state machine
// - Configuration via AgentConfig (created directly, built or deserialized)

pub mod agent;
pub mod config;
pub mod error;
pub mod llm_drivers;
pub mod message;
pub mod rag_agent;
pub mod retrieval;
pub mod revision;
pub mod router_agent;
pub mod session;
pub mod store;
pub mod traits;
pub mod web_search;

// In-memory implementations for examples and testing
pub mod memory;

// LLM Driver implementations
pub mod openai_protocol;

// Re-exports for convenience
pub use agent::{
    split_words, AgentResponse, AnswerStream, ConversationalAgent, Route, StreamedResponse,
    SufficiencyJudgment,
};
pub use config::{AgentConfig, DEFAULT_MODEL};
pub use error::{AgentError, Result, RevisionError};
pub use message::{Message, MessageRole};
pub use rag_agent::RagAgent;
pub use router_agent::{RouteDecision, RouterAgent};
pub use session::{derive_title, RouteAnnotation, Session, PLACEHOLDER_TITLE};
pub use store::ConversationStore;
pub use traits::{Passage, Retriever, SearchHit, WebSearch};

// Revision workflow re-exports
pub use revision::{split_sentences, RevisionStage, RevisionState, RevisionWorkflow};

// LLM driver types re-exports
pub use llm_drivers::{
    collect_stream, create_driver, BoxedLlmDriver, LlmCallConfig,
    LlmCompletionMetadata, LlmDriver, LlmMessage, LlmMessageRole, LlmResponse,
    LlmResponseStream, LlmStreamEvent, ProviderConfig,
};
pub use openai_protocol::OpenAIProtocolLlmDriver;

// Adapter re-exports
pub use retrieval::{chunk_text, KeywordRetriever};
pub use web_search::{augment_prompt, format_search_results, TavilySearch};
