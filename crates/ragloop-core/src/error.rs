// Error types for the agents, the conversation store and the revision workflow

use thiserror::Error;
use uuid::Uuid;

use crate::revision::RevisionStage;

/// Result type alias for ragloop operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur in ragloop
///
/// Port failures (`Llm`, `Retrieval`, `WebSearch`) are produced by port
/// implementations. The agents absorb them and never return them from
/// `invoke`; they surface to callers only when a port is used directly.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Document retrieval error
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Web search error
    #[error("Web search error: {0}")]
    WebSearch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session not found in the conversation store
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Refused to delete the only remaining session
    #[error("Cannot delete the last remaining session")]
    LastSession,

    /// Revision workflow misuse
    #[error(transparent)]
    Revision(#[from] RevisionError),
}

impl AgentError {
    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        AgentError::Llm(msg.into())
    }

    /// Create a retrieval error
    pub fn retrieval(msg: impl Into<String>) -> Self {
        AgentError::Retrieval(msg.into())
    }

    /// Create a web search error
    pub fn web_search(msg: impl Into<String>) -> Self {
        AgentError::WebSearch(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AgentError::Configuration(msg.into())
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: Uuid) -> Self {
        AgentError::SessionNotFound(session_id)
    }
}

/// Rejected revision workflow operations. The workflow state is unchanged
/// whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    #[error("Operation requires stage '{expected}' but workflow is in '{actual}'")]
    WrongStage {
        expected: RevisionStage,
        actual: RevisionStage,
    },

    #[error("This is the last sentence. Use a full rewrite instead.")]
    LastSentence,

    #[error("Text must not be empty")]
    EmptyText,

    #[error("No pending answer")]
    NoPendingAnswer,

    /// Accept or redo-all was requested while some sentence is still unreviewed
    #[error("Sentence at index {0} has not been reviewed yet")]
    UnreviewedSentence(usize),

    /// A sentence operation was requested but every sentence is reviewed
    #[error("Every sentence has been reviewed")]
    NothingToReview,
}
