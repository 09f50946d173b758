// Agent configuration
//
// AgentConfig is shared by the evidence-gathering agent, the router agent and
// the revision workflow's drafting call. It can be created directly or
// deserialized (missing fields fall back to defaults).

use serde::{Deserialize, Serialize};

/// Configuration for the agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identifier (e.g., "gpt-4.1-mini")
    pub model: String,

    /// Temperature for LLM sampling (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate per response
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Retry budget of the evidence-gathering loop. The loop performs at most
    /// `max_iterations + 1` retrievals before it is forced to answer.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Number of passages a retriever should return
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
}

fn default_temperature() -> Option<f32> {
    Some(0.3)
}

fn default_max_iterations() -> usize {
    3
}

fn default_retrieval_k() -> usize {
    3
}

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini-2025-04-14";

impl AgentConfig {
    /// Create a new agent configuration
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
            max_iterations: default_max_iterations(),
            retrieval_k: default_retrieval_k(),
        }
    }

    /// Set maximum iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.retrieval_k, 3);
        assert_eq!(config.temperature, Some(0.3));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: AgentConfig = serde_json::from_str(r#"{"model": "gpt-5-mini"}"#).unwrap();
        assert_eq!(config.model, "gpt-5-mini");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.temperature, Some(0.3));
    }
}
