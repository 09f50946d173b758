// Conversational agent contract
//
// Both agents (RagAgent, RouterAgent) expose the same invocation contract:
// a question plus the session history in, an AgentResponse out. Port failures
// are absorbed into the response; `invoke` never fails.
//
// This module also holds the pieces both agents share: the route label,
// transient per-invocation state and evidence/history formatting.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{truncate_chars, Message, MessageRole};
use crate::traits::Passage;

// ============================================================================
// Response types
// ============================================================================

/// Evidence source chosen by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Local document corpus
    VectorDb,
    /// Web search
    WebSearch,
    /// No retrieval, the LLM answers directly
    Direct,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::VectorDb => "vectordb",
            Route::WebSearch => "websearch",
            Route::Direct => "direct",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vectordb" => Ok(Route::VectorDb),
            "websearch" => Ok(Route::WebSearch),
            "direct" => Ok(Route::Direct),
            other => Err(format!("unknown route: {}", other)),
        }
    }
}

/// Outcome of one sufficiency judgment in the evidence-gathering loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyJudgment {
    /// Iteration the judgment belongs to (1-based)
    pub iteration: usize,
    pub is_relevant: bool,
    pub reason: String,
    /// False when the judgment fell back to the fail-open default
    pub parsed: bool,
}

/// Result of one agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub judgments: Vec<SufficiencyJudgment>,
    /// Messages the caller should append to the session
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Answer fragments yielded by `ConversationalAgent::stream`
pub type AnswerStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// A finished invocation plus its answer sliced into fragments
pub struct StreamedResponse {
    pub response: AgentResponse,
    pub fragments: AnswerStream,
}

impl fmt::Debug for StreamedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamedResponse")
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Split an answer into word fragments: the first word bare, every later
/// word with a leading space.
pub fn split_words(answer: &str) -> Vec<String> {
    answer
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                word.to_string()
            } else {
                format!(" {}", word)
            }
        })
        .collect()
}

/// Invocation contract shared by the agents
#[async_trait]
pub trait ConversationalAgent: Send + Sync {
    /// Answer a question given the prior conversation
    async fn invoke(&self, question: &str, chat_history: &[Message]) -> AgentResponse;

    /// Invoke, then slice the finished answer into word fragments
    async fn stream(&self, question: &str, chat_history: &[Message]) -> StreamedResponse {
        let response = self.invoke(question, chat_history).await;
        let fragments = split_words(&response.answer);
        StreamedResponse {
            response,
            fragments: Box::pin(futures::stream::iter(fragments)),
        }
    }
}

// ============================================================================
// Transient agent state
// ============================================================================

/// Per-invocation working state. Created fresh by each `invoke` and dropped
/// once the response is built.
#[derive(Debug, Clone, Default)]
pub(crate) struct AgentState {
    pub question: String,
    pub conversation_context: Vec<Message>,
    pub route: Option<Route>,
    pub routing_reason: Option<String>,
    pub evidence: String,
    pub is_sufficient: bool,
    pub iteration_count: usize,
    pub final_answer: Option<String>,
    pub messages: Vec<Message>,
}

impl AgentState {
    pub fn new(question: &str, chat_history: &[Message]) -> Self {
        Self {
            question: question.to_string(),
            conversation_context: chat_history.to_vec(),
            ..Default::default()
        }
    }

    /// Record the answer and the message delta of the turn
    pub fn finish_turn(&mut self, answer: String) {
        self.messages = vec![
            Message::user(self.question.clone()),
            Message::assistant(answer.clone()),
        ];
        self.final_answer = Some(answer);
    }
}

// ============================================================================
// Shared formatting
// ============================================================================

pub(crate) const NO_DOCUMENTS: &str = "No relevant documents were found.";
pub(crate) const NO_ANSWER: &str = "Unable to generate an answer.";

pub(crate) fn search_error(err: impl fmt::Display) -> String {
    format!("Error during search: {}", err)
}

pub(crate) fn answer_error(err: impl fmt::Display) -> String {
    format!("An error occurred while generating the answer: {}", err)
}

/// Format passages as numbered evidence blocks, or the no-documents marker
pub(crate) fn format_passages(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return NO_DOCUMENTS.to_string();
    }
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[Document {}]\n{}", i + 1, p.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recent conversation rendered for a synthesis prompt.
///
/// Keeps the last `last_n` messages, each cut to `max_chars` characters.
pub(crate) fn format_history(messages: &[Message], last_n: usize, max_chars: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let start = messages.len().saturating_sub(last_n);
    let mut history = String::from("\nPrevious conversation:\n");
    for msg in &messages[start..] {
        let speaker = if msg.role == MessageRole::User {
            "User"
        } else {
            "AI"
        };
        history.push_str(&format!(
            "{}: {}...\n",
            speaker,
            truncate_chars(&msg.content, max_chars)
        ));
    }
    history
}

/// Parse an LLM reply that should be a single JSON object.
/// Markdown code fences around the object are tolerated.
pub(crate) fn parse_json_object(text: &str) -> Result<serde_json::Map<String, Value>, String> {
    let trimmed = strip_code_fence(text);
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", other)),
        Err(e) => Err(e.to_string()),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_route_serde_labels() {
        assert_eq!(serde_json::to_string(&Route::VectorDb).unwrap(), "\"vectordb\"");
        assert_eq!(serde_json::to_string(&Route::WebSearch).unwrap(), "\"websearch\"");
        assert_eq!("direct".parse::<Route>().unwrap(), Route::Direct);
        assert!("database".parse::<Route>().is_err());
        // Labels must match exactly
        assert!("Direct".parse::<Route>().is_err());
        assert!("vectordb ".parse::<Route>().is_err());
    }

    #[test]
    fn test_split_words_normalizes_whitespace() {
        assert_eq!(
            split_words("Hello  world\nagain"),
            vec!["Hello", " world", " again"]
        );
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_format_passages_numbers_from_one() {
        let passages = vec![Passage::new("alpha"), Passage::new("beta")];
        assert_eq!(
            format_passages(&passages),
            "[Document 1]\nalpha\n\n[Document 2]\nbeta"
        );
        assert_eq!(format_passages(&[]), NO_DOCUMENTS);
    }

    #[test]
    fn test_format_history_keeps_last_messages_truncated() {
        let messages: Vec<Message> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {} {}", i, "x".repeat(300)))
                } else {
                    Message::assistant(format!("answer {}", i))
                }
            })
            .collect();

        let history = format_history(&messages, 6, 200);
        assert!(history.starts_with("\nPrevious conversation:\n"));
        assert_eq!(history.lines().filter(|l| !l.is_empty()).count(), 7);
        assert!(!history.contains("question 0"));
        assert!(history.contains("question 2"));
        assert!(history.contains("AI: answer 7..."));
        assert!(!history.contains(&"x".repeat(200)));
        assert_eq!(format_history(&[], 6, 200), "");
    }

    #[test]
    fn test_parse_json_object_with_fences() {
        let map = parse_json_object("```json\n{\"route\": \"direct\"}\n```").unwrap();
        assert_eq!(map["route"], "direct");
        assert!(parse_json_object("{\"a\": 1}").is_ok());
        assert!(parse_json_object("not json").is_err());
        assert!(parse_json_object("[1, 2]").is_err());
    }

    struct EchoAgent;

    #[async_trait]
    impl ConversationalAgent for EchoAgent {
        async fn invoke(&self, question: &str, _chat_history: &[Message]) -> AgentResponse {
            AgentResponse {
                question: question.to_string(),
                answer: format!("You  said {}", question),
                evidence: None,
                route: None,
                routing_reason: None,
                iterations: None,
                judgments: Vec::new(),
                messages: Vec::new(),
            }
        }
    }

    #[tokio::test]
    async fn test_stream_yields_words_of_invoke_answer() {
        let streamed = EchoAgent.stream("hi", &[]).await;
        let fragments: Vec<String> = streamed.fragments.collect().await;
        assert_eq!(fragments, vec!["You", " said", " hi"]);
        assert_eq!(fragments.concat(), "You said hi");
        assert_eq!(streamed.response.answer, "You  said hi");
    }
}
