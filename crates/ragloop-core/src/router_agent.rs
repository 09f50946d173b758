// Router agent
//
// ROUTER -> {VECTORDB | WEBSEARCH | DIRECT} -> ANSWER -> END
//
// The LLM classifies each question once. VECTORDB and WEBSEARCH collect
// evidence and hand off to ANSWER; DIRECT answers from the conversation alone
// and ends immediately. A single retrieval pass is trusted: there is no
// sufficiency loop here.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::{
    answer_error, format_history, format_passages, parse_json_object, search_error, AgentResponse,
    AgentState, ConversationalAgent, Route, NO_ANSWER,
};
use crate::config::AgentConfig;
use crate::llm_drivers::{LlmCallConfig, LlmDriver, LlmMessage};
use crate::message::Message;
use crate::traits::{Retriever, WebSearch};
use crate::web_search::format_hits_as_evidence;

const HISTORY_MESSAGES: usize = 4;
const HISTORY_CHARS: usize = 100;

pub(crate) const WEB_SEARCH_UNCONFIGURED: &str =
    "Web search tool is not configured. Check the Tavily API key.";
const NO_SEARCH_RESULTS: &str = "No search results were found.";
const DEFAULT_ROUTE_REASON: &str = "Default route";
const UNKNOWN_ROUTE_REASON: &str = "Unknown route, using default route";

/// Stage of the router state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterStage {
    Router,
    VectorDb,
    WebSearch,
    Direct,
    Answer,
    End,
}

impl From<Route> for RouterStage {
    fn from(route: Route) -> Self {
        match route {
            Route::VectorDb => RouterStage::VectorDb,
            Route::WebSearch => RouterStage::WebSearch,
            Route::Direct => RouterStage::Direct,
        }
    }
}

/// A parsed routing decision
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub route: Route,
    pub reasoning: String,
}

impl RouteDecision {
    fn direct(reasoning: impl Into<String>) -> Self {
        Self {
            route: Route::Direct,
            reasoning: reasoning.into(),
        }
    }

    /// Interpret the classifier's reply.
    ///
    /// Always yields a valid route: a missing label means `direct`, an
    /// unknown label is coerced to `direct` and unparseable text is an error
    /// the caller turns into `direct`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let object = parse_json_object(text)?;

        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ROUTE_REASON)
            .to_string();

        let label = match object.get("route") {
            None | Some(Value::Null) => return Ok(Self::direct(reasoning)),
            Some(Value::String(label)) => label.as_str(),
            Some(_) => return Ok(Self::direct(UNKNOWN_ROUTE_REASON)),
        };

        Ok(match label.parse::<Route>() {
            Ok(route) => Self { route, reasoning },
            Err(_) => Self::direct(UNKNOWN_ROUTE_REASON),
        })
    }
}

/// Router agent dispatching between document search, web search and a
/// direct answer
pub struct RouterAgent {
    llm: Arc<dyn LlmDriver>,
    retriever: Arc<dyn Retriever>,
    web_search: Option<Arc<dyn WebSearch>>,
    config: AgentConfig,
}

impl RouterAgent {
    pub fn new(
        llm: Arc<dyn LlmDriver>,
        retriever: Arc<dyn Retriever>,
        web_search: Option<Arc<dyn WebSearch>>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            retriever,
            web_search,
            config,
        }
    }

    pub fn has_web_search(&self) -> bool {
        self.web_search.is_some()
    }

    fn call_config(&self) -> LlmCallConfig {
        LlmCallConfig::from(&self.config)
    }

    /// Classify the question. Never fails: errors resolve to `direct`.
    pub async fn classify(&self, question: &str) -> RouteDecision {
        let reply = self
            .llm
            .chat_completion(
                vec![LlmMessage::system(router_prompt(question))],
                &self.call_config(),
            )
            .await;

        let decision = reply
            .map_err(|e| e.to_string())
            .and_then(|r| RouteDecision::parse(&r.text));

        match decision {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Routing failed, using default route");
                RouteDecision::direct(format!("Routing error: {}", e))
            }
        }
    }

    async fn search_documents(&self, question: &str) -> String {
        match self.retriever.retrieve(question).await {
            Ok(passages) => {
                debug!(passages = passages.len(), "Document search completed");
                format_passages(&passages)
            }
            Err(e) => {
                warn!(error = %e, "Document search failed");
                search_error(e)
            }
        }
    }

    async fn search_web(&self, question: &str) -> String {
        let Some(web_search) = &self.web_search else {
            return WEB_SEARCH_UNCONFIGURED.to_string();
        };

        match web_search.search(question).await {
            Ok(hits) if hits.is_empty() => NO_SEARCH_RESULTS.to_string(),
            Ok(hits) => {
                debug!(hits = hits.len(), "Web search completed");
                format_hits_as_evidence(&hits)
            }
            Err(e) => {
                warn!(error = %e, "Web search failed");
                search_error(e)
            }
        }
    }

    /// Answer from the conversation alone.
    /// On failure the answer carries the error and no messages are produced.
    async fn answer_directly(&self, state: &mut AgentState) {
        let mut conversation: Vec<LlmMessage> = state
            .conversation_context
            .iter()
            .map(LlmMessage::from)
            .collect();
        conversation.push(LlmMessage::user(state.question.clone()));

        match self.llm.chat_completion(conversation, &self.call_config()).await {
            Ok(response) => state.finish_turn(response.text),
            Err(e) => {
                warn!(error = %e, "Direct answer failed");
                state.final_answer = Some(answer_error(e));
            }
        }
    }

    /// Answer from the gathered evidence.
    /// On failure the answer carries the error and no messages are produced.
    async fn answer_from_evidence(&self, state: &mut AgentState) {
        let prompt = answer_prompt(state);
        match self
            .llm
            .chat_completion(vec![LlmMessage::system(prompt)], &self.call_config())
            .await
        {
            Ok(response) => state.finish_turn(response.text),
            Err(e) => {
                warn!(error = %e, "Answer synthesis failed");
                state.final_answer = Some(answer_error(e));
            }
        }
    }

    async fn run(&self, state: &mut AgentState) {
        let mut stage = RouterStage::Router;

        while stage != RouterStage::End {
            stage = match stage {
                RouterStage::Router => {
                    let decision = self.classify(&state.question).await;
                    info!(route = %decision.route, reason = %decision.reasoning, "Route selected");
                    state.route = Some(decision.route);
                    state.routing_reason = Some(decision.reasoning);
                    RouterStage::from(decision.route)
                }
                RouterStage::VectorDb => {
                    state.evidence = self.search_documents(&state.question).await;
                    RouterStage::Answer
                }
                RouterStage::WebSearch => {
                    state.evidence = self.search_web(&state.question).await;
                    RouterStage::Answer
                }
                RouterStage::Direct => {
                    self.answer_directly(state).await;
                    RouterStage::End
                }
                RouterStage::Answer => {
                    self.answer_from_evidence(state).await;
                    RouterStage::End
                }
                RouterStage::End => RouterStage::End,
            };
        }
    }
}

#[async_trait]
impl ConversationalAgent for RouterAgent {
    async fn invoke(&self, question: &str, chat_history: &[Message]) -> AgentResponse {
        let mut state = AgentState::new(question, chat_history);
        self.run(&mut state).await;

        let evidence = (!state.evidence.is_empty()).then_some(state.evidence);
        AgentResponse {
            question: state.question,
            answer: state.final_answer.unwrap_or_else(|| NO_ANSWER.to_string()),
            evidence,
            route: state.route,
            routing_reason: state.routing_reason,
            iterations: None,
            judgments: Vec::new(),
            messages: state.messages,
        }
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn router_prompt(question: &str) -> String {
    format!(
        r#"Analyze the following question and choose the most appropriate way to handle it.

Question: {question}

Options:
1. **vectordb**: technical questions about AI, deep learning, machine learning, neural networks, optimization algorithms
   - Examples: "What is backpropagation?", "How is a CNN structured?", "Explain gradient descent"
   - Source: the document corpus
2. **websearch**: recent news, real-time information, recent events, current weather or stock prices
   - Examples: "Who won the Nobel Prize this year?", "Today's weather", "Latest AI news"
   - Source: web search
3. **direct**: small talk, translation, calculation, reasoning, creative writing
   - Examples: "Hello", "What is 1+1?", "Write a poem", "Write Python code"
   - Source: the LLM answers directly

Respond in the following JSON format:
{{
    "route": "vectordb" or "websearch" or "direct",
    "reasoning": "one sentence explaining the choice"
}}

Output only the JSON."#,
        question = question
    )
}

fn answer_prompt(state: &AgentState) -> String {
    let source = match state.route {
        Some(Route::WebSearch) => "web search",
        _ => "document corpus",
    };
    format!(
        r#"{history}
Question: {question}

Reference material (source: {source}):
{evidence}

Write an accurate and detailed answer to the question based on the reference material above.
If the material does not contain the answer, say so honestly."#,
        history = format_history(&state.conversation_context, HISTORY_MESSAGES, HISTORY_CHARS),
        question = state.question,
        source = source,
        evidence = state.evidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_routes() {
        let decision =
            RouteDecision::parse(r#"{"route": "websearch", "reasoning": "current events"}"#)
                .unwrap();
        assert_eq!(decision.route, Route::WebSearch);
        assert_eq!(decision.reasoning, "current events");
    }

    #[test]
    fn test_parse_missing_route_defaults_to_direct() {
        let decision = RouteDecision::parse(r#"{"reasoning": "greeting"}"#).unwrap();
        assert_eq!(decision, RouteDecision::direct("greeting"));

        let decision = RouteDecision::parse("{}").unwrap();
        assert_eq!(decision, RouteDecision::direct(DEFAULT_ROUTE_REASON));
    }

    #[test]
    fn test_parse_unknown_route_coerced_to_direct() {
        for reply in [
            r#"{"route": "database", "reasoning": "x"}"#,
            r#"{"route": 7, "reasoning": "x"}"#,
            r#"{"route": "VectorDB", "reasoning": "x"}"#,
            r#"{"route": "websearch ", "reasoning": "x"}"#,
        ] {
            let decision = RouteDecision::parse(reply).unwrap();
            assert_eq!(decision, RouteDecision::direct(UNKNOWN_ROUTE_REASON));
        }
    }

    #[test]
    fn test_parse_fenced_reply() {
        let decision =
            RouteDecision::parse("```json\n{\"route\": \"vectordb\", \"reasoning\": \"ML\"}\n```")
                .unwrap();
        assert_eq!(decision.route, Route::VectorDb);
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(RouteDecision::parse("I think vectordb").is_err());
    }

    #[test]
    fn test_answer_prompt_names_source() {
        let mut state = AgentState::new("q", &[]);
        state.route = Some(Route::WebSearch);
        state.evidence = "[Rust]\nnews".into();
        let prompt = answer_prompt(&state);
        assert!(prompt.contains("(source: web search)"));

        state.route = Some(Route::VectorDb);
        assert!(answer_prompt(&state).contains("(source: document corpus)"));
    }
}
