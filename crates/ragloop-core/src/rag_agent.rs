// Evidence-gathering agent
//
// A bounded retrieval loop: THOUGHT -> ACTION -> OBSERVATION -> (THOUGHT | END).
//
// - THOUGHT counts the iteration.
// - ACTION retrieves passages for the question. Failures become evidence text.
// - OBSERVATION asks the LLM whether the evidence answers the question. An
//   unparseable judgment counts as sufficient, so the loop answers rather than
//   spins. Insufficient evidence loops back while retries remain; otherwise
//   the answer is synthesized.
//
// With `max_iterations = n` the loop performs at most n + 1 retrievals.
// The retry re-runs the identical query.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agent::{
    answer_error, format_history, format_passages, parse_json_object, search_error, AgentResponse,
    AgentState, ConversationalAgent, SufficiencyJudgment, NO_ANSWER,
};
use crate::config::AgentConfig;
use crate::llm_drivers::{LlmCallConfig, LlmDriver, LlmMessage};
use crate::message::{truncate_chars, Message};
use crate::traits::Retriever;

const HISTORY_MESSAGES: usize = 6;
const HISTORY_CHARS: usize = 200;
const JUDGMENT_EVIDENCE_CHARS: usize = 1000;

/// Stage of the evidence-gathering loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvidenceStage {
    Thought,
    Action,
    Observation,
    End,
}

/// Evidence-gathering agent over a document retriever
pub struct RagAgent {
    llm: Arc<dyn LlmDriver>,
    retriever: Arc<dyn Retriever>,
    config: AgentConfig,
}

impl RagAgent {
    pub fn new(llm: Arc<dyn LlmDriver>, retriever: Arc<dyn Retriever>, config: AgentConfig) -> Self {
        Self {
            llm,
            retriever,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn call_config(&self) -> LlmCallConfig {
        LlmCallConfig::from(&self.config)
    }

    async fn gather_evidence(&self, question: &str) -> String {
        match self.retriever.retrieve(question).await {
            Ok(passages) => {
                debug!(passages = passages.len(), "Retrieved passages");
                format_passages(&passages)
            }
            Err(e) => {
                warn!(error = %e, "Retrieval failed");
                search_error(e)
            }
        }
    }

    async fn judge(&self, state: &AgentState) -> SufficiencyJudgment {
        let prompt = judgment_prompt(&state.question, &state.evidence);
        let reply = self
            .llm
            .chat_completion(vec![LlmMessage::system(prompt)], &self.call_config())
            .await;

        let parsed = reply
            .map_err(|e| e.to_string())
            .and_then(|r| parse_json_object(&r.text));

        match parsed {
            Ok(object) => SufficiencyJudgment {
                iteration: state.iteration_count,
                is_relevant: object
                    .get("is_relevant")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false),
                reason: object
                    .get("reason")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                parsed: true,
            },
            Err(e) => {
                warn!(error = %e, "Sufficiency judgment unusable, treating evidence as sufficient");
                SufficiencyJudgment {
                    iteration: state.iteration_count,
                    is_relevant: true,
                    reason: format!("Judgment unavailable: {}", e),
                    parsed: false,
                }
            }
        }
    }

    async fn synthesize(&self, state: &AgentState) -> String {
        let prompt = answer_prompt(state);
        match self
            .llm
            .chat_completion(vec![LlmMessage::system(prompt)], &self.call_config())
            .await
        {
            Ok(response) => response.text,
            Err(e) => {
                warn!(error = %e, "Answer synthesis failed");
                answer_error(e)
            }
        }
    }

    /// Run the loop to completion
    async fn run(&self, state: &mut AgentState, judgments: &mut Vec<SufficiencyJudgment>) {
        let mut stage = EvidenceStage::Thought;

        while stage != EvidenceStage::End {
            stage = match stage {
                EvidenceStage::Thought => {
                    state.iteration_count += 1;
                    debug!(iteration = state.iteration_count, "Thought");
                    EvidenceStage::Action
                }
                EvidenceStage::Action => {
                    state.evidence = self.gather_evidence(&state.question).await;
                    EvidenceStage::Observation
                }
                EvidenceStage::Observation => {
                    let judgment = self.judge(state).await;
                    state.is_sufficient = judgment.is_relevant;
                    info!(
                        iteration = state.iteration_count,
                        is_relevant = judgment.is_relevant,
                        "Evidence judged"
                    );
                    judgments.push(judgment);

                    let retries_used = state.iteration_count - 1;
                    if !state.is_sufficient && retries_used < self.config.max_iterations {
                        EvidenceStage::Thought
                    } else {
                        let answer = self.synthesize(state).await;
                        state.finish_turn(answer);
                        EvidenceStage::End
                    }
                }
                EvidenceStage::End => EvidenceStage::End,
            };
        }
    }
}

#[async_trait]
impl ConversationalAgent for RagAgent {
    async fn invoke(&self, question: &str, chat_history: &[Message]) -> AgentResponse {
        let mut state = AgentState::new(question, chat_history);
        let mut judgments = Vec::new();

        self.run(&mut state, &mut judgments).await;

        info!(iterations = state.iteration_count, "Evidence-gathering agent finished");

        AgentResponse {
            question: state.question,
            answer: state.final_answer.unwrap_or_else(|| NO_ANSWER.to_string()),
            evidence: Some(state.evidence),
            route: None,
            routing_reason: None,
            iterations: Some(state.iteration_count),
            judgments,
            messages: state.messages,
        }
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn judgment_prompt(question: &str, evidence: &str) -> String {
    format!(
        r#"Evaluate whether the search results are sufficient to answer the question.

Question: {question}

Search results:
{evidence}...

Respond in the following JSON format:
{{
    "is_relevant": true/false,
    "reason": "why you reached this judgment"
}}
"#,
        question = question,
        evidence = truncate_chars(evidence, JUDGMENT_EVIDENCE_CHARS),
    )
}

fn answer_prompt(state: &AgentState) -> String {
    format!(
        r#"{history}
Question: {question}

Reference documents:
{evidence}

Write an accurate and detailed answer to the question based on the documents above.
If the documents do not contain the answer, say so honestly."#,
        history = format_history(&state.conversation_context, HISTORY_MESSAGES, HISTORY_CHARS),
        question = state.question,
        evidence = state.evidence,
    )
}
