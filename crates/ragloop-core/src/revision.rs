// Response revision workflow
//
// A human-in-the-loop state machine that sits between "the LLM produced a
// draft" and "the draft is committed to the session":
//
//   user --submit--> validate --accept--> user
//                    validate --edit sentences--> correct --accept--> user
//                    validate --rewrite--> rewrite --commit--> user
//                                          rewrite --cancel--> validate
//
// The question is appended when the draft is submitted; the answer only on
// commit. Discarding a draft removes the question again. New questions are
// only accepted in the `user` stage. Every rejected operation leaves the
// workflow unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result, RevisionError};
use crate::llm_drivers::{collect_stream, LlmCallConfig, LlmDriver, LlmMessage};
use crate::message::Message;
use crate::session::Session;
use crate::traits::WebSearch;
use crate::web_search::{augment_prompt, format_search_results};

/// Stage of the revision workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionStage {
    /// Waiting for a new question
    #[default]
    User,
    /// A draft is pending: accept, edit sentences or rewrite
    Validate,
    /// Sentence-by-sentence review
    Correct,
    /// Full-text replacement
    Rewrite,
}

impl fmt::Display for RevisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RevisionStage::User => "user",
            RevisionStage::Validate => "validate",
            RevisionStage::Correct => "correct",
            RevisionStage::Rewrite => "rewrite",
        };
        f.write_str(name)
    }
}

/// Split a draft into period-terminated sentences.
///
/// Splits on `". "`, trims periods and spaces from both ends of each
/// fragment, drops empty fragments and re-terminates the rest with `"."`.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(". ")
        .filter_map(|fragment| {
            let core = trim_sentence(fragment);
            (!core.is_empty()).then(|| format!("{}.", core))
        })
        .collect()
}

fn trim_sentence(text: &str) -> &str {
    text.trim_matches(|c| c == '.' || c == ' ')
}

/// Workflow state: the stage plus the draft under review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionState {
    pub stage: RevisionStage,
    /// Index of the question this draft answers in the session log
    #[serde(default)]
    pub question_index: Option<usize>,
    pub pending_answer: Option<String>,
    pub sentences: Vec<String>,
    pub sentence_approved: Vec<bool>,
}

/// Human-in-the-loop revision of LLM drafts
#[derive(Debug, Clone, Default)]
pub struct RevisionWorkflow {
    state: RevisionState,
}

impl RevisionWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> RevisionStage {
        self.state.stage
    }

    pub fn state(&self) -> &RevisionState {
        &self.state
    }

    pub fn pending_answer(&self) -> Option<&str> {
        self.state.pending_answer.as_deref()
    }

    pub fn sentences(&self) -> &[String] {
        &self.state.sentences
    }

    pub fn sentence_approved(&self) -> &[bool] {
        &self.state.sentence_approved
    }

    /// New questions are accepted only while no draft is under review
    pub fn accepts_input(&self) -> bool {
        self.state.stage == RevisionStage::User
    }

    fn expect_stage(&self, expected: RevisionStage) -> std::result::Result<(), RevisionError> {
        if self.state.stage == expected {
            Ok(())
        } else {
            Err(RevisionError::WrongStage {
                expected,
                actual: self.state.stage,
            })
        }
    }

    fn commit(&mut self, session: &mut Session, text: String) -> String {
        session.push(Message::assistant(text.clone()));
        self.reset();
        info!(session_id = %session.id, "Committed revised answer");
        text
    }

    // ------------------------------------------------------------------------
    // user
    // ------------------------------------------------------------------------

    /// Record a question with an already-produced draft
    pub fn submit_draft(
        &mut self,
        session: &mut Session,
        question: &str,
        draft: impl Into<String>,
    ) -> std::result::Result<(), RevisionError> {
        self.expect_stage(RevisionStage::User)?;
        let index = session.push(Message::user(question));
        self.hold_draft(index, draft.into());
        Ok(())
    }

    fn hold_draft(&mut self, question_index: usize, draft: String) {
        self.state = RevisionState {
            stage: RevisionStage::Validate,
            question_index: Some(question_index),
            pending_answer: Some(draft),
            ..Default::default()
        };
        debug!(stage = %self.state.stage, "Draft pending review");
    }

    /// Ask the LLM for a draft and hold it for review.
    ///
    /// With a web search port, results for the question are annotated on the
    /// user message and the question sent to the LLM is augmented with them.
    /// A failed search falls back to the plain question. The session's system
    /// prompt goes first. Text deltas are handed to `on_delta` as they stream.
    ///
    /// On an LLM failure the session and the workflow are left unchanged.
    pub async fn submit(
        &mut self,
        session: &mut Session,
        question: &str,
        llm: &dyn LlmDriver,
        config: &AgentConfig,
        web_search: Option<&dyn WebSearch>,
        on_delta: impl FnMut(&str) + Send,
    ) -> Result<String> {
        self.expect_stage(RevisionStage::User)?;

        let mut search_results = None;
        if let Some(search) = web_search {
            match search.search(question).await {
                Ok(hits) if !hits.is_empty() => {
                    search_results = Some(format_search_results(&hits));
                }
                Ok(_) => debug!("Web search returned no results"),
                Err(e) => warn!(error = %e, "Web search failed, sending the plain question"),
            }
        }

        let prompt = match &search_results {
            Some(results) => augment_prompt(question, results),
            None => question.to_string(),
        };
        let mut context = session.llm_context();
        context.push(LlmMessage::user(prompt));

        let stream = llm
            .chat_completion_stream(context, &LlmCallConfig::from(config))
            .await?;
        let response = collect_stream(stream, on_delta).await?;
        if response.text.trim().is_empty() {
            return Err(AgentError::llm("LLM returned an empty draft"));
        }

        let index = session.push(Message::user(question));
        if let Some(results) = search_results {
            session.annotate_search(index, results);
        }
        self.hold_draft(index, response.text.clone());
        Ok(response.text)
    }

    // ------------------------------------------------------------------------
    // validate
    // ------------------------------------------------------------------------

    /// Commit the draft as it stands.
    ///
    /// In `validate` the pending draft is committed. In `correct` every
    /// sentence must be approved; the joined sentences are committed.
    pub fn accept(&mut self, session: &mut Session) -> std::result::Result<String, RevisionError> {
        match self.state.stage {
            RevisionStage::Validate => {
                let text = self
                    .state
                    .pending_answer
                    .clone()
                    .ok_or(RevisionError::NoPendingAnswer)?;
                Ok(self.commit(session, text))
            }
            RevisionStage::Correct => {
                if let Some(index) = self.focus() {
                    return Err(RevisionError::UnreviewedSentence(index));
                }
                let text = self.state.sentences.join(" ");
                Ok(self.commit(session, text))
            }
            actual => Err(RevisionError::WrongStage {
                expected: RevisionStage::Validate,
                actual,
            }),
        }
    }

    /// Split the draft into sentences, all unapproved, for review
    pub fn edit_sentences(&mut self) -> std::result::Result<(), RevisionError> {
        self.expect_stage(RevisionStage::Validate)?;
        let draft = self
            .state
            .pending_answer
            .as_deref()
            .ok_or(RevisionError::NoPendingAnswer)?;

        let sentences = split_sentences(draft);
        if sentences.is_empty() {
            return Err(RevisionError::EmptyText);
        }

        self.state.sentence_approved = vec![false; sentences.len()];
        self.state.sentences = sentences;
        self.state.stage = RevisionStage::Correct;
        Ok(())
    }

    pub fn request_rewrite(&mut self) -> std::result::Result<(), RevisionError> {
        self.expect_stage(RevisionStage::Validate)?;
        self.state.stage = RevisionStage::Rewrite;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // correct
    // ------------------------------------------------------------------------

    /// Index of the first sentence still awaiting review
    pub fn focus(&self) -> Option<usize> {
        self.state.sentence_approved.iter().position(|approved| !approved)
    }

    fn focused(&self) -> std::result::Result<usize, RevisionError> {
        self.expect_stage(RevisionStage::Correct)?;
        self.focus().ok_or(RevisionError::NothingToReview)
    }

    fn rejoin(&mut self) {
        self.state.pending_answer = Some(self.state.sentences.join(" "));
    }

    /// Replace the focused sentence and approve it
    pub fn update_sentence(&mut self, text: &str) -> std::result::Result<(), RevisionError> {
        let index = self.focused()?;
        let core = trim_sentence(text.trim());
        if core.is_empty() {
            return Err(RevisionError::EmptyText);
        }

        self.state.sentences[index] = format!("{}.", core);
        self.state.sentence_approved[index] = true;
        self.rejoin();
        Ok(())
    }

    /// Remove the focused sentence. The last remaining sentence cannot be
    /// removed; rewrite the answer instead.
    pub fn delete_sentence(&mut self) -> std::result::Result<(), RevisionError> {
        let index = self.focused()?;
        if self.state.sentences.len() <= 1 {
            return Err(RevisionError::LastSentence);
        }

        self.state.sentences.remove(index);
        self.state.sentence_approved.remove(index);
        self.rejoin();
        Ok(())
    }

    /// Approve the focused sentence unchanged
    pub fn skip_sentence(&mut self) -> std::result::Result<(), RevisionError> {
        let index = self.focused()?;
        self.state.sentence_approved[index] = true;
        Ok(())
    }

    /// Start the review over once every sentence has been reviewed
    pub fn redo_all(&mut self) -> std::result::Result<(), RevisionError> {
        self.expect_stage(RevisionStage::Correct)?;
        if let Some(index) = self.focus() {
            return Err(RevisionError::UnreviewedSentence(index));
        }
        self.state.sentence_approved.fill(false);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // rewrite
    // ------------------------------------------------------------------------

    /// Commit a full replacement for the draft
    pub fn commit_rewrite(
        &mut self,
        session: &mut Session,
        text: &str,
    ) -> std::result::Result<String, RevisionError> {
        self.expect_stage(RevisionStage::Rewrite)?;
        if text.trim().is_empty() {
            return Err(RevisionError::EmptyText);
        }
        Ok(self.commit(session, text.to_string()))
    }

    /// Discard the rewrite and return to the pending draft
    pub fn cancel_rewrite(&mut self) -> std::result::Result<(), RevisionError> {
        self.expect_stage(RevisionStage::Rewrite)?;
        self.state.stage = RevisionStage::Validate;
        Ok(())
    }

    /// Abandon the draft under review.
    ///
    /// The question it answers is removed from the session along with its
    /// annotations, so the log never holds an unanswered turn.
    pub fn discard(&mut self, session: &mut Session) -> std::result::Result<(), RevisionError> {
        if self.accepts_input() {
            return Err(RevisionError::NoPendingAnswer);
        }
        if let Some(index) = self.state.question_index {
            session.discard_from(index);
        }
        self.reset();
        debug!(session_id = %session.id, "Discarded draft");
        Ok(())
    }

    /// Forget any draft under review and wait for a new question.
    /// The session is not touched; see `discard`.
    pub fn reset(&mut self) {
        self.state = RevisionState::default();
    }
}
