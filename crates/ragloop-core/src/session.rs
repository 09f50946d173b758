// Session domain types
//
// A Session is an isolated conversation thread: its own message log
// (append-only except for dropping an unanswered turn), a derived title, an
// optional system prompt and per-message annotations (evidence shown next to
// a user message, route chosen for it).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{AgentResponse, Route};
use crate::llm_drivers::LlmMessage;
use crate::message::{truncate_chars, Message, MessageRole};

/// Title shown before the first user message arrives
pub const PLACEHOLDER_TITLE: &str = "New conversation";

const TITLE_MAX_CHARS: usize = 30;

/// Derive a session title from its messages.
///
/// Uses the first user message, cut to 30 characters with a trailing
/// ellipsis when longer.
pub fn derive_title(messages: &[Message]) -> String {
    let Some(first) = messages.iter().find(|m| m.role == MessageRole::User) else {
        return PLACEHOLDER_TITLE.to_string();
    };

    let text = first.content.as_str();
    if text.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", truncate_chars(text, TITLE_MAX_CHARS))
    } else {
        text.to_string()
    }
}

/// Routing decision recorded against a user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAnnotation {
    pub route: Route,
    pub reason: String,
}

/// Session - one conversation thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    /// Evidence text keyed by the index of the user message it belongs to
    #[serde(default)]
    pub search_annotations: BTreeMap<usize, String>,
    /// Routing decision keyed by the index of the user message it belongs to
    #[serde(default)]
    pub route_annotations: BTreeMap<usize, RouteAnnotation>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            system_prompt: None,
            search_annotations: BTreeMap::new(),
            route_annotations: BTreeMap::new(),
        }
    }

    /// Messages in dialogue order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message and return its index
    pub fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.refresh_title();
        self.messages.len() - 1
    }

    /// Recompute the title while it is still unset
    fn refresh_title(&mut self) {
        if self.title.trim().is_empty() || self.title == PLACEHOLDER_TITLE {
            self.title = derive_title(&self.messages);
        }
    }

    /// Drop the messages from `index` on, with their annotations.
    ///
    /// Used to abandon a turn that was never answered. A title derived from
    /// a dropped message is derived again from what remains.
    pub fn discard_from(&mut self, index: usize) {
        if index >= self.messages.len() {
            return;
        }
        let title_was_derived = self.title == derive_title(&self.messages);

        self.messages.truncate(index);
        self.search_annotations.retain(|&i, _| i < index);
        self.route_annotations.retain(|&i, _| i < index);
        if title_was_derived {
            self.title = derive_title(&self.messages);
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Set the system prompt; a blank prompt disables it
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.system_prompt = if prompt.trim().is_empty() {
            None
        } else {
            Some(prompt)
        };
    }

    pub fn annotate_search(&mut self, message_index: usize, evidence: impl Into<String>) {
        self.search_annotations
            .insert(message_index, evidence.into());
    }

    pub fn annotate_route(&mut self, message_index: usize, annotation: RouteAnnotation) {
        self.route_annotations.insert(message_index, annotation);
    }

    /// Messages for the LLM, with the system prompt first when one is set
    pub fn llm_context(&self) -> Vec<LlmMessage> {
        let mut context = Vec::with_capacity(self.messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            context.push(LlmMessage::system(prompt.clone()));
        }
        context.extend(self.messages.iter().map(LlmMessage::from));
        context
    }

    /// Commit the message delta of an agent invocation.
    ///
    /// Evidence and routing are annotated on the user message of the turn.
    /// Returns the index of that user message, if the delta contained one.
    pub fn commit_response(&mut self, response: &AgentResponse) -> Option<usize> {
        let mut user_index = None;
        for message in &response.messages {
            let index = self.push(message.clone());
            if message.role == MessageRole::User && user_index.is_none() {
                user_index = Some(index);
            }
        }

        if let Some(index) = user_index {
            if let Some(evidence) = response.evidence.as_ref().filter(|e| !e.is_empty()) {
                self.annotate_search(index, evidence.clone());
            }
            if let Some(route) = response.route {
                self.annotate_route(
                    index,
                    RouteAnnotation {
                        route,
                        reason: response.routing_reason.clone().unwrap_or_default(),
                    },
                );
            }
        }

        user_index
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
