//! Chat Context and Responses
//!
//! Data carried into and out of a chat call. The context is transient: built
//! by the caller per call from the item, any pipeline steps already produced,
//! and the visible turn history, and dropped when the call resolves.

use serde::{Deserialize, Serialize};

use crate::item::WorkItem;
use crate::step::ReasoningStep;

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Grounding context for one chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    /// The item the conversation is about
    pub item: WorkItem,
    /// Steps the pipeline already produced for this item, if it ran
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_steps: Vec<ReasoningStep>,
    /// Prior user/assistant turns, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatTurn>,
}

impl ChatContext {
    pub fn new(item: WorkItem) -> Self {
        Self {
            item,
            reasoning_steps: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Attach the pipeline's completed steps as grounding.
    pub fn with_steps(mut self, steps: Vec<ReasoningStep>) -> Self {
        self.reasoning_steps = steps;
        self
    }

    /// Attach prior conversation turns.
    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }
}

/// Final answer of a chat call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Full answer text (token frames concatenated in arrival order)
    pub text: String,
    /// Procedure identifiers the answer cites
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_procedures: Vec<String>,
    /// Up to three suggested follow-up questions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// True when the answer came from the local fallback path
    #[serde(default)]
    pub simulated: bool,
}
