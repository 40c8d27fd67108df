//! Append-only conversation with structural invariants
//!
//! * exactly one system message, always first
//! * tool messages answering an assistant message follow it contiguously,
//!   one per requested call, in request order

use filepilot_provider::{Message, Role};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConversationError {
    #[error("{0} tool result(s) still pending")]
    PendingToolResults(usize),

    #[error("no tool results are pending")]
    NoPendingToolCalls,

    #[error("tool results {got:?} do not match pending calls {expected:?}")]
    MismatchedToolResults {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("expected a {expected} message, got {got}")]
    UnexpectedRole { expected: Role, got: Role },
}

pub type Result<T> = std::result::Result<T, ConversationError>;

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Ids of the last assistant message's tool calls, awaiting results
    pending: Vec<String>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            pending: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true: the system message is always present
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ids still waiting for a tool result
    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<()> {
        self.ensure_settled()?;
        self.messages.push(Message::user(content));
        Ok(())
    }

    /// Append a model reply. Its tool calls, if any, become pending.
    pub fn push_assistant(&mut self, message: Message) -> Result<()> {
        self.ensure_settled()?;
        if message.role != Role::Assistant {
            return Err(ConversationError::UnexpectedRole {
                expected: Role::Assistant,
                got: message.role,
            });
        }

        self.pending = message
            .tool_calls()
            .iter()
            .map(|call| call.id.clone())
            .collect();
        self.messages.push(message);
        trace!("◆ CONVERSATION: {} MESSAGES", self.messages.len());
        Ok(())
    }

    /// Append the complete result batch for the pending tool calls.
    /// Nothing is appended unless the ids match the pending ones exactly.
    pub fn push_tool_results(&mut self, results: Vec<Message>) -> Result<()> {
        if self.pending.is_empty() {
            return Err(ConversationError::NoPendingToolCalls);
        }
        if let Some(wrong) = results.iter().find(|m| m.role != Role::Tool) {
            return Err(ConversationError::UnexpectedRole {
                expected: Role::Tool,
                got: wrong.role,
            });
        }

        let got: Vec<String> = results
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap_or_default())
            .collect();
        if got != self.pending {
            return Err(ConversationError::MismatchedToolResults {
                expected: self.pending.clone(),
                got,
            });
        }

        self.messages.extend(results);
        self.pending.clear();
        Ok(())
    }

    fn ensure_settled(&self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ConversationError::PendingToolResults(self.pending.len()))
        }
    }
}
