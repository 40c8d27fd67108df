//! AGENT: conversation loop, tool dispatch and the filesystem toolkit
//!
//! The loop alternates between waiting for user input and running a turn:
//! completion calls against a [`filepilot_provider::Provider`], interleaved
//! with tool dispatch, until the model replies without tool calls.

use thiserror::Error;

pub mod agent_loop;
pub mod console;
pub mod context;
pub mod conversation;
pub mod dispatcher;
pub mod tools;

pub use agent_loop::{AgentLoop, RetryPolicy, TurnOutcome};
pub use console::{AgentEvent, Console, UserInput};
pub use context::ContextBuilder;
pub use conversation::{Conversation, ConversationError};
pub use dispatcher::{DispatchError, Dispatcher};
pub use tools::{ToolError, ToolRegistry, ToolTrait};

/// Errors that end a session
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("conversation invariant violated: {0}")]
    Conversation(#[from] ConversationError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
