//! Seams between the agent loop and the terminal

use async_trait::async_trait;
use filepilot_provider::ProviderError;
use std::time::Duration;
use tokio::io::{AsyncBufRead, Lines};

/// Something the user should see
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// Assistant text
    Reply(&'a str),
    /// A tool is about to run
    ToolCall { name: &'a str, arguments: &'a str },
    /// A completion attempt failed; `attempt` counts from 1
    CompletionFailed {
        error: &'a ProviderError,
        attempt: u32,
    },
    /// Waiting before the next attempt
    Retrying { delay: Duration },
    /// Retries exhausted; back to waiting for input
    TurnAbandoned { attempts: u32 },
}

/// Output side of the session
pub trait Console {
    /// Called right before waiting for the next input line
    fn prompt(&mut self) {}

    fn emit(&mut self, event: AgentEvent<'_>);
}

/// Line-oriented input. `Ok(None)` means the stream is closed.
#[async_trait]
pub trait UserInput: Send {
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;
}

#[async_trait]
impl<R> UserInput for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}
