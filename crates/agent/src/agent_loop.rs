//! Agent loop - core processing engine
//!
//! Idle: wait for a line of input. Turn: complete, run any requested tools,
//! feed the results back and complete again until the model answers without
//! tool calls. Only one completion call or dispatch pass is ever in flight.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Level};

use filepilot_provider::{ChatResponse, Message, Provider, Role, Tool, ToolCall};

use crate::console::{AgentEvent, Console, UserInput};
use crate::conversation::Conversation;
use crate::dispatcher::Dispatcher;
use crate::tools::ToolRegistry;

/// What to do after a failed completion call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure; `None` never gives up
    pub max_retries: Option<u32>,
    /// Pause before each retry
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Retry immediately, forever
    pub fn unlimited() -> Self {
        Self {
            max_retries: None,
            backoff: Duration::ZERO,
        }
    }

    pub fn bounded(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries: Some(max_retries),
            backoff,
        }
    }

    /// Whether another attempt is allowed after `failures` failed ones
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_retries.map_or(true, |max| failures <= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model replied without tool calls
    Completed,
    /// The retry policy ran out
    Abandoned { attempts: u32 },
}

/// Owns the conversation and drives the completion/dispatch cycle
pub struct AgentLoop<P: Provider> {
    provider: P,
    dispatcher: Dispatcher,
    manifest: Vec<Tool>,
    conversation: Conversation,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<P: Provider> AgentLoop<P> {
    pub fn new(provider: P, registry: ToolRegistry, system_prompt: impl Into<String>) -> Self {
        let manifest = registry.definitions();
        Self {
            provider,
            dispatcher: Dispatcher::new(registry),
            manifest,
            conversation: Conversation::new(system_prompt),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Token passed to every completion call. Cancelling it fails the call
    /// in flight; it does not end the loop.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run until `input` is closed
    pub async fn run<I, C>(&mut self, input: &mut I, console: &mut C) -> crate::Result<()>
    where
        I: UserInput + ?Sized,
        C: Console + ?Sized,
    {
        info!(
            "◆ SESSION STARTED: MODEL {}, {} TOOLS",
            self.provider.model(),
            self.manifest.len()
        );

        loop {
            console.prompt();
            let line = match input.next_line().await? {
                Some(line) => line,
                None => {
                    info!("◆ INPUT CLOSED, ENDING SESSION");
                    return Ok(());
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let outcome = self.run_turn(&line, console).await?;
            debug!("◆ TURN ENDED: {:?}", outcome);
        }
    }

    /// Process one line of user input through to a final reply
    pub async fn run_turn<C>(&mut self, input: &str, console: &mut C) -> crate::Result<TurnOutcome>
    where
        C: Console + ?Sized,
    {
        self.conversation.push_user(input)?;

        loop {
            let mut reply = match self.complete_with_retry(console).await {
                Ok(reply) => reply,
                Err(attempts) => return Ok(TurnOutcome::Abandoned { attempts }),
            };

            if reply.role != Role::Assistant {
                warn!("◆ REPLY HAS ROLE {}, TREATING AS ASSISTANT", reply.role);
                reply.role = Role::Assistant;
            }

            let skipped = retain_function_calls(&mut reply);
            if skipped > 0 {
                warn!("◆ DROPPED {} NON-FUNCTION TOOL CALL(S) FROM REPLY", skipped);
            }

            if let Some(text) = reply.text() {
                console.emit(AgentEvent::Reply(text));
            }

            let calls: Vec<ToolCall> = reply.tool_calls().to_vec();
            self.conversation.push_assistant(reply)?;

            if calls.is_empty() {
                return Ok(TurnOutcome::Completed);
            }

            for call in &calls {
                console.emit(AgentEvent::ToolCall {
                    name: &call.function.name,
                    arguments: &call.function.arguments,
                });
            }

            let results = self.dispatcher.dispatch(&calls).await;
            self.conversation.push_tool_results(results)?;
        }
    }

    /// Complete against the current conversation, retrying per policy.
    /// The conversation is never touched here. `Err` carries the number of
    /// attempts made before giving up.
    async fn complete_with_retry<C>(&self, console: &mut C) -> Result<Message, u32>
    where
        C: Console + ?Sized,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            if tracing::enabled!(Level::TRACE) {
                trace!(
                    "◆ CONVERSATION BEFORE COMPLETION:\n{}",
                    render_conversation(self.conversation.messages())
                );
            }

            let error = match self
                .provider
                .complete(self.conversation.messages(), &self.manifest, &self.cancel)
                .await
                .and_then(ChatResponse::into_reply)
            {
                Ok(reply) => return Ok(reply),
                Err(e) => e,
            };

            warn!("◆ COMPLETION FAILED (ATTEMPT {}): {}", attempt, error);
            console.emit(AgentEvent::CompletionFailed {
                error: &error,
                attempt,
            });

            if !self.retry.allows_retry(attempt) {
                console.emit(AgentEvent::TurnAbandoned { attempts: attempt });
                return Err(attempt);
            }

            if !self.retry.backoff.is_zero() {
                console.emit(AgentEvent::Retrying {
                    delay: self.retry.backoff,
                });
                tokio::time::sleep(self.retry.backoff).await;
            }
        }
    }
}

/// Pretty JSON of the messages as they will be sent
fn render_conversation(messages: &[Message]) -> String {
    serde_json::to_string_pretty(messages)
        .unwrap_or_else(|e| format!("<unserializable conversation: {}>", e))
}

/// Drop tool calls that cannot be dispatched so every recorded call gets a
/// result. Returns how many were dropped.
fn retain_function_calls(reply: &mut Message) -> usize {
    let Some(calls) = reply.tool_calls.as_mut() else {
        return 0;
    };

    let before = calls.len();
    calls.retain(ToolCall::is_function);
    let skipped = before - calls.len();
    if calls.is_empty() {
        reply.tool_calls = None;
    }
    skipped
}
