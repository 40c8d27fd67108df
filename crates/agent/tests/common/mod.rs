//! Shared fixtures for agent tests

#![allow(dead_code)]

use async_trait::async_trait;
use filepilot_agent::{AgentEvent, Console};
use filepilot_provider::{
    ChatResponse, Message, Provider, ProviderError, Result as ProviderResult, Tool, ToolCall,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Replays queued responses and records every request it receives
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResult<ChatResponse>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    tool_counts: Mutex<Vec<usize>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResult<ChatResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            tool_counts: Mutex::new(Vec::new()),
        }
    }

    /// Conversation snapshots, one per completion call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tool_counts(&self) -> Vec<usize> {
        self.tool_counts.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        _cancel: &CancellationToken,
    ) -> ProviderResult<ChatResponse> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.tool_counts.lock().unwrap().push(tools.len());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for request {}", messages.len()))
    }

    fn model(&self) -> String {
        "scripted".to_string()
    }
}

/// Console that keeps a plain-text log of what would have been shown
#[derive(Default)]
pub struct RecordingConsole {
    pub prompts: usize,
    pub lines: Vec<String>,
}

impl Console for RecordingConsole {
    fn prompt(&mut self) {
        self.prompts += 1;
    }

    fn emit(&mut self, event: AgentEvent<'_>) {
        let line = match event {
            AgentEvent::Reply(text) => format!("reply: {}", text),
            AgentEvent::ToolCall { name, arguments } => format!("tool: {}({})", name, arguments),
            AgentEvent::CompletionFailed { error, attempt } => {
                format!("failed #{}: {}", attempt, error)
            }
            AgentEvent::Retrying { delay } => format!("retrying in {:?}", delay),
            AgentEvent::TurnAbandoned { attempts } => format!("abandoned after {}", attempts),
        };
        self.lines.push(line);
    }
}

pub fn text_reply(text: &str) -> ProviderResult<ChatResponse> {
    Ok(ChatResponse::from_message(Message::assistant(text)))
}

pub fn tool_reply(calls: Vec<ToolCall>) -> ProviderResult<ChatResponse> {
    Ok(ChatResponse::from_message(Message::assistant_with_tools(
        None, calls,
    )))
}

pub fn server_error() -> ProviderResult<ChatResponse> {
    Err(ProviderError::Status {
        status: 500,
        body: "upstream exploded".to_string(),
    })
}
