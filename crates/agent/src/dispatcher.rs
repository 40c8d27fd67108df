//! Tool dispatcher: turns a batch of tool calls into correlated results

use filepilot_provider::{Message, ToolCall};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::tools::{ToolError, ToolRegistry};

/// Failure of a single call, rendered into the result message content
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("error executing tool '{tool}': {source}")]
    Execution {
        tool: String,
        #[source]
        source: ToolError,
    },
}

/// Runs tool calls against an immutable [`ToolRegistry`]
pub struct Dispatcher {
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Execute `calls` strictly in order.
    ///
    /// Every function call yields exactly one tool message carrying the
    /// call's id, whether it succeeded or not. Calls of any other type are
    /// skipped and yield nothing.
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if !call.is_function() {
                warn!(
                    "◆ SKIPPING NON-FUNCTION TOOL CALL {} (type '{}')",
                    call.id, call.call_type
                );
                continue;
            }

            let name = &call.function.name;
            let content = match self.invoke(call).await {
                Ok(output) => output,
                Err(e) => {
                    warn!("◆ TOOL FAILURE: {}", e);
                    e.to_string()
                }
            };
            results.push(Message::tool(&call.id, name, content));
        }

        results
    }

    async fn invoke(&self, call: &ToolCall) -> Result<String, DispatchError> {
        let name = &call.function.name;
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::ToolNotFound(name.clone()))?;

        debug!("◆ EXECUTING {}", name);
        trace!("◆ ARGUMENTS: {}", call.function.arguments);
        tool.execute(&call.function.arguments)
            .await
            .map_err(|source| DispatchError::Execution {
                tool: name.clone(),
                source,
            })
    }
}
