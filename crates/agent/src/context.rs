//! System prompt assembly

use chrono::Local;
use std::path::{Path, PathBuf};

use crate::tools::ToolRegistry;

/// Builds the system prompt that opens every conversation
pub struct ContextBuilder {
    root: PathBuf,
}

impl ContextBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn build_system_prompt(&self, registry: &ToolRegistry) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
        let tools = registry.names().join(", ");

        format!(
            r#"You are a helpful programming assistant. You have access to tools to interact with the local filesystem (read, list, edit files). Use them when appropriate to fulfill the user's request. When editing, be precise about the changes. Respond ONLY with tool calls if you need to use tools, otherwise respond with text.

## Tools
{}

## Working Directory
Relative paths are resolved against: {}

## Current Time
{}"#,
            tools,
            self.root.display(),
            now
        )
    }
}
