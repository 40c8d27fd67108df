//! TOOLKIT

pub mod filesystem;

pub use filesystem::{EditFileTool, ListFilesTool, ReadFileTool};

use async_trait::async_trait;
use filepilot_provider::{ParameterSchema, Tool};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Why a tool invocation failed. Always reported back to the model, never
/// raised past the dispatcher.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to parse input for {tool}: {source}. Input was: {input}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
        input: String,
    },

    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("error reading file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing file '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error listing files in '{path}': {source}")]
    List {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("old_str '{old_str}' not found in file '{path}'")]
    NoMatch { old_str: String, path: String },

    #[error("file '{0}' already exists; old_str must be non-empty to edit it")]
    AlreadyExists(String),

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("tool task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A tool the model may call
#[async_trait]
pub trait ToolTrait: Send + Sync {
    /// Registry key, unique
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> ParameterSchema;
    /// `args` is the raw argument text produced by the model
    async fn execute(&self, args: &str) -> Result<String, ToolError>;
}

/// Decode raw argument text into a tool's parameter struct.
///
/// Blank input and `null` decode as `{}` so tools whose parameters are all
/// optional can be called without arguments.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: &str) -> Result<T, ToolError> {
    let trimmed = args.trim();
    let text = if trimmed.is_empty() || trimmed == "null" {
        "{}"
    } else {
        trimmed
    };
    serde_json::from_str(text).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
        input: args.to_string(),
    })
}

/// Resolve a model-supplied path against the tool root
pub(crate) fn resolve(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

type BoxedTool = Box<dyn ToolTrait>;

/// Name-keyed tool store, filled once at startup and read-only afterwards
pub struct ToolRegistry {
    tools: BTreeMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registry holding `read_file`, `list_files` and `edit_file`, all
    /// resolving relative paths against `root`
    pub fn with_default_tools(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut registry = Self::new();
        registry.register(EditFileTool::new(root.clone()));
        registry.register(ListFilesTool::new(root.clone()));
        registry.register(ReadFileTool::new(root));
        registry
    }

    /// Add a tool. A later registration under the same name replaces the
    /// earlier one.
    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        debug!("◆ TOOL REGISTERED: {}", name);
        self.tools.insert(name, Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolTrait> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool manifest in name order
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|t| to_provider_tool(t.as_ref()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
