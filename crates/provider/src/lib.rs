//! UPLINK: Chat-completion provider
//!
//! Wire types for an OpenAI-compatible chat-completions endpoint with
//! function calling, and the [`Provider`] seam the agent talks through.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub mod openai;

pub use openai::OpenAiProvider;

/// Which side of the error taxonomy a failure falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure, timeout, cancellation or non-success status
    Transport,
    /// The endpoint answered but the body is unusable
    Protocol,
}

/// Completion client errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("failed to send HTTP request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response JSON: {source}. Body: {body}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("response contained no choices")]
    EmptyChoices,
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Request(_) | ProviderError::Cancelled | ProviderError::Status { .. } => {
                ErrorKind::Transport
            }
            ProviderError::Malformed { .. } | ProviderError::EmptyChoices => ErrorKind::Protocol,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub fn is_protocol(&self) -> bool {
        self.kind() == ErrorKind::Protocol
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// One entry of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Assistant role only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool role only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    /// Assistant message requesting tools, optionally with accompanying text
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        if !tool_calls.is_empty() {
            msg.tool_calls = Some(tool_calls);
        }
        msg
    }

    pub fn tool(
        call_id: impl Into<String>,
        name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Requested tool calls, empty for anything but a tool-calling assistant
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Content if present and not blank
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Model-issued request to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Empty when the endpoint omits it, which makes the call non-actionable
    #[serde(rename = "type", default)]
    pub call_type: String,
    pub function: FunctionCall,
}

const FUNCTION_TYPE: &str = "function";

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: FUNCTION_TYPE.to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Only function calls can be dispatched
    pub fn is_function(&self) -> bool {
        self.call_type == FUNCTION_TYPE
    }
}

/// Function name plus the raw argument text produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, deserialize_with = "arguments_text")]
    pub arguments: String,
}

/// Some endpoints send arguments as a JSON object rather than a string.
fn arguments_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// JSON-schema object describing a tool's accepted arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSchema(Map<String, Value>);

impl ParameterSchema {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Names listed under `required`
    pub fn required(&self) -> Vec<&str> {
        self.0
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Build an object schema of string properties: `(name, description, required)`
pub fn object_schema(properties: &[(&str, &str, bool)]) -> ParameterSchema {
    let mut props = Map::new();
    let mut required = Vec::new();

    for (name, description, is_required) in properties {
        props.insert(
            name.to_string(),
            serde_json::json!({
                "type": "string",
                "description": description
            }),
        );
        if *is_required {
            required.push(Value::String(name.to_string()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(props));
    schema.insert("required".to_string(), Value::Array(required));
    schema.insert("additionalProperties".to_string(), Value::Bool(false));
    ParameterSchema(schema)
}

/// Manifest entry for one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Self {
        Self {
            tool_type: FUNCTION_TYPE.to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Tool selection policy: either a mode string or a specific function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

impl Serialize for ToolChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ToolChoice::Auto => serializer.serialize_str("auto"),
            ToolChoice::None => serializer.serialize_str("none"),
            ToolChoice::Required => serializer.serialize_str("required"),
            ToolChoice::Function(name) => serde_json::json!({
                "type": FUNCTION_TYPE,
                "function": { "name": name }
            })
            .serialize(serializer),
        }
    }
}

/// Request body; borrows the conversation instead of cloning it
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub tools: &'a [Tool],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    pub max_tokens: u32,
    pub temperature: f32,
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// Response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Response carrying a single assistant message
    pub fn from_message(message: Message) -> Self {
        let finish_reason = if message.has_tool_calls() {
            "tool_calls"
        } else {
            "stop"
        };
        Self {
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: Some(finish_reason.to_string()),
            }],
            ..Default::default()
        }
    }

    /// The first choice's message
    pub fn into_reply(self) -> Result<Message> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ProviderError::EmptyChoices)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Completion endpoint
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send the conversation plus the tool manifest and return the parsed
    /// response. Implementations guarantee at least one choice on success and
    /// must give up with [`ProviderError::Cancelled`] once `cancel` fires.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse>;

    fn model(&self) -> String;
}

/// Decode a response body and reject one without choices
pub fn parse_response(body: &str) -> Result<ChatResponse> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|source| ProviderError::Malformed {
            source,
            body: body.to_string(),
        })?;

    if response.choices.is_empty() {
        return Err(ProviderError::EmptyChoices);
    }

    if let Some(usage) = &response.usage {
        trace!(
            prompt = usage.prompt_tokens,
            completion = usage.completion_tokens,
            total = usage.total_tokens,
            "◆ TOKEN USAGE"
        );
    }
    debug!(
        "◆ RESPONSE {}: {} TOOL CALLS",
        response.id,
        response.choices[0].message.tool_calls().len()
    );

    Ok(response)
}
