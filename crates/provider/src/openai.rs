//! UPLINK: OpenAI-compatible chat-completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::{
    parse_response, ChatRequest, ChatResponse, Message, Provider, ProviderError, Result, Tool,
    ToolChoice,
};

const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Client for a single chat-completions endpoint.
///
/// No retries happen here; a failed call is returned as-is and the caller
/// decides what to do with it.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    /// `endpoint` is the full URL, e.g. `https://host/v1/chat/completions`.
    /// `timeout` bounds each request from connect to the last body byte.
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Override the sampling parameters sent with every request
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request body for `messages` with `tools` as the manifest. The model
    /// always decides on its own whether to call a tool.
    pub fn build_request<'a>(&'a self, messages: &'a [Message], tools: &'a [Tool]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            tools,
            tool_choice: (!tools.is_empty()).then_some(ToolChoice::Auto),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        trace!("◆ POST {} ({} MESSAGES)", self.endpoint, messages.len());

        let request = self.build_request(messages, tools);
        let exchange = async {
            let response = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            Ok::<_, ProviderError>((status, body))
        };

        let (status, body) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = exchange => result?,
        };

        if !status.is_success() {
            warn!("◆ ENDPOINT RETURNED {}", status);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
