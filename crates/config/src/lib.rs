//! CONTROL: Configuration management for filepilot
//!
//! One explicit [`Config`] value is built at startup from defaults, an
//! optional JSON file and the environment, then handed to the completion
//! client. Nothing here is process-wide mutable state.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Credential for the completion endpoint.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Base URL of the completion endpoint, without the `/v1/...` suffix.
pub const ENV_API_BASE: &str = "OPENAI_API_BASE";
/// Model identifier sent with every request.
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "FILEPILOT_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "FILEPILOT_MAX_RETRIES";
pub const ENV_RETRY_BACKOFF_MS: &str = "FILEPILOT_RETRY_BACKOFF_MS";

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Errors in configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Runtime parameters for the agent and its completion client
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries after a failed completion call. `None` retries forever.
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: None,
            retry_backoff_ms: 0,
        }
    }
}

fn default_api_base() -> String {
    "https://api.siliconflow.cn".to_string()
}

fn default_model() -> String {
    "deepseek-ai/DeepSeek-V3".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Build from defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Config::default().with_env(|key| std::env::var(key).ok())
    }

    /// Load from a JSON file
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        debug!("◆ READING CONFIG FROM {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Overlay values found through `lookup`. Unset or empty variables keep
    /// the current value.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(base) = get(ENV_API_BASE) {
            self.api_base = base;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_number(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_RETRIES) {
            self.max_retries = Some(parse_number(ENV_MAX_RETRIES, &raw)?);
        }
        if let Some(raw) = get(ENV_RETRY_BACKOFF_MS) {
            self.retry_backoff_ms = parse_number(ENV_RETRY_BACKOFF_MS, &raw)?;
        }

        Ok(self)
    }

    /// Check that everything required to talk to the endpoint is present
    pub fn validate(&self) -> Result<()> {
        if !self.has_api_key() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Full chat-completions URL
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), COMPLETIONS_PATH)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
