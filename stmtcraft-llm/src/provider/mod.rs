//! # LLM Provider Interface
//!
//! A trait-based abstraction for communicating with hosted code-generation
//! backends.
//!
//! ## Design
//! - `LlmProvider` trait defines the core interface
//! - Implementations for OpenAI-compatible endpoints (Groq, OpenAI, local
//!   servers) and Anthropic
//! - `AnyProvider` picks one at runtime from a `ProviderConfig`
//! - Usage tracking across calls

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stmtcraft_error::{Error, ErrorKind};

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Request parameters for a completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Total characters across all message bodies
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.text().len()).sum()
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Error type for provider operations
#[derive(Debug)]
pub enum ProviderError {
    /// Network/connection error
    Network(String),
    /// The request did not complete within the client timeout
    Timeout(String),
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited
    RateLimited { retry_after: Option<u64> },
    /// Authentication failed
    AuthenticationFailed,
    /// Other error
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Timeout(e) => write!(f, "Request timed out: {}", e),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Classify a transport failure from reqwest
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }

    /// Convert into the unified error, tagging the provider that failed.
    ///
    /// Everything the service does wrong maps to `GenerationFailed` except
    /// rate limiting and bad credentials, which keep their own kinds.
    pub fn into_error(self, provider: &str) -> Error {
        let kind = match &self {
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            _ => ErrorKind::GenerationFailed,
        };
        let mut err = Error::new(kind, self.to_string())
            .with_operation("provider::complete")
            .with_context("provider", provider.to_string());
        if let ProviderError::Api { status, .. } = &self {
            err = err.with_context("status", status.to_string());
        }
        err.set_source(self)
    }
}

/// Maps a non-success HTTP status to a provider error
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationFailed,
        429 => ProviderError::RateLimited { retry_after: None },
        _ => ProviderError::Api { status, message: body },
    }
}

/// The main LLM provider trait
#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "groq", "anthropic")
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Send a completion request and get a full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

// ============================================================================
// Provider Configuration
// ============================================================================

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Groq,
    OpenAI,
    Anthropic,
    Local,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Groq => "groq",
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Local => "local",
        }
    }

    /// Environment variables holding the API key, in lookup order
    pub fn key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderType::Groq => &["GROQ_API_KEY", "grok_api_key"],
            ProviderType::OpenAI => &["OPENAI_API_KEY"],
            ProviderType::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderType::Local => &[],
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(ProviderType::Groq),
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" => Ok(ProviderType::Anthropic),
            "local" => Ok(ProviderType::Local),
            other => Err(Error::config_invalid(format!("unknown provider '{}'", other))
                .with_context("provider", other.to_string())),
        }
    }
}

impl ProviderConfig {
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Groq,
            api_key: Some(api_key.into()),
            base_url: Some(GROQ_BASE_URL.into()),
            default_model: Some(GROQ_DEFAULT_MODEL.into()),
            headers: HashMap::new(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4o".into()),
            headers: HashMap::new(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("anthropic-version".into(), "2023-06-01".into());

        Self {
            provider_type: ProviderType::Anthropic,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.anthropic.com/v1".into()),
            default_model: Some("claude-sonnet-4-20250514".into()),
            headers,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Any OpenAI-compatible server without authentication (vLLM, Ollama)
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Local,
            api_key: None,
            base_url: Some(base_url.into()),
            default_model: Some(model.into()),
            headers: HashMap::new(),
            timeout_secs: Some(300),
        }
    }

    /// Build a config from environment-style lookups.
    ///
    /// `lookup` is usually `std::env::var(..).ok()`; tests pass a map.
    /// Recognised overrides: `STMTCRAFT_BASE_URL`, `STMTCRAFT_MODEL`.
    pub fn from_lookup<F>(provider_type: ProviderType, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = provider_type
            .key_vars()
            .iter()
            .find_map(|var| lookup(var).filter(|v| !v.trim().is_empty()));

        let mut config = match (provider_type, api_key) {
            (ProviderType::Groq, Some(key)) => Self::groq(key),
            (ProviderType::OpenAI, Some(key)) => Self::openai(key),
            (ProviderType::Anthropic, Some(key)) => Self::anthropic(key),
            (ProviderType::Local, _) => Self::local("http://localhost:11434/v1", "llama3.3"),
            (ty, None) => {
                return Err(Error::config_invalid(format!(
                    "{} is missing. Please set it via environment or .env file.",
                    ty.key_vars().join(" / ")
                ))
                .with_context("provider", ty.as_str()));
            }
        };

        if let Some(url) = lookup("STMTCRAFT_BASE_URL").filter(|v| !v.is_empty()) {
            config.base_url = Some(url);
        }
        if let Some(model) = lookup("STMTCRAFT_MODEL").filter(|v| !v.is_empty()) {
            config.default_model = Some(model);
        }
        Ok(config)
    }

    /// Build a config from the process environment
    pub fn from_env(provider_type: ProviderType) -> Result<Self, Error> {
        Self::from_lookup(provider_type, |var| std::env::var(var).ok())
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| {
                Error::config_invalid("failed to create HTTP client")
                    .with_operation("provider::new")
                    .set_source(e)
            })
    }
}

// ============================================================================
// Runtime provider selection
// ============================================================================

/// A provider chosen at runtime from configuration
pub enum AnyProvider {
    OpenAI(OpenAIProvider),
    Anthropic(AnthropicProvider),
}

impl AnyProvider {
    pub fn from_config(config: ProviderConfig) -> Result<Self, Error> {
        match config.provider_type {
            ProviderType::Anthropic => Ok(AnyProvider::Anthropic(AnthropicProvider::new(config)?)),
            ProviderType::Groq | ProviderType::OpenAI | ProviderType::Local => {
                Ok(AnyProvider::OpenAI(OpenAIProvider::new(config)?))
            }
        }
    }
}

impl LlmProvider for AnyProvider {
    fn name(&self) -> &str {
        match self {
            AnyProvider::OpenAI(p) => p.name(),
            AnyProvider::Anthropic(p) => p.name(),
        }
    }

    fn default_model(&self) -> &str {
        match self {
            AnyProvider::OpenAI(p) => p.default_model(),
            AnyProvider::Anthropic(p) => p.default_model(),
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        match self {
            AnyProvider::OpenAI(p) => p.complete(request).await,
            AnyProvider::Anthropic(p) => p.complete(request).await,
        }
    }
}

// ============================================================================
// Usage Tracking
// ============================================================================

/// Tracks token usage across multiple calls
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    pub by_model: HashMap<String, Usage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

// ============================================================================
// Tests
// ============================================================================
