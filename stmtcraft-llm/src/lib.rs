//! # stmtcraft LLM
//!
//! Chat-completion clients used to ask a hosted model for parser code.
//!
//! ## Core Concepts
//! - **Provider**: Trait-based LLM communication (Groq / OpenAI-compatible, Anthropic)
//! - **ProviderConfig**: Endpoint, credential, model and timeout, built explicitly
//!   and handed to whoever needs a client
//! - **UsageTracker**: Token accounting across calls

pub mod provider;

pub use provider::{
    AnthropicProvider, AnyProvider, ChatMessage, CompletionRequest, CompletionResponse,
    FinishReason, LlmProvider, OpenAIProvider, ProviderConfig, ProviderError, ProviderType,
    Role, Usage, UsageTracker, DEFAULT_TIMEOUT_SECS, GROQ_BASE_URL, GROQ_DEFAULT_MODEL,
};
pub use stmtcraft_error::{Error, ErrorKind, ErrorStatus, Result};
