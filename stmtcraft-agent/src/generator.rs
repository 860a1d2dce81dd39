//! Code generation through an LLM provider

use crate::prompt::Prompt;
use stmtcraft_error::{Error, Result};
use stmtcraft_llm::{ChatMessage, CompletionRequest, LlmProvider, UsageTracker};
use tracing::{debug, warn};

/// Asks the provider for parser source, one call per attempt.
pub struct CodeGenerator<P> {
    provider: P,
    model: Option<String>,
    temperature: f32,
    usage: UsageTracker,
}

impl<P: LlmProvider> CodeGenerator<P> {
    pub fn new(provider: P, model: Option<String>, temperature: f32) -> Self {
        Self {
            provider,
            model,
            temperature,
            usage: UsageTracker::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Model the next request will use
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.provider.default_model())
    }

    /// Request source code for `prompt` and return it with fences removed.
    pub async fn generate(&mut self, prompt: &Prompt) -> Result<String> {
        let model = self.model().to_string();
        let request = CompletionRequest::new(vec![
            ChatMessage::system(&prompt.system),
            ChatMessage::user(&prompt.user),
        ])
        .with_model(&model)
        .with_temperature(self.temperature);

        debug!(provider = self.provider.name(), %model, chars = request.prompt_chars(), "requesting parser source");

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| {
                e.into_error(self.provider.name())
                    .with_operation("generator::generate")
                    .with_context("model", model.clone())
            })?;

        self.usage.track(&response.model, &response.usage);

        let content = response.content.ok_or_else(|| {
            Error::empty_generation("model returned no content")
                .with_operation("generator::generate")
                .with_context("model", model.clone())
        })?;
        debug!(chars = content.len(), "received response");

        let code = extract_code(&content);
        if code.is_empty() {
            warn!(chars = content.len(), "response contained no code");
            return Err(Error::empty_generation("model returned an empty parser")
                .with_operation("generator::generate")
                .with_context("model", model));
        }
        Ok(code.to_string())
    }
}

/// Strip markdown fences.
///
/// The body of the first fenced block wins; text without fences is used as
/// is. The result is trimmed.
pub fn extract_code(content: &str) -> &str {
    let Some(start) = content.find("```") else {
        return content.trim();
    };
    let after = &content[start + 3..];
    // skip the info string (`python`, `py`, ...) up to the end of the line
    let body = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => return content.trim(),
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}
