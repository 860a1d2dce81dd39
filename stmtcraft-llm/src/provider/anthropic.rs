//! Anthropic Claude provider implementation

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, Error> {
        let client = config.http_client()?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.anthropic.com/v1")
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("claude-sonnet-4-20250514")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());
        let api_request = AnthropicRequest::build(model, &request);

        let api_key = self.config.api_key.as_ref()
            .ok_or(ProviderError::AuthenticationFailed)?;

        let url = format!("{}/messages", self.base_url());
        debug!(%url, model, chars = request.prompt_chars(), "sending messages request");

        let mut req = self.client
            .post(url)
            .header("x-api-key", api_key)
            .header("content-type", "application/json")
            .json(&api_request);

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await.map_err(ProviderError::from_transport)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let api_response: AnthropicResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(api_response.into_completion())
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

impl AnthropicRequest {
    /// System messages travel in the top-level `system` field.
    fn build(model: &str, request: &CompletionRequest) -> Self {
        let mut system: Option<String> = None;
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg.role {
                Role::System => match system.as_mut() {
                    Some(sys) => {
                        sys.push_str("\n\n");
                        sys.push_str(msg.text());
                    }
                    None => system = Some(msg.text().to_string()),
                },
                Role::User | Role::Assistant => messages.push(AnthropicMessage {
                    role: msg.role.as_str().into(),
                    content: msg.text().to_string(),
                }),
            }
        }

        Self {
            model: model.to_string(),
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(8192),
            temperature: request.temperature,
            stop_sequences: request.stop.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

impl AnthropicResponse {
    fn into_completion(self) -> CompletionResponse {
        let content: String = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();

        let finish_reason = match self.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Unknown,
        };

        CompletionResponse {
            id: self.id,
            model: self.model,
            content: if content.is_empty() { None } else { Some(content) },
            finish_reason,
            usage: Usage {
                prompt_tokens: self.usage.input_tokens,
                completion_tokens: self.usage.output_tokens,
                total_tokens: self.usage.input_tokens + self.usage.output_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_hoisted() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("You are a senior Python engineer."),
            ChatMessage::user("Write parse()"),
        ])
        .with_temperature(0.2);

        let api = AnthropicRequest::build("claude-sonnet-4-20250514", &request);
        assert_eq!(api.system.as_deref(), Some("You are a senior Python engineer."));
        assert_eq!(api.messages.len(), 1);
        assert_eq!(api.messages[0].role, "user");
        assert_eq!(api.max_tokens, 8192);
    }

    #[test]
    fn test_response_text_blocks_joined() {
        let body = r#"{
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "import pandas as pd\n"},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "def parse(pdf_path): ..."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 30}
        }"#;

        let response: AnthropicResponse = serde_json::from_str(body).unwrap();
        let completion = response.into_completion();
        assert_eq!(
            completion.content.as_deref(),
            Some("import pandas as pd\ndef parse(pdf_path): ...")
        );
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.usage.total_tokens, 42);
    }

    #[test]
    fn test_empty_content_is_none() {
        let body = r#"{"id": "m", "model": "x", "content": [], "stop_reason": "max_tokens",
                       "usage": {"input_tokens": 1, "output_tokens": 0}}"#;
        let completion = serde_json::from_str::<AnthropicResponse>(body).unwrap().into_completion();
        assert!(completion.content.is_none());
        assert_eq!(completion.finish_reason, FinishReason::Length);
    }
}
