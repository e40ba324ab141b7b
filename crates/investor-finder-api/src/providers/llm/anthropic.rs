use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::PromptBuilder;
use super::sse;
use crate::config::LlmProviderConfig;
use crate::models::ChatMessage;
use crate::providers::{LlmContext, LlmProvider, ProviderError, TextStream};

const PROVIDER: &str = "anthropic";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize, Debug, PartialEq)]
struct WireMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API backend.
pub struct AnthropicProvider {
    client: Client,
    config: LlmProviderConfig,
    api_version: String,
}

impl AnthropicProvider {
    pub fn new(config: LlmProviderConfig, api_version: String) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::configuration(PROVIDER, "ANTHROPIC api_key is missing"));
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self { client, config, api_version })
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let system = PromptBuilder::system_prompt(self.config.system_prompt.as_deref(), context);
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: &system,
            messages: wire_messages(messages),
            stream,
        };

        debug!(
            "Anthropic request: model={}, messages={}, stream={}",
            self.config.model,
            request.messages.len(),
            stream
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(PROVIDER, response).await);
        }
        Ok(response)
    }
}

/// The Messages API wants strictly alternating turns that open with the
/// user, so consecutive same-role messages are folded together.
fn wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'static>> {
    let mut wire: Vec<WireMessage<'static>> = Vec::new();
    for (role, text) in PromptBuilder::dialogue(messages) {
        let role = role.as_str();
        match wire.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(text);
            }
            _ => wire.push(WireMessage { role, content: text.to_string() }),
        }
    }
    if wire.first().is_some_and(|m| m.role != "user") {
        wire.remove(0);
    }
    wire
}

fn delta_text(data: &str) -> Option<String> {
    let event: StreamEvent = serde_json::from_str(data).ok()?;
    if event.kind != "content_block_delta" {
        return None;
    }
    event.delta?.text
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
    ) -> Result<String, ProviderError> {
        let response = self.send(messages, context, false).await?;
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::parse(PROVIDER, e))?;

        let text: String = body.content.into_iter().filter_map(|b| b.text).collect();
        if text.is_empty() {
            return Err(ProviderError::parse(PROVIDER, "empty content"));
        }
        Ok(text)
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
    ) -> Result<TextStream, ProviderError> {
        let response = self.send(messages, context, true).await?;
        Ok(sse::text_stream(response, PROVIDER, delta_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_roles_are_folded() {
        let history = vec![
            ChatMessage::assistant("welcome"),
            ChatMessage::user("find investors"),
            ChatMessage::user("in fintech"),
            ChatMessage::assistant("sure"),
        ];
        let wire = wire_messages(&history);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "user");
        assert_eq!(wire[0].content, "find investors\n\nin fintech");
        assert_eq!(wire[1].role, "assistant");
    }

    #[test]
    fn test_only_text_deltas_are_streamed() {
        assert_eq!(
            delta_text(r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}"#),
            Some("Hi".to_string())
        );
        assert_eq!(delta_text(r#"{"type":"message_start","message":{}}"#), None);
    }
}
