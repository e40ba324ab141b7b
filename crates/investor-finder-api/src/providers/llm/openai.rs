use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::PromptBuilder;
use super::sse;
use crate::config::LlmProviderConfig;
use crate::models::ChatMessage;
use crate::providers::{LlmContext, LlmProvider, ProviderError, TextStream};

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChoiceChunk>,
}

#[derive(Debug, Deserialize)]
struct ChoiceChunk {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// OpenAI-compatible `/v1/chat/completions` backend.
pub struct OpenAiProvider {
    client: Client,
    config: LlmProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: LlmProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::configuration(PROVIDER, "OPENAI api_key is missing"));
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::configuration(PROVIDER, e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let system = PromptBuilder::system_prompt(self.config.system_prompt.as_deref(), context);
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: wire_messages(&system, messages),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream,
        };

        debug!(
            "OpenAI request: model={}, messages={}, stream={}",
            self.config.model,
            request.messages.len(),
            stream
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
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

fn wire_messages<'a>(system: &'a str, messages: &'a [ChatMessage]) -> Vec<WireMessage<'a>> {
    let mut wire = vec![WireMessage { role: "system", content: system }];
    wire.extend(
        PromptBuilder::dialogue(messages)
            .into_iter()
            .map(|(role, content)| WireMessage { role: role.as_str(), content }),
    );
    wire
}

fn delta_text(data: &str) -> Option<String> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data).ok()?;
    chunk.choices.into_iter().next()?.delta.content
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
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
        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::parse(PROVIDER, e))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::parse(PROVIDER, "no choices returned"))
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
