use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::PromptBuilder;
use super::sse;
use crate::config::LlmProviderConfig;
use crate::models::{ChatMessage, MessageRole};
use crate::providers::{LlmContext, LlmProvider, ProviderError, TextStream};

const PROVIDER: &str = "gemini";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug, PartialEq)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug, PartialEq)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

/// Google Gemini `generateContent` backend.
pub struct GeminiProvider {
    client: Client,
    config: LlmProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: LlmProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::configuration(PROVIDER, "GEMINI api_key is missing"));
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self { client, config })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            method
        )
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let system = PromptBuilder::system_prompt(self.config.system_prompt.as_deref(), context);
        let request = GenerateContentRequest {
            system_instruction: Content { role: None, parts: vec![Part { text: &system }] },
            contents: contents(messages),
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        };

        let mut builder = if stream {
            self.client
                .post(self.endpoint("streamGenerateContent"))
                .query(&[("alt", "sse")])
        } else {
            self.client.post(self.endpoint("generateContent"))
        };
        builder = builder.query(&[("key", self.config.api_key.as_str())]);

        debug!(
            "Gemini request: model={}, contents={}, stream={}",
            self.config.model,
            request.contents.len(),
            stream
        );

        let response = builder
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

fn contents(messages: &[ChatMessage]) -> Vec<Content<'_>> {
    PromptBuilder::dialogue(messages)
        .into_iter()
        .map(|(role, text)| Content {
            role: Some(if role == MessageRole::Assistant { "model" } else { "user" }),
            parts: vec![Part { text }],
        })
        .collect()
}

fn chunk_text(data: &str) -> Option<String> {
    serde_json::from_str::<GenerateContentResponse>(data).ok()?.text()
}

#[async_trait]
impl LlmProvider for GeminiProvider {
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
        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::parse(PROVIDER, e))?;

        body.text()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::parse(PROVIDER, "no candidates returned"))
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
    ) -> Result<TextStream, ProviderError> {
        let response = self.send(messages, context, true).await?;
        Ok(sse::text_stream(response, PROVIDER, chunk_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_maps_to_model_role() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let wire = contents(&history);
        assert_eq!(wire[0].role, Some("user"));
        assert_eq!(wire[1].role, Some("model"));
    }

    #[test]
    fn test_chunk_text_joins_parts() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hi "},{"text":"there"}]}}]}"#;
        assert_eq!(chunk_text(data), Some("Hi there".to_string()));
        assert_eq!(chunk_text(r#"{"candidates":[]}"#), None);
    }

    #[test]
    fn test_request_uses_camel_case() {
        let request = GenerateContentRequest {
            system_instruction: Content { role: None, parts: vec![Part { text: "sys" }] },
            contents: vec![],
            generation_config: GenerationConfig { temperature: 0.7, max_output_tokens: 10 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10);
        assert!(json["systemInstruction"].get("role").is_none());
    }
}
