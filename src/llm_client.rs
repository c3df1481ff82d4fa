//! # LLM Client Module
//!
//! Transport for the AI combine collaborator: a chat-completion call that is
//! asked to answer with a JSON object. [`OpenAiClient`] talks to any
//! OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::AiConfig;
use crate::errors::PantryError;

/// A model that answers a system + user prompt with a JSON document
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String, PantryError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completions
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig, timeout: Duration) -> Result<Self, PantryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PantryError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            client,
        })
    }

    fn build_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.0,
        }
    }
}

fn first_content(response: ChatResponse) -> Result<String, PantryError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| PantryError::MalformedResponse("No content in completion".to_string()))
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String, PantryError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, %url, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(system_prompt, user_prompt))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Completion request failed");
                PantryError::AiCombine(format!("LLM request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Completion endpoint returned an error");
            return Err(PantryError::AiCombine(format!(
                "LLM API returned error: {status} - {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse completion response");
            PantryError::MalformedResponse(format!("Failed to parse LLM response: {e}"))
        })?;
        first_content(parsed)
    }
}
