//! Completion back-ends used by the classifier

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{AutoLabelError, Result};

/// A single prompt-in, text-out model call
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the completion client described by the `[llm]` config section
///
/// The API key is read from the environment variable named in the config,
/// once, here.
pub fn build_completion_client(config: &LlmConfig) -> Result<Box<dyn CompletionClient>> {
    match config.provider {
        LlmProvider::OpenAi => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                AutoLabelError::Config(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;
            if api_key.trim().is_empty() {
                return Err(AutoLabelError::Config(format!(
                    "environment variable {} is empty",
                    config.api_key_env
                )));
            }
            Ok(Box::new(OpenAiCompatClient::new(
                config.base_url(),
                api_key,
                &config.model,
                config.temperature,
            )))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::new(
            config.base_url(),
            &config.model,
            config.temperature,
        ))),
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible chat completions endpoint
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, api_key: String, model: &str, temperature: f32) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: endpoint(base_url, "chat/completions"),
            api_key,
            model: model.to_string(),
            temperature,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!("POST {} (model {})", self.url, self.model);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": &self.model,
                "temperature": self.temperature,
                "messages": [
                    { "role": "user", "content": prompt }
                ],
                "response_format": { "type": "json_object" }
            }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: ChatApiResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AutoLabelError::Api("No choices in chat completion response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Local Ollama `generate` endpoint
pub struct OllamaClient {
    http: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, temperature: f32) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: endpoint(base_url, "api/generate"),
            model: model.to_string(),
            temperature,
        }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!("POST {} (model {})", self.url, self.model);

        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "model": &self.model,
                "prompt": prompt,
                "format": "json",
                "stream": false,
                "options": { "temperature": self.temperature }
            }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .response
            .ok_or_else(|| AutoLabelError::Api("Ollama response has no 'response' field".to_string()))
    }
}
