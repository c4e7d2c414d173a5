//! Completion service client used by the fallback parser.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("completion service returned no choices")]
    NoChoices,

    #[error("{0} environment variable not set")]
    MissingApiKey(String),
}

/// What the fallback parser sends: fixed instructions plus the user's text.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub instructions: String,
    pub query: String,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Ask for a JSON object reply; returns the raw reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;
}

/// Chat-completions endpoint client (Mistral and OpenAI style APIs).
#[derive(Clone)]
pub struct ChatCompletionClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            model: model.to_string(),
            temperature,
            client,
        })
    }

    /// Read the key from the named environment variable.
    pub fn from_env(
        base_url: &str,
        api_key_env: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CompletionError::MissingApiKey(api_key_env.to_string()))?;

        Self::new(base_url, api_key, model, temperature, timeout)
    }
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        log::info!("query to {}: {}", self.model, request.query);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": &self.model,
                "messages": [
                    {"role": "system", "content": &request.instructions},
                    {"role": "user", "content": &request.query}
                ],
                "temperature": self.temperature,
                "response_format": {"type": "json_object"}
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::NoChoices)?;

        log::debug!("{} response: {content}", self.model);
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
