//! Generation model abstraction.
//!
//! A [`ChatModel`] turns one rendered prompt into one response text. It is
//! used for query expansion, per-stage answering, and the final synthesis.
//! Calls are single-message and non-streaming.
//!
//! | Provider | Endpoint |
//! |----------|----------|
//! | `openai` | `POST {url}/chat/completions` (default url `https://api.openai.com/v1`) |
//! | `ollama` | `POST {url}/api/chat` (default url `http://localhost:11434`) |
//! | `disabled` | always errors |

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::embedding::send_with_retry;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    /// Send `prompt` as a single user message and return the reply text.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generation model used when `llm.provider = "disabled"`.
pub struct DisabledChat;

#[async_trait]
impl ChatModel for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation model is disabled; set [llm].provider")
    }
}

/// OpenAI-compatible chat completions client.
pub struct OpenAIChat {
    model: String,
    temperature: f32,
    api_key: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let request = self
            .client
            .post(format!("{}/chat/completions", self.url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "OpenAI").await?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

/// Ollama chat client.
pub struct OllamaChat {
    model: String,
    temperature: f32,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "options": { "temperature": self.temperature },
            "messages": [{ "role": "user", "content": prompt }],
        });
        let request = self
            .client
            .post(format!("{}/api/chat", self.url.trim_end_matches('/')))
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "Ollama").await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
    }
}

/// Create the configured [`ChatModel`].
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "a\nb" } }]
        });
        assert_eq!(parse_openai_chat(&json).unwrap(), "a\nb");
    }

    #[test]
    fn missing_choice_is_an_error() {
        assert!(parse_openai_chat(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn disabled_model_errors() {
        assert!(DisabledChat.generate("hi").await.is_err());
    }
}
