//! Language-model commentary on a set of recommendations.
//!
//! Sends the recommendation payload to an OpenAI-compatible chat
//! completions endpoint and returns the reply text untouched.

use crate::recommend::RecommendationPayload;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Turns a payload into free text.
pub trait Enricher {
    fn enrich(&self, payload: &RecommendationPayload) -> Result<String>;
}

/// Settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub timeout: Duration,
}

impl EnrichConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: OPENAI_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Prompt asking for commentary on `payload`.
pub fn build_prompt(payload: &RecommendationPayload) -> Result<String> {
    let rendered = serde_json::to_string(payload).context("Failed to render recommendation")?;
    Ok(format!(
        "Given the following input: {rendered} Recommend 3 similar songs such as the input song, \
         and provide short descriptions for all the recommended songs and why they would be \
         similar, including the ones in the recommendation input."
    ))
}

/// Blocking chat-completions client.
pub struct OpenAiClient {
    client: Client,
    config: EnrichConfig,
}

impl OpenAiClient {
    pub fn new(config: EnrichConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            bail!("An OpenAI API key is required (OPENAI_APIKEY)");
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

impl Enricher for OpenAiClient {
    fn enrich(&self, payload: &RecommendationPayload) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(payload)?,
            }],
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!("POST {url} with model {}", self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .context("Chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("Chat completion failed with status {status}: {body}");
        }

        let reply = first_choice(response.json().context("Malformed chat completion response")?)?;
        info!("Received {} characters of commentary", reply.len());
        Ok(reply)
    }
}

fn first_choice(response: ChatResponse) -> Result<String> {
    match response.choices.into_iter().next() {
        Some(choice) => Ok(choice.message.content),
        None => bail!("Chat completion returned no choices"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> RecommendationPayload {
        RecommendationPayload {
            input_song: "Daft Punk - One More Time".to_string(),
            recommendations: vec!["Cassius - Feeling for You".to_string()],
        }
    }

    #[test]
    fn test_prompt_embeds_payload() {
        let prompt = build_prompt(&payload()).unwrap();

        assert!(prompt.contains("\"Input_song\":\"Daft Punk - One More Time\""));
        assert!(prompt.contains("Cassius - Feeling for You"));
        assert!(prompt.contains("Recommend 3 similar songs"));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: DEFAULT_MODEL,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: DEFAULT_TEMPERATURE,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_first_choice() {
        let body = r#"{"id": "x", "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "Great picks."}, "finish_reason": "stop"}
        ]}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(first_choice(response).unwrap(), "Great picks.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_choice(empty).is_err());
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(OpenAiClient::new(EnrichConfig::new("")).is_err());
    }
}
