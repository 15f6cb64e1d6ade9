//! Generation model collaborator used for keyword expansion and relevance
//! judgments.

use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A text-in, text-out generation model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` and return the model's free-text reply
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for an Ollama-compatible `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        ::log::trace!("Sending prompt of {} chars to {}", prompt.len(), self.model);

        let mut request = self
            .http
            .post(format!("{}/api/generate", self.endpoint))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body: GenerateResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| LlmError::Response(e.to_string()))?;

        Ok(body.response)
    }
}
