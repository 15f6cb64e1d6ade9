//! Embedding collaborators.
//!
//! [`OllamaEmbedder`] calls an HTTP embeddings endpoint. With the
//! `local-embeddings` feature, [`FastEmbedder`] runs all-MiniLM-L6-v2 in
//! process instead.

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::EmbedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[async_trait]
impl Embedder for Box<dyn Embedder> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text).await
    }
}

/// Build the embedder selected by `config.backend`
pub fn from_config(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbedError> {
    match config.backend {
        EmbeddingBackend::Ollama => Ok(Box::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Fastembed => Ok(Box::new(FastEmbedder::new()?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Fastembed => Err(EmbedError::Model(
            "built without the `local-embeddings` feature".into(),
        )),
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Client for an Ollama-compatible `/api/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        ::log::debug!("Generating embedding for text of length {}", text.len());

        let response: EmbeddingResponse = self
            .http
            .post(format!("{}/api/embeddings", self.endpoint))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| EmbedError::Model(format!("bad embeddings response: {e}")))?;

        if response.embedding.is_empty() {
            return Err(EmbedError::Model("model returned an empty embedding".into()));
        }

        ::log::trace!("Generated embedding with {} dimensions", response.embedding.len());
        Ok(response.embedding)
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::Embedder;
    use crate::error::EmbedError;
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Arc, Mutex};

    /// In-process all-MiniLM-L6-v2 (384 dimensions)
    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedder {
        pub fn new() -> Result<Self, EmbedError> {
            let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
                .map_err(|e| EmbedError::Model(e.to_string()))?;
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            let model = Arc::clone(&self.model);
            let text = text.to_string();

            let embeddings = tokio::task::spawn_blocking(move || {
                let model = model
                    .lock()
                    .map_err(|_| EmbedError::Model("embedding model lock poisoned".into()))?;
                model
                    .embed(vec![text], None)
                    .map_err(|e| EmbedError::Model(e.to_string()))
            })
            .await
            .map_err(|e| EmbedError::Model(format!("embedding task failed: {e}")))??;

            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| EmbedError::Model("model returned no embedding".into()))
        }
    }
}
