use std::time::Duration;

use async_trait::async_trait;
use lumen_core::config::OpenAiSettings;
use lumen_core::traits::Embedder;
use lumen_core::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// `/embeddings` endpoint of an OpenAI-compatible API.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    id: String,
    dim: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(settings: &OpenAiSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingCredential("OpenAI API key is not set".to_string()))?
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.embedding_model.clone(),
            id: format!("openai:{}", settings.embedding_model),
            dim: model_dim(&settings.embedding_model),
        })
    }
}

fn model_dim(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} texts with {}", texts.len(), self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("{status}: {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("malformed response: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_credential_error() {
        let mut settings = OpenAiSettings::default();
        assert!(matches!(OpenAiEmbedder::new(&settings), Err(Error::MissingCredential(_))));

        settings.api_key = Some("  ".to_string());
        assert!(matches!(OpenAiEmbedder::new(&settings), Err(Error::MissingCredential(_))));
    }

    #[test]
    fn endpoint_and_identity_follow_settings() {
        let settings = OpenAiSettings {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:8080/v1/".to_string(),
            ..OpenAiSettings::default()
        };
        let embedder = OpenAiEmbedder::new(&settings).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:8080/v1/embeddings");
        assert_eq!(embedder.id(), "openai:text-embedding-ada-002");
        assert_eq!(embedder.dim(), 1536);
    }
}
