//! Embedding provider implementations

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::debug;

use sr_core::{Embedder, Error, Result};

use crate::config::EmbeddingConfig;

/// Deterministic bag-of-words embedder that needs no network.
///
/// Words and bigrams are hashed into a fixed number of buckets and the
/// result is L2-normalized, so texts sharing vocabulary land close together
/// under cosine distance.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        hasher.finish()
    }

    /// Compute the embedding synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mut embedding = vec![0.0f32; self.dimension];

        for (i, word) in words.iter().enumerate() {
            let hash = self.bucket(word);
            let weight = 1.0 / (1.0 + i as f32 * 0.1);
            embedding[(hash as usize) % self.dimension] += weight;

            if word.chars().count() > 3 {
                embedding[((hash >> 16) as usize) % self.dimension] += weight * 0.5;
            }
        }

        for window in words.windows(2) {
            let hash = self.bucket(&format!("{} {}", window[0], window[1]));
            embedding[(hash as usize) % self.dimension] += 0.3;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }
        embedding
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
    options: FeatureExtractionOptions,
}

#[derive(Serialize)]
struct FeatureExtractionOptions {
    wait_for_model: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Vectors(Vec<Vec<f32>>),
    Error { error: String },
}

/// Embedding client for the Hugging Face feature-extraction endpoint
pub struct HuggingFaceEmbedder {
    config: EmbeddingConfig,
    client: Client,
}

impl HuggingFaceEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Configuration("missing Hugging Face API key".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Provider(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Create a new embedder from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(EmbeddingConfig::from_env()?)
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = FeatureExtractionRequest {
            inputs,
            options: FeatureExtractionOptions {
                wait_for_model: true,
            },
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(self.config.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Provider(format!(
                "embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: FeatureExtractionResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed embedding response: {}", e)))?;

        let vectors = match parsed {
            FeatureExtractionResponse::Vectors(vectors) => vectors,
            FeatureExtractionResponse::Error { error } => return Err(Error::Provider(error)),
        };

        if vectors.len() != inputs.len() {
            return Err(Error::Provider(format!(
                "provider returned {} embeddings for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.config.dimension) {
            return Err(Error::Provider(format!(
                "expected {}-dimensional embeddings, got {}",
                self.config.dimension,
                bad.len()
            )));
        }

        debug!(model = %self.config.model, count = vectors.len(), "embedded texts");
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Provider("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
