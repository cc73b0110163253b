//! Vector database and embedding provider configuration

use serde::{Deserialize, Serialize};
use std::env;

use sr_core::{Error, Result};

const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
const DEFAULT_COLLECTION: &str = "support_documents";
const DEFAULT_HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction";
const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Connection settings for the Qdrant vector database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub collection: String,
    /// Chunks embedded and upserted per request
    pub batch_size: usize,
}

impl QdrantConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = env::var("QDRANT_URL").unwrap_or_else(|_| DEFAULT_QDRANT_URL.to_string());
        let api_key = env::var("QDRANT_API_KEY").ok().filter(|key| !key.trim().is_empty());
        let collection =
            env::var("QDRANT_COLLECTION").unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());

        let config = Self {
            url,
            api_key,
            collection,
            batch_size: 32,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            collection: collection.into(),
            batch_size: 32,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| Error::Configuration(format!("invalid QDRANT_URL '{}': {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "QDRANT_URL must be http(s), got '{}'",
                parsed.scheme()
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Configuration("collection name is required".to_string()));
        }
        Ok(())
    }
}

/// Settings for the Hugging Face feature-extraction endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub dimension: usize,
}

impl EmbeddingConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("HUGGING_FACE_API_KEY").map_err(|_| {
            Error::Configuration("HUGGING_FACE_API_KEY environment variable not found".to_string())
        })?;
        let model = env::var("EMBEDDING_MODEL_NAME")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        let base_url =
            env::var("HF_INFERENCE_URL").unwrap_or_else(|_| DEFAULT_HF_INFERENCE_URL.to_string());
        let dimension = match env::var("EMBEDDING_DIMENSION") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Configuration(format!("EMBEDDING_DIMENSION '{}' is not a number", raw))
            })?,
            Err(_) => DEFAULT_EMBEDDING_DIMENSION,
        };

        Ok(Self {
            api_key,
            model,
            base_url,
            dimension,
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_HF_INFERENCE_URL.to_string(),
            dimension,
        }
    }

    /// Full feature-extraction URL for the configured model
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}
