//! Cohere configuration

use serde::{Deserialize, Serialize};
use std::env;
use sr_core::{Error, Result};

/// Configuration for the Cohere chat client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub model: String,
    pub api_url: String,
}

impl CohereConfig {
    pub const DEFAULT_MODEL: &'static str = "command-r-plus";
    pub const DEFAULT_API_URL: &'static str = "https://api.cohere.ai";

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("COHERE_API_KEY").map_err(|_| {
            Error::Configuration("COHERE_API_KEY environment variable not found".to_string())
        })?;

        let model = env::var("COHERE_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string());

        let api_url =
            env::var("COHERE_API_URL").unwrap_or_else(|_| Self::DEFAULT_API_URL.to_string());

        Ok(Self {
            api_key,
            model,
            api_url,
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: Self::DEFAULT_MODEL.to_string(),
            api_url: Self::DEFAULT_API_URL.to_string(),
        }
    }

    pub(crate) fn chat_url(&self) -> String {
        format!("{}/v1/chat", self.api_url.trim_end_matches('/'))
    }
}
