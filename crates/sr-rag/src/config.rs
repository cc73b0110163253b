//! Query engine configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use sr_core::{Error, Result};

pub const DEFAULT_PREAMBLE: &str = "أنت شات بوت تعمل كموظف خدمة زبائن.";

/// Retrieval and language settings for [`crate::RagEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    /// Neighbours retrieved when the caller does not pick `k`
    pub top_k: usize,
    /// Language of the indexed corpus
    pub native_language: String,
    /// Language bridged questions arrive in and answers are returned in
    pub bridged_language: String,
    pub preamble: String,
    pub max_tokens: u32,
    pub template_path: Option<PathBuf>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            native_language: "Arabic".to_string(),
            bridged_language: "English".to_string(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            max_tokens: 1500,
            template_path: None,
        }
    }
}

impl RagConfig {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let top_k = match env::var("RAG_TOP_K") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|k| *k > 0)
                .ok_or_else(|| {
                    Error::Configuration(format!("RAG_TOP_K must be a positive integer, got '{}'", raw))
                })?,
            Err(_) => defaults.top_k,
        };

        Ok(Self {
            top_k,
            native_language: env::var("RAG_NATIVE_LANGUAGE").unwrap_or(defaults.native_language),
            bridged_language: env::var("RAG_BRIDGED_LANGUAGE").unwrap_or(defaults.bridged_language),
            preamble: env::var("RAG_PREAMBLE").unwrap_or(defaults.preamble),
            max_tokens: defaults.max_tokens,
            template_path: env::var("PROMPT_TEMPLATE_PATH").ok().map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_snapshot() {
        insta::assert_json_snapshot!(RagConfig::default(), @r#"
        {
          "top_k": 20,
          "native_language": "Arabic",
          "bridged_language": "English",
          "preamble": "أنت شات بوت تعمل كموظف خدمة زبائن.",
          "max_tokens": 1500,
          "template_path": null
        }
        "#);
    }
}
