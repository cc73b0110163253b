//! Generation model provider trait and types

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::Result;

/// Incremental text fragments from a streaming generation call
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A single chat turn sent to the generation provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// System preamble describing the assistant's role
    pub preamble: Option<String>,
    /// Opaque key the provider uses to keep multi-turn history
    pub conversation_id: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            preamble: None,
            conversation_id: None,
            temperature: 0.3,
            max_tokens: 1500,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Trait for generation model providers (e.g., Cohere)
///
/// Conversation memory lives with the provider, keyed by
/// `ChatRequest::conversation_id`; implementations forward it untouched.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Single-shot chat completion returning the full text
    async fn chat(&self, request: &ChatRequest) -> Result<String>;

    /// Streaming chat completion, one item per text event until stream end
    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream>;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_builder() {
        let request = ChatRequest::new("hello")
            .with_preamble("You are helpful.")
            .with_conversation("conv-1")
            .with_temperature(0.0)
            .with_max_tokens(64);

        assert_eq!(request.message, "hello");
        assert_eq!(request.preamble.as_deref(), Some("You are helpful."));
        assert_eq!(request.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 64);
    }
}
