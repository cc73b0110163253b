//! Cohere chat client implementation

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use sr_core::{ChatRequest, Error, LLMProvider, Result, TextStream};

use crate::config::CohereConfig;

/// Cohere chat client
pub struct CohereClient {
    config: CohereConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatBody<'a> {
    message: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl<'a> ChatBody<'a> {
    pub(crate) fn new(request: &'a ChatRequest, model: &'a str, stream: bool) -> Self {
        Self {
            message: &request.message,
            model,
            preamble: request.preamble.as_deref(),
            conversation_id: request.conversation_id.as_deref(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct StreamLine {
    event_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// One decoded event from the chat stream
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StreamEvent {
    Text(String),
    End,
}

/// Splits the newline-delimited event stream into events.
///
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network chunks decodes intact.
#[derive(Debug, Default)]
pub(crate) struct EventDecoder {
    buffer: Vec<u8>,
}

impl EventDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = Self::decode_line(&line)? {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Decode whatever is left once the connection closes
    pub(crate) fn finish(&mut self) -> Result<Option<StreamEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_line(&rest)
    }

    fn decode_line(line: &[u8]) -> Result<Option<StreamEvent>> {
        let line = std::str::from_utf8(line)
            .map_err(|e| Error::Provider(format!("stream is not valid UTF-8: {}", e)))?
            .trim();
        let line = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
        if line.is_empty() {
            return Ok(None);
        }

        let parsed: StreamLine = serde_json::from_str(line)
            .map_err(|e| Error::Provider(format!("malformed stream event: {}", e)))?;

        match parsed.event_type.as_str() {
            "text-generation" => Ok(parsed.text.map(StreamEvent::Text)),
            "stream-end" => match parsed.finish_reason.as_deref() {
                Some(reason) if reason.starts_with("ERROR") => Err(Error::Provider(format!(
                    "generation stopped with {}",
                    reason
                ))),
                _ => Ok(Some(StreamEvent::End)),
            },
            other => {
                debug!(event_type = other, "skipping stream event");
                Ok(None)
            }
        }
    }
}

impl CohereClient {
    /// Create a new Cohere client from configuration
    pub fn new(config: CohereConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Configuration("missing Cohere API key".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Provider(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Create a new Cohere client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(CohereConfig::from_env()?)
    }

    /// Set the model to use for generation
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<Response> {
        let body = ChatBody::new(request, &self.config.model, stream);

        let response = self
            .client
            .post(self.config.chat_url())
            .header("Accept", "application/json")
            .bearer_auth(self.config.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Provider(format!(
                "Cohere API request failed with status {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for CohereClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let response = self.send(request, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed chat response: {}", e)))?;

        debug!(model = %self.config.model, chars = parsed.text.len(), "chat completed");
        Ok(parsed.text)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let response = self.send(request, true).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let stream = async_stream::stream! {
            let mut decoder = EventDecoder::default();

            loop {
                let chunk = match bytes.next().await {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        yield Err(Error::Provider(format!("stream interrupted: {}", e)));
                        break;
                    }
                    None => {
                        match decoder.finish() {
                            Ok(Some(StreamEvent::End)) => {}
                            Ok(Some(StreamEvent::Text(text))) => yield Ok(text),
                            Ok(None) => warn!("chat stream closed without an end event"),
                            Err(e) => yield Err(e),
                        }
                        break;
                    }
                };

                let events = match decoder.push(&chunk) {
                    Ok(events) => events,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                let mut ended = false;
                for event in events {
                    match event {
                        StreamEvent::Text(text) => yield Ok(text),
                        StreamEvent::End => {
                            ended = true;
                            break;
                        }
                    }
                }
                if ended {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
