//! Cohere integration for SupportRAG
//!
//! This crate provides the Cohere implementation of the LLMProvider trait.

mod client;
mod config;


pub use client::CohereClient;
pub use config::CohereConfig;

// Re-export core types for convenience
pub use sr_core::{ChatRequest, Error, LLMProvider, Result, TextStream};
