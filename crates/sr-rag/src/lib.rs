//! Retrieval-augmented answering for SupportRAG
//!
//! This crate wires a [`VectorStore`] and an [`LLMProvider`] into the query
//! pipeline: optional question translation, retrieval, prompt assembly,
//! generation and translation of the answer back.

mod config;
mod engine;
mod template;


pub use config::{DEFAULT_PREAMBLE, RagConfig};
pub use engine::{
    Answer, ERROR_PREFIX, FragmentStream, QueryState, RagEngine, error_payload, render_context,
};
pub use template::{DEFAULT_TEMPLATE, PromptTemplate};

// Re-export core types for convenience
pub use sr_core::{
    ConversationContext, Error, LLMProvider, LanguageFlag, Result, TextStream, VectorStore,
};
