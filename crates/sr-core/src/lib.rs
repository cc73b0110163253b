//! Core traits and types for SupportRAG
//!
//! This crate defines the data model and the capability-facing interfaces
//! (embedding provider, vector store, generation model) shared by the
//! ingestion and query crates, so each collaborator can be swapped for a stub.

pub mod conversation;
pub mod document;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod vector_store;

pub use conversation::{ConversationContext, LanguageFlag};
pub use document::{ContentBlock, IndexedChunk, Metadata, NO_HEADER, SectionRecord};
pub use embedder::Embedder;
pub use error::{Error, Result};
pub use llm::{ChatRequest, LLMProvider, TextStream};
pub use vector_store::{
    FilterValue, MetadataFilter, PropertyMap, RetrievedChunk, SearchResult, TEXT_PROPERTY,
    VectorStore, chunk_properties, metadata_from_properties,
};
