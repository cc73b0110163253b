//! Vector store gateway for SupportRAG
//!
//! This crate provides the Qdrant-backed store, an in-memory store with the
//! same contract, and the embedding providers the stores delegate to.

mod config;
mod embedder;
mod local;
mod point;
mod qdrant;


pub use config::{EmbeddingConfig, QdrantConfig};
pub use embedder::{HashEmbedder, HuggingFaceEmbedder};
pub use local::LocalVectorStore;
pub use point::point_id;
pub use qdrant::QdrantVectorStore;

// Re-export core types for convenience
pub use sr_core::{
    Embedder, Error, FilterValue, IndexedChunk, Metadata, MetadataFilter, PropertyMap, Result,
    RetrievedChunk, SearchResult, VectorStore,
};
