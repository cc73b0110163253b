//! Document ingestion for SupportRAG
//!
//! This crate turns raw markup into section records, serializes them into
//! indexable chunks tagged with per-document metadata, and drives the
//! ingestion of whole files into a vector store.

mod chunks;
mod pipeline;
mod structure;


pub use chunks::{
    from_interchange, json_path_for, read_sections_json, to_chunks, to_interchange,
    write_sections_json,
};
pub use pipeline::{
    IngestionPipeline, IngestionReport, SourceDocument, StructureMode, convert_file,
};
pub use structure::{DedupSet, structure, structure_file, structure_posts};

// Re-export core types for convenience
pub use sr_core::{
    ContentBlock, Error, IndexedChunk, Metadata, MetadataFilter, NO_HEADER, Result, SectionRecord,
    VectorStore,
};
