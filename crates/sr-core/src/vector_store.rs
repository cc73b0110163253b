//! Vector store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{IndexedChunk, Metadata, Result};

/// Flat property map as stored alongside each vector
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// Payload key holding the serialized section
pub const TEXT_PROPERTY: &str = "text";

/// Value side of a metadata predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FilterValue {
    /// Exact string equality
    Text(String),
    /// Substring match on a string property
    Contains(String),
    Bool(bool),
}

/// A predicate over a single metadata property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub property: String,
    pub value: FilterValue,
}

impl MetadataFilter {
    pub fn equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn contains(property: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: FilterValue::Contains(fragment.into()),
        }
    }

    pub fn flag(property: impl Into<String>, value: bool) -> Self {
        Self {
            property: property.into(),
            value: FilterValue::Bool(value),
        }
    }

    /// Parse a filter from command-line style input.
    ///
    /// `active` is treated as a boolean property. A value starting or ending
    /// with `*` (e.g. `*bundle*`) becomes a substring match and must keep some
    /// text once the `*`s are stripped. Anything else is exact.
    pub fn parse(property: &str, raw: &str) -> Result<Self> {
        let property = property.trim();
        if property.is_empty() {
            return Err(crate::Error::InvalidInput("filter property is empty".to_string()));
        }

        if property == "active" {
            return match raw.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Self::flag(property, true)),
                "false" | "no" | "0" => Ok(Self::flag(property, false)),
                other => Err(crate::Error::InvalidInput(format!(
                    "'{}' is not a boolean value for 'active'",
                    other
                ))),
            };
        }

        let trimmed = raw.trim();
        if trimmed.starts_with('*') || trimmed.ends_with('*') {
            let fragment = trimmed.trim_matches('*');
            // an empty fragment would match every chunk
            if fragment.is_empty() {
                return Err(crate::Error::InvalidInput(format!(
                    "'{}' has no text to match for '{}'",
                    trimmed, property
                )));
            }
            return Ok(Self::contains(property, fragment));
        }

        Ok(Self::equals(property, trimmed))
    }

    /// Evaluate the predicate against a property map
    pub fn matches(&self, properties: &PropertyMap) -> bool {
        let Some(value) = properties.get(&self.property) else {
            return false;
        };

        match (&self.value, value) {
            (FilterValue::Text(expected), serde_json::Value::String(actual)) => expected == actual,
            (FilterValue::Contains(fragment), serde_json::Value::String(actual)) => {
                actual.contains(fragment.as_str())
            }
            (FilterValue::Bool(expected), serde_json::Value::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// One search hit: the stored properties and the store's similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub properties: PropertyMap,
    pub score: Option<f32>,
}

/// Search result from vector store, nearest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub documents: Vec<RetrievedChunk>,
    pub total: usize,
}

impl SearchResult {
    pub fn new(documents: Vec<RetrievedChunk>) -> Self {
        let total = documents.len();
        Self { documents, total }
    }
}

/// Build the flat property map stored for one chunk
pub fn chunk_properties(chunk: &IndexedChunk) -> PropertyMap {
    let mut properties = PropertyMap::new();
    properties.insert(TEXT_PROPERTY.to_string(), chunk.content.clone().into());
    properties.insert("name".to_string(), chunk.metadata.name.clone().into());
    properties.insert("active".to_string(), chunk.metadata.active.into());
    properties.insert("date".to_string(), chunk.metadata.date.clone().into());
    properties
}

/// Recover document metadata from a stored property map
pub fn metadata_from_properties(properties: &PropertyMap) -> Option<Metadata> {
    let mut stripped = properties.clone();
    stripped.remove(TEXT_PROPERTY);
    serde_json::from_value(serde_json::Value::Object(stripped)).ok()
}

/// Trait for the vector database gateway (e.g., Qdrant)
///
/// The gateway owns both the database session and the embedding provider,
/// so callers only ever hand it text or query vectors. Implementations must
/// be safe for concurrent read access: one handle is shared by every request.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed text with the gateway's embedding provider
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed and upsert chunks; returns the number written.
    ///
    /// A failure part-way leaves already-written chunks in place.
    async fn index(&self, chunks: &[IndexedChunk]) -> Result<usize>;

    /// Nearest `top_k` chunks to `vector`, optionally restricted by a metadata predicate
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<SearchResult>;

    /// Delete every chunk matching the predicate. Irreversible.
    async fn delete_by_metadata(&self, filter: &MetadataFilter) -> Result<()>;

    /// Delete exactly these chunks, leaving others with the same metadata
    async fn delete_chunks(&self, chunks: &[IndexedChunk]) -> Result<()>;

    /// Fetch the property maps of chunks matching the predicate
    async fn find_by_metadata(&self, filter: &MetadataFilter, limit: usize) -> Result<Vec<PropertyMap>>;

    /// One metadata record per distinct value of `property`, content excluded
    async fn list_unique_by_property(&self, property: &str) -> Result<Vec<Metadata>>;

    /// Names of the collections available on the server
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Total number of stored chunks
    async fn count(&self) -> Result<usize>;
}
