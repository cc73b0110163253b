//! In-memory vector store

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use sr_core::{
    Embedder, Error, IndexedChunk, Metadata, MetadataFilter, PropertyMap, Result, RetrievedChunk,
    SearchResult, VectorStore, chunk_properties, metadata_from_properties,
};

use crate::point::point_id;

#[derive(Debug, Clone)]
struct StoredChunk {
    id: String,
    vector: Vec<f32>,
    properties: PropertyMap,
}

/// Local in-memory vector store using cosine similarity.
///
/// Chunks keep insertion order, which makes "first record seen" listings
/// and equal-score ties deterministic.
pub struct LocalVectorStore {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl LocalVectorStore {
    /// Create a new local vector store embedding with `embedder`
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    fn lock_error<E: std::fmt::Display>(e: E) -> Error {
        Error::VectorStore(format!("Lock error: {}", e))
    }

    fn upsert(&self, stored: StoredChunk) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(Self::lock_error)?;
        match chunks.iter_mut().find(|existing| existing.id == stored.id) {
            Some(existing) => *existing = stored,
            None => chunks.push(stored),
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    async fn index(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        let mut written = 0;
        for chunk in chunks {
            let vector = self.embedder.embed(&chunk.content).await.inspect_err(|e| {
                warn!(written, error = %e, "embedding failed part-way through batch");
            })?;
            self.upsert(StoredChunk {
                id: point_id(chunk),
                vector,
                properties: chunk_properties(chunk),
            })?;
            written += 1;
        }
        debug!(written, "indexed chunks in memory");
        Ok(written)
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<SearchResult> {
        let chunks = self.chunks.read().map_err(Self::lock_error)?;

        let mut results: Vec<RetrievedChunk> = chunks
            .iter()
            .filter(|chunk| filter.is_none_or(|f| f.matches(&chunk.properties)))
            .map(|chunk| RetrievedChunk {
                properties: chunk.properties.clone(),
                score: Some(Self::cosine_similarity(vector, &chunk.vector)),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(SearchResult::new(results))
    }

    async fn delete_by_metadata(&self, filter: &MetadataFilter) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(Self::lock_error)?;
        let before = chunks.len();
        chunks.retain(|chunk| !filter.matches(&chunk.properties));
        debug!(removed = before - chunks.len(), property = %filter.property, "deleted chunks");
        Ok(())
    }

    async fn delete_chunks(&self, chunks: &[IndexedChunk]) -> Result<()> {
        let ids: HashSet<String> = chunks.iter().map(point_id).collect();
        let mut stored = self.chunks.write().map_err(Self::lock_error)?;
        stored.retain(|chunk| !ids.contains(&chunk.id));
        Ok(())
    }

    async fn find_by_metadata(&self, filter: &MetadataFilter, limit: usize) -> Result<Vec<PropertyMap>> {
        let chunks = self.chunks.read().map_err(Self::lock_error)?;
        Ok(chunks
            .iter()
            .filter(|chunk| filter.matches(&chunk.properties))
            .take(limit)
            .map(|chunk| chunk.properties.clone())
            .collect())
    }

    async fn list_unique_by_property(&self, property: &str) -> Result<Vec<Metadata>> {
        let chunks = self.chunks.read().map_err(Self::lock_error)?;
        let mut seen = HashSet::new();
        let mut unique = Vec::new();

        for chunk in chunks.iter() {
            let Some(key) = chunk.properties.get(property) else {
                continue;
            };
            if !seen.insert(key.to_string()) {
                continue;
            }
            if let Some(metadata) = metadata_from_properties(&chunk.properties) {
                unique.push(metadata);
            }
        }

        Ok(unique)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(vec!["local".to_string()])
    }

    async fn count(&self) -> Result<usize> {
        let chunks = self.chunks.read().map_err(Self::lock_error)?;
        Ok(chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;

    fn chunk(name: &str, active: bool, content: &str) -> IndexedChunk {
        IndexedChunk {
            content: content.to_string(),
            metadata: Metadata::new(name, active, "2024-06-01"),
        }
    }

    fn store() -> LocalVectorStore {
        LocalVectorStore::new(Arc::new(HashEmbedder::new(128)))
    }

    #[tokio::test]
    async fn test_index_and_count() {
        let store = store();
        let written = store
            .index(&[chunk("a", true, "first"), chunk("a", true, "second")])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reindex_same_chunk_upserts() {
        let store = store();
        store.index(&[chunk("a", true, "same")]).await.unwrap();
        store.index(&[chunk("a", true, "same")]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let store = store();
        store
            .index(&[
                chunk("roaming", true, "roaming abroad packages"),
                chunk("billing", true, "roaming charges on your bill"),
            ])
            .await
            .unwrap();

        let query = store.embed("roaming").await.unwrap();
        let filter = MetadataFilter::equals("name", "billing");
        let result = store.search(&query, 10, Some(&filter)).await.unwrap();

        assert_eq!(result.total, 1);
        assert_eq!(result.documents[0].properties["name"], "billing");
    }

    #[tokio::test]
    async fn test_delete_by_metadata() {
        let store = store();
        store
            .index(&[
                chunk("old-offers", false, "expired"),
                chunk("offers", true, "current"),
                chunk("old-offers", false, "also expired"),
            ])
            .await
            .unwrap();

        store
            .delete_by_metadata(&MetadataFilter::flag("active", false))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let remaining = store
            .find_by_metadata(&MetadataFilter::contains("name", "offers"), 10)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["name"], "offers");
    }

    #[tokio::test]
    async fn test_list_unique_by_name_excludes_text() {
        let store = store();
        store
            .index(&[
                chunk("faq", true, "one"),
                chunk("offers", false, "two"),
                chunk("faq", true, "three"),
            ])
            .await
            .unwrap();

        let unique = store.list_unique_by_property("name").await.unwrap();
        assert_eq!(
            unique,
            vec![
                Metadata::new("faq", true, "2024-06-01"),
                Metadata::new("offers", false, "2024-06-01"),
            ]
        );
    }
}
