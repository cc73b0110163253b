//! Qdrant-backed vector store gateway

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use sr_core::{
    Embedder, Error, FilterValue, IndexedChunk, Metadata, MetadataFilter, PropertyMap, Result,
    RetrievedChunk, SearchResult, VectorStore, metadata_from_properties,
};

use crate::config::QdrantConfig;
use crate::point::{from_payload, point_id, to_payload};

/// Upper bound on points scanned when listing distinct documents
const SCAN_LIMIT: u32 = 5000;

/// Vector store backed by a Qdrant collection.
///
/// The client is created once by [`QdrantVectorStore::connect`] and only
/// read afterwards, so one instance can be shared across concurrent requests.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
}

impl QdrantVectorStore {
    /// Open a session and make sure the collection exists
    pub async fn connect(config: &QdrantConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;

        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .build()
            .map_err(|e| Error::Connection(format!("failed to build Qdrant client: {}", e)))?;

        let store = Self {
            client,
            collection: config.collection.clone(),
            batch_size: config.batch_size.max(1),
            embedder,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    /// Create the collection for storing chunk embeddings if missing
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| Error::Connection(format!("Qdrant unreachable: {}", e)))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.embedder.dimension() as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| Error::Connection(format!("failed to create collection: {}", e)))?;
            info!(collection = %self.collection, "created Qdrant collection");
        }

        Ok(())
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn filter(filter: &MetadataFilter) -> Filter {
        let property = filter.property.clone();
        let condition = match &filter.value {
            FilterValue::Text(value) => Condition::matches(property, value.clone()),
            // without a full-text index Qdrant evaluates this as a substring match
            FilterValue::Contains(fragment) => Condition::matches_text(property, fragment.clone()),
            FilterValue::Bool(value) => Condition::matches(property, *value),
        };
        Filter::must([condition])
    }

    fn store_error(action: &str, e: impl std::fmt::Display) -> Error {
        Error::VectorStore(format!("{} failed: {}", action, e))
    }

    async fn scroll(&self, filter: Option<&MetadataFilter>, limit: u32) -> Result<Vec<PropertyMap>> {
        let mut request = ScrollPointsBuilder::new(&self.collection)
            .limit(limit)
            .with_payload(true)
            .with_vectors(false);
        if let Some(filter) = filter {
            request = request.filter(Self::filter(filter));
        }

        let response = self
            .client
            .scroll(request)
            .await
            .map_err(|e| Self::store_error("scroll", e))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| from_payload(point.payload))
            .collect())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    async fn index(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        let mut written = 0;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await.inspect_err(|e| {
                warn!(written, error = %e, "embedding failed part-way through batch");
            })?;

            let points: Vec<PointStruct> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| PointStruct::new(point_id(chunk), vector, to_payload(chunk)))
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(|e| {
                    warn!(written, error = %e, "upsert failed part-way through batch");
                    Self::store_error("upsert", e)
                })?;

            written += batch.len();
        }

        debug!(collection = %self.collection, written, "indexed chunks");
        Ok(written)
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<SearchResult> {
        let mut request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(filter) = filter {
            request = request.filter(Self::filter(filter));
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| Self::store_error("search", e))?;

        // Qdrant returns hits best-first; keep that order
        let documents = response
            .result
            .into_iter()
            .map(|point| RetrievedChunk {
                score: Some(point.score),
                properties: from_payload(point.payload),
            })
            .collect();

        Ok(SearchResult::new(documents))
    }

    async fn delete_by_metadata(&self, filter: &MetadataFilter) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Self::filter(filter))
                    .wait(true),
            )
            .await
            .map_err(|e| Self::store_error("delete", e))?;

        info!(collection = %self.collection, property = %filter.property, "deleted chunks by metadata");
        Ok(())
    }

    async fn delete_chunks(&self, chunks: &[IndexedChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let ids: Vec<PointId> = chunks.iter().map(|chunk| point_id(chunk).into()).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await
            .map_err(|e| Self::store_error("delete", e))?;

        debug!(collection = %self.collection, removed = chunks.len(), "deleted chunks by id");
        Ok(())
    }

    async fn find_by_metadata(&self, filter: &MetadataFilter, limit: usize) -> Result<Vec<PropertyMap>> {
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        self.scroll(Some(filter), limit).await
    }

    async fn list_unique_by_property(&self, property: &str) -> Result<Vec<Metadata>> {
        let records = self.scroll(None, SCAN_LIMIT).await?;
        let mut seen = HashSet::new();

        Ok(records
            .into_iter()
            .filter(|record| {
                record
                    .get(property)
                    .is_some_and(|value| seen.insert(value.to_string()))
            })
            .filter_map(|record| metadata_from_properties(&record))
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| Error::Connection(format!("Qdrant unreachable: {}", e)))?;

        Ok(response
            .collections
            .into_iter()
            .map(|collection| collection.name)
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| Self::store_error("count", e))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
