//! Ingestion pipeline: markup file → sections → chunks → vector store

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use sr_core::{
    IndexedChunk, Metadata, MetadataFilter, Result, SectionRecord, TEXT_PROPERTY, VectorStore,
    metadata_from_properties,
};

use crate::chunks::{json_path_for, to_chunks, write_sections_json};
use crate::structure::{read_markup, structure, structure_posts};

/// How markup is split into sections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureMode {
    /// Split at every heading
    #[default]
    Sections,
    /// One section per `<div class="post">`
    Posts,
}

impl StructureMode {
    fn apply(&self, markup: &str) -> Result<Vec<SectionRecord>> {
        match self {
            StructureMode::Sections => structure(markup),
            StructureMode::Posts => structure_posts(markup),
        }
    }
}

/// A markup file to ingest with its caller-supplied metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Result of an ingestion batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionReport {
    pub documents_indexed: usize,
    pub documents_failed: usize,
    pub chunks_indexed: usize,
    pub errors: Vec<String>,
}

impl IngestionReport {
    pub fn is_success(&self) -> bool {
        self.documents_failed == 0
    }
}

/// Upper bound on stored chunks inspected when pruning a replaced document
const REPLACE_SCAN_LIMIT: usize = 10_000;

/// Ingestion pipeline writing into any [`VectorStore`]
pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    mode: StructureMode,
    replace: bool,
}

impl IngestionPipeline {
    /// Create a new pipeline splitting documents at headings
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            mode: StructureMode::default(),
            replace: false,
        }
    }

    pub fn with_mode(mut self, mode: StructureMode) -> Self {
        self.mode = mode;
        self
    }

    /// Drop chunks of a same-named document that the new version no longer has.
    ///
    /// Stale chunks are removed only after the new ones are indexed, so a
    /// failing replacement leaves the previous version searchable.
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn mode(&self) -> StructureMode {
        self.mode
    }

    /// Structure markup and build its chunks without touching the store
    pub fn prepare(&self, markup: &str, metadata: &Metadata) -> Result<Vec<IndexedChunk>> {
        let sections = self.mode.apply(markup)?;
        to_chunks(&sections, metadata)
    }

    /// Structure, chunk and index one markup string; returns chunks written
    pub async fn ingest_markup(&self, markup: &str, metadata: &Metadata) -> Result<usize> {
        let chunks = self.prepare(markup, metadata)?;
        if chunks.is_empty() {
            warn!(document = %metadata.name, "document produced no content, nothing indexed");
            return Ok(0);
        }

        let written = self.store.index(&chunks).await?;
        info!(document = %metadata.name, chunks = written, "indexed document");

        if self.replace {
            self.prune_stale(&chunks, metadata).await?;
        }
        Ok(written)
    }

    /// Delete stored chunks named like `metadata` that are not in `current`
    async fn prune_stale(&self, current: &[IndexedChunk], metadata: &Metadata) -> Result<()> {
        let stored = self
            .store
            .find_by_metadata(&MetadataFilter::equals("name", metadata.name.clone()), REPLACE_SCAN_LIMIT)
            .await?;

        let stale: Vec<IndexedChunk> = stored
            .iter()
            .filter_map(|properties| {
                let content = properties.get(TEXT_PROPERTY)?.as_str()?.to_string();
                let metadata = metadata_from_properties(properties)?;
                Some(IndexedChunk { content, metadata })
            })
            .filter(|chunk| !current.iter().any(|kept| kept.content == chunk.content))
            .collect();

        if !stale.is_empty() {
            self.store.delete_chunks(&stale).await?;
            info!(document = %metadata.name, removed = stale.len(), "removed stale chunks");
        }
        Ok(())
    }

    /// Read, structure, chunk and index one markup file
    pub async fn ingest_file(&self, path: &Path, metadata: &Metadata) -> Result<usize> {
        let markup = read_markup(path).await?;
        self.ingest_markup(&markup, metadata).await
    }

    /// Ingest several documents. A failing document is recorded in the
    /// report and never stops the rest of the batch.
    pub async fn ingest_batch(&self, documents: Vec<SourceDocument>) -> IngestionReport {
        let mut report = IngestionReport::default();

        for document in documents {
            match self.ingest_file(&document.path, &document.metadata).await {
                Ok(written) => {
                    report.documents_indexed += 1;
                    report.chunks_indexed += written;
                }
                Err(e) => {
                    error!(path = %document.path.display(), error = %e, "failed to ingest document");
                    report.documents_failed += 1;
                    report
                        .errors
                        .push(format!("Failed to ingest {}: {}", document.path.display(), e));
                }
            }
        }

        report
    }

    /// Convert a markup file into a structured JSON file without indexing it
    pub async fn convert_file(&self, path: &Path, output: Option<&Path>) -> Result<PathBuf> {
        convert_file(path, output, self.mode).await
    }
}

/// Convert a markup file into a structured JSON file.
///
/// Writes next to the source (`.json` extension) unless `output` is given.
pub async fn convert_file(path: &Path, output: Option<&Path>, mode: StructureMode) -> Result<PathBuf> {
    let markup = read_markup(path).await?;
    let sections = mode.apply(&markup)?;
    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| json_path_for(path));
    write_sections_json(&sections, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_vector::{HashEmbedder, LocalVectorStore};

    fn pipeline() -> (Arc<LocalVectorStore>, IngestionPipeline) {
        let store = Arc::new(LocalVectorStore::new(Arc::new(HashEmbedder::new(64))));
        let pipeline = IngestionPipeline::new(store.clone());
        (store, pipeline)
    }

    #[tokio::test]
    async fn test_ingest_markup_indexes_one_chunk_per_section() {
        let (store, pipeline) = pipeline();
        let metadata = Metadata::new("offers", true, "2024-06-01");

        let written = pipeline
            .ingest_markup("<h2>A</h2><p>one</p><h2>B</h2><p>two</p>", &metadata)
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_document_indexes_nothing() {
        let (store, pipeline) = pipeline();
        let metadata = Metadata::new("empty", true, "2024-06-01");

        assert_eq!(pipeline.ingest_markup("<div></div>", &metadata).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_posts_mode() {
        let (_, pipeline) = pipeline();
        let pipeline = pipeline.with_mode(StructureMode::Posts);
        let metadata = Metadata::new("posts", false, "2024-06-01");

        let chunks = pipeline
            .prepare(
                r#"<div class="post"><h3>One</h3><p>a</p></div><div class="post"><h3>Two</h3></div>"#,
                &metadata,
            )
            .unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failing_document() {
        let (store, pipeline) = pipeline();
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("good.html");
        std::fs::write(&good, "<h3>Fees</h3><p>No monthly fee</p>").unwrap();
        let bad = dir.path().join("bad.html");
        std::fs::write(&bad, [0xff, 0xfe, 0xfd]).unwrap();
        let missing = dir.path().join("missing.html");

        let report = pipeline
            .ingest_batch(vec![
                SourceDocument {
                    path: bad,
                    metadata: Metadata::new("bad", true, "2024-06-01"),
                },
                SourceDocument {
                    path: missing,
                    metadata: Metadata::new("missing", true, "2024-06-01"),
                },
                SourceDocument {
                    path: good,
                    metadata: Metadata::new("good", true, "2024-06-01"),
                },
            ])
            .await;

        assert_eq!(report.documents_indexed, 1);
        assert_eq!(report.documents_failed, 2);
        assert_eq!(report.chunks_indexed, 1);
        assert_eq!(report.errors.len(), 2);
        assert!(!report.is_success());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_keeps_previous_version_when_new_file_fails() {
        let (store, pipeline) = pipeline();
        let pipeline = pipeline.with_replace(true);
        let metadata = Metadata::new("bundles", true, "2024-06-01");
        pipeline
            .ingest_markup("<h2>Daily</h2><p>100</p><h2>Weekly</h2><p>500</p>", &metadata)
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("bundles.html");
        std::fs::write(&broken, [0xff, 0xfe, 0xfd]).unwrap();

        let report = pipeline
            .ingest_batch(vec![SourceDocument {
                path: broken,
                metadata: metadata.clone(),
            }])
            .await;

        assert_eq!(report.documents_failed, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_drops_sections_removed_from_document() {
        let (store, pipeline) = pipeline();
        let pipeline = pipeline.with_replace(true);
        let other = Metadata::new("faq", true, "2024-06-01");
        pipeline.ingest_markup("<h2>Daily</h2><p>100</p>", &other).await.unwrap();

        let v1 = Metadata::new("bundles", true, "2024-06-01");
        pipeline
            .ingest_markup("<h2>Daily</h2><p>100</p><h2>Weekly</h2><p>500</p>", &v1)
            .await
            .unwrap();

        let v2 = Metadata::new("bundles", true, "2024-07-01");
        let written = pipeline
            .ingest_markup("<h2>Daily</h2><p>100</p><h2>Monthly</h2><p>1500</p>", &v2)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let stored = store
            .find_by_metadata(&MetadataFilter::equals("name", "bundles"), 10)
            .await
            .unwrap();
        let texts: Vec<&str> = stored
            .iter()
            .filter_map(|properties| properties.get(TEXT_PROPERTY)?.as_str())
            .collect();
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().all(|text| !text.contains("Weekly")));
        assert!(texts.iter().any(|text| text.contains("Monthly")));
        assert!(stored.iter().all(|properties| properties["date"] == "2024-07-01"));

        // same section under another name is untouched
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_convert_file_writes_json_next_to_source() {
        let (_, pipeline) = pipeline();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("faq.html");
        std::fs::write(&source, "<h3>Q</h3><p>A</p>").unwrap();

        let target = pipeline.convert_file(&source, None).await.unwrap();
        assert_eq!(target, dir.path().join("faq.json"));

        let sections = crate::chunks::read_sections_json(&target).await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, "Q");
    }
}
