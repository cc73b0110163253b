//! Chunk building: section records to interchange JSON plus document metadata

use std::path::{Path, PathBuf};
use tracing::info;

use sr_core::{Error, IndexedChunk, Metadata, Result, SectionRecord};

/// Serialize one section into its interchange form (pretty JSON, non-ASCII kept verbatim)
pub fn to_interchange(section: &SectionRecord) -> Result<String> {
    serde_json::to_string_pretty(section)
        .map_err(|e| Error::Serialization(format!("section '{}': {}", section.header, e)))
}

/// Rebuild a section from its interchange form
pub fn from_interchange(content: &str) -> Result<SectionRecord> {
    serde_json::from_str(content).map_err(|e| Error::Serialization(e.to_string()))
}

/// Pair every section of one document with that document's metadata.
///
/// Metadata is per document: every chunk gets an identical copy.
pub fn to_chunks(sections: &[SectionRecord], metadata: &Metadata) -> Result<Vec<IndexedChunk>> {
    sections
        .iter()
        .map(|section| {
            Ok(IndexedChunk {
                content: to_interchange(section)?,
                metadata: metadata.clone(),
            })
        })
        .collect()
}

/// Default output path for a converted document: same directory, `.json` extension
pub fn json_path_for(markup_path: &Path) -> PathBuf {
    markup_path.with_extension("json")
}

/// Persist a whole structured document as a JSON array
pub async fn write_sections_json(sections: &[SectionRecord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(sections)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), sections = sections.len(), "wrote structured document");
    Ok(())
}

/// Load a document previously written by [`write_sections_json`]
pub async fn read_sections_json(path: &Path) -> Result<Vec<SectionRecord>> {
    let json = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&json).map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_core::ContentBlock;

    fn sample_sections() -> Vec<SectionRecord> {
        vec![
            SectionRecord {
                header: "باقات الإنترنت".to_string(),
                content: vec![ContentBlock::Paragraph("اشترك الآن".to_string())],
            },
            SectionRecord {
                header: "Prices".to_string(),
                content: vec![
                    ContentBlock::List(vec!["Daily".to_string(), "Weekly".to_string()]),
                    ContentBlock::Table(vec![
                        vec!["Plan".to_string(), "Price".to_string()],
                        vec!["Daily".to_string(), String::new()],
                    ]),
                ],
            },
        ]
    }

    #[test]
    fn test_interchange_round_trip() {
        for section in sample_sections() {
            let text = to_interchange(&section).unwrap();
            assert_eq!(from_interchange(&text).unwrap(), section);
        }
    }

    #[test]
    fn test_interchange_keeps_non_ascii_verbatim() {
        let text = to_interchange(&sample_sections()[0]).unwrap();
        assert!(text.contains("باقات الإنترنت"));
        assert!(!text.contains("\\u"));
    }

    #[test]
    fn test_every_chunk_carries_document_metadata() {
        let metadata = Metadata::new("internet-bundles", true, "2024-06-01");
        let chunks = to_chunks(&sample_sections(), &metadata).unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.metadata == metadata));
        assert_eq!(from_interchange(&chunks[1].content).unwrap().header, "Prices");
    }

    #[test]
    fn test_malformed_interchange_is_serialization_error() {
        let err = from_interchange("{\"header\": 3}").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_json_path_for() {
        assert_eq!(
            json_path_for(Path::new("docs/offers.html")),
            PathBuf::from("docs/offers.json")
        );
    }

    #[tokio::test]
    async fn test_sections_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offers.json");
        let sections = sample_sections();

        write_sections_json(&sections, &path).await.unwrap();
        assert_eq!(read_sections_json(&path).await.unwrap(), sections);
    }
}
