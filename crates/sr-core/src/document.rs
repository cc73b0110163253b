//! Document data model: structured sections, metadata and indexable chunks

use serde::{Deserialize, Serialize};

/// Header assigned to content that appears before any heading
pub const NO_HEADER: &str = "No header";

/// A typed block of content inside a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum ContentBlock {
    Paragraph(String),
    List(Vec<String>),
    /// Rows of cell text, in document order
    Table(Vec<Vec<String>>),
}

impl ContentBlock {
    /// Short name of the block kind, matching the interchange `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Paragraph(_) => "paragraph",
            ContentBlock::List(_) => "list",
            ContentBlock::Table(_) => "table",
        }
    }
}

/// A header plus the content blocks that follow it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub header: String,
    #[serde(rename = "text")]
    pub content: Vec<ContentBlock>,
}

impl SectionRecord {
    /// Create an empty section with the given header
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            content: Vec::new(),
        }
    }

    /// Create an empty section carrying the "no header" sentinel
    pub fn untitled() -> Self {
        Self::new(NO_HEADER)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Caller-supplied metadata attached to every chunk of one source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub active: bool,
    pub date: String,
}

impl Metadata {
    pub fn new(name: impl Into<String>, active: bool, date: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active,
            date: date.into(),
        }
    }
}

/// One indexable unit: a serialized section plus its document metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Interchange form of one `SectionRecord`
    pub content: String,
    pub metadata: Metadata,
}
