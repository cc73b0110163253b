//! Content structuring: markup in, ordered section records out
//!
//! Block-level elements are visited in document order. Headings open a new
//! section, paragraphs, lists and tables become typed content blocks. A
//! per-document [`DedupSet`] keeps the same literal text from showing up both
//! as a paragraph and as a list item or table cell.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use sr_core::{ContentBlock, Error, NO_HEADER, Result, SectionRecord};

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, ul, ol, table";
const POST_SELECTOR: &str = "div.post";

/// Normalized text fragments already emitted within one document
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    /// Register a fragment; returns `false` if it was already present
    pub fn insert(&mut self, text: impl Into<String>) -> bool {
        self.seen.insert(text.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

struct Selectors {
    blocks: Selector,
    tables: Selector,
    rows: Selector,
    cells: Selector,
    posts: Selector,
    post_header: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            blocks: compile(BLOCK_SELECTOR)?,
            tables: compile("table")?,
            rows: compile("tr")?,
            cells: compile("td, th")?,
            posts: compile(POST_SELECTOR)?,
            post_header: compile("h3")?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::Parse(format!("invalid selector '{}': {:?}", selector, e)))
}

/// Collapse all descendant text of an element into one trimmed line
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Turns block elements into content blocks against one DedupSet
struct BlockCollector<'s> {
    selectors: &'s Selectors,
    dedup: DedupSet,
}

impl<'s> BlockCollector<'s> {
    /// Start a collector for `scope`, pre-registering every table cell so a
    /// paragraph is suppressed even when the table that repeats it comes later.
    fn for_scope(selectors: &'s Selectors, scope: ElementRef<'_>) -> Self {
        let mut collector = Self {
            selectors,
            dedup: DedupSet::new(),
        };
        for table in scope.select(&selectors.tables) {
            for row in collector.table_rows(table) {
                for cell in row {
                    collector.dedup.insert(cell);
                }
            }
        }
        collector
    }

    fn table_rows(&self, table: ElementRef<'_>) -> Vec<Vec<String>> {
        table
            .select(&self.selectors.rows)
            .map(|row| row.select(&self.selectors.cells).map(element_text).collect())
            .collect()
    }

    fn paragraph(&mut self, element: ElementRef<'_>) -> Option<ContentBlock> {
        let text = element_text(element);
        if text.is_empty() || !self.dedup.insert(text.clone()) {
            return None;
        }
        Some(ContentBlock::Paragraph(text))
    }

    fn list(&mut self, element: ElementRef<'_>) -> Option<ContentBlock> {
        let items: Vec<String> = element
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "li")
            .map(element_text)
            .filter(|text| !text.is_empty())
            .filter(|text| self.dedup.insert(text.clone()))
            .collect();

        if items.is_empty() {
            return None;
        }
        Some(ContentBlock::List(items))
    }

    fn table(&mut self, element: ElementRef<'_>) -> Option<ContentBlock> {
        let rows = self.table_rows(element);
        if rows.is_empty() {
            return None;
        }
        for cell in rows.iter().flatten() {
            self.dedup.insert(cell.clone());
        }
        Some(ContentBlock::Table(rows))
    }

    fn block(&mut self, element: ElementRef<'_>) -> Option<ContentBlock> {
        match element.value().name() {
            "p" => self.paragraph(element),
            "ul" | "ol" => self.list(element),
            "table" => self.table(element),
            _ => None,
        }
    }
}

/// Structure markup into sections split at every heading.
///
/// Content before the first heading goes under the "no header" sentinel.
/// Consecutive headings with nothing between them collapse to the last one,
/// and a trailing heading with no content is dropped.
pub fn structure(markup: &str) -> Result<Vec<SectionRecord>> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(markup);
    let root = document.root_element();

    let mut collector = BlockCollector::for_scope(&selectors, root);
    let mut sections = Vec::new();
    let mut current = SectionRecord::untitled();

    for element in root.select(&selectors.blocks) {
        let name = element.value().name();
        if is_heading(name) {
            let header = element_text(element);
            if current.is_empty() {
                current.header = header;
            } else {
                sections.push(std::mem::replace(&mut current, SectionRecord::new(header)));
            }
            continue;
        }

        if let Some(block) = collector.block(element) {
            current.content.push(block);
        }
    }

    if !current.is_empty() {
        sections.push(current);
    }

    debug!(
        sections = sections.len(),
        fragments = collector.dedup.len(),
        "structured markup"
    );
    Ok(sections)
}

/// Structure markup made of `<div class="post">` containers.
///
/// Each post becomes exactly one section headed by its first `h3`, with its
/// own DedupSet. Headings inside a post never split it.
pub fn structure_posts(markup: &str) -> Result<Vec<SectionRecord>> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(markup);

    let sections: Vec<SectionRecord> = document
        .select(&selectors.posts)
        .map(|post| {
            let header = post
                .select(&selectors.post_header)
                .next()
                .map(element_text)
                .unwrap_or_else(|| NO_HEADER.to_string());

            let mut collector = BlockCollector::for_scope(&selectors, post);
            let content = post
                .select(&selectors.blocks)
                .filter_map(|element| collector.block(element))
                .collect();

            SectionRecord { header, content }
        })
        .collect();

    debug!(posts = sections.len(), "structured posts");
    Ok(sections)
}

/// Read a markup file and structure it. Non-UTF-8 content is a parse error.
pub async fn structure_file(path: impl AsRef<Path>) -> Result<Vec<SectionRecord>> {
    let markup = read_markup(path.as_ref()).await?;
    structure(&markup)
}

pub(crate) async fn read_markup(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Parse(format!("{} is not valid UTF-8: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> ContentBlock {
        ContentBlock::Paragraph(text.to_string())
    }

    fn list(items: &[&str]) -> ContentBlock {
        ContentBlock::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_empty_markup_yields_no_sections() {
        assert!(structure("").unwrap().is_empty());
        assert!(structure("<html><body></body></html>").unwrap().is_empty());
    }

    #[test]
    fn test_content_without_headings_uses_sentinel() {
        let sections = structure("<p>first</p><ul><li>one</li></ul>").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, NO_HEADER);
        assert_eq!(sections[0].content, vec![paragraph("first"), list(&["one"])]);
    }

    #[test]
    fn test_trailing_empty_header_is_discarded() {
        let sections = structure("<h3>A</h3><p>x</p><h3>B</h3>").unwrap();
        assert_eq!(
            sections,
            vec![SectionRecord {
                header: "A".to_string(),
                content: vec![paragraph("x")],
            }]
        );
    }

    #[test]
    fn test_consecutive_headers_collapse_to_last() {
        let sections = structure("<h1>Title</h1><h2>Intro</h2><p>body</p>").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, "Intro");
    }

    #[test]
    fn test_sections_follow_document_order() {
        let markup = "<p>lead</p><h2>One</h2><p>a</p><h2>Two</h2><ol><li>b</li></ol>";
        let headers: Vec<String> = structure(markup)
            .unwrap()
            .into_iter()
            .map(|s| s.header)
            .collect();
        assert_eq!(headers, vec![NO_HEADER, "One", "Two"]);
    }

    #[test]
    fn test_paragraph_repeating_later_table_cell_is_dropped() {
        let markup = r#"
            <h3>Prices</h3>
            <p>Gold plan</p>
            <p>Pick the plan that suits you</p>
            <table>
                <tr><th>Plan</th><th>Price</th></tr>
                <tr><td>Gold plan</td><td>10$</td></tr>
            </table>
        "#;
        let sections = structure(markup).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(
            sections[0].content,
            vec![
                paragraph("Pick the plan that suits you"),
                ContentBlock::Table(vec![
                    vec!["Plan".to_string(), "Price".to_string()],
                    vec!["Gold plan".to_string(), "10$".to_string()],
                ]),
            ]
        );
    }

    #[test]
    fn test_table_is_kept_whole_even_when_cells_repeat() {
        let markup = "<p>Yes</p><table><tr><td>Yes</td><td>No</td></tr></table>";
        let sections = structure(markup).unwrap();
        // the paragraph is suppressed, the table keeps every cell
        assert_eq!(
            sections[0].content,
            vec![ContentBlock::Table(vec![vec!["Yes".to_string(), "No".to_string()]])]
        );
    }

    #[test]
    fn test_list_items_dedup_individually() {
        let markup = "<p>alpha</p><ul><li>alpha</li><li>beta</li></ul><ul><li>beta</li></ul>";
        let sections = structure(markup).unwrap();
        assert_eq!(sections[0].content, vec![paragraph("alpha"), list(&["beta"])]);
    }

    #[test]
    fn test_repeated_paragraph_is_emitted_once() {
        let sections = structure("<p>same</p><h2>Next</h2><p>same</p><p>other</p>").unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].content, vec![paragraph("same")]);
        assert_eq!(sections[1].content, vec![paragraph("other")]);
    }

    #[test]
    fn test_whitespace_and_inline_markup_are_normalized() {
        let sections = structure("<p>  Call   <b>1234</b>\n for help </p>").unwrap();
        assert_eq!(sections[0].content, vec![paragraph("Call 1234 for help")]);
    }

    #[test]
    fn test_empty_blocks_are_skipped() {
        let sections = structure("<p>   </p><ul><li> </li></ul><table></table>").unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn test_nested_list_visited_separately() {
        let markup = "<ul><li>Parent<ul><li>Child</li></ul></li></ul>";
        let sections = structure(markup).unwrap();
        assert_eq!(
            sections[0].content,
            vec![list(&["Parent Child"]), list(&["Child"])]
        );
    }

    #[test]
    fn test_posts_become_one_section_each() {
        let markup = r#"
            <div class="post"><h3>Roaming</h3><p>Enable roaming from the app.</p></div>
            <div class="post"><p>No title here</p><ul><li>No title here</li><li>extra</li></ul></div>
            <div class="other"><p>ignored</p></div>
        "#;
        let sections = structure_posts(markup).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header, "Roaming");
        assert_eq!(sections[0].content, vec![paragraph("Enable roaming from the app.")]);
        assert_eq!(sections[1].header, NO_HEADER);
        assert_eq!(
            sections[1].content,
            vec![paragraph("No title here"), list(&["extra"])]
        );
    }

    #[test]
    fn test_dedup_is_scoped_per_post() {
        let markup = r#"
            <div class="post"><h3>A</h3><p>shared</p></div>
            <div class="post"><h3>B</h3><p>shared</p></div>
        "#;
        let sections = structure_posts(markup).unwrap();
        assert_eq!(sections[0].content, vec![paragraph("shared")]);
        assert_eq!(sections[1].content, vec![paragraph("shared")]);
    }

    #[tokio::test]
    async fn test_structure_file_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.html");
        std::fs::write(&path, [0x3c, 0x70, 0x3e, 0xff, 0xfe]).unwrap();

        let err = structure_file(&path).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
