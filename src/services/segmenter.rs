//! Content segmentation.
//!
//! Splits a documentation page into heading-delimited chunks. Page chrome
//! (navigation, headers, footers, sidebars, scripts) is skipped, and short
//! fragments are discarded so that only substantive sections survive.

use scraper::{ElementRef, Html, Node};

use crate::models::{Chunk, SegmenterConfig};
use crate::utils::normalize_whitespace;

/// Subtrees never contributing text.
const NOISE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "template",
];

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3"];

const TEXT_TAGS: &[&str] = &["p", "li", "td"];

/// Heading given to content before the first heading.
pub const LEADING_HEADING: &str = "Overview";

/// Heading of the single chunk produced from unstructured pages.
pub const FALLBACK_HEADING: &str = "Page";

#[derive(Debug, Clone)]
pub struct Segmenter {
    /// Bodies shorter than this are dropped
    min_chunk_chars: usize,
    /// Text fragments must be longer than this
    min_text_chars: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(&SegmenterConfig::default())
    }
}

impl Segmenter {
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            min_chunk_chars: config.min_chunk_chars,
            min_text_chars: config.min_text_chars,
        }
    }

    /// Split `html` into chunks, in document order.
    ///
    /// Pages without any headings, paragraphs, list items or table cells are
    /// treated as unstructured: their visible text becomes one `"Page"` chunk.
    pub fn segment(&self, html: &str, base_url: &str) -> Vec<Chunk> {
        let document = Html::parse_document(html);
        let root = content_root(&document);

        let mut builder = ChunkBuilder::new(self.min_chunk_chars);
        self.walk(root, &mut builder);

        let chunks = if builder.saw_structure {
            builder.finish()
        } else {
            self.coarse(root)
        };

        log::debug!("Segmented {} into {} chunks", base_url, chunks.len());
        chunks
    }

    fn walk(&self, element: ElementRef, builder: &mut ChunkBuilder) {
        for child in element.children() {
            let Some(child) = ElementRef::wrap(child) else {
                continue;
            };
            let name = child.value().name();

            if NOISE_TAGS.contains(&name) {
                continue;
            }

            if HEADING_TAGS.contains(&name) {
                builder.saw_structure = true;
                builder.flush();
                let heading = visible_text(child);
                if !heading.is_empty() {
                    builder.heading = heading;
                }
            } else if TEXT_TAGS.contains(&name) {
                builder.saw_structure = true;
                // Descendants are part of this text; never collected twice.
                let text = visible_text(child);
                if text.chars().count() > self.min_text_chars {
                    builder.parts.push(text);
                }
            } else {
                self.walk(child, builder);
            }
        }
    }

    fn coarse(&self, root: ElementRef) -> Vec<Chunk> {
        let text = visible_text(root);
        if text.chars().count() >= self.min_chunk_chars {
            vec![Chunk::new(FALLBACK_HEADING, text)]
        } else {
            Vec::new()
        }
    }
}

struct ChunkBuilder {
    heading: String,
    parts: Vec<String>,
    chunks: Vec<Chunk>,
    min_chunk_chars: usize,
    saw_structure: bool,
}

impl ChunkBuilder {
    fn new(min_chunk_chars: usize) -> Self {
        Self {
            heading: LEADING_HEADING.to_string(),
            parts: Vec::new(),
            chunks: Vec::new(),
            min_chunk_chars,
            saw_structure: false,
        }
    }

    fn flush(&mut self) {
        if self.parts.is_empty() {
            return;
        }
        let body = self.parts.join(" ");
        self.parts.clear();
        if body.chars().count() >= self.min_chunk_chars {
            self.chunks.push(Chunk::new(self.heading.clone(), body));
        }
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        self.chunks
    }
}

/// First `main`, else `article`, else `body`, else the document root.
fn content_root(document: &Html) -> ElementRef<'_> {
    let root = document.root_element();
    ["main", "article", "body"]
        .iter()
        .find_map(|tag| {
            root.descendants()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == *tag)
        })
        .unwrap_or(root)
}

/// Whitespace-normalized text of an element, skipping noise subtrees.
fn visible_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    normalize_whitespace(&raw)
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Node::Text(text) = child.value() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child) = ElementRef::wrap(child) {
            if !NOISE_TAGS.contains(&child.value().name()) {
                collect_text(child, out);
            }
        }
    }
}
