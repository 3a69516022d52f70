//! Markdown parsing module.
//!
//! Parses markdown text into the structure the viewer and the section
//! tracker work from:
//! - a flat list of top-level content blocks with their line ranges
//! - every heading with its level, text, line and deduplicated anchor id
//! - inline link spans inside each block

use std::collections::HashMap;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The kind of a top-level content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    CodeBlock,
    List,
    BlockQuote,
    ThematicBreak,
    HtmlBlock,
    Table,
}

/// A link whose text appears inline within a [`ContentBlock`]'s content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineLink {
    /// Byte offset of the link text start within `ContentBlock::content`.
    pub start: usize,
    /// Byte offset of the link text end (exclusive) within `ContentBlock::content`.
    pub end: usize,
    /// Destination URL.
    pub url: String,
}

/// A top-level content block in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// 1-based starting line number.
    pub line_start: usize,
    /// 1-based ending line number (inclusive).
    pub line_end: usize,
    /// Flattened text content of the block.
    pub content: String,
    /// Links whose text appears within `content`, with byte offsets.
    pub inline_links: Vec<InlineLink>,
    /// Anchor id, set for heading blocks only.
    pub anchor_id: Option<String>,
}

/// A heading extracted from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Heading level (1–6).
    pub level: u8,
    /// Flattened text content of the heading.
    pub text: String,
    /// 1-based line number where the heading appears.
    pub line: usize,
    /// URL-safe anchor id, unique within the document.
    ///
    /// The first occurrence of a slug is bare (`setup`); later ones get a
    /// numeric suffix (`setup-1`, `setup-2`).
    pub anchor_id: String,
    /// False for headings nested inside quotes or list items.
    pub top_level: bool,
}

/// The fully parsed representation of a markdown document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub blocks: Vec<ContentBlock>,
    pub headings: Vec<Heading>,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Maps byte offsets into a source string to 1-based line numbers.
struct LineIndex {
    /// Byte offsets of each `\n` character in the source.
    newline_offsets: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let newline_offsets = source
            .bytes()
            .enumerate()
            .filter_map(|(i, b)| if b == b'\n' { Some(i) } else { None })
            .collect();
        Self { newline_offsets }
    }

    /// Convert a byte offset to a 1-based line number.
    fn line_at(&self, offset: usize) -> usize {
        match self.newline_offsets.binary_search(&offset) {
            Ok(idx) | Err(idx) => idx + 1,
        }
    }
}

/// Hands out anchor ids, suffixing repeated slugs.
#[derive(Default)]
struct AnchorAllocator {
    seen: HashMap<String, usize>,
}

impl AnchorAllocator {
    fn allocate(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.seen.entry(base.clone()).or_insert(0);
        let anchor = if *count == 0 {
            base
        } else {
            format!("{base}-{count}")
        };
        *count += 1;
        anchor
    }
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Returns `true` for block-level tags (as opposed to inline spans).
fn is_block_level(tag: &Tag) -> bool {
    !matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn is_block_level_end(tag: &TagEnd) -> bool {
    !matches!(
        tag,
        TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
    )
}

/// Map a *top-level* block tag to its [`BlockKind`].
///
/// Returns `None` for block tags that only appear nested (e.g. `Item`,
/// `TableRow`) and for types we intentionally skip (e.g. metadata blocks).
fn tag_to_block_kind(tag: &Tag) -> Option<BlockKind> {
    match tag {
        Tag::Paragraph => Some(BlockKind::Paragraph),
        Tag::Heading { level, .. } => Some(BlockKind::Heading(heading_level_to_u8(level))),
        Tag::CodeBlock(_) => Some(BlockKind::CodeBlock),
        Tag::BlockQuote(..) => Some(BlockKind::BlockQuote),
        Tag::List(_) => Some(BlockKind::List),
        Tag::Table(_) => Some(BlockKind::Table),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Convert heading text to a URL-safe anchor slug.
///
/// Lowercases the text, maps spaces/hyphens/underscores to `-`, drops every
/// other non-alphanumeric character, collapses repeated hyphens and trims
/// them from both ends.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if matches!(c, ' ' | '-' | '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_owned()
}

/// Parse a markdown source string into a [`ParsedDocument`].
pub fn parse(source: &str) -> ParsedDocument {
    let line_index = LineIndex::new(source);

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(source, options);

    let mut blocks: Vec<ContentBlock> = Vec::new();
    let mut headings: Vec<Heading> = Vec::new();
    let mut anchors = AnchorAllocator::default();

    // Block tracking
    let mut block_depth: usize = 0;
    let mut current_block: Option<(BlockKind, usize)> = None; // (kind, start_offset)
    let mut text_buf = String::new();

    // Heading tracking: (level, line, top_level)
    let mut in_heading: Option<(u8, usize, bool)> = None;
    let mut heading_text_buf = String::new();
    let mut block_anchor: Option<String> = None;

    // Inline link tracking (byte offsets within current block's text_buf)
    let mut in_link: Option<(String, usize)> = None; // (url, content start)
    let mut block_inline_links: Vec<InlineLink> = Vec::new();

    for (event, range) in parser.into_offset_iter() {
        match &event {
            Event::Start(tag) => {
                if is_block_level(tag) {
                    if block_depth == 0 {
                        if let Some(kind) = tag_to_block_kind(tag) {
                            current_block = Some((kind, range.start));
                            text_buf.clear();
                        }
                    }
                    // Newlines between list items / table rows keep the
                    // flattened content line-oriented.
                    if block_depth >= 1
                        && matches!(tag, Tag::Item | Tag::TableRow)
                        && !text_buf.is_empty()
                        && !text_buf.ends_with('\n')
                    {
                        text_buf.push('\n');
                    }
                    block_depth += 1;
                }

                match tag {
                    Tag::Heading { level, .. } => {
                        // block_depth already counts the heading itself.
                        let top_level = block_depth == 1;
                        in_heading = Some((
                            heading_level_to_u8(level),
                            line_index.line_at(range.start),
                            top_level,
                        ));
                        heading_text_buf.clear();
                    }
                    Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                        in_link = Some((dest_url.to_string(), text_buf.len()));
                    }
                    _ => {}
                }
            }

            Event::End(tag_end) => {
                // Finalize heading before the block closes so the block can
                // carry its anchor.
                if let TagEnd::Heading(_) = tag_end {
                    if let Some((level, line, top_level)) = in_heading.take() {
                        let anchor_id = anchors.allocate(&heading_text_buf);
                        if top_level {
                            block_anchor = Some(anchor_id.clone());
                        }
                        headings.push(Heading {
                            level,
                            text: std::mem::take(&mut heading_text_buf),
                            line,
                            anchor_id,
                            top_level,
                        });
                    }
                }

                if is_block_level_end(tag_end) {
                    block_depth = block_depth.saturating_sub(1);
                    if block_depth == 0 {
                        if let Some((kind, start_offset)) = current_block.take() {
                            let start_line = line_index.line_at(start_offset);
                            let end_line = line_index
                                .line_at(range.end.saturating_sub(1).max(start_offset));
                            blocks.push(ContentBlock {
                                kind,
                                line_start: start_line,
                                line_end: end_line,
                                content: text_buf.clone(),
                                inline_links: std::mem::take(&mut block_inline_links),
                                anchor_id: block_anchor.take(),
                            });
                        }
                        text_buf.clear();
                    }
                }

                if matches!(tag_end, TagEnd::Link | TagEnd::Image) {
                    if let Some((url, start)) = in_link.take() {
                        if block_depth > 0 {
                            block_inline_links.push(InlineLink {
                                start,
                                end: text_buf.len(),
                                url,
                            });
                        }
                    }
                }
            }

            Event::Text(text) | Event::Code(text) => {
                text_buf.push_str(text);
                if in_heading.is_some() {
                    heading_text_buf.push_str(text);
                }
            }

            Event::SoftBreak | Event::HardBreak => {
                text_buf.push('\n');
                if in_heading.is_some() {
                    heading_text_buf.push(' ');
                }
            }

            Event::Html(html) => {
                if block_depth == 0 {
                    blocks.push(ContentBlock {
                        kind: BlockKind::HtmlBlock,
                        line_start: line_index.line_at(range.start),
                        line_end: line_index
                            .line_at(range.end.saturating_sub(1).max(range.start)),
                        content: html.to_string(),
                        inline_links: Vec::new(),
                        anchor_id: None,
                    });
                } else {
                    text_buf.push_str(html);
                }
            }

            Event::InlineHtml(html) => {
                text_buf.push_str(html);
            }

            Event::Rule => {
                let line = line_index.line_at(range.start);
                blocks.push(ContentBlock {
                    kind: BlockKind::ThematicBreak,
                    line_start: line,
                    line_end: line,
                    content: String::new(),
                    inline_links: Vec::new(),
                    anchor_id: None,
                });
            }

            _ => {}
        }
    }

    ParsedDocument { blocks, headings }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document() {
        let doc = parse("");
        assert!(doc.blocks.is_empty());
        assert!(doc.headings.is_empty());
    }

    #[test]
    fn headings_extracted_with_anchors() {
        let src = "# Title\n\nBody\n\n## Getting Started\n\nMore\n\n### Sub_section\n";
        let doc = parse(src);

        assert_eq!(doc.headings.len(), 3);

        assert_eq!(doc.headings[0].level, 1);
        assert_eq!(doc.headings[0].text, "Title");
        assert_eq!(doc.headings[0].line, 1);
        assert_eq!(doc.headings[0].anchor_id, "title");

        assert_eq!(doc.headings[1].level, 2);
        assert_eq!(doc.headings[1].line, 5);
        assert_eq!(doc.headings[1].anchor_id, "getting-started");

        assert_eq!(doc.headings[2].level, 3);
        assert_eq!(doc.headings[2].line, 9);
        assert_eq!(doc.headings[2].anchor_id, "sub-section");
        assert!(doc.headings.iter().all(|h| h.top_level));
    }

    #[test]
    fn heading_blocks_carry_anchor() {
        let doc = parse("# Heading\n\nParagraph\n");
        assert_eq!(doc.blocks[0].kind, BlockKind::Heading(1));
        assert_eq!(doc.blocks[0].anchor_id.as_deref(), Some("heading"));
        assert_eq!(doc.blocks[1].kind, BlockKind::Paragraph);
        assert_eq!(doc.blocks[1].anchor_id, None);
    }

    #[test]
    fn duplicate_headings_get_sequential_anchors() {
        let doc = parse("# Foo\n\n## Foo\n\n### Foo\n");
        let anchors: Vec<&str> = doc.headings.iter().map(|h| h.anchor_id.as_str()).collect();
        assert_eq!(anchors, ["foo", "foo-1", "foo-2"]);
    }

    #[test]
    fn nested_heading_is_not_top_level() {
        let doc = parse("# Top\n\n> ## Quoted\n");
        assert_eq!(doc.headings.len(), 2);
        assert!(doc.headings[0].top_level);
        assert!(!doc.headings[1].top_level);
        let quote = doc
            .blocks
            .iter()
            .find(|b| b.kind == BlockKind::BlockQuote)
            .unwrap();
        assert_eq!(quote.anchor_id, None);
    }

    #[test]
    fn inline_code_in_heading_is_part_of_text() {
        let doc = parse("## The `init` call\n");
        assert_eq!(doc.headings[0].text, "The init call");
        assert_eq!(doc.headings[0].anchor_id, "the-init-call");
    }

    #[test]
    fn slugify_drops_punctuation_and_collapses_hyphens() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  a -- b  "), "a-b");
        assert_eq!(slugify("Ünïcode Títle"), "ünïcode-títle");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn inline_links_recorded_with_offsets() {
        let src = "See [setup](#setup) and [docs](https://example.com).\n";
        let doc = parse(src);

        assert_eq!(doc.blocks.len(), 1);
        let block = &doc.blocks[0];
        assert_eq!(block.inline_links.len(), 2);
        let first = &block.inline_links[0];
        assert_eq!(&block.content[first.start..first.end], "setup");
        assert_eq!(first.url, "#setup");
        assert_eq!(block.inline_links[1].url, "https://example.com");
    }

    #[test]
    fn code_block_content() {
        let src = "```rust\nfn main() {}\n```\n";
        let doc = parse(src);

        let code: Vec<&ContentBlock> = doc
            .blocks
            .iter()
            .filter(|b| b.kind == BlockKind::CodeBlock)
            .collect();
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].content, "fn main() {}\n");
    }

    #[test]
    fn list_items_are_line_separated() {
        let doc = parse("- alpha\n- beta\n- gamma\n");
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].kind, BlockKind::List);
        assert_eq!(doc.blocks[0].content.lines().count(), 3);
    }

    #[test]
    fn mixed_document() {
        let src = "\
# Introduction

Welcome to **mdtoc**.

## Features

- Fast [rendering](#rendering)
- Keyboard navigation

```bash
mdtoc README.md
```

---

> Note: still in development.
";
        let doc = parse(src);

        assert_eq!(doc.headings.len(), 2);
        assert_eq!(doc.headings[0].text, "Introduction");
        assert_eq!(doc.headings[1].text, "Features");

        let kinds: Vec<&BlockKind> = doc.blocks.iter().map(|b| &b.kind).collect();
        assert!(kinds.contains(&&BlockKind::Heading(1)));
        assert!(kinds.contains(&&BlockKind::Heading(2)));
        assert!(kinds.contains(&&BlockKind::Paragraph));
        assert!(kinds.contains(&&BlockKind::List));
        assert!(kinds.contains(&&BlockKind::CodeBlock));
        assert!(kinds.contains(&&BlockKind::ThematicBreak));
        assert!(kinds.contains(&&BlockKind::BlockQuote));

        let list = doc.blocks.iter().find(|b| b.kind == BlockKind::List).unwrap();
        assert_eq!(list.inline_links[0].url, "#rendering");
    }

    #[test]
    fn line_ranges_increase() {
        let src = "# A\n\nPara 1\n\n## B\n\nPara 2\n";
        let doc = parse(src);

        for window in doc.blocks.windows(2) {
            assert!(
                window[0].line_start <= window[1].line_start,
                "blocks should appear in source order"
            );
        }
    }
}
