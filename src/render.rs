//! Markdown rendering module.
//!
//! Converts a [`ParsedDocument`] into styled ratatui [`Text`] for the content
//! pane, and records where headings and links ended up so the tracker and
//! the link focus can reason about rendered rows.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

use crate::geometry::{coord, offset_between, Rect, Viewport};
use crate::parse::{BlockKind, ContentBlock, InlineLink, ParsedDocument};
use crate::tracker::{Heading, TrackedSet, ViewportGeometry};

/// Where a heading landed in the rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingPosition {
    pub level: u8,
    pub text: String,
    pub anchor_id: String,
    /// 0-based index of the heading's first rendered line.
    pub rendered_line: usize,
    /// Number of rendered lines the heading occupies.
    pub height: usize,
    /// Display width of the heading's widest line, in cells.
    pub width: usize,
}

impl HeadingPosition {
    /// Bounding box relative to a content pane scrolled to `scroll_offset`.
    pub fn bounding_rect(&self, scroll_offset: usize) -> Rect {
        let top = offset_between(scroll_offset, self.rendered_line);
        Rect::new(
            top,
            0,
            top.saturating_add(coord(self.height)),
            coord(self.width),
        )
    }
}

/// Where a link landed in the rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPosition {
    /// 0-based rendered line index.
    pub rendered_line: usize,
    /// Display column where the link text starts.
    pub column_start: usize,
    /// Display column where the link text ends (exclusive).
    pub column_end: usize,
    pub url: String,
}

/// Rendered document plus row metadata.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub text: Text<'static>,
    pub heading_lines: Vec<HeadingPosition>,
    pub link_positions: Vec<LinkPosition>,
}

impl RenderedDocument {
    /// Rendered line of the heading whose anchor is `fragment`.
    ///
    /// A leading `#` is ignored, so both `setup` and `#setup` work.
    pub fn heading_line_for(&self, fragment: &str) -> Option<usize> {
        let id = fragment.strip_prefix('#').unwrap_or(fragment);
        self.heading_lines
            .iter()
            .find(|h| h.anchor_id == id)
            .map(|h| h.rendered_line)
    }

    /// Collect the trackable headings; element handles index `heading_lines`.
    pub fn tracked_headings(&self) -> TrackedSet {
        TrackedSet::collect(
            self.heading_lines
                .iter()
                .enumerate()
                .map(|(i, h)| (i, h.anchor_id.as_str(), h.level)),
        )
    }
}

/// The content pane as seen by the tracker and the observer.
pub struct ContentGeometry<'a> {
    pub headings: &'a [HeadingPosition],
    pub scroll_offset: usize,
    pub viewport: Viewport,
}

impl ViewportGeometry for ContentGeometry<'_> {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn bounding_rect(&self, heading: &Heading) -> Rect {
        self.headings[heading.element()].bounding_rect(self.scroll_offset)
    }
}

/// Convert a parsed markdown document into a [`RenderedDocument`].
///
/// The caller is responsible for clipping to the viewport height.
pub fn render_document(doc: &ParsedDocument) -> RenderedDocument {
    let mut out = Output::default();

    for (i, block) in doc.blocks.iter().enumerate() {
        if i > 0 {
            // Blank line between blocks
            out.lines.push(Line::default());
        }
        render_block(block, &mut out);
    }

    RenderedDocument {
        text: Text::from(out.lines),
        heading_lines: out.headings,
        link_positions: out.links,
    }
}

#[derive(Default)]
struct Output {
    lines: Vec<Line<'static>>,
    headings: Vec<HeadingPosition>,
    links: Vec<LinkPosition>,
}

fn render_block(block: &ContentBlock, out: &mut Output) {
    match &block.kind {
        BlockKind::Heading(level) => render_heading(*level, block, out),
        BlockKind::Paragraph => render_paragraph(block, out),
        BlockKind::CodeBlock => render_code_block(&block.content, out),
        BlockKind::List => render_list(block, out),
        BlockKind::BlockQuote => render_block_quote(&block.content, out),
        BlockKind::ThematicBreak => render_thematic_break(out),
        BlockKind::HtmlBlock => render_plain(&block.content, out),
        BlockKind::Table => render_table(&block.content, out),
    }
}

pub fn heading_style(level: u8) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        1 => base.fg(Color::Magenta),
        2 => base.fg(Color::Cyan),
        3 => base.fg(Color::Green),
        4 => base.fg(Color::Yellow),
        _ => base.fg(Color::White),
    }
}

fn heading_prefix(level: u8) -> String {
    format!("{} ", "#".repeat(level.clamp(1, 6) as usize))
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::UNDERLINED)
}

fn render_heading(level: u8, block: &ContentBlock, out: &mut Output) {
    let style = heading_style(level);
    let prefix = heading_prefix(level);
    let first = out.lines.len();
    let mut width = 0;
    for text_line in block.content.lines() {
        let line = Line::from(Span::styled(format!("{prefix}{text_line}"), style));
        width = width.max(line.width());
        out.lines.push(line);
    }
    if let Some(anchor_id) = &block.anchor_id {
        out.headings.push(HeadingPosition {
            level,
            text: block.content.lines().collect::<Vec<_>>().join(" "),
            anchor_id: anchor_id.clone(),
            rendered_line: first,
            height: out.lines.len() - first,
            width,
        });
    }
}

fn render_paragraph(block: &ContentBlock, out: &mut Output) {
    for (start, end) in line_ranges(&block.content) {
        render_linked_line(block, start, end, Vec::new(), out);
    }
}

fn render_plain(content: &str, out: &mut Output) {
    for text_line in content.lines() {
        out.lines.push(Line::from(Span::raw(text_line.to_owned())));
    }
}

fn render_code_block(content: &str, out: &mut Output) {
    let border_style = Style::default().fg(Color::DarkGray);
    let code_style = Style::default().fg(Color::Green).bg(Color::Black);

    out.lines.push(Line::from(Span::styled("┌───", border_style)));
    for text_line in content.lines() {
        out.lines.push(Line::from(vec![
            Span::styled("│ ", border_style),
            Span::styled(text_line.to_owned(), code_style),
        ]));
    }
    out.lines.push(Line::from(Span::styled("└───", border_style)));
}

fn render_list(block: &ContentBlock, out: &mut Output) {
    let bullet_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    for (start, end) in line_ranges(&block.content) {
        let raw = &block.content[start..end];
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lead = raw.len() - raw.trim_start().len();
        let start = start + lead;
        let end = start + trimmed.len();
        render_linked_line(
            block,
            start,
            end,
            vec![Span::styled("  • ", bullet_style)],
            out,
        );
    }
}

fn render_block_quote(content: &str, out: &mut Output) {
    let bar_style = Style::default().fg(Color::DarkGray);
    let text_style = Style::default().add_modifier(Modifier::ITALIC).fg(Color::Gray);
    for text_line in content.lines() {
        out.lines.push(Line::from(vec![
            Span::styled("  ▌ ", bar_style),
            Span::styled(text_line.to_owned(), text_style),
        ]));
    }
}

fn render_thematic_break(out: &mut Output) {
    let style = Style::default().fg(Color::DarkGray);
    out.lines.push(Line::from(Span::styled("─".repeat(40), style)));
}

fn render_table(content: &str, out: &mut Output) {
    let style = Style::default().fg(Color::White);
    for text_line in content.lines() {
        let trimmed = text_line.trim();
        if !trimmed.is_empty() {
            out.lines
                .push(Line::from(Span::styled(format!("  {trimmed}"), style)));
        }
    }
}

/// Byte ranges of each line in `content`, without the newline.
fn line_ranges(content: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for line in content.split('\n') {
        let end = start + line.len();
        if !(line.is_empty() && end == content.len()) {
            ranges.push((start, end));
        }
        start = end + 1;
    }
    ranges
}

/// Push one line covering `content[start..end]`, styling and recording the
/// links that fall inside it.
fn render_linked_line(
    block: &ContentBlock,
    start: usize,
    end: usize,
    mut spans: Vec<Span<'static>>,
    out: &mut Output,
) {
    let rendered_line = out.lines.len();
    let mut column: usize = spans.iter().map(|s| s.width()).sum();
    let mut cursor = start;

    let links = block
        .inline_links
        .iter()
        .filter(|l| l.start >= start && l.end <= end && l.start < l.end);
    for InlineLink {
        start: link_start,
        end: link_end,
        url,
    } in links
    {
        if *link_start > cursor {
            let plain = Span::raw(block.content[cursor..*link_start].to_owned());
            column += plain.width();
            spans.push(plain);
        }
        let linked = Span::styled(block.content[*link_start..*link_end].to_owned(), link_style());
        let width = linked.width();
        out.links.push(LinkPosition {
            rendered_line,
            column_start: column,
            column_end: column + width,
            url: url.clone(),
        });
        column += width;
        spans.push(linked);
        cursor = *link_end;
    }
    if cursor < end {
        spans.push(Span::raw(block.content[cursor..end].to_owned()));
    }
    out.lines.push(Line::from(spans));
}
