//! The overview (table of contents) pane.
//!
//! Entries are rendered independently of the tracked headings: the pane
//! only lists headings up to a configurable depth and can be narrowed by a
//! filter, so some tracked headings have no entry of their own and are
//! highlighted through their nearest listed ancestor.

use clap::ValueEnum;

use crate::geometry::coord;
use crate::render::HeadingPosition;
use crate::tracker::OverviewContainer;

/// How entries reference their heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MenuStyle {
    /// Plain anchor links (`href="#id"`).
    Anchors,
    /// Tab-style menu entries (`data-target="#id"`).
    Tabs,
}

/// Link target of an overview entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryTarget {
    Href(String),
    DataTarget(String),
}

impl MenuStyle {
    pub fn name(self) -> &'static str {
        match self {
            Self::Anchors => "anchors",
            Self::Tabs => "tabs",
        }
    }
}

impl EntryTarget {
    pub fn fragment(&self) -> &str {
        match self {
            Self::Href(id) | Self::DataTarget(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewEntry {
    pub level: u8,
    pub text: String,
    pub target: EntryTarget,
    pub active: bool,
}

/// Which headings the pane lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewOptions {
    /// Deepest heading level listed (1–3).
    pub depth: u8,
    pub style: MenuStyle,
    /// Whitespace-separated words that must all occur in an entry's text.
    pub filter: String,
}

impl Default for OverviewOptions {
    fn default() -> Self {
        Self {
            depth: 2,
            style: MenuStyle::Anchors,
            filter: String::new(),
        }
    }
}

/// Rendered overview list with its own scroll position.
#[derive(Debug, Clone, Default)]
pub struct OverviewPane {
    entries: Vec<OverviewEntry>,
    scroll_top: usize,
    height: usize,
}

impl OverviewPane {
    pub fn build(headings: &[HeadingPosition], options: &OverviewOptions) -> Self {
        let entries = headings
            .iter()
            .filter(|h| h.level <= options.depth)
            .filter(|h| matches_filter(&h.text, &options.filter))
            .map(|h| OverviewEntry {
                level: h.level,
                text: h.text.clone(),
                target: match options.style {
                    MenuStyle::Anchors => EntryTarget::Href(h.anchor_id.clone()),
                    MenuStyle::Tabs => EntryTarget::DataTarget(h.anchor_id.clone()),
                },
                active: false,
            })
            .collect();
        Self {
            entries,
            scroll_top: 0,
            height: 0,
        }
    }

    pub fn entries(&self) -> &[OverviewEntry] {
        &self.entries
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    /// Indices of the active entries, top to bottom.
    pub fn active_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.active)
            .map(|(i, _)| i)
            .collect()
    }

    /// Record the number of visible rows and re-clamp the scroll position.
    pub fn set_height(&mut self, height: usize) {
        self.height = height;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    /// Scroll just enough to show entry `index`.
    pub fn reveal(&mut self, index: usize) {
        if index < self.scroll_top {
            self.scroll_top = index;
        } else if self.height > 0 && index >= self.scroll_top + self.height {
            self.scroll_top = (index + 1 - self.height).min(self.max_scroll());
        }
    }

    fn max_scroll(&self) -> usize {
        self.entries.len().saturating_sub(self.height)
    }
}

impl OverviewContainer for OverviewPane {
    type Entry = usize;

    fn lookup(&self, id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(&e.target, EntryTarget::DataTarget(t) if t == id))
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|e| matches!(&e.target, EntryTarget::Href(t) if t == id))
            })
    }

    fn set_active(&mut self, entry: usize, active: bool) {
        if let Some(e) = self.entries.get_mut(entry) {
            e.active = active;
        }
    }

    fn offset_top(&self, entry: usize) -> i32 {
        coord(entry)
    }

    fn scroll_to(&mut self, top: i32) {
        self.scroll_top = usize::try_from(top).unwrap_or(0).min(self.max_scroll());
    }
}

/// True when every whitespace-separated word of `query` occurs in
/// `subject`, ignoring case. An empty query matches everything.
pub fn matches_filter(subject: &str, query: &str) -> bool {
    let subject = subject.to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .all(|word| subject.contains(word))
}
