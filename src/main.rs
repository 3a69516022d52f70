mod geometry;
mod observer;
mod overview;
mod parse;
mod render;
mod trace;
mod tracker;

use std::{fs, io, path::Path, process};

use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    DefaultTerminal, Frame,
};

use geometry::Viewport;
use observer::VisibilityObserver;
use overview::{MenuStyle, OverviewOptions, OverviewPane};
use render::{ContentGeometry, HeadingPosition, RenderedDocument};
use trace::TraceOptions;
use tracker::{HeadingRank, SectionTracker, TrackedSet, TrackerOptions};

/// Contents rows kept above the active entry when the sidebar scrolls.
const TERMINAL_LOOKAHEAD: i32 = 3;

/// Width of the contents sidebar, borders included.
const SIDEBAR_WIDTH: u16 = 32;

/// Options shared by every command that builds a table of contents.
#[derive(Args, Clone)]
struct TocArgs {
    /// Deepest heading level listed in the table of contents
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=3))]
    toc_depth: u8,
    /// How contents entries reference their headings
    #[arg(long, value_enum, default_value_t = MenuStyle::Anchors)]
    menu_style: MenuStyle,
    /// Rows kept above the active entry when the contents scroll
    #[arg(long, default_value_t = TERMINAL_LOOKAHEAD, allow_negative_numbers = true)]
    lookahead: i32,
}

impl TocArgs {
    fn overview_options(&self) -> OverviewOptions {
        OverviewOptions {
            depth: self.toc_depth,
            style: self.menu_style,
            filter: String::new(),
        }
    }

    fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            lookahead: self.lookahead,
            ..TrackerOptions::default()
        }
    }
}

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// View a markdown file with a live table of contents (equivalent to legacy positional form)
    View {
        /// Path to the markdown file
        file: String,
        /// Heading anchor to jump to on load (with or without '#')
        #[arg(long)]
        anchor: Option<String>,
        /// Start with the contents sidebar hidden
        #[arg(long)]
        no_toc: bool,
        #[command(flatten)]
        toc: TocArgs,
    },
    /// Print which contents entries are active at each scroll offset
    Trace {
        /// Path to the markdown file
        file: String,
        /// Viewport height in rows
        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u16).range(1..))]
        height: u16,
        /// Viewport width in columns
        #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u16).range(1..))]
        width: u16,
        /// Scroll offset to visit; repeat for several steps (default: one per page)
        #[arg(long = "offset")]
        offsets: Vec<usize>,
        /// Print one JSON object per step
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        toc: TocArgs,
    },
}

/// Full CLI with explicit subcommands.
#[derive(Parser)]
#[command(
    name = "mdtoc",
    version,
    about = "A markdown viewer with a scroll-tracking table of contents",
    after_help = "INVOCATION FORMS:\n  mdtoc <file>                     View file in TUI mode (legacy)\n  mdtoc view [OPTIONS] <file>      View file in TUI mode\n  mdtoc trace [OPTIONS] <file>     Trace active contents entries headlessly"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Legacy positional form: mdtoc <file>
#[derive(Parser)]
#[command(
    name = "mdtoc",
    version,
    about = "A markdown viewer with a scroll-tracking table of contents"
)]
struct LegacyCli {
    /// Path to a markdown file to view
    file: String,
}

/// Everything the viewer needs besides the document itself.
struct ViewSettings {
    overview: OverviewOptions,
    tracker: TrackerOptions,
    anchor: Option<String>,
    show_toc: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            overview: OverviewOptions::default(),
            tracker: TrackerOptions {
                lookahead: TERMINAL_LOOKAHEAD,
                ..TrackerOptions::default()
            },
            anchor: None,
            show_toc: true,
        }
    }
}

/// Resolved dispatch mode after CLI argument parsing.
enum DispatchMode {
    Legacy {
        file: String,
    },
    View {
        file: String,
        settings: ViewSettings,
    },
    Trace {
        file: String,
        options: TraceOptions,
        json: bool,
    },
}

/// Keyboard focus inside the contents sidebar.
struct TocFocus {
    /// Index of the selected entry.
    selected: usize,
}

/// State for the help/shortcuts modal overlay.
struct HelpState {
    /// Current filter string for narrowing displayed shortcuts.
    filter: String,
    /// Scroll offset within the help modal content.
    scroll_offset: usize,
}

/// A single keyboard shortcut entry.
struct ShortcutEntry {
    key: &'static str,
    description: &'static str,
}

/// A group of related shortcuts.
struct ShortcutCategory {
    name: &'static str,
    entries: Vec<ShortcutEntry>,
}

/// Build the complete list of shortcut categories.
fn shortcut_categories() -> Vec<ShortcutCategory> {
    vec![
        ShortcutCategory {
            name: "Navigation",
            entries: vec![
                ShortcutEntry {
                    key: "j / \u{2193}",
                    description: "Scroll down one line",
                },
                ShortcutEntry {
                    key: "k / \u{2191}",
                    description: "Scroll up one line",
                },
                ShortcutEntry {
                    key: "Ctrl-d / PgDn",
                    description: "Scroll down half page",
                },
                ShortcutEntry {
                    key: "Ctrl-u / PgUp",
                    description: "Scroll up half page",
                },
                ShortcutEntry {
                    key: "g / Home",
                    description: "Jump to top",
                },
                ShortcutEntry {
                    key: "G / End",
                    description: "Jump to bottom",
                },
                ShortcutEntry {
                    key: "n",
                    description: "Next heading",
                },
                ShortcutEntry {
                    key: "p",
                    description: "Previous heading",
                },
            ],
        },
        ShortcutCategory {
            name: "Contents",
            entries: vec![
                ShortcutEntry {
                    key: "t",
                    description: "Show or hide contents",
                },
                ShortcutEntry {
                    key: "o",
                    description: "Focus contents",
                },
                ShortcutEntry {
                    key: "j / k",
                    description: "Select entry (while focused)",
                },
                ShortcutEntry {
                    key: "Enter",
                    description: "Jump to selected entry",
                },
                ShortcutEntry {
                    key: "/",
                    description: "Filter contents",
                },
            ],
        },
        ShortcutCategory {
            name: "Links",
            entries: vec![
                ShortcutEntry {
                    key: "Tab",
                    description: "Next link",
                },
                ShortcutEntry {
                    key: "Shift-Tab",
                    description: "Previous link",
                },
                ShortcutEntry {
                    key: "Enter",
                    description: "Follow #fragment link",
                },
            ],
        },
        ShortcutCategory {
            name: "General",
            entries: vec![
                ShortcutEntry {
                    key: "?",
                    description: "Toggle this help",
                },
                ShortcutEntry {
                    key: "q",
                    description: "Quit",
                },
                ShortcutEntry {
                    key: "Esc",
                    description: "Clear link focus or contents filter",
                },
            ],
        },
    ]
}

fn resolve_dispatch_mode() -> DispatchMode {
    match Cli::try_parse() {
        Ok(cli) => match cli.command {
            Commands::View {
                file,
                anchor,
                no_toc,
                toc,
            } => DispatchMode::View {
                file,
                settings: ViewSettings {
                    overview: toc.overview_options(),
                    tracker: toc.tracker_options(),
                    anchor,
                    show_toc: !no_toc,
                },
            },
            Commands::Trace {
                file,
                height,
                width,
                offsets,
                json,
                toc,
            } => DispatchMode::Trace {
                file,
                options: TraceOptions {
                    width: usize::from(width),
                    height: usize::from(height),
                    offsets,
                    overview: toc.overview_options(),
                    tracker: toc.tracker_options(),
                },
                json,
            },
        },
        Err(clap_err) => {
            // Pass --help, --version, and subcommand-level help through to the full Cli handler.
            use clap::error::ErrorKind;
            if matches!(
                clap_err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                clap_err.exit();
            }
            // Fall back to legacy positional parse: mdtoc <file>
            match LegacyCli::try_parse() {
                Ok(legacy) => DispatchMode::Legacy { file: legacy.file },
                Err(legacy_err) => legacy_err.exit(),
            }
        }
    }
}

fn main() -> io::Result<()> {
    match resolve_dispatch_mode() {
        DispatchMode::Legacy { file } => {
            eprintln!("[legacy] TUI viewer dispatched for: {file}");
            run_tui_file(&file, ViewSettings::default())
        }
        DispatchMode::View { file, settings } => {
            eprintln!("[view] TUI viewer dispatched for: {file}");
            run_tui_file(&file, settings)
        }
        DispatchMode::Trace {
            file,
            options,
            json,
        } => {
            eprintln!(
                "[trace] file={file} height={} width={} offsets={}",
                options.height,
                options.width,
                options.offsets.len()
            );
            let source = read_markdown_or_exit(&file);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            trace::write_trace(&mut out, &source, &options, json)
        }
    }
}

/// Read a markdown file, or report why not and exit with status 1.
fn read_markdown_or_exit(file_arg: &str) -> String {
    let path = Path::new(file_arg);

    // Check the file extension before attempting to read.
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown" | "mdx" | "mdown" | "mkd" | "mkdn") => {}
        Some(ext) => {
            eprintln!("Error: '{ext}' is not a recognized markdown extension.");
            eprintln!("Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn).");
            process::exit(1);
        }
        None => {
            eprintln!("Error: '{file_arg}' has no file extension.");
            eprintln!("Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn).");
            process::exit(1);
        }
    }

    fs::read_to_string(path).unwrap_or_else(|e| {
        match e.kind() {
            io::ErrorKind::NotFound => {
                eprintln!("Error: file not found: {file_arg}");
            }
            io::ErrorKind::PermissionDenied => {
                eprintln!("Error: permission denied: {file_arg}");
            }
            _ => {
                eprintln!("Error reading '{file_arg}': {e}");
            }
        }
        process::exit(1);
    })
}

fn run_tui_file(file_arg: &str, settings: ViewSettings) -> io::Result<()> {
    let source = read_markdown_or_exit(file_arg);
    let doc = parse::parse(&source);
    let rendered = render::render_document(&doc);
    let sections = rendered.tracked_headings();
    let count_rank = |rank: HeadingRank| sections.iter().filter(|h| h.rank() == rank).count();
    eprintln!(
        "[tracker] tracked={} top={} major={} minor={} skipped={} nested={}",
        sections.len(),
        count_rank(HeadingRank::Top),
        count_rank(HeadingRank::Major),
        count_rank(HeadingRank::Minor),
        doc.headings.len() - sections.len(),
        doc.headings.iter().filter(|h| !h.top_level).count()
    );
    if sections.is_empty() {
        eprintln!("[tracker] no trackable headings, contents will stay idle");
    }

    let overview = OverviewPane::build(&rendered.heading_lines, &settings.overview);
    eprintln!(
        "[overview] entries={} depth={} style={}",
        overview.entries().len(),
        settings.overview.depth,
        settings.overview.style.name()
    );

    let initial_scroll = match settings.anchor.as_deref() {
        Some(anchor) => match rendered.heading_line_for(anchor) {
            Some(line) => {
                let source_line = doc
                    .headings
                    .iter()
                    .find(|h| h.anchor_id == anchor.trim_start_matches('#'))
                    .map_or(0, |h| h.line);
                eprintln!("[view] anchor={anchor} line={line} source_line={source_line}");
                line
            }
            None => {
                eprintln!("[view] anchor={anchor} not found, starting at top");
                0
            }
        },
        None => 0,
    };

    ratatui::run(|terminal| {
        run(
            terminal,
            &rendered,
            &sections,
            overview,
            settings,
            initial_scroll,
        )
    })
}

/// Screen areas for one frame.
struct Panes {
    content: Rect,
    toc: Option<Rect>,
    status: Rect,
}

impl Panes {
    fn split(area: Rect, show_toc: bool) -> Self {
        let [main, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);
        if !show_toc {
            return Self {
                content: main,
                toc: None,
                status,
            };
        }
        let [content, toc] =
            Layout::horizontal([Constraint::Min(20), Constraint::Length(SIDEBAR_WIDTH)])
                .areas(main);
        Self {
            content,
            toc: Some(toc),
            status,
        }
    }

    /// Entry rows visible inside the sidebar border.
    fn toc_rows(&self) -> usize {
        self.toc
            .map_or(0, |area| area.height.saturating_sub(2) as usize)
    }
}

/// Rebuild the contents after the filter changed. The fresh pane has no
/// active entries, so the observer is reset to force a new cycle.
fn rebuild_overview(
    rendered: &RenderedDocument,
    options: &OverviewOptions,
    observer: &mut VisibilityObserver,
) -> OverviewPane {
    observer.reobserve();
    OverviewPane::build(&rendered.heading_lines, options)
}

fn run(
    terminal: &mut DefaultTerminal,
    rendered: &RenderedDocument,
    sections: &TrackedSet,
    mut overview: OverviewPane,
    settings: ViewSettings,
    initial_scroll: usize,
) -> io::Result<()> {
    let tracker = SectionTracker::new(sections, settings.tracker);
    let mut observer = VisibilityObserver::observe(tracker.sections());
    let mut overview_options = settings.overview;
    let mut show_toc = settings.show_toc;
    let total_lines = rendered.text.lines.len();
    let mut scroll_offset = initial_scroll;
    let mut focused_link: Option<usize> = None;
    let mut toc_focus: Option<TocFocus> = None;
    let mut filter_typing = false;
    let mut help: Option<HelpState> = None;

    loop {
        // Recalculate bounds and clamp scroll offset every frame, so the
        // view stays valid after terminal resize.
        let size = terminal.size()?;
        let panes = Panes::split(Rect::new(0, 0, size.width, size.height), show_toc);
        let viewport_height = usize::from(panes.content.height);
        let max_scroll = total_lines.saturating_sub(viewport_height);
        scroll_offset = scroll_offset.min(max_scroll);
        overview.set_height(panes.toc_rows());

        let geometry = ContentGeometry {
            headings: &rendered.heading_lines,
            scroll_offset,
            viewport: Viewport {
                width: i32::from(panes.content.width),
                height: i32::from(panes.content.height),
            },
        };
        if let Some(batch) = observer.poll(tracker.sections(), &geometry) {
            let container = if show_toc { Some(&mut overview) } else { None };
            tracker.handle_visibility_batch(&batch, &geometry, container);
        }

        terminal.draw(|frame| {
            ui(
                frame,
                &ViewState {
                    rendered,
                    scroll_offset,
                    focused_link,
                    overview: show_toc.then_some(&overview),
                    toc_selected: toc_focus.as_ref().map(|f| f.selected),
                    filter: &overview_options.filter,
                    filter_typing,
                    help: help.as_ref(),
                },
            );
        })?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(ref mut hl) = help {
            // Help modal keys
            match key.code {
                KeyCode::Esc | KeyCode::Char('?') => {
                    help = None;
                }
                KeyCode::Backspace => {
                    hl.filter.pop();
                    hl.scroll_offset = 0;
                }
                KeyCode::Down => {
                    hl.scroll_offset = hl.scroll_offset.saturating_add(1);
                }
                KeyCode::Up => {
                    hl.scroll_offset = hl.scroll_offset.saturating_sub(1);
                }
                KeyCode::Char(c) => {
                    hl.filter.push(c);
                    hl.scroll_offset = 0;
                }
                _ => {}
            }
        } else if let Some(ref mut focus) = toc_focus {
            // Contents sidebar has focus
            let num_entries = overview.entries().len();
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    if num_entries > 0 {
                        focus.selected = (focus.selected + 1).min(num_entries - 1);
                        overview.reveal(focus.selected);
                    }
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    focus.selected = focus.selected.saturating_sub(1);
                    overview.reveal(focus.selected);
                }
                KeyCode::Char('g') | KeyCode::Home => {
                    focus.selected = 0;
                    overview.reveal(focus.selected);
                }
                KeyCode::Char('G') | KeyCode::End => {
                    if num_entries > 0 {
                        focus.selected = num_entries - 1;
                        overview.reveal(focus.selected);
                    }
                }
                KeyCode::Enter => {
                    if let Some(line) = overview
                        .entries()
                        .get(focus.selected)
                        .and_then(|entry| rendered.heading_line_for(entry.target.fragment()))
                    {
                        scroll_offset = line.min(max_scroll);
                    }
                    toc_focus = None;
                }
                KeyCode::Esc | KeyCode::Char('o') => {
                    toc_focus = None;
                }
                KeyCode::Char('q') => return Ok(()),
                _ => {}
            }
        } else if filter_typing {
            // Contents filter input
            match key.code {
                KeyCode::Enter => {
                    filter_typing = false;
                }
                KeyCode::Esc => {
                    filter_typing = false;
                    overview_options.filter.clear();
                    overview = rebuild_overview(rendered, &overview_options, &mut observer);
                }
                KeyCode::Backspace => {
                    overview_options.filter.pop();
                    overview = rebuild_overview(rendered, &overview_options, &mut observer);
                }
                KeyCode::Char(c) => {
                    overview_options.filter.push(c);
                    overview = rebuild_overview(rendered, &overview_options, &mut observer);
                }
                _ => {}
            }
        } else {
            // Normal mode
            match key.code {
                KeyCode::Char('q') => return Ok(()),

                // Single line down
                KeyCode::Char('j') | KeyCode::Down => {
                    scroll_offset = (scroll_offset + 1).min(max_scroll);
                    focused_link = None;
                }

                // Single line up
                KeyCode::Char('k') | KeyCode::Up => {
                    scroll_offset = scroll_offset.saturating_sub(1);
                    focused_link = None;
                }

                // Half page down
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    scroll_offset = (scroll_offset + viewport_height / 2).min(max_scroll);
                    focused_link = None;
                }
                KeyCode::PageDown => {
                    scroll_offset = (scroll_offset + viewport_height / 2).min(max_scroll);
                    focused_link = None;
                }

                // Half page up
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    scroll_offset = scroll_offset.saturating_sub(viewport_height / 2);
                    focused_link = None;
                }
                KeyCode::PageUp => {
                    scroll_offset = scroll_offset.saturating_sub(viewport_height / 2);
                    focused_link = None;
                }

                // Jump to top
                KeyCode::Char('g') | KeyCode::Home => {
                    scroll_offset = 0;
                    focused_link = None;
                }

                // Jump to bottom
                KeyCode::Char('G') | KeyCode::End => {
                    scroll_offset = max_scroll;
                    focused_link = None;
                }

                // Next heading
                KeyCode::Char('n') => {
                    if let Some(pos) = rendered
                        .heading_lines
                        .iter()
                        .find(|h| h.rendered_line > scroll_offset)
                    {
                        scroll_offset = pos.rendered_line.min(max_scroll);
                    }
                    focused_link = None;
                }

                // Previous heading
                KeyCode::Char('p') => {
                    if let Some(pos) = rendered
                        .heading_lines
                        .iter()
                        .rev()
                        .find(|h| h.rendered_line < scroll_offset)
                    {
                        scroll_offset = pos.rendered_line.min(max_scroll);
                    }
                    focused_link = None;
                }

                // Focus the contents sidebar, starting on the active entry
                KeyCode::Char('o') => {
                    if show_toc && !overview.entries().is_empty() {
                        let selected = overview.active_indices().first().copied().unwrap_or(0);
                        toc_focus = Some(TocFocus { selected });
                        focused_link = None;
                    }
                }

                // Show or hide the contents sidebar
                KeyCode::Char('t') => {
                    show_toc = !show_toc;
                    if show_toc {
                        observer.reobserve();
                    }
                }

                // Filter the contents
                KeyCode::Char('/') => {
                    if !show_toc {
                        show_toc = true;
                        observer.reobserve();
                    }
                    filter_typing = true;
                    focused_link = None;
                }

                // Next link (Tab)
                KeyCode::Tab => {
                    let num_links = rendered.link_positions.len();
                    if num_links > 0 {
                        focused_link = Some(match focused_link {
                            Some(idx) => (idx + 1) % num_links,
                            None => rendered
                                .link_positions
                                .iter()
                                .position(|l| l.rendered_line >= scroll_offset)
                                .unwrap_or(0),
                        });
                        scroll_offset = reveal_link(
                            rendered,
                            focused_link,
                            scroll_offset,
                            viewport_height,
                            max_scroll,
                        );
                    }
                }

                // Previous link (Shift-Tab)
                KeyCode::BackTab => {
                    let num_links = rendered.link_positions.len();
                    if num_links > 0 {
                        focused_link = Some(match focused_link {
                            Some(0) => num_links - 1,
                            Some(idx) => idx - 1,
                            None => {
                                let visible_end = scroll_offset + viewport_height;
                                rendered
                                    .link_positions
                                    .iter()
                                    .rposition(|l| l.rendered_line < visible_end)
                                    .unwrap_or(num_links - 1)
                            }
                        });
                        scroll_offset = reveal_link(
                            rendered,
                            focused_link,
                            scroll_offset,
                            viewport_height,
                            max_scroll,
                        );
                    }
                }

                // Follow focused #fragment link (Enter)
                KeyCode::Enter => {
                    if let Some(line) = focused_link
                        .and_then(|idx| rendered.link_positions.get(idx))
                        .filter(|link| link.url.starts_with('#'))
                        .and_then(|link| rendered.heading_line_for(&link.url))
                    {
                        scroll_offset = line.min(max_scroll);
                        focused_link = None;
                    }
                }

                // Open help modal
                KeyCode::Char('?') => {
                    help = Some(HelpState {
                        filter: String::new(),
                        scroll_offset: 0,
                    });
                    focused_link = None;
                }

                // Escape clears link focus, then the contents filter
                KeyCode::Esc => {
                    if focused_link.is_some() {
                        focused_link = None;
                    } else if !overview_options.filter.is_empty() {
                        overview_options.filter.clear();
                        overview = rebuild_overview(rendered, &overview_options, &mut observer);
                    }
                }

                _ => {}
            }
        }
    }
}

/// Scroll offset that brings the focused link into view, if it is not
/// already visible.
fn reveal_link(
    rendered: &RenderedDocument,
    focused_link: Option<usize>,
    scroll_offset: usize,
    viewport_height: usize,
    max_scroll: usize,
) -> usize {
    match focused_link.and_then(|idx| rendered.link_positions.get(idx)) {
        Some(link)
            if link.rendered_line < scroll_offset
                || link.rendered_line >= scroll_offset + viewport_height =>
        {
            link.rendered_line
                .saturating_sub(viewport_height / 3)
                .min(max_scroll)
        }
        _ => scroll_offset,
    }
}

/// Rendered lines starting at `scroll_offset`, at most `height` of them.
fn visible_lines(
    rendered: &RenderedDocument,
    scroll_offset: usize,
    height: usize,
) -> Vec<Line<'static>> {
    rendered
        .text
        .lines
        .iter()
        .skip(scroll_offset)
        .take(height)
        .cloned()
        .collect()
}

/// Find the heading context for the current scroll position.
///
/// Returns the most recent heading at or before `scroll_offset`.
fn current_heading_context(
    heading_lines: &[HeadingPosition],
    scroll_offset: usize,
) -> Option<&HeadingPosition> {
    heading_lines
        .iter()
        .rev()
        .find(|h| h.rendered_line <= scroll_offset)
}

/// Snapshot of the viewer state needed to draw one frame.
struct ViewState<'a> {
    rendered: &'a RenderedDocument,
    scroll_offset: usize,
    focused_link: Option<usize>,
    /// `None` while the sidebar is hidden.
    overview: Option<&'a OverviewPane>,
    toc_selected: Option<usize>,
    filter: &'a str,
    filter_typing: bool,
    help: Option<&'a HelpState>,
}

fn ui(frame: &mut Frame, view: &ViewState) {
    let area = frame.area();

    // Minimum usable terminal size: need width for content and height for viewport + status bar
    const MIN_WIDTH: u16 = 20;
    const MIN_HEIGHT: u16 = 5;
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = "Terminal too small";
        let msg_len = msg.len() as u16;
        let x = area.x + area.width.saturating_sub(msg_len) / 2;
        let y = area.y + area.height / 2;
        let w = msg_len.min(area.width);
        if w > 0 && area.height > 0 {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    msg,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Rect::new(x, y, w, 1),
            );
        }
        return;
    }

    let panes = Panes::split(area, view.overview.is_some());
    let rendered = view.rendered;
    let scroll_offset = view.scroll_offset;
    let viewport_height = usize::from(panes.content.height);
    let total_lines = rendered.text.lines.len();

    // Render only the visible slice; Paragraph scroll offsets are u16.
    let widget = Paragraph::new(visible_lines(rendered, scroll_offset, viewport_height));
    frame.render_widget(widget, panes.content);

    // Apply focus highlight overlay on the focused link
    if let Some(link) = view
        .focused_link
        .and_then(|idx| rendered.link_positions.get(idx))
    {
        let rel_line = link
            .rendered_line
            .checked_sub(scroll_offset)
            .filter(|&rel| rel < viewport_height)
            .and_then(|rel| u16::try_from(rel).ok());
        if let Some(rel_line) = rel_line {
            let row = panes.content.y + rel_line;
            let focused_style = Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD);
            let right = panes.content.x + panes.content.width;
            for col in link.column_start..link.column_end {
                let Some(x) = u16::try_from(col)
                    .ok()
                    .and_then(|col| panes.content.x.checked_add(col))
                    .filter(|&x| x < right)
                else {
                    break;
                };
                if let Some(cell) = frame.buffer_mut().cell_mut(Position::new(x, row)) {
                    cell.set_style(focused_style);
                }
            }
        }
    }

    if let (Some(overview), Some(toc_area)) = (view.overview, panes.toc) {
        render_overview(frame, overview, view.toc_selected, view.filter, toc_area);
    }

    // Render help modal overlay
    if let Some(hl) = view.help {
        render_help(frame, hl, panes.content);
    }

    // Filter input bar
    if view.filter_typing {
        let count = view.overview.map_or(0, |o| o.entries().len());
        let bar_text = format!("/{}|  [{count} entries]", view.filter);
        let bar = Paragraph::new(Span::styled(
            bar_text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        ))
        .style(Style::default().bg(Color::DarkGray));
        frame.render_widget(bar, panes.status);
        return;
    }

    // Render normal status bar with scroll position indicator
    let position = if total_lines == 0 {
        "Empty".to_owned()
    } else if total_lines <= viewport_height {
        "All".to_owned()
    } else if scroll_offset == 0 {
        "Top".to_owned()
    } else if scroll_offset >= total_lines.saturating_sub(viewport_height) {
        "Bot".to_owned()
    } else {
        let pct = (scroll_offset * 100) / total_lines;
        format!("{pct}%")
    };

    // Prefer what the contents highlight; with the sidebar hidden, fall
    // back to the last heading above the viewport top.
    let active_text = view.overview.and_then(|o| {
        o.active_indices()
            .first()
            .map(|&i| o.entries()[i].text.clone())
    });
    let heading_ctx = active_text
        .or_else(|| {
            current_heading_context(&rendered.heading_lines, scroll_offset)
                .map(|h| h.text.clone())
        })
        .map(|text| format!(" \u{00A7} {text}"))
        .unwrap_or_default();

    let link_info = view
        .focused_link
        .and_then(|idx| rendered.link_positions.get(idx))
        .map(|l| format!(" -> {}", l.url))
        .unwrap_or_default();

    let filter_info = if view.filter.is_empty() {
        String::new()
    } else {
        format!("  /{}", view.filter)
    };

    let status = format!(
        " Line {}/{} \u{2014} {}{}{}{}",
        scroll_offset + 1,
        total_lines,
        position,
        heading_ctx,
        link_info,
        filter_info,
    );
    let status_bar = Paragraph::new(Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::White),
    ))
    .style(Style::default().bg(Color::White));
    frame.render_widget(status_bar, panes.status);
}

/// Render the contents sidebar with active and selected entries highlighted.
fn render_overview(
    frame: &mut Frame,
    overview: &OverviewPane,
    selected: Option<usize>,
    filter: &str,
    area: Rect,
) {
    let title = if filter.is_empty() {
        " Contents ".to_owned()
    } else {
        format!(" Contents /{filter} ")
    };
    let border_color = if selected.is_some() {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::bordered()
        .title(title)
        .border_style(Style::default().fg(border_color));

    let mut lines: Vec<Line<'static>> = overview
        .entries()
        .iter()
        .enumerate()
        .skip(overview.scroll_top())
        .map(|(idx, entry)| {
            let indent = "  ".repeat((entry.level as usize).saturating_sub(1));
            let marker = if entry.active { "\u{25B8} " } else { "  " };
            let style = if selected == Some(idx) {
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Blue)
                    .add_modifier(Modifier::BOLD)
            } else if entry.active {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(Span::styled(format!("{marker}{indent}{}", entry.text), style))
        })
        .collect();

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            " No matching headings",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

/// Compute a centered rectangle within `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = (area.width * percent_x / 100).max(30).min(area.width);
    let height = (area.height * percent_y / 100).max(5).min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Render the help/shortcuts modal overlay with filterable shortcut list.
fn render_help(frame: &mut Frame, help: &HelpState, viewport_area: Rect) {
    let popup = centered_rect(70, 70, viewport_area);

    // Clear the popup area
    frame.render_widget(Clear, popup);

    let categories = shortcut_categories();

    let mut lines: Vec<Line<'static>> = Vec::new();

    // Filter input line
    let filter_display = if help.filter.is_empty() {
        " Type to filter...".to_owned()
    } else {
        format!(" {}\u{2502}", help.filter) // │ as cursor
    };
    lines.push(Line::from(Span::styled(
        filter_display,
        Style::default().fg(Color::Yellow),
    )));
    lines.push(Line::from(""));

    let mut any_match = false;
    for cat in &categories {
        let filtered: Vec<&ShortcutEntry> = cat
            .entries
            .iter()
            .filter(|e| {
                let subject = format!("{} {} {}", cat.name, e.key, e.description);
                overview::matches_filter(&subject, &help.filter)
            })
            .collect();

        if filtered.is_empty() {
            continue;
        }
        any_match = true;

        // Category header
        lines.push(Line::from(Span::styled(
            format!(" {}", cat.name),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));

        for entry in &filtered {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("   {:16}", entry.key),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    entry.description.to_owned(),
                    Style::default().fg(Color::White),
                ),
            ]));
        }

        lines.push(Line::from(""));
    }

    if !any_match {
        lines.push(Line::from(Span::styled(
            " No matching shortcuts",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let title = if help.filter.is_empty() {
        " Help \u{2014} ? to close "
    } else {
        " Help \u{2014} Esc to close "
    };

    let block = Block::bordered()
        .title(title)
        .style(Style::default().fg(Color::White));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((u16::try_from(help.scroll_offset).unwrap_or(u16::MAX), 0));

    frame.render_widget(paragraph, popup);
}
