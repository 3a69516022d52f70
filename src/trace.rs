//! Headless run of the tracking pipeline over a list of scroll offsets.
//!
//! Every step goes through the same observer → tracker → overview path as
//! the interactive viewer, against one long-lived overview, so highlights
//! carry over from step to step exactly as they would while scrolling.

use std::io::{self, Write};

use serde_json::json;

use crate::geometry::Viewport;
use crate::observer::VisibilityObserver;
use crate::overview::{OverviewOptions, OverviewPane};
use crate::parse;
use crate::render::{self, ContentGeometry};
use crate::tracker::{SectionTracker, TrackerOptions};

/// Parameters of a trace run.
#[derive(Debug, Clone)]
pub struct TraceOptions {
    pub width: usize,
    pub height: usize,
    /// Scroll offsets to visit in order; empty means one step per page.
    pub offsets: Vec<usize>,
    pub overview: OverviewOptions,
    pub tracker: TrackerOptions,
}

/// Result of the cycle that ran at a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    /// Number of headings whose visibility changed since the last batch.
    pub changes: usize,
    pub visible: Vec<String>,
    pub fallback: Option<String>,
}

/// State after visiting one offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    /// Offset actually applied, after clamping to the document.
    pub offset: usize,
    /// `None` when the observer had nothing to deliver.
    pub cycle: Option<CycleSummary>,
    /// Fragments of the active overview entries, top to bottom.
    pub active: Vec<String>,
    pub toc_scroll: usize,
}

impl TraceStep {
    pub fn to_text(&self) -> String {
        let active = join_or_dash(&self.active);
        match &self.cycle {
            Some(cycle) => format!(
                "offset={} cycle=yes visible={} fallback={} active={} toc_scroll={}",
                self.offset,
                join_or_dash(&cycle.visible),
                cycle.fallback.as_deref().unwrap_or("-"),
                active,
                self.toc_scroll,
            ),
            None => format!(
                "offset={} cycle=no active={} toc_scroll={}",
                self.offset, active, self.toc_scroll,
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "offset": self.offset,
            "cycle": self.cycle.as_ref().map(|c| json!({
                "changes": c.changes,
                "visible": c.visible,
                "fallback": c.fallback,
            })),
            "active": self.active,
            "toc_scroll": self.toc_scroll,
        })
    }
}

fn join_or_dash(ids: &[String]) -> String {
    if ids.is_empty() {
        "-".to_owned()
    } else {
        ids.join(",")
    }
}

/// Offsets visited when none are given: one page at a time, ending on the
/// last scrollable position.
fn page_offsets(max_scroll: usize, height: usize) -> Vec<usize> {
    let mut offsets: Vec<usize> = (0..=max_scroll).step_by(height.max(1)).collect();
    if offsets.last() != Some(&max_scroll) {
        offsets.push(max_scroll);
    }
    offsets
}

/// Run the pipeline over `source` and collect one [`TraceStep`] per offset.
pub fn trace_document(source: &str, options: &TraceOptions) -> Vec<TraceStep> {
    let doc = parse::parse(source);
    let rendered = render::render_document(&doc);
    let sections = rendered.tracked_headings();
    let tracker = SectionTracker::new(&sections, options.tracker);
    let mut observer = VisibilityObserver::observe(&sections);
    let mut overview = OverviewPane::build(&rendered.heading_lines, &options.overview);
    overview.set_height(options.height);

    let viewport = Viewport {
        width: i32::try_from(options.width).unwrap_or(i32::MAX),
        height: i32::try_from(options.height).unwrap_or(i32::MAX),
    };
    let max_scroll = rendered.text.lines.len().saturating_sub(options.height);
    let offsets = if options.offsets.is_empty() {
        page_offsets(max_scroll, options.height)
    } else {
        options.offsets.clone()
    };

    let id_at = |position: usize| {
        sections
            .get(position)
            .map(|h| h.id().to_owned())
            .unwrap_or_default()
    };

    let mut steps = Vec::with_capacity(offsets.len());
    for requested in offsets {
        let offset = requested.min(max_scroll);
        let geometry = ContentGeometry {
            headings: &rendered.heading_lines,
            scroll_offset: offset,
            viewport,
        };
        let cycle = observer.poll(&sections, &geometry).map(|batch| {
            let report = tracker.handle_visibility_batch(&batch, &geometry, Some(&mut overview));
            CycleSummary {
                changes: batch.changes.len(),
                visible: report.visible.iter().map(|&p| id_at(p)).collect(),
                fallback: report.fallback.map(id_at),
            }
        });
        let active = overview
            .active_indices()
            .into_iter()
            .map(|i| overview.entries()[i].target.fragment().to_owned())
            .collect();
        steps.push(TraceStep {
            offset,
            cycle,
            active,
            toc_scroll: overview.scroll_top(),
        });
    }

    let cycles: Vec<&CycleSummary> = steps.iter().filter_map(|s| s.cycle.as_ref()).collect();
    eprintln!(
        "[trace] tracked={} entries={} steps={} cycles={} changes={}",
        sections.len(),
        overview.entries().len(),
        steps.len(),
        cycles.len(),
        cycles.iter().map(|c| c.changes).sum::<usize>()
    );
    steps
}

/// Trace `source` and write one line per step to `out`.
pub fn write_trace<W: Write>(
    out: &mut W,
    source: &str,
    options: &TraceOptions,
    as_json: bool,
) -> io::Result<()> {
    for step in trace_document(source, options) {
        if as_json {
            writeln!(out, "{}", step.to_json())?;
        } else {
            writeln!(out, "{}", step.to_text())?;
        }
    }
    Ok(())
}
