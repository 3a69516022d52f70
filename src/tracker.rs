//! Active section tracking for the table of contents.
//!
//! The tracker owns no UI. A host supplies two seams:
//!
//! - [`ViewportGeometry`]: viewport size and the bounding box of each tracked
//!   heading at the moment of the query;
//! - [`OverviewContainer`]: the rendered overview list, which the tracker
//!   queries by heading id and mutates (active flags, scroll offset).
//!
//! Evaluation is driven exclusively by [`SectionTracker::handle_visibility_batch`],
//! which the host calls whenever its visibility observer delivers a batch.

use std::collections::HashSet;
use std::hash::Hash;

use crate::geometry::{Rect, Viewport};
use crate::observer::VisibilityBatch;

/// Overview scroll lookahead: the active entry is placed this far below the
/// top of the overview's visible area.
pub const DEFAULT_LOOKAHEAD: i32 = 100;

/// Maximum number of predecessors examined when looking for an ancestor.
pub const ANCESTOR_WALK_LIMIT: usize = 250;

// ---------------------------------------------------------------------------
// Tracked set
// ---------------------------------------------------------------------------

/// The three heading ranks eligible for tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeadingRank {
    Top,
    Major,
    Minor,
}

impl HeadingRank {
    /// Map a markdown heading level to a rank; levels 4–6 are not tracked.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Top),
            2 => Some(Self::Major),
            3 => Some(Self::Minor),
            _ => None,
        }
    }

    /// Ranks a heading of this rank may fall back to.
    fn ancestor_ranks(self) -> &'static [HeadingRank] {
        match self {
            Self::Minor => &[Self::Major, Self::Top],
            Self::Major => &[Self::Top],
            Self::Top => &[],
        }
    }
}

/// A heading under observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    id: String,
    rank: HeadingRank,
    /// Index into the tracked set (document order).
    position: usize,
    /// Opaque host handle for the heading's element.
    element: usize,
}

impl Heading {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rank(&self) -> HeadingRank {
        self.rank
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn element(&self) -> usize {
        self.element
    }
}

/// Headings collected once at load time, in document order.
#[derive(Debug, Clone, Default)]
pub struct TrackedSet {
    headings: Vec<Heading>,
}

impl TrackedSet {
    /// Build the set from `(element, id, level)` candidates in document order.
    ///
    /// Candidates without an id or outside the three tracked levels are
    /// skipped.
    pub fn collect<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = (usize, S, u8)>,
        S: Into<String>,
    {
        let mut headings = Vec::new();
        for (element, id, level) in candidates {
            let id = id.into();
            let Some(rank) = HeadingRank::from_level(level) else {
                continue;
            };
            if id.is_empty() {
                continue;
            }
            headings.push(Heading {
                id,
                rank,
                position: headings.len(),
                element,
            });
        }
        Self { headings }
    }

    pub fn len(&self) -> usize {
        self.headings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Heading> {
        self.headings.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Heading> {
        self.headings.iter()
    }

    /// Nearest predecessor of `heading` whose rank is an allowed ancestor.
    ///
    /// At most `walk_limit` predecessors are examined; running out of steps
    /// is reported the same way as running out of predecessors.
    pub fn nearest_ancestor(&self, heading: &Heading, walk_limit: usize) -> Option<&Heading> {
        let wanted = heading.rank.ancestor_ranks();
        if wanted.is_empty() {
            return None;
        }
        self.headings[..heading.position]
            .iter()
            .rev()
            .take(walk_limit)
            .find(|prev| wanted.contains(&prev.rank))
    }
}

// ---------------------------------------------------------------------------
// Host seams
// ---------------------------------------------------------------------------

/// Geometry queries answered by the host at evaluation time.
pub trait ViewportGeometry {
    fn viewport(&self) -> Viewport;

    /// Current bounding box of `heading`, relative to the viewport origin.
    fn bounding_rect(&self, heading: &Heading) -> Rect;
}

/// The overview (table of contents) the tracker highlights.
pub trait OverviewContainer {
    /// Handle for one entry; only meaningful within a single cycle.
    type Entry: Copy + Eq + Hash;

    /// Entry whose target is `id`. Tab-style targets win over anchor links.
    fn lookup(&self, id: &str) -> Option<Self::Entry>;

    fn set_active(&mut self, entry: Self::Entry, active: bool);

    /// Vertical offset of the entry within the container.
    fn offset_top(&self, entry: Self::Entry) -> i32;

    /// Scroll the container so that `top` is the first visible offset.
    fn scroll_to(&mut self, top: i32);
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Tunables for [`SectionTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOptions {
    pub lookahead: i32,
    pub walk_limit: usize,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
            walk_limit: ANCESTOR_WALK_LIMIT,
        }
    }
}

/// Summary of one evaluation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Positions of the fully visible headings, in document order.
    pub visible: Vec<usize>,
    /// Position of the heading chosen by the nearest-edge fallback.
    pub fallback: Option<usize>,
}

/// Keeps the overview's active entries in step with the visible headings.
pub struct SectionTracker<'a> {
    sections: &'a TrackedSet,
    options: TrackerOptions,
}

impl<'a> SectionTracker<'a> {
    pub fn new(sections: &'a TrackedSet, options: TrackerOptions) -> Self {
        Self { sections, options }
    }

    pub fn sections(&self) -> &'a TrackedSet {
        self.sections
    }

    /// Run one evaluation cycle in response to a visibility batch.
    ///
    /// The batch only signals that something changed; visibility of every
    /// tracked heading is queried afresh. Without an overview container the
    /// cycle still measures visibility but mutates nothing.
    pub fn handle_visibility_batch<G, O>(
        &self,
        _batch: &VisibilityBatch,
        geometry: &G,
        overview: Option<&mut O>,
    ) -> CycleReport
    where
        G: ViewportGeometry,
        O: OverviewContainer,
    {
        let viewport = geometry.viewport();
        let visible: Vec<&Heading> = self
            .sections
            .iter()
            .filter(|h| geometry.bounding_rect(h).fully_within(viewport))
            .collect();

        let fallback = if visible.is_empty() {
            self.nearest_to_edge(geometry)
        } else {
            None
        };

        let report = CycleReport {
            visible: visible.iter().map(|h| h.position).collect(),
            fallback: fallback.map(|h| h.position),
        };

        let Some(overview) = overview else {
            return report;
        };

        let mut keep_active = HashSet::new();
        for heading in &visible {
            if let Some(entry) = self.resolve_entry(heading, overview) {
                keep_active.insert(entry);
                overview.set_active(entry, true);
                let top = overview.offset_top(entry) - self.options.lookahead;
                overview.scroll_to(top);
            }
        }

        for heading in self.sections.iter() {
            if let Some(entry) = self.resolve_entry(heading, overview) {
                if !keep_active.contains(&entry) {
                    overview.set_active(entry, false);
                }
            }
        }

        // Only the chosen entry is touched here; entries no tracked heading
        // resolves to keep whatever flag they had.
        if let Some(heading) = fallback {
            if let Some(entry) = self.resolve_entry(heading, overview) {
                overview.set_active(entry, true);
            }
        }

        report
    }

    /// Overview entry for `heading`, falling back to its nearest ancestor.
    pub fn resolve_entry<O: OverviewContainer>(
        &self,
        heading: &Heading,
        overview: &O,
    ) -> Option<O::Entry> {
        resolve_entry(self.sections, heading, overview, self.options.walk_limit)
    }

    /// Heading whose nearer edge is closest to the viewport's top edge.
    /// Ties keep the earliest heading.
    fn nearest_to_edge<G: ViewportGeometry>(&self, geometry: &G) -> Option<&'a Heading> {
        let mut best: Option<(i32, &'a Heading)> = None;
        for heading in self.sections.iter() {
            let distance = geometry.bounding_rect(heading).nearest_edge_distance();
            match best {
                Some((min, _)) if distance >= min => {}
                _ => best = Some((distance, heading)),
            }
        }
        best.map(|(_, heading)| heading)
    }
}

/// Resolve `heading` to an overview entry.
///
/// A direct id match wins. Otherwise major and minor headings defer to the
/// nearest allowed ancestor found within `walk_limit` predecessors, which is
/// resolved the same way. Ancestors always have a strictly higher rank, so
/// the recursion is at most two levels deep.
pub fn resolve_entry<O: OverviewContainer>(
    sections: &TrackedSet,
    heading: &Heading,
    overview: &O,
    walk_limit: usize,
) -> Option<O::Entry> {
    if let Some(entry) = overview.lookup(&heading.id) {
        return Some(entry);
    }
    let ancestor = sections.nearest_ancestor(heading, walk_limit)?;
    resolve_entry(sections, ancestor, overview, walk_limit)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Geometry backed by one rect per tracked element.
    struct FixedGeometry {
        viewport: Viewport,
        rects: Vec<Rect>,
    }

    impl ViewportGeometry for FixedGeometry {
        fn viewport(&self) -> Viewport {
            self.viewport
        }

        fn bounding_rect(&self, heading: &Heading) -> Rect {
            self.rects[heading.element()]
        }
    }

    /// In-memory overview list: one row per entry.
    #[derive(Default)]
    struct ListOverview {
        entries: Vec<(String, bool)>,
        scroll: Option<i32>,
        lookups: Cell<usize>,
    }

    impl ListOverview {
        fn with_ids(ids: &[&str]) -> Self {
            Self {
                entries: ids.iter().map(|id| (id.to_string(), false)).collect(),
                ..Self::default()
            }
        }

        fn active(&self) -> Vec<&str> {
            self.entries
                .iter()
                .filter(|(_, active)| *active)
                .map(|(id, _)| id.as_str())
                .collect()
        }
    }

    impl OverviewContainer for ListOverview {
        type Entry = usize;

        fn lookup(&self, id: &str) -> Option<usize> {
            self.lookups.set(self.lookups.get() + 1);
            self.entries.iter().position(|(entry, _)| entry == id)
        }

        fn set_active(&mut self, entry: usize, active: bool) {
            self.entries[entry].1 = active;
        }

        fn offset_top(&self, entry: usize) -> i32 {
            entry as i32 * 30
        }

        fn scroll_to(&mut self, top: i32) {
            self.scroll = Some(top);
        }
    }

    const VIEW: Viewport = Viewport {
        width: 100,
        height: 50,
    };

    fn on_screen(top: i32) -> Rect {
        Rect::new(top, 0, top + 2, 40)
    }

    fn set(headings: &[(&str, u8)]) -> TrackedSet {
        TrackedSet::collect(
            headings
                .iter()
                .enumerate()
                .map(|(i, (id, level))| (i, *id, *level)),
        )
    }

    fn geometry(rects: Vec<Rect>) -> FixedGeometry {
        FixedGeometry {
            viewport: VIEW,
            rects,
        }
    }

    fn run(
        tracker: &SectionTracker,
        geometry: &FixedGeometry,
        overview: &mut ListOverview,
    ) -> CycleReport {
        tracker.handle_visibility_batch(&VisibilityBatch::default(), geometry, Some(overview))
    }

    // --- tracked set ---

    #[test]
    fn collect_skips_untracked_levels_and_missing_ids() {
        let sections = TrackedSet::collect(vec![
            (0, "a", 1),
            (1, "", 2),
            (2, "deep", 4),
            (3, "b", 3),
        ]);
        assert_eq!(sections.len(), 2);
        let ids: Vec<&str> = sections.iter().map(|h| h.id()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(sections.get(1).unwrap().position(), 1);
        assert_eq!(sections.get(1).unwrap().element(), 3);
        assert_eq!(sections.get(1).unwrap().rank(), HeadingRank::Minor);
    }

    #[test]
    fn minor_heading_falls_back_to_preceding_major() {
        let sections = set(&[("a", 1), ("b", 2), ("c", 3), ("d", 2)]);
        let c = sections.get(2).unwrap();
        let ancestor = sections.nearest_ancestor(c, ANCESTOR_WALK_LIMIT).unwrap();
        assert_eq!(ancestor.id(), "b");
    }

    #[test]
    fn major_heading_skips_majors_when_looking_for_top() {
        let sections = set(&[("a", 1), ("b", 2), ("c", 3), ("d", 2)]);
        let d = sections.get(3).unwrap();
        assert_eq!(sections.nearest_ancestor(d, ANCESTOR_WALK_LIMIT).unwrap().id(), "a");
    }

    #[test]
    fn top_heading_has_no_ancestor() {
        let sections = set(&[("a", 1), ("b", 1)]);
        assert!(sections.nearest_ancestor(sections.get(1).unwrap(), ANCESTOR_WALK_LIMIT).is_none());
    }

    // --- resolution ---

    #[test]
    fn direct_match_never_walks() {
        let sections = set(&[("a", 1), ("c", 3)]);
        let overview = ListOverview::with_ids(&["a", "c"]);
        let entry = resolve_entry(&sections, sections.get(1).unwrap(), &overview, ANCESTOR_WALK_LIMIT);
        assert_eq!(entry, Some(1));
        assert_eq!(overview.lookups.get(), 1, "only the direct lookup should run");
    }

    #[test]
    fn resolution_recurses_through_unlisted_ancestors() {
        // c → b (not listed) → a (listed)
        let sections = set(&[("a", 1), ("b", 2), ("c", 3)]);
        let overview = ListOverview::with_ids(&["a"]);
        let entry = resolve_entry(&sections, sections.get(2).unwrap(), &overview, ANCESTOR_WALK_LIMIT);
        assert_eq!(entry, Some(0));
    }

    #[test]
    fn minor_without_ancestor_resolves_to_nothing() {
        let sections = set(&[("x", 3), ("y", 3)]);
        let overview = ListOverview::with_ids(&["a"]);
        assert_eq!(
            resolve_entry(&sections, sections.get(1).unwrap(), &overview, ANCESTOR_WALK_LIMIT),
            None
        );
    }

    #[test]
    fn walk_limit_bounds_the_search() {
        let mut headings = vec![("top".to_string(), 1u8)];
        for i in 0..ANCESTOR_WALK_LIMIT {
            headings.push((format!("minor-{i}"), 3));
        }
        headings.push(("last".to_string(), 3));
        let sections = TrackedSet::collect(
            headings
                .iter()
                .enumerate()
                .map(|(i, (id, level))| (i, id.as_str(), *level)),
        );
        let overview = ListOverview::with_ids(&["top"]);
        let last = sections.get(sections.len() - 1).unwrap();

        assert_eq!(
            resolve_entry(&sections, last, &overview, ANCESTOR_WALK_LIMIT),
            None,
            "top heading lies 251 steps back"
        );
        assert_eq!(
            resolve_entry(&sections, last, &overview, ANCESTOR_WALK_LIMIT + 1),
            Some(0)
        );
    }

    // --- evaluation cycle ---

    #[test]
    fn visible_minor_highlights_its_major() {
        let sections = set(&[("a", 1), ("b", 2), ("c", 3), ("d", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b", "d"]);
        overview.entries[0].1 = true;
        overview.entries[2].1 = true;

        let geo = geometry(vec![on_screen(-200), on_screen(-100), on_screen(10), on_screen(300)]);
        let report = run(&tracker, &geo, &mut overview);

        assert_eq!(report.visible, vec![2]);
        assert_eq!(report.fallback, None);
        assert_eq!(overview.active(), ["b"]);
    }

    #[test]
    fn active_set_is_image_of_visible_headings() {
        let sections = set(&[("a", 1), ("b", 2), ("c", 3), ("d", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b", "d"]);

        let geo = geometry(vec![on_screen(0), on_screen(10), on_screen(20), on_screen(60)]);
        run(&tracker, &geo, &mut overview);
        assert_eq!(overview.active(), ["a", "b"]);
    }

    #[test]
    fn cycle_is_idempotent() {
        let sections = set(&[("a", 1), ("b", 2), ("c", 3), ("d", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b", "d"]);
        let geo = geometry(vec![on_screen(-40), on_screen(5), on_screen(20), on_screen(45)]);

        let first = run(&tracker, &geo, &mut overview);
        let after_first: Vec<String> = overview.active().iter().map(|s| s.to_string()).collect();
        let second = run(&tracker, &geo, &mut overview);

        assert_eq!(first, second);
        assert_eq!(overview.active(), after_first);
        assert_eq!(overview.active(), ["b", "d"]);
    }

    #[test]
    fn shared_entry_is_not_cleared_by_hidden_sibling() {
        // b and its child c both resolve to b; c visible, b scrolled away.
        let sections = set(&[("b", 2), ("c", 3)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["b"]);
        let geo = geometry(vec![on_screen(-30), on_screen(4)]);

        run(&tracker, &geo, &mut overview);
        assert_eq!(overview.active(), ["b"]);
    }

    #[test]
    fn scrolls_overview_to_last_visible_entry_minus_lookahead() {
        let sections = set(&[("a", 1), ("b", 2), ("d", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b", "d"]);
        let geo = geometry(vec![on_screen(0), on_screen(10), on_screen(80)]);

        run(&tracker, &geo, &mut overview);
        // b sits at offset 30 in the list
        assert_eq!(overview.scroll, Some(30 - DEFAULT_LOOKAHEAD));
    }

    #[test]
    fn custom_lookahead_is_applied() {
        let sections = set(&[("a", 1)]);
        let options = TrackerOptions {
            lookahead: 3,
            ..TrackerOptions::default()
        };
        let tracker = SectionTracker::new(&sections, options);
        let mut overview = ListOverview::with_ids(&["x", "y", "a"]);
        let geo = geometry(vec![on_screen(0)]);

        run(&tracker, &geo, &mut overview);
        assert_eq!(overview.scroll, Some(57));
    }

    #[test]
    fn fallback_picks_heading_nearest_to_an_edge() {
        let sections = set(&[("a", 1), ("b", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b"]);
        // a ends 5 units above the viewport; b starts 40 units below it.
        let geo = geometry(vec![Rect::new(-7, 0, -5, 40), Rect::new(90, 0, 92, 40)]);

        let report = run(&tracker, &geo, &mut overview);
        assert!(report.visible.is_empty());
        assert_eq!(report.fallback, Some(0));
        assert_eq!(overview.active(), ["a"]);
        assert_eq!(overview.scroll, None, "fallback never scrolls the overview");
    }

    #[test]
    fn fallback_ties_keep_document_order() {
        let sections = set(&[("a", 1), ("b", 1)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b"]);
        let geo = geometry(vec![Rect::new(-12, 0, -10, 40), Rect::new(10, 0, 12, 200)]);

        let report = run(&tracker, &geo, &mut overview);
        assert_eq!(report.fallback, Some(0));
        assert_eq!(overview.active(), ["a"]);
    }

    #[test]
    fn fallback_leaves_exactly_one_tracked_entry_active() {
        let sections = set(&[("a", 1), ("b", 2), ("c", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b", "c"]);
        for entry in &mut overview.entries {
            entry.1 = true;
        }
        let geo = geometry(vec![
            Rect::new(-300, 0, -298, 40),
            Rect::new(-20, 0, -18, 40),
            Rect::new(400, 0, 402, 40),
        ]);

        run(&tracker, &geo, &mut overview);
        assert_eq!(overview.active(), ["b"]);
    }

    #[test]
    fn fallback_resolving_to_nothing_leaves_nothing_active() {
        let sections = set(&[("orphan", 3)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a"]);
        let geo = geometry(vec![Rect::new(-8, 0, -6, 40)]);

        let report = run(&tracker, &geo, &mut overview);
        assert_eq!(report.fallback, Some(0));
        assert!(overview.active().is_empty());
    }

    /// Current behavior, possibly unintended: the fallback branch does not
    /// clear entries that no tracked heading resolves to, so a stale
    /// highlight on such an entry survives alongside the fallback entry.
    #[test]
    fn fallback_keeps_unrelated_highlight_sticky() {
        let sections = set(&[("a", 1), ("b", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b", "appendix"]);
        overview.entries[2].1 = true;
        let geo = geometry(vec![Rect::new(-4, 0, -2, 40), Rect::new(80, 0, 82, 40)]);

        run(&tracker, &geo, &mut overview);
        assert_eq!(overview.active(), ["a", "appendix"]);
    }

    #[test]
    fn heading_wider_than_viewport_is_not_visible() {
        let sections = set(&[("a", 1), ("b", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a", "b"]);
        let geo = geometry(vec![Rect::new(1, 0, 2, 140), on_screen(10)]);

        let report = run(&tracker, &geo, &mut overview);
        assert_eq!(report.visible, vec![1]);
        assert_eq!(overview.active(), ["b"]);
    }

    #[test]
    fn missing_overview_is_tolerated() {
        let sections = set(&[("a", 1), ("b", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let geo = geometry(vec![on_screen(0), on_screen(10)]);

        let report = tracker.handle_visibility_batch::<_, ListOverview>(
            &VisibilityBatch::default(),
            &geo,
            None,
        );
        assert_eq!(report.visible, vec![0, 1]);
    }

    #[test]
    fn empty_tracked_set_does_nothing() {
        let sections = TrackedSet::default();
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a"]);
        overview.entries[0].1 = true;
        let geo = geometry(Vec::new());

        let report = run(&tracker, &geo, &mut overview);
        assert_eq!(report, CycleReport::default());
        assert_eq!(overview.active(), ["a"]);
        assert_eq!(overview.scroll, None);
    }

    #[test]
    fn entries_added_between_cycles_are_picked_up() {
        let sections = set(&[("a", 1), ("b", 2)]);
        let tracker = SectionTracker::new(&sections, TrackerOptions::default());
        let mut overview = ListOverview::with_ids(&["a"]);
        let geo = geometry(vec![on_screen(-50), on_screen(5)]);

        run(&tracker, &geo, &mut overview);
        assert_eq!(overview.active(), ["a"], "b resolves to its top heading");

        overview.entries.push(("b".to_string(), false));
        run(&tracker, &geo, &mut overview);
        assert_eq!(overview.active(), ["b"]);
    }
}
