//! Visibility observation for tracked headings.
//!
//! Stands in for a browser intersection observer with a zero threshold: a
//! heading "changes" when it starts or stops overlapping the viewport. A
//! terminal scrolls in whole rows, so a heading can go from partly to fully
//! visible without its overlap changing; that transition is reported too.
//! The host polls once per frame, so every scroll and resize event between
//! two frames is coalesced into at most one [`VisibilityBatch`].

use crate::tracker::{TrackedSet, ViewportGeometry};

/// One heading whose visibility changed since the last delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    /// Position of the heading in the tracked set.
    pub position: usize,
    pub intersecting: bool,
    pub fully_visible: bool,
}

/// A coalesced notification handed to the tracker.
///
/// The tracker re-measures every heading when notified, so the individual
/// changes are only reported for diagnostics by `trace`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityBatch {
    pub changes: Vec<VisibilityChange>,
}

/// Last delivered state of one heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seen {
    intersecting: bool,
    fully_visible: bool,
}

/// Remembers the last delivered visibility of every heading.
#[derive(Debug, Clone)]
pub struct VisibilityObserver {
    /// `None` until the heading's state has been delivered once.
    delivered: Vec<Option<Seen>>,
}

impl VisibilityObserver {
    /// Register every heading of `sections`. The first poll reports all of
    /// them.
    pub fn observe(sections: &TrackedSet) -> Self {
        Self {
            delivered: vec![None; sections.len()],
        }
    }

    /// Forget delivered state so the next poll reports every heading again.
    pub fn reobserve(&mut self) {
        self.delivered.iter_mut().for_each(|state| *state = None);
    }

    /// Compare current visibility against the last delivery.
    ///
    /// Returns `None` when nothing changed.
    pub fn poll<G: ViewportGeometry>(
        &mut self,
        sections: &TrackedSet,
        geometry: &G,
    ) -> Option<VisibilityBatch> {
        let viewport = geometry.viewport();
        let mut changes = Vec::new();
        for (heading, delivered) in sections.iter().zip(self.delivered.iter_mut()) {
            let rect = geometry.bounding_rect(heading);
            let now = Seen {
                intersecting: rect.intersects(viewport),
                fully_visible: rect.fully_within(viewport),
            };
            if *delivered != Some(now) {
                *delivered = Some(now);
                changes.push(VisibilityChange {
                    position: heading.position(),
                    intersecting: now.intersecting,
                    fully_visible: now.fully_visible,
                });
            }
        }
        if changes.is_empty() {
            None
        } else {
            Some(VisibilityBatch { changes })
        }
    }
}
