//! Viewport geometry shared by the tracker, the observer and the hosts.
//!
//! Coordinates are signed and relative to the top-left corner of the
//! viewport, so an element scrolled above the viewport has a negative `top`.
//! One unit is one terminal cell in the viewer.

/// Bounding box of an element, relative to the viewport origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub top: i32,
    pub left: i32,
    /// Exclusive bottom edge (`top + height`).
    pub bottom: i32,
    /// Exclusive right edge (`left + width`).
    pub right: i32,
}

/// Size of the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

/// Convert a row or column count to a coordinate, saturating at `i32::MAX`.
pub fn coord(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Signed distance `to - from` between two rows, saturating at the `i32`
/// range.
pub fn offset_between(from: usize, to: usize) -> i32 {
    if to >= from {
        coord(to - from)
    } else {
        -coord(from - to)
    }
}

impl Rect {
    pub fn new(top: i32, left: i32, bottom: i32, right: i32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// True when all four edges lie inside the viewport.
    pub fn fully_within(&self, viewport: Viewport) -> bool {
        self.top >= 0
            && self.left >= 0
            && self.bottom <= viewport.height
            && self.right <= viewport.width
    }

    /// True when at least one cell of the box is inside the viewport.
    ///
    /// Edges are exclusive, so a box that only touches the viewport border
    /// does not intersect.
    pub fn intersects(&self, viewport: Viewport) -> bool {
        self.bottom > 0
            && self.top < viewport.height
            && self.right > 0
            && self.left < viewport.width
    }

    /// Distance of the nearer horizontal edge from the viewport's top edge.
    pub fn nearest_edge_distance(&self) -> i32 {
        self.top.abs().min(self.bottom.abs())
    }
}
