//! Rectangular regions of interest in image pixel coordinates.

use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle with inclusive bounds.
///
/// Regions are stored as given and clamped against a concrete frame with
/// [`Region::clamped`] right before use. A region whose clamped width or height is
/// not positive is empty, which means "no statistics available" rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Left column.
    pub x1: i64,
    /// Top row.
    pub y1: i64,
    /// Right column.
    pub x2: i64,
    /// Bottom row.
    pub y2: i64,
}

impl Region {
    /// Region with these corners, as given.
    pub const fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The whole `width` x `height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, i64::from(width) - 1, i64::from(height) - 1)
    }

    /// Region spanned by two corner pixels given in any order.
    pub fn from_corners(a: (i64, i64), b: (i64, i64)) -> Self {
        Self::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
    }

    /// Intersect with `[0, width) x [0, height)`.
    #[must_use]
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        Self {
            x1: self.x1.max(0),
            y1: self.y1.max(0),
            x2: self.x2.min(i64::from(width) - 1),
            y2: self.y2.min(i64::from(height) - 1),
        }
    }

    /// Columns covered, 0 when empty.
    #[must_use]
    pub fn width(&self) -> i64 {
        self.x2 - self.x1 + 1
    }

    /// Rows covered, 0 when empty.
    #[must_use]
    pub fn height(&self) -> i64 {
        self.y2 - self.y1 + 1
    }

    /// Whether no pixel is covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Number of pixels, 0 when empty.
    #[must_use]
    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width() as u64 * self.height() as u64
        }
    }

    /// Whether `(x, y)` is inside.
    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    /// Move by `(dx, dy)` pixels, keeping the size and staying inside the frame.
    ///
    /// A region larger than the frame is pinned to the top-left corner.
    #[must_use]
    pub fn translated_within(&self, dx: i64, dy: i64, width: u32, height: u32) -> Self {
        let w = self.x2 - self.x1;
        let h = self.y2 - self.y1;
        let max_x1 = (i64::from(width) - 1 - w).max(0);
        let max_y1 = (i64::from(height) - 1 - h).max(0);

        let x1 = (self.x1 + dx).clamp(0, max_x1);
        let y1 = (self.y1 + dy).clamp(0, max_y1);
        Self::new(x1, y1, x1 + w, y1 + h)
    }
}
