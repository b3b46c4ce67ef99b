use core::fmt;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// Largest grid the engine supports: columns `A..=CRXO`, rows `1..=2147483647`.
pub const MAX_GRID_SIZE: Size = Size::new(65_535, 2_147_483_647);

/// A coordinate within the grid.
///
/// Both axes are **0-indexed**: `x = 0` is column `A`, `y = 0` is row `1`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    #[inline]
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Signed distance from `self` to `other` on each axis.
    #[inline]
    #[must_use]
    pub const fn distance_to(self, other: Point) -> (i64, i64) {
        (
            other.x as i64 - self.x as i64,
            other.y as i64 - self.y as i64,
        )
    }

    /// Returns the point shifted by a signed delta if the result stays within `max`.
    #[must_use]
    pub fn offset_by(self, dx: i64, dy: i64, max: Size) -> Option<Point> {
        let x = self.x as i64 + dx;
        let y = self.y as i64 + dy;
        if x < 0 || y < 0 || x >= max.width as i64 || y >= max.height as i64 {
            return None;
        }
        Some(Point::new(x as u32, y as u32))
    }
}

impl Add<Size> for Point {
    type Output = Point;

    #[inline]
    fn add(self, rhs: Size) -> Point {
        Point::new(self.x + rhs.width, self.y + rhs.height)
    }
}

/// Width and height of a rectangular block of cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Default for Size {
    fn default() -> Self {
        Self::ONE
    }
}

impl Size {
    pub const ONE: Size = Size::new(1, 1);

    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn is_single(&self) -> bool {
        self.width == 1 && self.height == 1
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of cells covered, widened to avoid overflow on whole-column blocks.
    #[inline]
    pub const fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Grows `self` so that it covers `other` on both axes.
    pub fn extend_to(&mut self, other: Size) {
        self.width = self.width.max(other.width);
        self.height = self.height.max(other.height);
    }

    /// Returns true if `offset` addresses a cell within a block of this size.
    #[inline]
    pub const fn contains_offset(&self, offset: Point) -> bool {
        offset.x < self.width && offset.y < self.height
    }

    /// Shrinks the size so that a block anchored at `origin` does not cross `max`.
    #[must_use]
    pub fn clamped_at(self, origin: Point, max: Size) -> Size {
        Size::new(
            self.width.min(max.width.saturating_sub(origin.x)),
            self.height.min(max.height.saturating_sub(origin.y)),
        )
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A rectangular region of the grid. `origin` is always the top-left corner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    #[inline]
    #[must_use]
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Builds the rectangle spanned by two corners given in any order.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        let origin = Point::new(a.x.min(b.x), a.y.min(b.y));
        let size = Size::new(a.x.abs_diff(b.x) + 1, a.y.abs_diff(b.y) + 1);
        Self { origin, size }
    }

    #[inline]
    #[must_use]
    pub const fn single(origin: Point) -> Self {
        Self::new(origin, Size::ONE)
    }

    /// Exclusive right edge.
    #[inline]
    pub const fn right(&self) -> u64 {
        self.origin.x as u64 + self.size.width as u64
    }

    /// Exclusive bottom edge.
    #[inline]
    pub const fn bottom(&self) -> u64 {
        self.origin.y as u64 + self.size.height as u64
    }

    #[inline]
    pub const fn contains(&self, pt: Point) -> bool {
        pt.x >= self.origin.x
            && pt.y >= self.origin.y
            && (pt.x as u64) < self.right()
            && (pt.y as u64) < self.bottom()
    }

    /// Returns the part of the rectangle that lies within a grid of size `max`.
    #[must_use]
    pub fn clamped_to(self, max: Size) -> Rect {
        Rect::new(self.origin, self.size.clamped_at(self.origin, max))
    }

    /// Iterates the covered points in row-major order.
    pub fn points(self) -> impl Iterator<Item = Point> {
        let Rect { origin, size } = self;
        (0..size.height).flat_map(move |dy| {
            (0..size.width).map(move |dx| Point::new(origin.x + dx, origin.y + dy))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_corners_normalizes() {
        let r = Rect::from_corners(Point::new(3, 1), Point::new(1, 4));
        assert_eq!(r.origin, Point::new(1, 1));
        assert_eq!(r.size, Size::new(3, 4));
        assert!(r.contains(Point::new(3, 4)));
        assert!(!r.contains(Point::new(4, 4)));
    }

    #[test]
    fn clamping_stops_at_grid_edge() {
        let max = Size::new(10, 10);
        let r = Rect::new(Point::new(8, 9), Size::new(5, 5)).clamped_to(max);
        assert_eq!(r.size, Size::new(2, 1));
    }

    #[test]
    fn points_are_row_major() {
        let pts: Vec<_> = Rect::new(Point::new(1, 1), Size::new(2, 2)).points().collect();
        assert_eq!(
            pts,
            vec![
                Point::new(1, 1),
                Point::new(2, 1),
                Point::new(1, 2),
                Point::new(2, 2)
            ]
        );
    }

    #[test]
    fn offset_by_rejects_points_outside_the_grid() {
        let max = Size::new(5, 5);
        assert_eq!(Point::new(1, 1).offset_by(-1, 3, max), Some(Point::new(0, 4)));
        assert_eq!(Point::new(1, 1).offset_by(-2, 0, max), None);
        assert_eq!(Point::new(1, 1).offset_by(0, 4, max), None);
    }
}
