//! Screen-space to board-cell mapping.
//!
//! Pure functions only; callers measure the container and the grid gap and
//! pass them in on every lookup.

use wordgrid_shared::Cell;

/// Fraction of the cell edge used as the hit radius around each cell center.
///
/// Kept well under 0.5 so a diagonal drag that grazes the corner of a
/// neighbouring tile does not select it.
pub const HIT_RADIUS_RATIO: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Container bounds in viewport coordinates. The grid is square, so only
/// the width is measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64) -> Self {
        Self { left, top, width }
    }

    /// Convert a viewport point into coordinates relative to the top-left corner.
    pub fn to_local(&self, point: Point) -> Point {
        Point::new(point.x - self.left, point.y - self.top)
    }
}

/// Measured layout of an N×N tile grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub rect: Rect,
    pub size: u8,
    pub gap: f64,
}

impl GridLayout {
    pub fn new(rect: Rect, size: u8, gap: f64) -> Self {
        Self { rect, size, gap }
    }

    fn gap(&self) -> f64 {
        if self.gap.is_finite() {
            self.gap.max(0.0)
        } else {
            0.0
        }
    }

    /// Edge length of one tile.
    pub fn edge(&self) -> f64 {
        let n = f64::from(self.size);
        (self.rect.width - (n - 1.0) * self.gap()) / n
    }

    fn pitch(&self) -> f64 {
        self.edge() + self.gap()
    }

    /// Center of `cell`, relative to the container's top-left corner.
    pub fn cell_center(&self, cell: Cell) -> Point {
        let pitch = self.pitch();
        let half = self.edge() / 2.0;
        Point::new(
            f64::from(cell.col) * pitch + half,
            f64::from(cell.row) * pitch + half,
        )
    }

    /// Resolve a container-relative point to the cell whose hit circle
    /// contains it, or `None` for points outside the grid or in the dead zone
    /// between hit circles.
    pub fn cell_at(&self, point: Point) -> Option<Cell> {
        if self.size == 0 || !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }
        let edge = self.edge();
        if !edge.is_finite() || edge <= 0.0 {
            return None;
        }

        let n = f64::from(self.size);
        let pitch = self.pitch();
        let col = (point.x / pitch).floor();
        let row = (point.y / pitch).floor();
        if col < 0.0 || row < 0.0 || col >= n || row >= n {
            return None;
        }

        let cell = Cell::new(row as u8, col as u8);
        let center = self.cell_center(cell);
        let (dx, dy) = (point.x - center.x, point.y - center.y);
        let radius = HIT_RADIUS_RATIO * edge;
        (dx * dx + dy * dy <= radius * radius).then_some(cell)
    }
}
