//! Geometry primitives shared by the coordinator, trigger layer and overlay
//!
//! Screen coordinates use a top-left origin: y grows downward, so the menu
//! bar occupies the band `0..menu_bar_height` of its display.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// True for rectangles that cannot be drawn (zero or negative extent, NaN)
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
            || !self.x.is_finite()
            || !self.y.is_finite()
    }

    /// Half-open containment: the max edges belong to the neighbour
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// Overlap test; rectangles that merely touch do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Union of every rectangle in the iterator, `None` when empty
    pub fn union_all<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
        rects.into_iter().fold(None, |acc: Option<Rect>, r| match acc {
            Some(acc) => Some(acc.union(r)),
            None => Some(*r),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let rect = Rect::new(0.0, 0.0, 100.0, 24.0);
        assert!(rect.contains(Point::new(0.0, 0.0)));
        assert!(rect.contains(Point::new(99.9, 23.9)));
        assert!(!rect.contains(Point::new(100.0, 10.0)));
        assert!(!rect.contains(Point::new(50.0, 24.0)));
    }

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 100.0, 24.0);
        let b = Rect::new(100.0, 0.0, 50.0, 24.0);
        assert!(!a.intersects(&b));
        let c = Rect::new(99.0, 0.0, 50.0, 24.0);
        assert!(a.intersects(&c));
    }

    #[test]
    fn test_union_all() {
        let rects = [
            Rect::new(10.0, 0.0, 20.0, 24.0),
            Rect::new(40.0, 0.0, 30.0, 24.0),
        ];
        assert_eq!(Rect::union_all(&rects), Some(Rect::new(10.0, 0.0, 60.0, 24.0)));
        let empty: [Rect; 0] = [];
        assert_eq!(Rect::union_all(&empty), None);
    }

    #[test]
    fn test_degenerate() {
        assert!(Rect::zero().is_degenerate());
        assert!(Rect::new(0.0, 0.0, -5.0, 24.0).is_degenerate());
        assert!(Rect::new(0.0, 0.0, f64::NAN, 24.0).is_degenerate());
        assert!(!Rect::new(0.0, 0.0, 5.0, 24.0).is_degenerate());
    }
}
