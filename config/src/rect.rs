// SPDX-License-Identifier: MPL-2.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

/// A rectangle in compositor logical coordinates.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// The overlapping part of two rectangles, if they overlap at all.
    #[must_use]
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= i64::from(left) || bottom <= i64::from(top) {
            return None;
        }

        Some(Rect {
            x: left,
            y: top,
            width: (right - i64::from(left)) as u32,
            height: (bottom - i64::from(top)) as u32,
        })
    }

    /// The smallest rectangle containing both.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect {
            x: left,
            y: top,
            width: (right - i64::from(left)) as u32,
            height: (bottom - i64::from(top)) as u32,
        }
    }
}

/// Formats as an X geometry string, `<w>x<h>+<x>+<y>`.
impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::Rect;

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 25, 100, 100);
        assert_eq!(a.intersection(&b), Some(Rect::new(50, 25, 50, 75)));
        assert_eq!(b.intersection(&a), a.intersection(&b));
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let left = Rect::new(0, 0, 1920, 1080);
        let right = Rect::new(1920, 0, 1920, 1080);
        assert_eq!(left.intersection(&right), None);
    }

    #[test]
    fn union_spans_both() {
        let left = Rect::new(0, 0, 1920, 1080);
        let right = Rect::new(1920, -200, 1280, 1024);
        assert_eq!(left.union(&right), Rect::new(0, -200, 3200, 1280));
    }

    #[test]
    fn geometry_display() {
        assert_eq!(Rect::new(0, 0, 1920, 1080).to_string(), "1920x1080+0+0");
        assert_eq!(Rect::new(-5, 3, 10, 10).to_string(), "10x10-5+3");
    }
}
