//! Small planar geometry helpers shared by the scanline code.

use crate::types::Point;

/// Whether segment `a -> b` crosses the horizontal line at `y`.
///
/// Half-open on the lower endpoint so that a vertex lying exactly on
/// the scanline is counted once for the two edges meeting there.
#[must_use]
pub fn crosses_scanline(a: Point, b: Point, y: f64) -> bool {
    (a.y <= y && y < b.y) || (a.y > y && y >= b.y)
}

/// X coordinate where the line through `a` and `b` meets the horizontal
/// line at `y`. `None` when the segment is horizontal.
#[must_use]
pub fn line_crossing_x(a: Point, b: Point, y: f64) -> Option<f64> {
    let dy = b.y - a.y;
    if dy == 0.0 {
        return None;
    }
    Some((y - a.y).mul_add((b.x - a.x) / dy, a.x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_of_diagonal() {
        let x = line_crossing_x(Point::new(0.0, 0.0), Point::new(4.0, 2.0), 1.0);
        assert_eq!(x, Some(2.0));
    }

    #[test]
    fn crossing_of_vertical() {
        let x = line_crossing_x(Point::new(3.0, -1.0), Point::new(3.0, 5.0), 2.5);
        assert_eq!(x, Some(3.0));
    }

    #[test]
    fn horizontal_has_no_crossing() {
        assert_eq!(line_crossing_x(Point::new(0.0, 1.0), Point::new(5.0, 1.0), 1.0), None);
    }

    #[test]
    fn scanline_is_half_open() {
        let lo = Point::new(0.0, 0.0);
        let hi = Point::new(0.0, 2.0);
        assert!(crosses_scanline(lo, hi, 0.0));
        assert!(!crosses_scanline(lo, hi, 2.0));
        assert!(crosses_scanline(hi, lo, 0.0));
        assert!(!crosses_scanline(hi, lo, 2.0));
        assert!(!crosses_scanline(lo, Point::new(5.0, 0.0), 0.0));
    }
}
