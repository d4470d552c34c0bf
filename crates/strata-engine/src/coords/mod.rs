//! Coordinate and geometry types shared by the journal, clip stack and backends.
//!
//! Spaces:
//! - local: the space quads are logged in (before the modelview)
//! - device: framebuffer pixels, origin top-left, +X right, +Y down
//!
//! Pixel `(x, y)` is sampled at its centre `(x + 0.5, y + 0.5)` by every
//! coverage test in the crate (rasterizer, scissor, fast read path).

mod matrix;
mod rect;
mod vec2;
mod viewport;

pub use matrix::Matrix;
pub use rect::{PixelBounds, Rect};
pub use vec2::Vec2;
pub use viewport::Viewport;

/// Crossing-number point-in-polygon test for device-space polygons.
///
/// Points exactly on a left/top edge count as inside; points on a right/bottom
/// edge do not. Works for convex and non-convex polygons with any winding.
pub fn point_in_poly(p: Vec2, poly: &[Vec2]) -> bool {
    let mut inside = false;
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let a = poly[i];
        let b = poly[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Vec2; 4] {
        [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(10.0, 0.0),
        ]
    }

    #[test]
    fn point_in_poly_interior_and_exterior() {
        assert!(point_in_poly(Vec2::new(5.0, 5.0), &square()));
        assert!(!point_in_poly(Vec2::new(15.0, 5.0), &square()));
        assert!(!point_in_poly(Vec2::new(5.0, -0.5), &square()));
    }

    #[test]
    fn point_in_poly_edges_are_half_open() {
        assert!(point_in_poly(Vec2::new(0.0, 5.0), &square()));
        assert!(!point_in_poly(Vec2::new(10.0, 5.0), &square()));
    }

    #[test]
    fn point_in_poly_rotated_quad() {
        let diamond = [
            Vec2::new(5.0, 0.0),
            Vec2::new(10.0, 5.0),
            Vec2::new(5.0, 10.0),
            Vec2::new(0.0, 5.0),
        ];
        assert!(point_in_poly(Vec2::new(5.0, 5.0), &diamond));
        assert!(!point_in_poly(Vec2::new(1.0, 1.0), &diamond));
    }
}
