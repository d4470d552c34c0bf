/// 2D point in quad-local units or device pixels, depending on context.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Centre of device pixel `(x, y)`.
    #[inline]
    pub fn pixel_center(x: i32, y: i32) -> Self {
        Self::new(x as f32 + 0.5, y as f32 + 0.5)
    }

    /// The four corners spanned by `[x1, y1, x2, y2]` in submission order:
    /// `(x1,y1) (x1,y2) (x2,y2) (x2,y1)`.
    ///
    /// Every consumer of logged quads (upload, hit tests, clip polygons) walks
    /// corners in this order.
    #[inline]
    pub const fn quad_corners([x1, y1, x2, y2]: [f32; 4]) -> [Vec2; 4] {
        [Vec2::new(x1, y1), Vec2::new(x1, y2), Vec2::new(x2, y2), Vec2::new(x2, y1)]
    }

    /// Signed parallelogram area of `(a, b, p)`; positive when `p` lies to the
    /// right of `a → b` with +Y down.
    #[inline]
    pub fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
        (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_follow_submission_order() {
        let c = Vec2::quad_corners([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(c, [Vec2::new(1.0, 2.0), Vec2::new(1.0, 4.0), Vec2::new(3.0, 4.0), Vec2::new(3.0, 2.0)]);
    }

    #[test]
    fn edge_sign() {
        let (a, b) = (Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0));
        assert!(Vec2::edge(a, b, Vec2::new(2.0, 1.0)) > 0.0);
        assert!(Vec2::edge(a, b, Vec2::new(2.0, -1.0)) < 0.0);
        assert_eq!(Vec2::edge(a, b, Vec2::new(9.0, 0.0)), 0.0);
    }
}
