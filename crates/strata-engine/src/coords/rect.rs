use super::Vec2;

/// Axis-aligned rectangle (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Builds a normalized rectangle spanning two arbitrary corners.
    #[inline]
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let x0 = a.x.min(b.x);
        let y0 = a.y.min(b.y);
        Rect::new(x0, y0, a.x.max(b.x) - x0, a.y.max(b.y) - y0)
    }

    /// Smallest rectangle containing every point. Empty input yields a zero rect.
    pub fn bounding(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Rect::default();
        };
        let (mut min, mut max) = (*first, *first);
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Rect::from_corners(min, max)
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.origin.x + self.size.x, self.origin.y + self.size.y)
    }

    /// Normalizes the rectangle so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        Rect::from_corners(self.min(), self.max())
    }
}

/// Half-open integer pixel range `[x0, x1) × [y0, y1)` in device space.
///
/// A pixel belongs to the range when its centre falls inside the continuous
/// rectangle it was derived from, which keeps scissoring consistent with the
/// rasterizer's sampling positions.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelBounds {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelBounds {
    #[inline]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Pixels whose centres lie inside the device-space rectangle.
    pub fn covering(rect: Rect) -> Self {
        let r = rect.normalized();
        let max = r.max();
        Self::new(
            (r.origin.x - 0.5).ceil() as i32,
            (r.origin.y - 0.5).ceil() as i32,
            (max.x - 0.5).ceil() as i32,
            (max.y - 0.5).ceil() as i32,
        )
    }

    #[inline]
    pub fn width(self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    #[inline]
    pub fn height(self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    #[inline]
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// True when `self` lies entirely inside `outer`.
    #[inline]
    pub fn within(self, outer: PixelBounds) -> bool {
        self.x0 >= outer.x0 && self.y0 >= outer.y0 && self.x1 <= outer.x1 && self.y1 <= outer.y1
    }

    /// Intersection; may be empty (never inverted past zero size).
    #[inline]
    pub fn intersect(self, other: PixelBounds) -> PixelBounds {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        PixelBounds::new(x0, y0, self.x1.min(other.x1).max(x0), self.y1.min(other.y1).max(y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── Rect ──────────────────────────────────────────────────────────────

    #[test]
    fn normalized_negative_width() {
        let n = r(10.0, 0.0, -4.0, 5.0).normalized();
        assert_eq!(n.origin.x, 6.0);
        assert_eq!(n.size.x, 4.0);
    }

    #[test]
    fn from_corners_orders_components() {
        let rect = Rect::from_corners(Vec2::new(5.0, 1.0), Vec2::new(2.0, 4.0));
        assert_eq!(rect, r(2.0, 1.0, 3.0, 3.0));
    }

    #[test]
    fn bounding_covers_all_points() {
        let pts = [Vec2::new(1.0, 5.0), Vec2::new(-2.0, 3.0), Vec2::new(4.0, -1.0)];
        assert_eq!(Rect::bounding(&pts), r(-2.0, -1.0, 6.0, 6.0));
    }

    // ── PixelBounds ───────────────────────────────────────────────────────

    #[test]
    fn covering_integer_rect_is_exact() {
        assert_eq!(PixelBounds::covering(r(2.0, 3.0, 4.0, 5.0)), PixelBounds::new(2, 3, 6, 8));
    }

    #[test]
    fn covering_uses_pixel_centres() {
        // Centre 2.5 is outside [2.6, ...), centre 9.5 is inside [..., 9.7).
        let b = PixelBounds::covering(r(2.6, 0.0, 7.1, 1.0));
        assert_eq!((b.x0, b.x1), (3, 10));
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = PixelBounds::new(0, 0, 4, 4);
        let b = PixelBounds::new(8, 8, 10, 10);
        assert!(a.intersect(b).is_empty());
        assert!(PixelBounds::new(1, 1, 2, 2).within(a));
        assert!(!b.within(a));
    }
}
