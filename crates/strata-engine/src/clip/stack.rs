use std::sync::Arc;

use crate::coords::{point_in_poly, Matrix, PixelBounds, Rect, Vec2, Viewport};

/// Rectangle clip recorded in the local space of `modelview`.
///
/// Corners are kept exactly as pushed (`x0 > x1` is allowed); consumers
/// normalize when they need ordered bounds.
#[derive(Debug, Clone)]
pub struct RectangleClip {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub modelview: Matrix,
    /// The rectangle projected to device space, corners in
    /// `(x0,y0) (x0,y1) (x1,y1) (x1,y0)` order.
    pub device_poly: [Vec2; 4],
    /// Device-space image is an axis-aligned rectangle, so the node's bounds
    /// are exact and a scissor can implement it.
    pub can_be_scissor: bool,
}

impl RectangleClip {
    /// Local-space bounds with ordered corners.
    #[inline]
    pub fn local_rect(&self) -> Rect {
        Rect::from_corners(Vec2::new(self.x0, self.y0), Vec2::new(self.x1, self.y1))
    }
}

#[derive(Debug, Clone)]
pub enum ClipKind {
    Rectangle(RectangleClip),
    /// Arbitrary primitive/path clip; only its device bounds are known here.
    Path,
    /// Device-space pixel rectangle (always exact).
    WindowRect,
}

#[derive(Debug)]
struct ClipNode {
    parent: Option<ClipStack>,
    kind: ClipKind,
    /// This node's own device bounds.
    bounds: PixelBounds,
    /// Intersection of the bounds of this node and every ancestor.
    combined: PixelBounds,
}

/// Shared handle to the top node of a clip stack.
#[derive(Debug, Clone)]
pub struct ClipStack(Arc<ClipNode>);

impl ClipStack {
    fn push(parent: Option<&ClipStack>, kind: ClipKind, bounds: PixelBounds) -> ClipStack {
        let combined = match parent {
            Some(p) => p.combined_bounds().intersect(bounds),
            None => bounds,
        };
        ClipStack(Arc::new(ClipNode {
            parent: parent.cloned(),
            kind,
            bounds,
            combined,
        }))
    }

    /// Pushes a rectangle given in the local space of `modelview`.
    pub fn push_rectangle(
        parent: Option<&ClipStack>,
        rect: [f32; 4],
        modelview: &Matrix,
        projection: &Matrix,
        viewport: Viewport,
    ) -> ClipStack {
        let [x0, y0, x1, y1] = rect;
        let device_poly = Vec2::quad_corners(rect).map(|c| viewport.project(modelview, projection, c));
        let [p0, p1, p2, p3] = device_poly;
        let can_be_scissor = (p0.x == p1.x && p2.x == p3.x && p0.y == p3.y && p1.y == p2.y)
            || (p0.y == p1.y && p2.y == p3.y && p0.x == p3.x && p1.x == p2.x);
        let bounds = PixelBounds::covering(Rect::bounding(&device_poly));

        log::trace!("push rectangle clip {rect:?} -> {bounds:?} (scissor: {can_be_scissor})");

        Self::push(
            parent,
            ClipKind::Rectangle(RectangleClip {
                x0,
                y0,
                x1,
                y1,
                modelview: *modelview,
                device_poly,
                can_be_scissor,
            }),
            bounds,
        )
    }

    /// Pushes a device-space pixel rectangle.
    pub fn push_window_rect(parent: Option<&ClipStack>, bounds: PixelBounds) -> ClipStack {
        Self::push(parent, ClipKind::WindowRect, bounds)
    }

    /// Pushes a path/primitive clip known only by its device-space bounds.
    pub fn push_path(parent: Option<&ClipStack>, device_bounds: Rect) -> ClipStack {
        Self::push(parent, ClipKind::Path, PixelBounds::covering(device_bounds))
    }

    #[inline]
    pub fn parent(&self) -> Option<&ClipStack> {
        self.0.parent.as_ref()
    }

    #[inline]
    pub fn kind(&self) -> &ClipKind {
        &self.0.kind
    }

    /// This node's own device bounds.
    #[inline]
    pub fn bounds(&self) -> PixelBounds {
        self.0.bounds
    }

    /// Device bounds of the whole stack (intersection over all ancestors).
    #[inline]
    pub fn combined_bounds(&self) -> PixelBounds {
        self.0.combined
    }

    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Iterates this node followed by each ancestor.
    #[inline]
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Node identity; clip nodes are immutable so identity implies equality.
    #[inline]
    pub fn ptr_eq(&self, other: &ClipStack) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity comparison over optional stacks (`None` means "no clip").
    #[inline]
    pub fn same(a: Option<&ClipStack>, b: Option<&ClipStack>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Every node can be implemented with a scissor rectangle.
    pub fn is_scissor_representable(&self) -> bool {
        self.ancestors().all(|n| match n.kind() {
            ClipKind::Rectangle(r) => r.can_be_scissor,
            ClipKind::WindowRect => true,
            ClipKind::Path => false,
        })
    }

    /// Whether device pixel `(x, y)` survives the clip.
    ///
    /// Rectangle clips are tested exactly against their device polygon; path
    /// clips can only be tested against their bounds.
    pub fn contains_pixel(&self, x: i32, y: i32) -> bool {
        if !self.combined_bounds().contains(x, y) {
            return false;
        }
        let center = Vec2::pixel_center(x, y);
        self.ancestors().all(|n| match n.kind() {
            ClipKind::Rectangle(r) if !r.can_be_scissor => point_in_poly(center, &r.device_poly),
            _ => true,
        })
    }
}

/// Iterator over a clip node and its ancestors, innermost first.
pub struct Ancestors<'a> {
    next: Option<&'a ClipStack>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ClipStack;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.parent();
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ortho(w: f32, h: f32) -> (Matrix, Viewport) {
        (Matrix::ortho(0.0, w, h, 0.0, -1.0, 1.0), Viewport::new(0.0, 0.0, w, h))
    }

    #[test]
    fn translated_rectangle_is_scissor_with_exact_bounds() {
        let (proj, vp) = ortho(64.0, 64.0);
        let mv = Matrix::translation(8.0, 4.0, 0.0);
        let c = ClipStack::push_rectangle(None, [0.0, 0.0, 10.0, 10.0], &mv, &proj, vp);
        let ClipKind::Rectangle(r) = c.kind() else { panic!("expected rectangle") };
        assert!(r.can_be_scissor);
        assert_eq!(c.bounds(), PixelBounds::new(8, 4, 18, 14));
        assert!(c.is_scissor_representable());
    }

    #[test]
    fn rotated_rectangle_is_not_scissor() {
        let (proj, vp) = ortho(64.0, 64.0);
        let mv = Matrix::translation(32.0, 32.0, 0.0).rotate_z(45.0);
        let c = ClipStack::push_rectangle(None, [-5.0, -5.0, 5.0, 5.0], &mv, &proj, vp);
        assert!(!c.is_scissor_representable());
        // Centre is inside, the bounding-box corner is not.
        assert!(c.contains_pixel(32, 32));
        let b = c.bounds();
        assert!(b.contains(b.x0, b.y0));
        assert!(!c.contains_pixel(b.x0, b.y0));
    }

    #[test]
    fn combined_bounds_intersect_ancestors() {
        let outer = ClipStack::push_window_rect(None, PixelBounds::new(0, 0, 10, 10));
        let inner = ClipStack::push_window_rect(Some(&outer), PixelBounds::new(5, 5, 20, 20));
        assert_eq!(inner.combined_bounds(), PixelBounds::new(5, 5, 10, 10));
        assert_eq!(inner.ancestors().count(), 2);
        assert!(inner.parent().is_some_and(|p| p.ptr_eq(&outer)));
        assert_eq!(outer.ref_count(), 2);
    }

    #[test]
    fn same_compares_identity() {
        let a = ClipStack::push_window_rect(None, PixelBounds::new(0, 0, 4, 4));
        let b = ClipStack::push_window_rect(None, PixelBounds::new(0, 0, 4, 4));
        assert!(ClipStack::same(Some(&a), Some(&a.clone())));
        assert!(!ClipStack::same(Some(&a), Some(&b)));
        assert!(ClipStack::same(None, None));
        assert!(!ClipStack::same(Some(&a), None));
    }
}
