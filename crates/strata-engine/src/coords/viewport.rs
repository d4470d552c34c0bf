use super::{Matrix, Rect, Vec2};

/// Framebuffer viewport in device pixels.
///
/// NDC `(-1, 1)` maps to the viewport's top-left corner; device +Y points down.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    #[inline]
    pub fn rect(self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Maps a clip-space position (after projection, before the divide) to device pixels.
    #[inline]
    pub fn clip_to_device(self, clip: [f32; 4]) -> Vec2 {
        let w = if clip[3] == 0.0 { 1.0 } else { clip[3] };
        let ndc_x = clip[0] / w;
        let ndc_y = clip[1] / w;
        Vec2::new(
            (ndc_x + 1.0) * (self.width / 2.0) + self.x,
            (1.0 - ndc_y) * (self.height / 2.0) + self.y,
        )
    }

    /// Projects a local-space point through `modelview`, `projection` and this viewport.
    #[inline]
    pub fn project(self, modelview: &Matrix, projection: &Matrix, p: Vec2) -> Vec2 {
        let eye = modelview.transform_point4([p.x, p.y, 0.0, 1.0]);
        self.clip_to_device(projection.transform_point4(eye))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ortho_projection_is_pixel_identity() {
        let vp = Viewport::new(0.0, 0.0, 64.0, 32.0);
        let proj = Matrix::ortho(0.0, 64.0, 32.0, 0.0, -1.0, 1.0);
        let d = vp.project(&Matrix::IDENTITY, &proj, Vec2::new(12.0, 7.0));
        assert!((d.x - 12.0).abs() < 1e-4 && (d.y - 7.0).abs() < 1e-4);
    }

    #[test]
    fn viewport_offset_is_applied() {
        let vp = Viewport::new(10.0, 20.0, 2.0, 2.0);
        let d = vp.clip_to_device([-1.0, 1.0, 0.0, 1.0]);
        assert_eq!(d, Vec2::new(10.0, 20.0));
    }
}
