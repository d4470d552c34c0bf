//! Framebuffer state: matrix stack, viewport, clip stack, dependencies and
//! the journal of pending quads.

use slotmap::new_key_type;

use crate::clip::ClipStack;
use crate::coords::{Matrix, PixelBounds, Rect, Viewport};
use crate::journal::{Journal, JournalConfig, QuadContext};
use crate::paint::PackedColor;
use crate::pipeline::Pipeline;
use crate::render::FlushTarget;
use crate::texture::TextureId;

new_key_type! {
    pub struct FramebufferId;
}

/// Last clear since the most recent flush; answers reads that miss the journal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClearRecord {
    pub color: PackedColor,
    pub bounds: PixelBounds,
}

#[derive(Debug)]
pub struct Framebuffer {
    target: TextureId,
    width: u32,
    height: u32,
    offscreen: bool,
    viewport: Viewport,
    projection: Matrix,
    /// Never empty; the last element is current.
    modelview: Vec<Matrix>,
    clip: Option<ClipStack>,
    /// Framebuffers whose pending quads must land before ours.
    dependencies: Vec<FramebufferId>,
    journal: Journal,
    last_clear: Option<ClearRecord>,
}

impl Framebuffer {
    /// Full-size viewport and a pixel-aligned, y-down orthographic projection.
    pub(crate) fn new(
        target: TextureId,
        width: u32,
        height: u32,
        offscreen: bool,
        config: JournalConfig,
    ) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            target,
            width,
            height,
            offscreen,
            viewport: Viewport::new(0.0, 0.0, w, h),
            projection: Matrix::ortho(0.0, w, h, 0.0, -1.0, 1.0),
            modelview: vec![Matrix::IDENTITY],
            clip: None,
            dependencies: Vec::new(),
            journal: Journal::new(config),
            last_clear: None,
        }
    }

    #[inline]
    pub fn target(&self) -> TextureId {
        self.target
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn projection(&self) -> &Matrix {
        &self.projection
    }

    #[inline]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    #[inline]
    pub(crate) fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    #[inline]
    pub fn last_clear(&self) -> Option<ClearRecord> {
        self.last_clear
    }

    #[inline]
    pub(crate) fn set_last_clear(&mut self, clear: Option<ClearRecord>) {
        self.last_clear = clear;
    }

    /// Callers flush the journal first; viewport is read at flush time.
    pub(crate) fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Callers flush the journal first; projection is read at flush time.
    pub(crate) fn set_projection(&mut self, projection: Matrix) {
        self.projection = projection;
    }

    pub(crate) fn flush_target(&self) -> FlushTarget {
        FlushTarget {
            texture: self.target,
            width: self.width,
            height: self.height,
            viewport: self.viewport,
            projection: self.projection,
        }
    }

    /// Logs a quad with the current modelview and clip. `id` must be this framebuffer's id.
    pub(crate) fn log_quad(
        &mut self,
        id: FramebufferId,
        position: [f32; 4],
        pipeline: &Pipeline,
        n_layers: usize,
        override_texture: Option<TextureId>,
        tex_coords: &[f32],
    ) {
        let ctx = QuadContext {
            framebuffer: id,
            modelview: &self.modelview[self.modelview.len() - 1],
            clip: self.clip.as_ref(),
        };
        self.journal.log_quad(ctx, position, pipeline, n_layers, override_texture, tex_coords);
    }

    // ── modelview stack ───────────────────────────────────────────────────

    #[inline]
    pub fn modelview(&self) -> &Matrix {
        // The stack is never empty.
        &self.modelview[self.modelview.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Matrix {
        let last = self.modelview.len() - 1;
        &mut self.modelview[last]
    }

    pub fn push_matrix(&mut self) {
        let top = *self.modelview();
        self.modelview.push(top);
    }

    /// Pops the modelview stack. The bottom matrix is never popped.
    pub fn pop_matrix(&mut self) {
        if self.modelview.len() > 1 {
            self.modelview.pop();
        } else {
            log::warn!("pop_matrix on an empty modelview stack ignored");
        }
    }

    pub fn set_modelview(&mut self, m: Matrix) {
        *self.top_mut() = m;
    }

    pub fn identity_matrix(&mut self) {
        self.set_modelview(Matrix::IDENTITY);
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        let m = self.modelview().translate(x, y, z);
        self.set_modelview(m);
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        let m = self.modelview().scale(x, y, z);
        self.set_modelview(m);
    }

    pub fn rotate_z(&mut self, degrees: f32) {
        let m = self.modelview().rotate_z(degrees);
        self.set_modelview(m);
    }

    // ── clip stack ────────────────────────────────────────────────────────

    #[inline]
    pub fn clip(&self) -> Option<&ClipStack> {
        self.clip.as_ref()
    }

    /// Pushes a rectangle in the current local space.
    pub fn push_clip_rectangle(&mut self, rect: [f32; 4]) {
        let node = ClipStack::push_rectangle(
            self.clip.as_ref(),
            rect,
            self.modelview(),
            &self.projection,
            self.viewport,
        );
        self.clip = Some(node);
    }

    pub fn push_clip_window_rect(&mut self, bounds: PixelBounds) {
        self.clip = Some(ClipStack::push_window_rect(self.clip.as_ref(), bounds));
    }

    /// Pushes a path clip known by its device-space bounds.
    pub fn push_clip_path(&mut self, device_bounds: Rect) {
        self.clip = Some(ClipStack::push_path(self.clip.as_ref(), device_bounds));
    }

    pub fn pop_clip(&mut self) {
        match self.clip.take() {
            Some(top) => self.clip = top.parent().cloned(),
            None => log::warn!("pop_clip on an empty clip stack ignored"),
        }
    }

    /// Device pixels the current clip lets through, limited to the framebuffer.
    pub fn clip_bounds(&self) -> PixelBounds {
        let full = PixelBounds::new(0, 0, self.width as i32, self.height as i32);
        match &self.clip {
            Some(c) => c.combined_bounds().intersect(full),
            None => full,
        }
    }

    // ── dependencies ──────────────────────────────────────────────────────

    #[inline]
    pub fn dependencies(&self) -> &[FramebufferId] {
        &self.dependencies
    }

    /// Records that `producer` must be flushed before this framebuffer.
    pub(crate) fn add_dependency(&mut self, producer: FramebufferId) {
        if !self.dependencies.contains(&producer) {
            log::trace!("framebuffer dependency on {producer:?}");
            self.dependencies.push(producer);
        }
    }

    pub(crate) fn take_dependencies(&mut self) -> Vec<FramebufferId> {
        std::mem::take(&mut self.dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::test_support::{framebuffer_id, texture_id};

    fn fb() -> Framebuffer {
        Framebuffer::new(texture_id(), 64, 32, false, JournalConfig::default())
    }

    #[test]
    fn defaults_cover_the_target() {
        let f = fb();
        assert_eq!(f.viewport(), Viewport::new(0.0, 0.0, 64.0, 32.0));
        assert!(f.modelview().is_identity());
        assert_eq!(f.clip_bounds(), PixelBounds::new(0, 0, 64, 32));
        let t = f.flush_target();
        assert_eq!((t.width, t.height), (64, 32));
    }

    #[test]
    fn matrix_stack_restores_on_pop() {
        let mut f = fb();
        f.push_matrix();
        f.translate(5.0, 0.0, 0.0);
        assert_eq!(f.modelview().get(0, 3), 5.0);
        f.pop_matrix();
        assert!(f.modelview().is_identity());
        // Extra pops leave the base matrix in place.
        f.pop_matrix();
        assert!(f.modelview().is_identity());
    }

    #[test]
    fn clip_push_pop_shares_nodes() {
        let mut f = fb();
        f.push_clip_rectangle([0.0, 0.0, 10.0, 10.0]);
        let outer = f.clip().cloned().expect("pushed");
        f.push_clip_window_rect(PixelBounds::new(2, 2, 40, 40));
        assert_eq!(f.clip_bounds(), PixelBounds::new(2, 2, 10, 10));
        f.pop_clip();
        assert!(f.clip().is_some_and(|c| c.ptr_eq(&outer)));
        f.pop_clip();
        assert!(f.clip().is_none());
        f.pop_clip();
        assert!(f.clip().is_none());
    }

    #[test]
    fn dependencies_are_deduplicated_and_taken() {
        let mut f = fb();
        let producer = framebuffer_id();
        f.add_dependency(producer);
        f.add_dependency(producer);
        assert_eq!(f.dependencies(), &[producer]);
        assert_eq!(f.take_dependencies(), vec![producer]);
        assert!(f.dependencies().is_empty());
    }
}
