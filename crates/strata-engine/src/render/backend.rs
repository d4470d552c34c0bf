use anyhow::Result;

use crate::clip::ClipStack;
use crate::coords::{Matrix, PixelBounds, Viewport};
use crate::paint::PackedColor;
use crate::pipeline::Pipeline;
use crate::texture::TextureId;

/// Backend-allocated GPU buffer handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Primitive support advertised by a backend.
///
/// Every backend must support at least one of the three modes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BackendCaps {
    /// `u16` indexed triangle lists with a base vertex.
    pub indexed: bool,
    /// Unindexed quad primitives (4 vertices per quad).
    pub quads: bool,
    /// Triangle fans.
    pub triangle_fans: bool,
}

impl Default for BackendCaps {
    fn default() -> Self {
        Self { indexed: true, quads: false, triangle_fans: true }
    }
}

/// How multi-quad batches are submitted, chosen once from [`BackendCaps`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DrawStrategy {
    /// One indexed triangle list over the shared quad index buffer.
    Indexed,
    /// One unindexed quad-primitive draw.
    Quads,
    /// One triangle fan per quad.
    Fans,
}

impl DrawStrategy {
    pub fn select(caps: BackendCaps) -> Self {
        if caps.indexed {
            DrawStrategy::Indexed
        } else if caps.quads {
            DrawStrategy::Quads
        } else {
            debug_assert!(caps.triangle_fans, "backend advertises no primitive mode");
            DrawStrategy::Fans
        }
    }
}

/// A single draw submission. Vertex numbers are relative to the bound [`VertexLayout`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DrawCall {
    TriangleFan {
        first_vertex: u32,
        vertex_count: u32,
    },
    IndexedTriangles {
        indices: BufferId,
        base_vertex: u32,
        first_index: u32,
        index_count: u32,
    },
    Quads {
        first_vertex: u32,
        vertex_count: u32,
    },
}

/// Interleaved vertex layout: `[position][packed colour][texcoords...]`.
///
/// `position_components` is 3 for software-transformed vertices (already in
/// eye space) and 2 for raw local positions. Texcoord slots are padded to at
/// least two layers; only the first `n_layers` are bound.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub buffer: BufferId,
    /// Byte offset of vertex 0.
    pub offset: usize,
    /// Bytes per vertex.
    pub stride: usize,
    pub position_components: usize,
    pub n_layers: usize,
}

impl VertexLayout {
    #[inline]
    pub fn color_offset(&self) -> usize {
        self.position_components * 4
    }

    #[inline]
    pub fn texcoord_offset(&self, layer: usize) -> usize {
        (self.position_components + 1 + 2 * layer) * 4
    }
}

/// Framebuffer state read at flush time.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlushTarget {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
    pub viewport: Viewport,
    pub projection: Matrix,
}

/// The draw interface the journal submits to.
///
/// Calls inside a flush are always bracketed by [`begin_flush`](Self::begin_flush)
/// and [`end_flush`](Self::end_flush). State set by `flush_*` and
/// `bind_vertices` persists until changed within the same flush.
pub trait DrawBackend {
    fn caps(&self) -> BackendCaps;

    // ── resources ─────────────────────────────────────────────────────────

    fn create_buffer(&mut self, size: usize, usage: BufferUsage) -> BufferId;
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_texture(&mut self, texture: TextureId, width: u32, height: u32);
    /// Replaces the whole texture with premultiplied RGBA8 rows.
    fn write_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<()>;
    fn destroy_texture(&mut self, texture: TextureId);

    /// Fills `bounds` (or the whole texture) outside of any flush.
    fn clear(&mut self, target: TextureId, color: PackedColor, bounds: Option<PixelBounds>);
    /// Reads one premultiplied RGBA8 pixel of a render target.
    fn read_pixel(&mut self, target: TextureId, x: i32, y: i32) -> Result<PackedColor>;

    // ── flush ─────────────────────────────────────────────────────────────

    fn begin_flush(&mut self, target: &FlushTarget);
    /// `None` disables clipping.
    fn flush_clip(&mut self, clip: Option<&ClipStack>);
    fn flush_modelview(&mut self, modelview: &Matrix);
    /// Pipeline colour is ignored; colour comes from the vertex attribute.
    fn flush_pipeline(&mut self, pipeline: &Pipeline, n_layers: usize);
    fn bind_vertices(&mut self, layout: &VertexLayout);
    fn draw(&mut self, call: DrawCall);
    /// Diagnostic outline of `n_quads` quads starting at `first_vertex`.
    fn draw_outline(&mut self, first_vertex: u32, n_quads: u32, color: PackedColor) {
        log::trace!("outline of {n_quads} quads at vertex {first_vertex} ({color:?}) not supported");
    }
    fn end_flush(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_prefers_indexed_then_quads() {
        let all = BackendCaps { indexed: true, quads: true, triangle_fans: true };
        assert_eq!(DrawStrategy::select(all), DrawStrategy::Indexed);
        let quads = BackendCaps { indexed: false, ..all };
        assert_eq!(DrawStrategy::select(quads), DrawStrategy::Quads);
        let fans = BackendCaps { indexed: false, quads: false, triangle_fans: true };
        assert_eq!(DrawStrategy::select(fans), DrawStrategy::Fans);
    }

    #[test]
    fn layout_offsets() {
        let l = VertexLayout {
            buffer: BufferId(0),
            offset: 0,
            stride: 32,
            position_components: 3,
            n_layers: 2,
        };
        assert_eq!(l.color_offset(), 12);
        assert_eq!(l.texcoord_offset(0), 16);
        assert_eq!(l.texcoord_offset(1), 24);
    }
}
