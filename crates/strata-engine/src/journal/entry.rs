use crate::clip::ClipStack;
use crate::coords::Matrix;
use crate::framebuffer::FramebufferId;
use crate::pipeline::Pipeline;
use crate::texture::TextureId;

use super::{array_stride, log_stride, record_len, Journal};

/// One logged quad. Its index in the journal is its paint order.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub(crate) pipeline: Pipeline,
    pub(crate) clip_stack: Option<ClipStack>,
    pub(crate) modelview: Matrix,
    /// Index of the record's colour slot in the vertex log.
    pub(crate) vertex_offset: usize,
    pub(crate) n_layers: usize,
}

impl JournalEntry {
    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[inline]
    pub fn clip_stack(&self) -> Option<&ClipStack> {
        self.clip_stack.as_ref()
    }

    #[inline]
    pub fn modelview(&self) -> &Matrix {
        &self.modelview
    }

    #[inline]
    pub fn vertex_offset(&self) -> usize {
        self.vertex_offset
    }

    #[inline]
    pub fn n_layers(&self) -> usize {
        self.n_layers
    }
}

/// Framebuffer state captured with each logged quad.
#[derive(Debug, Copy, Clone)]
pub struct QuadContext<'a> {
    pub framebuffer: FramebufferId,
    pub modelview: &'a Matrix,
    pub clip: Option<&'a ClipStack>,
}

impl Journal {
    /// Appends one quad.
    ///
    /// `position` is `[x1, y1, x2, y2]` in local space. `tex_coords` holds
    /// `[s1, t1, s2, t2]` per layer; layers without coordinates default to
    /// the whole texture. The pipeline is snapshotted, so later changes to
    /// the caller's handle do not affect this quad.
    ///
    /// Framebuffer dependency edges are the caller's responsibility (the
    /// journal does not know which textures are render targets).
    pub fn log_quad(
        &mut self,
        ctx: QuadContext<'_>,
        position: [f32; 4],
        pipeline: &Pipeline,
        n_layers: usize,
        override_texture: Option<TextureId>,
        tex_coords: &[f32],
    ) -> &JournalEntry {
        debug_assert!(
            tex_coords.len() <= 4 * n_layers,
            "{} texture coordinates for {n_layers} layers",
            tex_coords.len()
        );
        match self.framebuffer {
            None => self.framebuffer = Some(ctx.framebuffer),
            Some(fb) => debug_assert_eq!(fb, ctx.framebuffer, "journal shared between framebuffers"),
        }

        let stride = log_stride(n_layers);
        let offset = self.vertices.len();
        self.vertices.resize(offset + record_len(n_layers), 0.0);
        let v = &mut self.vertices[offset..];

        v[0] = pipeline.color().to_packed().to_f32_slot();
        let [x1, y1, x2, y2] = position;
        v[1] = x1;
        v[2] = y1;
        v[1 + stride] = x2;
        v[2 + stride] = y2;

        for layer in 0..n_layers {
            let [s1, t1, s2, t2] = match tex_coords.get(layer * 4..layer * 4 + 4) {
                Some(&[s1, t1, s2, t2]) => [s1, t1, s2, t2],
                _ => [0.0, 0.0, 1.0, 1.0],
            };
            let c1 = 3 + 2 * layer;
            let c2 = c1 + stride;
            v[c1] = s1;
            v[c1 + 1] = t1;
            v[c2] = s2;
            v[c2 + 1] = t2;
        }

        let mut snapshot = pipeline.truncated_layers(n_layers);
        // Only replaces an existing layer 0; a layerless quad samples nothing.
        if let Some(texture) = override_texture.filter(|_| n_layers > 0) {
            snapshot = snapshot.with_layer0_texture(texture);
        }
        debug_assert_eq!(
            snapshot.n_layers(),
            n_layers,
            "pipeline layers do not match the logged layer count"
        );

        self.needed_vbo_len += 4 * array_stride(n_layers, self.config.software_transform) * 4;
        self.entries.push(JournalEntry {
            pipeline: snapshot,
            clip_stack: ctx.clip.cloned(),
            modelview: *ctx.modelview,
            vertex_offset: offset,
            n_layers,
        });

        log::trace!("journal: logged quad {position:?} ({n_layers} layers), {} pending", self.entries.len());

        // Just pushed, so `last` is always present.
        &self.entries[self.entries.len() - 1]
    }
}
