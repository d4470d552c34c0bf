use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;

use crate::paint::Color;
use crate::texture::TextureId;

use super::Layer;

bitflags! {
    /// State groups considered by [`Pipeline::equal`] and [`Pipeline::state_hash`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateMask: u8 {
        const COLOR   = 1 << 0;
        const BLEND   = 1 << 1;
        const PROGRAM = 1 << 2;
        const LAYERS  = 1 << 3;
    }
}

impl StateMask {
    /// Everything except the flat colour (which the journal carries per vertex).
    #[inline]
    pub fn without_color() -> Self {
        Self::all() - Self::COLOR
    }
}

/// Framebuffer blending.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Premultiplied source-over.
    #[default]
    SrcOver,
    /// Source replaces destination.
    Replace,
}

/// Handle to a user-supplied shader program. Its contents are opaque here;
/// its presence disables optimisations that rewrite texture coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone)]
struct PipelineState {
    color: Color,
    blend: BlendMode,
    program: Option<ProgramId>,
    layers: Arc<[Layer]>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            blend: BlendMode::SrcOver,
            program: None,
            layers: Arc::from(Vec::new()),
        }
    }
}

/// Copy-on-write pipeline handle.
///
/// Cloning (or [`snapshot`](Self::snapshot)) is O(1) and freezes the current
/// state for the clone: later setters on either handle detach it first.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    state: Arc<PipelineState>,
}

impl Pipeline {
    /// Opaque white, source-over blending, no layers, no user program.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(color: Color) -> Self {
        let mut p = Self::new();
        p.set_color(color);
        p
    }

    /// Immutable reference to the current state, safe to keep across later
    /// mutation of `self`.
    #[inline]
    pub fn snapshot(&self) -> Pipeline {
        self.clone()
    }

    /// Whether both handles point at the very same state node.
    #[inline]
    pub fn ptr_eq(&self, other: &Pipeline) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn color(&self) -> Color {
        self.state.color
    }

    #[inline]
    pub fn blend(&self) -> BlendMode {
        self.state.blend
    }

    #[inline]
    pub fn user_program(&self) -> Option<ProgramId> {
        self.state.program
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.state.layers
    }

    #[inline]
    pub fn n_layers(&self) -> usize {
        self.state.layers.len()
    }

    #[inline]
    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.state.layers.get(index)
    }

    pub fn has_texture_matrices(&self) -> bool {
        self.state.layers.iter().any(Layer::has_texture_matrix)
    }

    // ── setters (copy on write) ───────────────────────────────────────────

    pub fn set_color(&mut self, color: Color) {
        Arc::make_mut(&mut self.state).color = color;
    }

    pub fn set_blend(&mut self, blend: BlendMode) {
        Arc::make_mut(&mut self.state).blend = blend;
    }

    pub fn set_user_program(&mut self, program: Option<ProgramId>) {
        Arc::make_mut(&mut self.state).program = program;
    }

    /// Replaces layer `index`, or appends when `index == n_layers()`.
    ///
    /// # Panics
    /// Panics (debug only) if `index > n_layers()`; release builds append.
    pub fn set_layer(&mut self, index: usize, layer: Layer) {
        debug_assert!(index <= self.n_layers(), "layer index {index} leaves a gap");
        self.edit_layers(|layers| {
            if index < layers.len() {
                layers[index] = layer;
            } else {
                layers.push(layer);
            }
        });
    }

    /// Sets the texture of layer `index`, creating a default layer if needed.
    pub fn set_layer_texture(&mut self, index: usize, texture: TextureId) {
        let layer = match self.layer(index) {
            Some(l) => Layer { texture, ..*l },
            None => Layer::new(texture),
        };
        self.set_layer(index, layer);
    }

    pub fn remove_layer(&mut self, index: usize) {
        if index < self.n_layers() {
            self.edit_layers(|layers| {
                layers.remove(index);
            });
        }
    }

    fn edit_layers(&mut self, f: impl FnOnce(&mut Vec<Layer>)) {
        let state = Arc::make_mut(&mut self.state);
        let mut layers = state.layers.to_vec();
        f(&mut layers);
        state.layers = Arc::from(layers);
    }

    /// Copy whose layer 0 samples `texture` instead (used for per-quad texture overrides).
    pub(crate) fn with_layer0_texture(&self, texture: TextureId) -> Pipeline {
        let mut p = self.clone();
        p.set_layer_texture(0, texture);
        p
    }

    /// Copy restricted to the first `n` layers. Returns `self` unchanged when already short enough.
    pub(crate) fn truncated_layers(&self, n: usize) -> Pipeline {
        if self.n_layers() <= n {
            return self.clone();
        }
        let mut p = self.clone();
        p.edit_layers(|layers| layers.truncate(n));
        p
    }

    // ── comparison ────────────────────────────────────────────────────────

    /// Compares the state groups selected by `mask`.
    pub fn equal(&self, other: &Pipeline, mask: StateMask) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (&*self.state, &*other.state);

        if mask.contains(StateMask::COLOR) && a.color != b.color {
            return false;
        }
        if mask.contains(StateMask::BLEND) && a.blend != b.blend {
            return false;
        }
        if mask.contains(StateMask::PROGRAM) && a.program != b.program {
            return false;
        }
        if mask.contains(StateMask::LAYERS) {
            if Arc::ptr_eq(&a.layers, &b.layers) {
                return true;
            }
            return a.layers.len() == b.layers.len()
                && a.layers.iter().zip(b.layers.iter()).all(|(x, y)| x.same_as(y));
        }
        true
    }

    /// Hash of the state groups selected by `mask`, consistent with [`equal`](Self::equal).
    pub fn state_hash(&self, mask: StateMask) -> u64 {
        let s = &*self.state;
        let mut h = DefaultHasher::new();
        if mask.contains(StateMask::COLOR) {
            for c in [s.color.r, s.color.g, s.color.b, s.color.a] {
                // Normalize -0.0 so equal colours hash equally.
                (c + 0.0).to_bits().hash(&mut h);
            }
        }
        if mask.contains(StateMask::BLEND) {
            s.blend.hash(&mut h);
        }
        if mask.contains(StateMask::PROGRAM) {
            s.program.hash(&mut h);
        }
        if mask.contains(StateMask::LAYERS) {
            s.layers.len().hash(&mut h);
            for l in s.layers.iter() {
                l.texture.hash(&mut h);
                l.filter.hash(&mut h);
                l.wrap.hash(&mut h);
                for v in l.matrix.to_cols_array() {
                    v.to_bits().hash(&mut h);
                }
            }
        }
        h.finish()
    }
}
