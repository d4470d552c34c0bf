use crate::coords::Matrix;
use crate::texture::TextureId;

/// Texel sampling filter.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

/// Texture coordinate wrap mode outside `[0, 1]`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Wrap {
    #[default]
    ClampToEdge,
    Repeat,
}

/// One texture layer. Layers are combined by modulating the vertex colour.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Layer {
    pub texture: TextureId,
    /// Applied to `(s, t, 0, 1)` before sampling.
    pub matrix: Matrix,
    pub filter: Filter,
    pub wrap: Wrap,
}

impl Layer {
    #[inline]
    pub fn new(texture: TextureId) -> Self {
        Self {
            texture,
            matrix: Matrix::IDENTITY,
            filter: Filter::Nearest,
            wrap: Wrap::ClampToEdge,
        }
    }

    #[inline]
    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = matrix;
        self
    }

    #[inline]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[inline]
    pub fn with_wrap(mut self, wrap: Wrap) -> Self {
        self.wrap = wrap;
        self
    }

    #[inline]
    pub fn has_texture_matrix(&self) -> bool {
        !self.matrix.is_identity()
    }

    /// Layer equality with bitwise matrix comparison.
    #[inline]
    pub(super) fn same_as(&self, other: &Layer) -> bool {
        self.texture == other.texture
            && self.filter == other.filter
            && self.wrap == other.wrap
            && self.matrix.bit_eq(&other.matrix)
    }
}
