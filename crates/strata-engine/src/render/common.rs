//! Helpers shared by the journal and the backends.

use super::backend::{BufferId, BufferUsage, DrawBackend};

/// Two triangles per quad over corners `(x1,y1) (x1,y2) (x2,y2) (x2,y1)`.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Largest quad run addressable with `u16` indices from one base vertex.
pub const MAX_QUADS_PER_INDEXED_DRAW: usize = (u16::MAX as usize + 1) / 4;

/// Builds the index pattern for `n_quads` consecutive quads.
pub fn quad_indices(n_quads: usize) -> Vec<u16> {
    let mut out = Vec::with_capacity(n_quads * 6);
    for q in 0..n_quads {
        let base = (q * 4) as u16;
        out.extend(QUAD_INDICES.iter().map(|i| base + i));
    }
    out
}

/// Shared, lazily grown index buffer for indexed quad batches.
///
/// Owned by the context; read-only while a flush is in progress.
#[derive(Debug, Default)]
pub struct QuadIndexBuffer {
    buffer: Option<BufferId>,
    capacity: usize,
}

impl QuadIndexBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a buffer holding indices for at least `n_quads` quads.
    pub fn ensure<B: DrawBackend + ?Sized>(&mut self, backend: &mut B, n_quads: usize) -> BufferId {
        let n_quads = n_quads.min(MAX_QUADS_PER_INDEXED_DRAW);
        if let Some(buffer) = self.buffer {
            if self.capacity >= n_quads {
                return buffer;
            }
            backend.destroy_buffer(buffer);
        }

        let cap = n_quads.next_power_of_two().clamp(64, MAX_QUADS_PER_INDEXED_DRAW);
        let indices = quad_indices(cap);
        let bytes: &[u8] = bytemuck::cast_slice(&indices);
        let buffer = backend.create_buffer(bytes.len(), BufferUsage::Index);
        backend.write_buffer(buffer, 0, bytes);
        log::debug!("quad index buffer grown to {cap} quads");

        self.buffer = Some(buffer);
        self.capacity = cap;
        buffer
    }

    pub fn release<B: DrawBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.capacity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_offset_per_quad() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn largest_pattern_fits_u16() {
        let idx = quad_indices(MAX_QUADS_PER_INDEXED_DRAW);
        assert_eq!(idx.iter().copied().max(), Some(u16::MAX));
    }
}
