//! Vertex expansion and upload.

use crate::coords::Vec2;
use crate::render::{BufferId, BufferUsage, DrawBackend};

use super::{array_stride, log_stride, Journal, JournalEntry};

/// Number of vertex buffers recycled across flushes.
pub(crate) const BUFFER_POOL_SIZE: usize = 8;

#[derive(Debug, Copy, Clone)]
struct PooledBuffer {
    id: BufferId,
    size: usize,
}

/// Round-robin pool of vertex buffers.
///
/// Each flush takes the next slot, so a buffer is only rewritten after seven
/// other flushes have been submitted.
#[derive(Debug, Default)]
pub(crate) struct BufferPool {
    slots: [Option<PooledBuffer>; BUFFER_POOL_SIZE],
    next: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a buffer of at least `size` bytes, replacing the slot's buffer if it is too small.
    pub fn acquire<B: DrawBackend + ?Sized>(&mut self, backend: &mut B, size: usize) -> BufferId {
        let index = self.next;
        self.next = (self.next + 1) % BUFFER_POOL_SIZE;

        let slot = &mut self.slots[index];
        if let Some(buf) = slot {
            if buf.size >= size {
                return buf.id;
            }
            backend.destroy_buffer(buf.id);
        }

        let id = backend.create_buffer(size, BufferUsage::Vertex);
        log::trace!("journal: vertex pool slot {index} -> {size} bytes");
        *slot = Some(PooledBuffer { id, size });
        id
    }

    pub fn release_all<B: DrawBackend + ?Sized>(&mut self, backend: &mut B) {
        for slot in &mut self.slots {
            if let Some(buf) = slot.take() {
                backend.destroy_buffer(buf.id);
            }
        }
        self.next = 0;
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

/// Expands every compact record into four interleaved vertices.
///
/// Output order follows `entries`; each entry uses its own
/// [`array_stride`]. Corners are emitted as `(x1,y1) (x1,y2) (x2,y2) (x2,y1)`.
pub(crate) fn expand_vertices(
    entries: &[JournalEntry],
    vertices: &[f32],
    software_transform: bool,
) -> Vec<f32> {
    let total: usize = entries
        .iter()
        .map(|e| 4 * array_stride(e.n_layers, software_transform))
        .sum();
    let mut out = Vec::with_capacity(total);

    for entry in entries {
        let n = entry.n_layers;
        let stride = log_stride(n);
        let array = array_stride(n, software_transform);
        let rec = &vertices[entry.vertex_offset..];

        let color = rec[0];
        let (x1, y1) = (rec[1], rec[2]);
        let (x2, y2) = (rec[1 + stride], rec[2 + stride]);
        let corners = Vec2::quad_corners([x1, y1, x2, y2]);
        // Which stored corner supplies (s, t) for each emitted vertex.
        const TEX_CORNERS: [(usize, usize); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];

        let transformed = software_transform.then(|| entry.modelview.transform_points2(&corners));

        for (v, &(s_from, t_from)) in TEX_CORNERS.iter().enumerate() {
            let start = out.len();
            match &transformed {
                Some(points) => out.extend_from_slice(&points[v]),
                None => out.extend_from_slice(&[corners[v].x, corners[v].y]),
            }
            out.push(color);
            for layer in 0..n {
                let s = rec[3 + 2 * layer + s_from * stride];
                let t = rec[4 + 2 * layer + t_from * stride];
                out.extend_from_slice(&[s, t]);
            }
            out.resize(start + array, 0.0);
        }
    }

    debug_assert_eq!(out.len(), total);
    out
}

impl Journal {
    /// Expands the log and writes it into the next pooled buffer.
    pub(crate) fn upload_vertices<B: DrawBackend + ?Sized>(&mut self, backend: &mut B) -> BufferId {
        let data = expand_vertices(&self.entries, &self.vertices, self.config.software_transform);
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        debug_assert_eq!(bytes.len(), self.needed_vbo_len, "vertex tally out of sync");

        let buffer = self.pool.acquire(backend, bytes.len());
        backend.write_buffer(buffer, 0, bytes);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Matrix;
    use crate::journal::entry::tests::{framebuffer_id, log, texture_id};
    use crate::journal::{JournalConfig, QuadContext};
    use crate::pipeline::Pipeline;
    use crate::render::SoftwareBackend;

    #[test]
    fn corner_order_and_texcoord_pairing() {
        let fb = framebuffer_id();
        let mut journal = Journal::new(JournalConfig { software_transform: false, ..Default::default() });
        let mut p = Pipeline::new();
        p.set_layer_texture(0, texture_id());
        let ctx = QuadContext { framebuffer: fb, modelview: &Matrix::IDENTITY, clip: None };
        journal.log_quad(ctx, [1.0, 2.0, 3.0, 4.0], &p, 1, None, &[0.1, 0.2, 0.3, 0.4]);

        let out = expand_vertices(journal.entries(), journal.vertices(), false);
        let stride = array_stride(1, false);
        assert_eq!(out.len(), 4 * stride);
        let vertex = |i: usize| &out[i * stride..(i + 1) * stride];
        let pos_tex = |i: usize| {
            let v = vertex(i);
            (v[0], v[1], v[3], v[4])
        };
        assert_eq!(pos_tex(0), (1.0, 2.0, 0.1, 0.2));
        assert_eq!(pos_tex(1), (1.0, 4.0, 0.1, 0.4));
        assert_eq!(pos_tex(2), (3.0, 4.0, 0.3, 0.4));
        assert_eq!(pos_tex(3), (3.0, 2.0, 0.3, 0.2));
        // Padding layer stays zero.
        assert_eq!(&vertex(0)[5..7], &[0.0, 0.0]);
        assert_eq!(vertex(0)[2].to_bits(), journal.vertices()[0].to_bits());
    }

    #[test]
    fn software_transform_applies_modelview() {
        let fb = framebuffer_id();
        let mut journal = Journal::default();
        let mv = Matrix::translation(10.0, 20.0, 0.0);
        let ctx = QuadContext { framebuffer: fb, modelview: &mv, clip: None };
        journal.log_quad(ctx, [0.0, 0.0, 1.0, 1.0], &Pipeline::new(), 0, None, &[]);

        let out = expand_vertices(journal.entries(), journal.vertices(), true);
        let stride = array_stride(0, true);
        assert_eq!(&out[0..3], &[10.0, 20.0, 0.0]);
        assert_eq!(&out[2 * stride..2 * stride + 3], &[11.0, 21.0, 0.0]);
    }

    #[test]
    fn mixed_strides_are_packed_back_to_back() {
        let fb = framebuffer_id();
        let mut journal = Journal::default();
        let mut textured = Pipeline::new();
        for i in 0..3 {
            textured.set_layer_texture(i, texture_id());
        }
        log(&mut journal, fb, [0.0, 0.0, 1.0, 1.0], &Pipeline::new(), None);
        log(&mut journal, fb, [0.0, 0.0, 1.0, 1.0], &textured, None);

        let out = expand_vertices(journal.entries(), journal.vertices(), true);
        assert_eq!(out.len() * 4, journal.needed_vbo_len());
    }

    #[test]
    fn pool_cycles_and_grows() {
        let mut backend = SoftwareBackend::new();
        let mut pool = BufferPool::new();
        let first = pool.acquire(&mut backend, 64);
        for _ in 1..BUFFER_POOL_SIZE {
            pool.acquire(&mut backend, 64);
        }
        assert_eq!(pool.live(), BUFFER_POOL_SIZE);
        // Slot 0 again, big enough: reused.
        assert_eq!(pool.acquire(&mut backend, 32), first);
        // Slot 1 too small: replaced.
        let grown = pool.acquire(&mut backend, 4096);
        assert_eq!(pool.live(), BUFFER_POOL_SIZE);
        assert_ne!(grown, first);
        pool.release_all(&mut backend);
        assert_eq!(pool.live(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }
}
