//! Flush driver: nested batching levels down to draw calls.

use crate::clip::ClipStack;
use crate::coords::Matrix;
use crate::framebuffer::FramebufferId;
use crate::paint::PackedColor;
use crate::pipeline::StateMask;
use crate::render::{
    BufferId, DrawBackend, DrawCall, DrawStrategy, FlushTarget, QuadIndexBuffer, VertexLayout,
    MAX_QUADS_PER_INDEXED_DRAW,
};

use super::{array_stride, batch, clip, Journal, JournalEntry, MIN_LAYER_PADDING};

/// Outline colours cycled through when `show_batches` is enabled.
const OUTLINE_PALETTE: [PackedColor; 3] = [
    PackedColor::from_rgba8([0xff, 0x00, 0x00, 0xff]),
    PackedColor::from_rgba8([0x00, 0xff, 0x00, 0xff]),
    PackedColor::from_rgba8([0x00, 0x00, 0xff, 0xff]),
];

/// What one flush did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub quads: usize,
    /// Draw submissions, excluding diagnostic outlines.
    pub draw_calls: usize,
    pub clip_batches: usize,
    pub stride_batches: usize,
    pub layer_batches: usize,
    pub pipeline_batches: usize,
    /// Zero when software transform is enabled.
    pub modelview_batches: usize,
    /// Entries whose clip was folded into geometry.
    pub software_clipped: usize,
}

impl FlushStats {
    /// Accumulates another flush into `self`.
    pub fn merge(&mut self, other: &FlushStats) {
        self.quads += other.quads;
        self.draw_calls += other.draw_calls;
        self.clip_batches += other.clip_batches;
        self.stride_batches += other.stride_batches;
        self.layer_batches += other.layer_batches;
        self.pipeline_batches += other.pipeline_batches;
        self.modelview_batches += other.modelview_batches;
        self.software_clipped += other.software_clipped;
    }
}

#[inline]
fn padded_layers(entry: &JournalEntry) -> usize {
    entry.n_layers.max(MIN_LAYER_PADDING)
}

fn same_clip(a: &JournalEntry, b: &JournalEntry) -> bool {
    ClipStack::same(a.clip_stack.as_ref(), b.clip_stack.as_ref())
}

struct FlushState<'a, B: DrawBackend + ?Sized> {
    backend: &'a mut B,
    entries: &'a [JournalEntry],
    vbo: BufferId,
    strategy: DrawStrategy,
    fans: bool,
    index_buffer: Option<BufferId>,
    software_transform: bool,
    show_batches: bool,

    /// Byte offset of the current stride run in the vertex buffer.
    array_offset: usize,
    /// Vertex index within the current stride run.
    current_vertex: usize,
    outline: usize,
    stats: FlushStats,
}

impl<B: DrawBackend + ?Sized> FlushState<'_, B> {
    // ── level 1: clip ─────────────────────────────────────────────────────

    fn flush_clip_stacks_and_entries(&mut self, start: usize, len: usize) {
        self.stats.clip_batches += 1;
        let entries = self.entries;
        self.backend.flush_clip(entries[start].clip_stack.as_ref());

        batch(
            &entries[start..start + len],
            |a, b| padded_layers(a) == padded_layers(b),
            |s, l| self.flush_vbo_offsets_and_entries(start + s, l),
        );
    }

    // ── level 2: vertex stride ────────────────────────────────────────────

    fn flush_vbo_offsets_and_entries(&mut self, start: usize, len: usize) {
        self.stats.stride_batches += 1;
        self.current_vertex = 0;
        let entries = self.entries;

        batch(
            &entries[start..start + len],
            |a, b| a.n_layers == b.n_layers,
            |s, l| self.flush_texcoords_and_entries(start + s, l),
        );

        let stride_bytes = array_stride(entries[start].n_layers, self.software_transform) * 4;
        self.array_offset += 4 * stride_bytes * len;
    }

    // ── level 3: exact layer count ────────────────────────────────────────

    fn flush_texcoords_and_entries(&mut self, start: usize, len: usize) {
        self.stats.layer_batches += 1;
        let entries = self.entries;
        let n_layers = entries[start].n_layers;

        self.backend.bind_vertices(&VertexLayout {
            buffer: self.vbo,
            offset: self.array_offset,
            stride: array_stride(n_layers, self.software_transform) * 4,
            position_components: if self.software_transform { 3 } else { 2 },
            n_layers,
        });

        batch(
            &entries[start..start + len],
            |a, b| a.pipeline.equal(&b.pipeline, StateMask::without_color()),
            |s, l| self.flush_pipeline_and_entries(start + s, l),
        );
    }

    // ── level 4: pipeline ─────────────────────────────────────────────────

    fn flush_pipeline_and_entries(&mut self, start: usize, len: usize) {
        self.stats.pipeline_batches += 1;
        let entries = self.entries;
        let first = &entries[start];
        self.backend.flush_pipeline(&first.pipeline, first.n_layers);

        if self.software_transform {
            self.draw_batch(len);
            return;
        }

        batch(
            &entries[start..start + len],
            |a, b| a.modelview.bit_eq(&b.modelview),
            |s, l| self.flush_modelview_and_entries(start + s, l),
        );
    }

    // ── level 5: modelview ────────────────────────────────────────────────

    fn flush_modelview_and_entries(&mut self, start: usize, len: usize) {
        self.stats.modelview_batches += 1;
        self.backend.flush_modelview(&self.entries[start].modelview);
        self.draw_batch(len);
    }

    // ── draw ──────────────────────────────────────────────────────────────

    fn draw_batch(&mut self, len: usize) {
        let first_vertex = self.current_vertex as u32;
        log::trace!("journal: draw {len} quads from vertex {first_vertex}");

        if len == 1 && self.fans {
            self.submit(DrawCall::TriangleFan { first_vertex, vertex_count: 4 });
        } else {
            match (self.strategy, self.index_buffer) {
                (DrawStrategy::Indexed, Some(indices)) => {
                    let mut done = 0;
                    while done < len {
                        let n = (len - done).min(MAX_QUADS_PER_INDEXED_DRAW);
                        self.submit(DrawCall::IndexedTriangles {
                            indices,
                            base_vertex: first_vertex + (done * 4) as u32,
                            first_index: 0,
                            index_count: (n * 6) as u32,
                        });
                        done += n;
                    }
                }
                (DrawStrategy::Quads, _) => {
                    self.submit(DrawCall::Quads { first_vertex, vertex_count: (len * 4) as u32 });
                }
                _ => {
                    for q in 0..len {
                        self.submit(DrawCall::TriangleFan {
                            first_vertex: first_vertex + (q * 4) as u32,
                            vertex_count: 4,
                        });
                    }
                }
            }
        }

        if self.show_batches {
            let color = OUTLINE_PALETTE[self.outline % OUTLINE_PALETTE.len()];
            self.outline += 1;
            self.backend.draw_outline(first_vertex, len as u32, color);
        }

        self.current_vertex += len * 4;
        self.stats.quads += len;
    }

    #[inline]
    fn submit(&mut self, call: DrawCall) {
        self.backend.draw(call);
        self.stats.draw_calls += 1;
    }
}

impl Journal {
    /// Submits every logged quad to `backend`, then discards the log.
    ///
    /// `framebuffer` must be the framebuffer the quads were logged against;
    /// `target` carries its flush-time state. Flushing an empty journal does nothing.
    pub fn flush<B: DrawBackend + ?Sized>(
        &mut self,
        framebuffer: FramebufferId,
        target: &FlushTarget,
        backend: &mut B,
        indices: &mut QuadIndexBuffer,
    ) -> FlushStats {
        if self.entries.is_empty() {
            return FlushStats::default();
        }
        debug_assert_eq!(
            self.framebuffer,
            Some(framebuffer),
            "journal flushed against a different framebuffer"
        );

        let mut software_clipped = 0;
        if self.config.software_clip {
            let mut runs = Vec::new();
            batch(&self.entries, same_clip, |s, l| runs.push(s..s + l));
            for run in runs {
                software_clipped +=
                    clip::maybe_software_clip_entries(&mut self.entries[run], &mut self.vertices);
            }
        }

        let vbo = self.upload_vertices(backend);
        let caps = backend.caps();
        let strategy = DrawStrategy::select(caps);
        // Grown before the flush begins so the buffer is stable while draws reference it.
        let single_fan = self.entries.len() == 1 && caps.triangle_fans;
        let index_buffer = (strategy == DrawStrategy::Indexed && !single_fan)
            .then(|| indices.ensure(backend, self.entries.len()));

        backend.begin_flush(target);
        if self.config.software_transform {
            backend.flush_modelview(&Matrix::IDENTITY);
        }

        let mut state = FlushState {
            backend: &mut *backend,
            entries: &self.entries,
            vbo,
            strategy,
            fans: caps.triangle_fans,
            index_buffer,
            software_transform: self.config.software_transform,
            show_batches: self.config.show_batches,
            array_offset: 0,
            current_vertex: 0,
            outline: 0,
            stats: FlushStats { software_clipped, ..FlushStats::default() },
        };
        batch(&self.entries, same_clip, |s, l| state.flush_clip_stacks_and_entries(s, l));
        let stats = state.stats;

        backend.end_flush();

        log::debug!(
            "journal flush: {} quads, {} draws (clip {}, stride {}, layers {}, pipeline {}, modelview {}), {} software-clipped",
            stats.quads,
            stats.draw_calls,
            stats.clip_batches,
            stats.stride_batches,
            stats.layer_batches,
            stats.pipeline_batches,
            stats.modelview_batches,
            stats.software_clipped,
        );

        self.discard();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::journal::entry::tests::{framebuffer_id, log, texture_id};
    use crate::journal::{JournalConfig, QuadContext};
    use crate::paint::Color;
    use crate::pipeline::{BlendMode, Pipeline};
    use crate::render::{BackendCaps, SoftwareBackend};

    struct Rig {
        backend: SoftwareBackend,
        indices: QuadIndexBuffer,
        fb: FramebufferId,
        target: FlushTarget,
    }

    impl Rig {
        fn new(caps: BackendCaps) -> Self {
            let mut backend = SoftwareBackend::with_caps(caps);
            let texture = texture_id();
            backend.create_texture(texture, 32, 32);
            Self {
                backend,
                indices: QuadIndexBuffer::new(),
                fb: framebuffer_id(),
                target: FlushTarget {
                    texture,
                    width: 32,
                    height: 32,
                    viewport: Viewport::new(0.0, 0.0, 32.0, 32.0),
                    projection: Matrix::ortho(0.0, 32.0, 32.0, 0.0, -1.0, 1.0),
                },
            }
        }

        fn flush(&mut self, journal: &mut Journal) -> FlushStats {
            journal.flush(self.fb, &self.target, &mut self.backend, &mut self.indices)
        }
    }

    fn layered(n: usize) -> Pipeline {
        let mut p = Pipeline::new();
        for i in 0..n {
            p.set_layer_texture(i, texture_id());
        }
        p
    }

    #[test]
    fn flushing_empty_journal_is_a_noop() {
        let mut rig = Rig::new(BackendCaps::default());
        let mut journal = Journal::default();
        assert_eq!(rig.flush(&mut journal), FlushStats::default());
        assert_eq!(rig.backend.stats().flushes, 0);
    }

    #[test]
    fn same_state_quads_share_one_draw() {
        let mut rig = Rig::new(BackendCaps::default());
        let mut journal = Journal::default();
        for i in 0..5 {
            let x = i as f32 * 2.0;
            let p = Pipeline::with_color(Color::from_premul(0.0, 0.0, x / 10.0, 1.0));
            log(&mut journal, rig.fb, [x, 0.0, x + 1.0, 1.0], &p, None);
        }
        let stats = rig.flush(&mut journal);
        assert_eq!(stats.quads, 5);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.pipeline_batches, 1);
    }

    #[test]
    fn discard_idempotence() {
        let mut rig = Rig::new(BackendCaps::default());
        let mut journal = Journal::default();
        log(&mut journal, rig.fb, [0.0, 0.0, 4.0, 4.0], &Pipeline::new(), None);
        assert_eq!(rig.flush(&mut journal).quads, 1);
        assert!(journal.is_empty());

        let draws = rig.backend.stats().draws;
        assert_eq!(rig.flush(&mut journal), FlushStats::default());
        assert_eq!(rig.backend.stats().draws, draws);
        assert!(journal.is_empty());
    }

    #[test]
    fn stride_padding_groups_small_layer_counts() {
        let cases = [((0, 1), 1), ((1, 2), 1), ((1, 3), 2)];
        for ((a, b), expected) in cases {
            let mut rig = Rig::new(BackendCaps::default());
            let mut journal = Journal::default();
            log(&mut journal, rig.fb, [0.0, 0.0, 1.0, 1.0], &layered(a), None);
            log(&mut journal, rig.fb, [2.0, 0.0, 3.0, 1.0], &layered(b), None);
            let stats = rig.flush(&mut journal);
            assert_eq!(stats.stride_batches, expected, "layers {a}/{b}");
            assert_eq!(stats.layer_batches, 2, "layers {a}/{b}");
        }
    }

    #[test]
    fn pipeline_change_splits_batch() {
        let mut rig = Rig::new(BackendCaps::default());
        let mut journal = Journal::default();
        let mut replace = Pipeline::new();
        replace.set_blend(BlendMode::Replace);
        log(&mut journal, rig.fb, [0.0, 0.0, 1.0, 1.0], &Pipeline::new(), None);
        log(&mut journal, rig.fb, [1.0, 0.0, 2.0, 1.0], &replace, None);
        log(&mut journal, rig.fb, [2.0, 0.0, 3.0, 1.0], &Pipeline::new(), None);
        let stats = rig.flush(&mut journal);
        assert_eq!(stats.pipeline_batches, 3);
        assert_eq!(stats.draw_calls, 3);
    }

    #[test]
    fn modelview_level_only_without_software_transform() {
        for software_transform in [true, false] {
            let mut rig = Rig::new(BackendCaps::default());
            let mut journal = Journal::new(JournalConfig { software_transform, ..Default::default() });
            for i in 0..3 {
                let mv = Matrix::translation(i as f32 * 4.0, 0.0, 0.0);
                let ctx = QuadContext { framebuffer: rig.fb, modelview: &mv, clip: None };
                journal.log_quad(ctx, [0.0, 0.0, 2.0, 2.0], &Pipeline::new(), 0, None, &[]);
            }
            let stats = rig.flush(&mut journal);
            if software_transform {
                assert_eq!((stats.modelview_batches, stats.draw_calls), (0, 1));
            } else {
                assert_eq!((stats.modelview_batches, stats.draw_calls), (3, 3));
            }
            // Same pixels either way.
            assert_eq!(rig.backend.pixel(rig.target.texture, 9, 1), Some([0xff; 4]));
        }
    }

    #[test]
    fn strategies_follow_caps() {
        let quads = BackendCaps { indexed: false, quads: true, triangle_fans: false };
        let fans = BackendCaps { indexed: false, quads: false, triangle_fans: true };
        for (caps, expected_draws) in [(quads, 1), (fans, 3)] {
            let mut rig = Rig::new(caps);
            let mut journal = Journal::default();
            for i in 0..3 {
                let x = i as f32;
                log(&mut journal, rig.fb, [x, 0.0, x + 1.0, 1.0], &Pipeline::new(), None);
            }
            assert_eq!(rig.flush(&mut journal).draw_calls, expected_draws);
        }
    }

    #[test]
    fn single_quad_uses_fan_when_available() {
        let mut rig = Rig::new(BackendCaps::default());
        let mut journal = Journal::default();
        log(&mut journal, rig.fb, [0.0, 0.0, 1.0, 1.0], &Pipeline::new(), None);
        rig.flush(&mut journal);
        assert_eq!(rig.backend.stats().fans, 1);
        assert_eq!(rig.indices.capacity(), 0);
    }

    #[test]
    fn software_clip_merges_clip_batches() {
        let mut rig = Rig::new(BackendCaps::default());
        let mut journal = Journal::default();
        let proj = rig.target.projection;
        let vp = rig.target.viewport;
        let a = ClipStack::push_rectangle(None, [0.0, 0.0, 8.0, 8.0], &Matrix::IDENTITY, &proj, vp);
        let b = ClipStack::push_rectangle(None, [8.0, 0.0, 16.0, 8.0], &Matrix::IDENTITY, &proj, vp);
        log(&mut journal, rig.fb, [0.0, 0.0, 12.0, 4.0], &Pipeline::new(), Some(&a));
        log(&mut journal, rig.fb, [4.0, 0.0, 16.0, 4.0], &Pipeline::new(), Some(&b));
        let stats = rig.flush(&mut journal);
        assert_eq!(stats.software_clipped, 2);
        assert_eq!(stats.clip_batches, 1);
        assert_eq!(stats.draw_calls, 1);
    }

    #[test]
    fn show_batches_outlines_each_leaf() {
        let mut rig = Rig::new(BackendCaps::default());
        let mut journal = Journal::new(JournalConfig { show_batches: true, ..Default::default() });
        let mut replace = Pipeline::new();
        replace.set_blend(BlendMode::Replace);
        log(&mut journal, rig.fb, [0.0, 0.0, 1.0, 1.0], &Pipeline::new(), None);
        log(&mut journal, rig.fb, [1.0, 0.0, 2.0, 1.0], &replace, None);
        rig.flush(&mut journal);
        assert_eq!(rig.backend.stats().outlines, 2);
    }
}
