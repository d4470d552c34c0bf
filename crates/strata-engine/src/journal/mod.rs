//! Render command journal.
//!
//! Quads are logged into a compact append-only record instead of being drawn
//! immediately. A flush then:
//!
//! 1. gives each clip-identical run to the software clipper ([`clip`]),
//! 2. expands the compact records into GPU vertices ([`upload`]),
//! 3. walks nested batching levels (clip, stride, layer count, pipeline,
//!    modelview) and issues one draw per leaf batch ([`flush`]).
//!
//! Batching only ever merges neighbours, so paint order is log order.
//!
//! Single-pixel reads can often be answered from the log without a flush
//! ([`read_pixel`]).

mod batch;
mod clip;
mod config;
mod entry;
mod flush;
mod read_pixel;
mod upload;

use crate::coords::PixelBounds;
use crate::framebuffer::FramebufferId;
use crate::render::DrawBackend;

pub use batch::batch;
pub use config::{JournalConfig, DEBUG_ENV_VAR};
pub use entry::{JournalEntry, QuadContext};
pub use flush::FlushStats;
pub use read_pixel::{FastRead, PixelFormat, MAX_FAST_READS};

use upload::BufferPool;

#[cfg(test)]
pub(crate) use entry::tests as test_support;

/// Texture layers are padded to this count when computing vertex strides.
const MIN_LAYER_PADDING: usize = 2;

/// Words per logged corner: `x, y` plus `s, t` per layer.
#[inline]
pub(crate) const fn log_stride(n_layers: usize) -> usize {
    2 + 2 * n_layers
}

/// Words per logged quad: packed colour plus two corners.
#[inline]
pub(crate) const fn record_len(n_layers: usize) -> usize {
    1 + 2 * log_stride(n_layers)
}

/// Floats per uploaded vertex.
#[inline]
pub(crate) const fn array_stride(n_layers: usize, software_transform: bool) -> usize {
    let pos = if software_transform { 3 } else { 2 };
    let layers = if n_layers < MIN_LAYER_PADDING { MIN_LAYER_PADDING } else { n_layers };
    pos + 1 + 2 * layers
}

/// Deferred quad log for one framebuffer.
#[derive(Debug)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    vertices: Vec<f32>,
    /// Bytes the uploaded vertex buffer will need.
    needed_vbo_len: usize,
    /// Target of the logged quads; set iff `entries` is non-empty.
    framebuffer: Option<FramebufferId>,
    pool: BufferPool,
    fast_read_pixel_count: u32,
    config: JournalConfig,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(JournalConfig::default())
    }
}

impl Journal {
    pub fn new(config: JournalConfig) -> Self {
        Self {
            entries: Vec::new(),
            vertices: Vec::new(),
            needed_vbo_len: 0,
            framebuffer: None,
            pool: BufferPool::new(),
            fast_read_pixel_count: 0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    #[inline]
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    #[inline]
    pub fn needed_vbo_len(&self) -> usize {
        self.needed_vbo_len
    }

    /// Framebuffer the pending quads target.
    #[inline]
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// Drops every logged quad and releases the framebuffer reference.
    ///
    /// Pooled GPU buffers are kept for the next flush.
    pub fn discard(&mut self) {
        if !self.entries.is_empty() {
            log::trace!("journal: discarding {} entries", self.entries.len());
        }
        self.entries.clear();
        self.vertices.clear();
        self.needed_vbo_len = 0;
        self.framebuffer = None;
        self.fast_read_pixel_count = 0;
    }

    /// Whether every pending quad is guaranteed to be clipped to `bounds`.
    ///
    /// The first entry's clip chain picks the outermost ancestor still inside
    /// `bounds`; every other entry must have that same node among its
    /// ancestors. Unclipped entries fail the test.
    pub fn all_entries_within_bounds(&self, bounds: PixelBounds) -> bool {
        let Some(first) = self.entries.first() else {
            return true;
        };
        let Some(stack) = first.clip_stack.as_ref() else {
            return false;
        };

        let mut reference = None;
        for node in stack.ancestors() {
            if node.combined_bounds().within(bounds) {
                reference = Some(node);
            } else {
                break;
            }
        }
        let Some(reference) = reference else {
            return false;
        };

        self.entries[1..].iter().all(|e| {
            e.clip_stack
                .as_ref()
                .is_some_and(|c| c.ancestors().any(|n| n.ptr_eq(reference)))
        })
    }

    /// Returns pooled buffers to the backend. Call before dropping the journal.
    pub fn release_buffers<B: DrawBackend + ?Sized>(&mut self, backend: &mut B) {
        self.pool.release_all(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipStack;
    use crate::journal::test_support::{framebuffer_id, log};
    use crate::pipeline::Pipeline;

    #[test]
    fn entries_within_bounds_share_a_contained_ancestor() {
        let fb = framebuffer_id();
        let p = Pipeline::new();
        let bounds = PixelBounds::new(0, 0, 16, 16);
        let outer = ClipStack::push_window_rect(None, PixelBounds::new(0, 0, 12, 12));
        let inner = ClipStack::push_window_rect(Some(&outer), PixelBounds::new(2, 2, 8, 8));
        let elsewhere = ClipStack::push_window_rect(None, PixelBounds::new(0, 0, 12, 12));

        let mut journal = Journal::default();
        assert!(journal.all_entries_within_bounds(bounds));

        log(&mut journal, fb, [0.0, 0.0, 4.0, 4.0], &p, Some(&inner));
        log(&mut journal, fb, [4.0, 4.0, 8.0, 8.0], &p, Some(&outer));
        assert!(journal.all_entries_within_bounds(bounds));
        // The reference node is `outer`, which is not inside these bounds.
        assert!(!journal.all_entries_within_bounds(PixelBounds::new(0, 0, 10, 10)));

        log(&mut journal, fb, [0.0, 0.0, 1.0, 1.0], &p, Some(&elsewhere));
        assert!(!journal.all_entries_within_bounds(bounds));

        journal.discard();
        log(&mut journal, fb, [0.0, 0.0, 1.0, 1.0], &p, None);
        assert!(!journal.all_entries_within_bounds(bounds));
    }

    #[test]
    fn strides() {
        assert_eq!(log_stride(0), 2);
        assert_eq!(log_stride(3), 8);
        assert_eq!(record_len(1), 9);
        assert_eq!(array_stride(0, true), 3 + 1 + 4);
        assert_eq!(array_stride(2, true), array_stride(1, true));
        assert_eq!(array_stride(3, false), 2 + 1 + 6);
    }
}
