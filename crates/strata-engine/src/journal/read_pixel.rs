//! Answering single-pixel reads from the log without flushing.

use crate::clip::ClipKind;
use crate::coords::{point_in_poly, Matrix, Vec2, Viewport};
use crate::paint::PackedColor;
use crate::pipeline::{Pipeline, StateMask};

use super::{clip, log_stride, Journal, JournalEntry};

/// Fast answers allowed between two discards. Past this, callers are better
/// served by flushing once.
pub const MAX_FAST_READS: u32 = 50;

/// Layout requested by a pixel read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8888,
    /// Premultiplied RGBA.
    Rgba8888Pre,
    Bgra8888,
    A8,
}

/// Outcome of [`Journal::try_read_pixel`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FastRead {
    /// The topmost quad over the pixel paints exactly this premultiplied colour.
    Hit(PackedColor),
    /// No logged quad touches the pixel.
    Miss,
    /// The log cannot decide; flush and read back.
    Unknown,
}

fn corners_poly(quad: [f32; 4], modelview: &Matrix, projection: &Matrix, viewport: Viewport) -> [Vec2; 4] {
    Vec2::quad_corners(quad).map(|c| viewport.project(modelview, projection, c))
}

/// Per-entry verdict while walking the log from the top.
enum Probe {
    Covers,
    Passes,
    Undecidable,
}

impl Journal {
    /// Tries to answer the colour of device pixel `(x, y)` from the log alone.
    ///
    /// Only opaque, untextured quads drawn with `default_pipeline` (colour
    /// aside) can answer. `Hit` and `Miss` count towards [`MAX_FAST_READS`].
    pub fn try_read_pixel(
        &mut self,
        x: i32,
        y: i32,
        format: PixelFormat,
        viewport: Viewport,
        projection: &Matrix,
        default_pipeline: &Pipeline,
    ) -> FastRead {
        if !self.config.fast_read_pixel {
            return FastRead::Unknown;
        }
        if !matches!(format, PixelFormat::Rgba8888 | PixelFormat::Rgba8888Pre) {
            return FastRead::Unknown;
        }
        if self.fast_read_pixel_count >= MAX_FAST_READS {
            log::trace!("fast read: budget of {MAX_FAST_READS} spent");
            return FastRead::Unknown;
        }

        let answer = self.read_from_log(x, y, viewport, projection, default_pipeline);
        if answer != FastRead::Unknown {
            self.fast_read_pixel_count += 1;
        }
        answer
    }

    fn read_from_log(
        &self,
        x: i32,
        y: i32,
        viewport: Viewport,
        projection: &Matrix,
        default_pipeline: &Pipeline,
    ) -> FastRead {
        let center = Vec2::pixel_center(x, y);

        for entry in self.entries.iter().rev() {
            match self.probe(entry, x, y, center, viewport, projection) {
                Probe::Passes => continue,
                Probe::Undecidable => return FastRead::Unknown,
                Probe::Covers => {}
            }

            if !entry.pipeline.equal(default_pipeline, StateMask::without_color()) {
                return FastRead::Unknown;
            }
            let color = PackedColor::from_f32_slot(self.vertices[entry.vertex_offset]);
            if !color.is_opaque() {
                return FastRead::Unknown;
            }
            return FastRead::Hit(color);
        }

        FastRead::Miss
    }

    fn probe(
        &self,
        entry: &JournalEntry,
        x: i32,
        y: i32,
        center: Vec2,
        viewport: Viewport,
        projection: &Matrix,
    ) -> Probe {
        let rec = &self.vertices[entry.vertex_offset..];
        let stride = log_stride(entry.n_layers);
        let corners = [rec[1], rec[2], rec[1 + stride], rec[2 + stride]];

        if !point_in_poly(center, &corners_poly(corners, &entry.modelview, projection, viewport)) {
            return Probe::Passes;
        }

        let Some(stack) = entry.clip_stack.as_ref() else {
            return Probe::Covers;
        };
        if !stack.combined_bounds().contains(x, y) {
            return Probe::Passes;
        }

        let mut needs_software_clip = false;
        for node in stack.ancestors() {
            match node.kind() {
                ClipKind::Path => return Probe::Undecidable,
                ClipKind::Rectangle(r) if !r.can_be_scissor => needs_software_clip = true,
                _ => {}
            }
        }
        if !needs_software_clip {
            // Scissor and window rectangles are exact in device space.
            return Probe::Covers;
        }

        let Some(bounds) = clip::software_clip_bounds(stack, &entry.modelview, true) else {
            return Probe::Undecidable;
        };
        match clip::clamp_corners(corners, bounds) {
            None => Probe::Passes,
            Some(clamped) => {
                let poly = corners_poly(clamped, &entry.modelview, projection, viewport);
                if point_in_poly(center, &poly) {
                    Probe::Covers
                } else {
                    Probe::Passes
                }
            }
        }
    }
}
