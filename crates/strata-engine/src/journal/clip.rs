//! Software clipping: folds rectangle clips into quad geometry so a run of
//! quads can skip GPU clip state entirely.

use crate::clip::{ClipKind, ClipStack};
use crate::coords::Matrix;
use crate::pipeline::Pipeline;

use super::{log_stride, record_len, JournalEntry};

/// Runs this long or longer keep GPU clipping; one clip flush is cheap next to
/// rewriting that many quads.
pub(crate) const SOFTWARE_CLIP_MAX_BATCH: usize = 8;

const TRANSLATION_EPSILON: f32 = 1e-6;

/// Clip bound in a quad's local space. May be inverted when ancestors are disjoint.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct ClipBounds {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl ClipBounds {
    const UNBOUNDED: ClipBounds = ClipBounds {
        x0: f32::MIN,
        y0: f32::MIN,
        x1: f32::MAX,
        y1: f32::MAX,
    };
}

/// Finds `(tx, ty)` such that `b == a · T(tx, ty, 0)`.
///
/// The translation is solved from the `a14`/`a24` equations; the remaining
/// entries of the upper 3×4 block must then agree within a small epsilon and
/// the bottom rows must be bitwise equal.
pub(crate) fn translation_between(a: &Matrix, b: &Matrix) -> Option<(f32, f32)> {
    if (0..4).any(|col| a.get(3, col).to_bits() != b.get(3, col).to_bits()) {
        return None;
    }

    let (a11, a12, a14) = (a.get(0, 0), a.get(0, 1), a.get(0, 3));
    let (a21, a22, a24) = (a.get(1, 0), a.get(1, 1), a.get(1, 3));
    let det = a11 * a22 - a12 * a21;
    if det == 0.0 || !det.is_finite() {
        return None;
    }

    let rx = b.get(0, 3) - a14;
    let ry = b.get(1, 3) - a24;
    let tx = (rx * a22 - a12 * ry) / det;
    let ty = (a11 * ry - a21 * rx) / det;

    let close = |x: f32, y: f32| (x - y).abs() <= TRANSLATION_EPSILON;

    for row in 0..3 {
        for col in 0..3 {
            if !close(a.get(row, col), b.get(row, col)) {
                return None;
            }
        }
    }
    for row in 0..3 {
        let expected = a.get(row, 0) * tx + a.get(row, 1) * ty + a.get(row, 3);
        if !close(expected, b.get(row, 3)) {
            return None;
        }
    }

    Some((tx, ty))
}

/// Intersects every rectangle ancestor of `clip`, expressed in the local
/// space of `modelview`.
///
/// Returns `None` when an ancestor is not a rectangle (unless
/// `skip_window_rects` allows window rectangles through) or is not a pure
/// translation of `modelview`.
pub(crate) fn software_clip_bounds(
    clip: &ClipStack,
    modelview: &Matrix,
    skip_window_rects: bool,
) -> Option<ClipBounds> {
    let mut out = ClipBounds::UNBOUNDED;
    for node in clip.ancestors() {
        let rect = match node.kind() {
            ClipKind::Rectangle(r) => r,
            ClipKind::WindowRect if skip_window_rects => continue,
            _ => return None,
        };
        let (tx, ty) = translation_between(modelview, &rect.modelview)?;
        let local = rect.local_rect();
        let max = local.max();
        out.x0 = out.x0.max(local.origin.x + tx);
        out.y0 = out.y0.max(local.origin.y + ty);
        out.x1 = out.x1.min(max.x + tx);
        out.y1 = out.y1.min(max.y + ty);
    }
    Some(out)
}

/// Clamps quad corners `[x1, y1, x2, y2]` to `bounds`, keeping their orientation.
///
/// `None` when nothing of the quad survives.
pub(crate) fn clamp_corners(corners: [f32; 4], bounds: ClipBounds) -> Option<[f32; 4]> {
    let [x1, y1, x2, y2] = corners;
    let clamp = |v: f32, lo: f32, hi: f32| v.max(lo).min(hi);

    let mut rx1 = clamp(x1.min(x2), bounds.x0, bounds.x1);
    let mut rx2 = clamp(x1.max(x2), bounds.x0, bounds.x1);
    let mut ry1 = clamp(y1.min(y2), bounds.y0, bounds.y1);
    let mut ry2 = clamp(y1.max(y2), bounds.y0, bounds.y1);

    if rx1 == rx2 || ry1 == ry2 {
        return None;
    }
    if x1 > x2 {
        std::mem::swap(&mut rx1, &mut rx2);
    }
    if y1 > y2 {
        std::mem::swap(&mut ry1, &mut ry2);
    }
    Some([rx1, ry1, rx2, ry2])
}

/// Rewriting texture coordinates is only sound when nothing else remaps them.
pub(crate) fn pipeline_allows_software_clip(pipeline: &Pipeline) -> bool {
    pipeline.user_program().is_none() && !pipeline.has_texture_matrices()
}

/// Clips one logged record in place. `record` starts at the colour slot.
pub(crate) fn software_clip_record(record: &mut [f32], n_layers: usize, bounds: ClipBounds) {
    let stride = log_stride(n_layers);
    let (vx1, vy1) = (record[1], record[2]);
    let (vx2, vy2) = (record[1 + stride], record[2 + stride]);

    let Some([nx1, ny1, nx2, ny2]) = clamp_corners([vx1, vy1, vx2, vy2], bounds) else {
        // Zero-area quad: keeps its slot (and the index pattern) but covers no pixels.
        record[1..].fill(0.0);
        return;
    };

    record[1] = nx1;
    record[2] = ny1;
    record[1 + stride] = nx2;
    record[2 + stride] = ny2;

    // Non-collapsed clamping implies a non-degenerate original quad.
    let fx1 = (nx1 - vx1) / (vx2 - vx1);
    let fy1 = (ny1 - vy1) / (vy2 - vy1);
    let fx2 = (nx2 - vx1) / (vx2 - vx1);
    let fy2 = (ny2 - vy1) / (vy2 - vy1);

    for layer in 0..n_layers {
        let c1 = 3 + 2 * layer;
        let c2 = c1 + stride;
        let (s1, t1, s2, t2) = (record[c1], record[c1 + 1], record[c2], record[c2 + 1]);
        record[c1] = fx1 * (s2 - s1) + s1;
        record[c1 + 1] = fy1 * (t2 - t1) + t1;
        record[c2] = fx2 * (s2 - s1) + s1;
        record[c2 + 1] = fy2 * (t2 - t1) + t1;
    }
}

/// Tries to fold the shared clip of a clip-identical run into its quads.
///
/// All or nothing: either every entry is rewritten and loses its clip, or the
/// run is left untouched for GPU clipping. Returns the number of entries clipped.
pub(crate) fn maybe_software_clip_entries(run: &mut [JournalEntry], vertices: &mut [f32]) -> usize {
    let Some(clip) = run.first().and_then(|e| e.clip_stack.clone()) else {
        return 0;
    };
    if run.len() >= SOFTWARE_CLIP_MAX_BATCH {
        return 0;
    }
    if !clip.ancestors().all(|n| matches!(n.kind(), ClipKind::Rectangle(_))) {
        return 0;
    }

    let mut bounds: Vec<ClipBounds> = Vec::with_capacity(run.len());
    for (i, entry) in run.iter().enumerate() {
        if !pipeline_allows_software_clip(&entry.pipeline) {
            log::trace!("software clip: rejected, pipeline remaps texture coordinates");
            return 0;
        }
        if i > 0 && run[i - 1].modelview.bit_eq(&entry.modelview) {
            bounds.push(bounds[i - 1]);
            continue;
        }
        match software_clip_bounds(&clip, &entry.modelview, false) {
            Some(b) => bounds.push(b),
            None => {
                log::trace!("software clip: rejected, clip is not a translation of the modelview");
                return 0;
            }
        }
    }

    for (entry, b) in run.iter_mut().zip(bounds) {
        let start = entry.vertex_offset;
        let end = start + record_len(entry.n_layers);
        debug_assert!(end <= vertices.len(), "entry layer count disagrees with vertex log");
        software_clip_record(&mut vertices[start..end], entry.n_layers, b);
        entry.clip_stack = None;
    }
    run.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{PixelBounds, Viewport};
    use crate::journal::entry::tests::{framebuffer_id, log, texture_id};
    use crate::journal::Journal;
    use crate::paint::{Color, PackedColor};
    use crate::pipeline::{Layer, ProgramId};

    fn rect_clip(parent: Option<&ClipStack>, rect: [f32; 4], mv: &Matrix) -> ClipStack {
        let proj = Matrix::ortho(0.0, 100.0, 100.0, 0.0, -1.0, 1.0);
        ClipStack::push_rectangle(parent, rect, mv, &proj, Viewport::new(0.0, 0.0, 100.0, 100.0))
    }

    fn clip_all(journal: &mut Journal) -> usize {
        let Journal { entries, vertices, .. } = journal;
        maybe_software_clip_entries(entries, vertices)
    }

    // ── translation test ──────────────────────────────────────────────────

    #[test]
    fn translation_of_identity() {
        let b = Matrix::translation(3.0, -2.0, 0.0);
        assert_eq!(translation_between(&Matrix::IDENTITY, &b), Some((3.0, -2.0)));
    }

    #[test]
    fn translation_under_scale() {
        let a = Matrix::translation(10.0, 10.0, 0.0).scale(2.0, 4.0, 1.0);
        let b = a.translate(3.0, 1.5, 0.0);
        let (tx, ty) = translation_between(&a, &b).expect("pure translation");
        assert!((tx - 3.0).abs() < 1e-6 && (ty - 1.5).abs() < 1e-6);
    }

    #[test]
    fn rotation_is_not_a_translation() {
        let a = Matrix::IDENTITY;
        let b = Matrix::rotation_z(10.0);
        assert_eq!(translation_between(&a, &b), None);
    }

    #[test]
    fn z_translation_is_rejected() {
        let b = Matrix::translation(1.0, 1.0, 5.0);
        assert_eq!(translation_between(&Matrix::IDENTITY, &b), None);
    }

    #[test]
    fn bottom_row_must_match_bitwise() {
        let mut b = Matrix::translation(1.0, 1.0, 0.0);
        b.set(3, 3, 1.0 + 1e-7);
        assert_eq!(translation_between(&Matrix::IDENTITY, &b), None);
    }

    #[test]
    fn singular_modelview_is_rejected() {
        let a = Matrix::scaling(0.0, 1.0, 1.0);
        assert_eq!(translation_between(&a, &a), None);
    }

    // ── record rewriting ──────────────────────────────────────────────────

    #[test]
    fn contained_quad_is_unchanged_and_unclipped() {
        let fb = framebuffer_id();
        let clip = rect_clip(None, [0.0, 0.0, 50.0, 50.0], &Matrix::IDENTITY);
        let mut journal = Journal::default();
        log(&mut journal, fb, [10.0, 10.0, 20.0, 20.0], &Pipeline::new(), Some(&clip));
        let before = journal.vertices().to_vec();

        assert_eq!(clip_all(&mut journal), 1);
        assert!(journal.entries()[0].clip_stack().is_none());
        assert_eq!(journal.vertices()[1..], before[1..]);
    }

    #[test]
    fn quad_outside_clip_becomes_zero_area() {
        let fb = framebuffer_id();
        let clip = rect_clip(None, [0.0, 0.0, 5.0, 5.0], &Matrix::IDENTITY);
        let mut journal = Journal::default();
        let red = Pipeline::with_color(Color::from_premul(1.0, 0.0, 0.0, 1.0));
        log(&mut journal, fb, [10.0, 10.0, 20.0, 20.0], &red, Some(&clip));

        assert_eq!(clip_all(&mut journal), 1);
        let v = journal.vertices();
        assert!(v[1..].iter().all(|&x| x == 0.0));
        assert_eq!(PackedColor::from_f32_slot(v[0]).to_rgba8(), [255, 0, 0, 255]);
    }

    #[test]
    fn partial_overlap_clamps_and_remaps_texcoords() {
        let fb = framebuffer_id();
        let clip = rect_clip(None, [0.0, 0.0, 15.0, 100.0], &Matrix::IDENTITY);
        let mut p = Pipeline::new();
        p.set_layer_texture(0, texture_id());
        let mut journal = Journal::default();
        let ctx = super::super::QuadContext {
            framebuffer: fb,
            modelview: &Matrix::IDENTITY,
            clip: Some(&clip),
        };
        journal.log_quad(ctx, [10.0, 0.0, 20.0, 10.0], &p, 1, None, &[0.0, 0.0, 1.0, 1.0]);

        assert_eq!(clip_all(&mut journal), 1);
        let v = journal.vertices();
        // corner 1: x, y, s, t | corner 2: x, y, s, t
        assert_eq!(&v[1..], &[10.0, 0.0, 0.0, 0.0, 15.0, 10.0, 0.5, 1.0]);
    }

    #[test]
    fn inverted_corners_keep_orientation() {
        let bounds = ClipBounds { x0: 0.0, y0: 0.0, x1: 15.0, y1: 100.0 };
        assert_eq!(
            clamp_corners([20.0, 10.0, 10.0, 0.0], bounds),
            Some([15.0, 10.0, 10.0, 0.0])
        );
    }

    #[test]
    fn translated_clip_is_moved_into_quad_space() {
        let fb = framebuffer_id();
        // Clip pushed under translate(5, 0); quad logged under identity.
        let clip = rect_clip(None, [0.0, 0.0, 10.0, 10.0], &Matrix::translation(5.0, 0.0, 0.0));
        let mut journal = Journal::default();
        log(&mut journal, fb, [0.0, 0.0, 10.0, 10.0], &Pipeline::new(), Some(&clip));

        assert_eq!(clip_all(&mut journal), 1);
        let v = journal.vertices();
        assert_eq!((v[1], v[3]), (5.0, 10.0));
    }

    #[test]
    fn nested_rectangles_intersect() {
        let outer = rect_clip(None, [0.0, 0.0, 12.0, 100.0], &Matrix::IDENTITY);
        let inner = rect_clip(Some(&outer), [4.0, 0.0, 50.0, 100.0], &Matrix::IDENTITY);
        let b = software_clip_bounds(&inner, &Matrix::IDENTITY, false).expect("rectangles");
        assert_eq!((b.x0, b.x1), (4.0, 12.0));
    }

    // ── rejection ─────────────────────────────────────────────────────────

    #[test]
    fn long_runs_are_left_to_the_gpu() {
        let fb = framebuffer_id();
        let clip = rect_clip(None, [0.0, 0.0, 5.0, 5.0], &Matrix::IDENTITY);
        let mut journal = Journal::default();
        for i in 0..SOFTWARE_CLIP_MAX_BATCH {
            let x = i as f32;
            log(&mut journal, fb, [x, 0.0, x + 1.0, 1.0], &Pipeline::new(), Some(&clip));
        }
        assert_eq!(clip_all(&mut journal), 0);
        assert!(journal.entries().iter().all(|e| e.clip_stack().is_some()));
    }

    #[test]
    fn window_rect_ancestor_rejects_run() {
        let fb = framebuffer_id();
        let window = ClipStack::push_window_rect(None, PixelBounds::new(0, 0, 50, 50));
        let clip = rect_clip(Some(&window), [0.0, 0.0, 5.0, 5.0], &Matrix::IDENTITY);
        let mut journal = Journal::default();
        log(&mut journal, fb, [0.0, 0.0, 10.0, 10.0], &Pipeline::new(), Some(&clip));
        assert_eq!(clip_all(&mut journal), 0);
        // The reader may skip window rectangles, which are exact in device space.
        assert!(software_clip_bounds(&clip, &Matrix::IDENTITY, true).is_some());
    }

    #[test]
    fn user_program_or_texture_matrix_rejects_whole_run() {
        let fb = framebuffer_id();
        let clip = rect_clip(None, [0.0, 0.0, 5.0, 5.0], &Matrix::IDENTITY);

        let mut programmed = Pipeline::new();
        programmed.set_user_program(Some(ProgramId(7)));
        let mut journal = Journal::default();
        log(&mut journal, fb, [0.0, 0.0, 10.0, 10.0], &Pipeline::new(), Some(&clip));
        log(&mut journal, fb, [0.0, 0.0, 10.0, 10.0], &programmed, Some(&clip));
        let before = journal.vertices().to_vec();
        assert_eq!(clip_all(&mut journal), 0);
        assert_eq!(journal.vertices(), &before[..]);

        let mut matrixed = Pipeline::new();
        matrixed.set_layer(0, Layer::new(texture_id()).with_matrix(Matrix::scaling(2.0, 2.0, 1.0)));
        let mut journal = Journal::default();
        log(&mut journal, fb, [0.0, 0.0, 10.0, 10.0], &matrixed, Some(&clip));
        assert_eq!(clip_all(&mut journal), 0);
    }

    #[test]
    fn rotated_quad_keeps_gpu_clip() {
        let fb = framebuffer_id();
        let clip = rect_clip(None, [0.0, 0.0, 5.0, 5.0], &Matrix::IDENTITY);
        let mut journal = Journal::default();
        let mv = Matrix::rotation_z(30.0);
        let ctx = super::super::QuadContext { framebuffer: fb, modelview: &mv, clip: Some(&clip) };
        journal.log_quad(ctx, [0.0, 0.0, 10.0, 10.0], &Pipeline::new(), 0, None, &[]);
        assert_eq!(clip_all(&mut journal), 0);
    }
}
