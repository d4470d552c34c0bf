//! CPU rasterizer implementing [`DrawBackend`].
//!
//! Used for tests and headless runs. Pixels are premultiplied RGBA8, sampled
//! at pixel centres with a top-left fill rule, so adjacent quads and the two
//! triangles of a quad never double-cover a pixel.

use std::collections::HashMap;

use anyhow::{bail, Context as _, Result};
use slotmap::SecondaryMap;

use crate::clip::ClipStack;
use crate::coords::{Matrix, PixelBounds, Vec2};
use crate::paint::PackedColor;
use crate::pipeline::{BlendMode, Filter, Layer, Pipeline, Wrap};
use crate::texture::TextureId;

use super::backend::{
    BackendCaps, BufferId, BufferUsage, DrawBackend, DrawCall, FlushTarget, VertexLayout,
};

/// Counters for what the backend was asked to do.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SoftwareStats {
    pub flushes: usize,
    /// All draw submissions, excluding outlines.
    pub draws: usize,
    pub fans: usize,
    pub indexed: usize,
    pub quads: usize,
    pub outlines: usize,
    pub triangles: usize,
    pub clip_changes: usize,
    pub pipeline_changes: usize,
}

#[derive(Debug, Clone)]
struct Surface {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, rgba: vec![0; width as usize * height as usize * 4] }
    }

    #[inline]
    fn bounds(&self) -> PixelBounds {
        PixelBounds::new(0, 0, self.width as i32, self.height as i32)
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    #[inline]
    fn get(&self, x: i32, y: i32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    #[inline]
    fn put(&mut self, x: i32, y: i32, px: [u8; 4]) {
        let i = self.index(x, y);
        self.rgba[i..i + 4].copy_from_slice(&px);
    }

    /// Nearest texel for `(s, t)` in normalized coordinates.
    fn sample(&self, s: f32, t: f32, wrap: Wrap) -> [u8; 4] {
        if self.width == 0 || self.height == 0 {
            return [0; 4];
        }
        let texel = |v: f32, size: u32| -> i32 {
            let i = (v * size as f32).floor() as i32;
            match wrap {
                Wrap::ClampToEdge => i.clamp(0, size as i32 - 1),
                Wrap::Repeat => i.rem_euclid(size as i32),
            }
        };
        self.get(texel(s, self.width), texel(t, self.height))
    }
}

/// One vertex after transformation to device space.
#[derive(Debug, Copy, Clone)]
struct DeviceVertex {
    pos: Vec2,
    color: PackedColor,
    tex: [[f32; 2]; MAX_SAMPLED_LAYERS],
}

/// Layers beyond this count are ignored by the rasterizer.
const MAX_SAMPLED_LAYERS: usize = 4;

/// Top-left rule for edges of a positively oriented triangle (device +Y down).
#[inline]
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    (a.y == b.y && b.x > a.x) || b.y < a.y
}

#[inline]
fn covers(w: f32, top_left: bool) -> bool {
    w > 0.0 || (w == 0.0 && top_left)
}

#[inline]
fn mul_u8(a: u8, b: u8) -> u8 {
    ((a as u32 * b as u32 + 127) / 255) as u8
}

fn blend(src: [u8; 4], dst: [u8; 4], mode: BlendMode) -> [u8; 4] {
    match mode {
        BlendMode::Replace => src,
        BlendMode::SrcOver => {
            let inv = 255 - src[3];
            std::array::from_fn(|i| src[i].saturating_add(mul_u8(dst[i], inv)))
        }
    }
}

/// CPU implementation of the draw seam.
#[derive(Debug)]
pub struct SoftwareBackend {
    caps: BackendCaps,
    buffers: HashMap<BufferId, Vec<u8>>,
    next_buffer: u32,
    textures: SecondaryMap<TextureId, Surface>,

    target: Option<FlushTarget>,
    clip: Option<ClipStack>,
    modelview: Matrix,
    pipeline: Option<Pipeline>,
    n_layers: usize,
    layout: Option<VertexLayout>,

    stats: SoftwareStats,
    warned_linear_filter: bool,
    warned_user_program: bool,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    /// Backend advertising indexed drawing and triangle fans.
    pub fn new() -> Self {
        Self::with_caps(BackendCaps::default())
    }

    pub fn with_caps(caps: BackendCaps) -> Self {
        debug_assert!(
            caps.indexed || caps.quads || caps.triangle_fans,
            "backend must support a primitive mode"
        );
        Self {
            caps,
            buffers: HashMap::new(),
            next_buffer: 0,
            textures: SecondaryMap::new(),
            target: None,
            clip: None,
            modelview: Matrix::IDENTITY,
            pipeline: None,
            n_layers: 0,
            layout: None,
            stats: SoftwareStats::default(),
            warned_linear_filter: false,
            warned_user_program: false,
        }
    }

    #[inline]
    pub fn stats(&self) -> SoftwareStats {
        self.stats
    }

    #[inline]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Premultiplied RGBA8 contents of a texture, row-major.
    pub fn pixels(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(texture).map(|s| s.rgba.as_slice())
    }

    pub fn pixel(&self, texture: TextureId, x: i32, y: i32) -> Option<[u8; 4]> {
        let s = self.textures.get(texture)?;
        s.bounds().contains(x, y).then(|| s.get(x, y))
    }

    // ── vertex fetch ──────────────────────────────────────────────────────

    fn read_f32(data: &[u8], offset: usize) -> f32 {
        data.get(offset..offset + 4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .unwrap_or(0.0)
    }

    fn fetch_vertex(&self, data: &[u8], layout: &VertexLayout, target: &FlushTarget, index: u32) -> DeviceVertex {
        let base = layout.offset + index as usize * layout.stride;
        let x = Self::read_f32(data, base);
        let y = Self::read_f32(data, base + 4);
        let z = if layout.position_components == 3 { Self::read_f32(data, base + 8) } else { 0.0 };

        let eye = self.modelview.transform_point4([x, y, z, 1.0]);
        let pos = target.viewport.clip_to_device(target.projection.transform_point4(eye));
        let color = PackedColor::from_bits(Self::read_f32(data, base + layout.color_offset()).to_bits());

        let mut tex = [[0.0; 2]; MAX_SAMPLED_LAYERS];
        for (layer, st) in tex.iter_mut().enumerate().take(layout.n_layers) {
            let o = base + layout.texcoord_offset(layer);
            *st = [Self::read_f32(data, o), Self::read_f32(data, o + 4)];
        }
        DeviceVertex { pos, color, tex }
    }

    /// Vertex-index triples for a draw call.
    fn triangles(&self, call: DrawCall) -> Vec<[u32; 3]> {
        let fan = |first: u32, count: u32| (1..count.saturating_sub(1)).map(move |i| [first, first + i, first + i + 1]);
        match call {
            DrawCall::TriangleFan { first_vertex, vertex_count } => fan(first_vertex, vertex_count).collect(),
            DrawCall::Quads { first_vertex, vertex_count } => (0..vertex_count / 4)
                .flat_map(|q| fan(first_vertex + q * 4, 4))
                .collect(),
            DrawCall::IndexedTriangles { indices, base_vertex, first_index, index_count } => {
                let Some(data) = self.buffers.get(&indices) else {
                    log::warn!("software backend: draw with unknown index buffer {indices:?}");
                    return Vec::new();
                };
                let idx: Vec<u32> = (0..index_count)
                    .map(|i| {
                        let o = (first_index + i) as usize * 2;
                        data.get(o..o + 2)
                            .map(|b| u16::from_le_bytes([b[0], b[1]]) as u32)
                            .unwrap_or(0)
                    })
                    .collect();
                idx.chunks_exact(3)
                    .map(|t| [base_vertex + t[0], base_vertex + t[1], base_vertex + t[2]])
                    .collect()
            }
        }
    }

    // ── rasterization ─────────────────────────────────────────────────────

    fn shade(&self, v: &DeviceVertex, tex: &[[f32; 2]], layers: &[Layer]) -> [u8; 4] {
        let mut px = v.color.to_rgba8();
        for (layer, st) in layers.iter().zip(tex) {
            let (mut s, mut t) = (st[0], st[1]);
            if layer.has_texture_matrix() {
                let m = layer.matrix.transform_point4([s, t, 0.0, 1.0]);
                s = m[0];
                t = m[1];
            }
            let texel = self
                .textures
                .get(layer.texture)
                .map(|surf| surf.sample(s, t, layer.wrap))
                .unwrap_or([0; 4]);
            px = std::array::from_fn(|i| mul_u8(px[i], texel[i]));
        }
        px
    }

    fn raster_triangle(&self, surface: &mut Surface, area: PixelBounds, tri: [DeviceVertex; 3], layers: &[Layer], mode: BlendMode) {
        let [v0, mut v1, mut v2] = tri;
        let mut a = Vec2::edge(v0.pos, v1.pos, v2.pos);
        if a < 0.0 {
            std::mem::swap(&mut v1, &mut v2);
            a = -a;
        }
        if a == 0.0 || !a.is_finite() {
            return;
        }

        let min_x = v0.pos.x.min(v1.pos.x).min(v2.pos.x);
        let min_y = v0.pos.y.min(v1.pos.y).min(v2.pos.y);
        let max_x = v0.pos.x.max(v1.pos.x).max(v2.pos.x);
        let max_y = v0.pos.y.max(v1.pos.y).max(v2.pos.y);
        let bbox = PixelBounds::new(
            (min_x - 0.5).floor() as i32,
            (min_y - 0.5).floor() as i32,
            (max_x + 0.5).ceil() as i32,
            (max_y + 0.5).ceil() as i32,
        )
        .intersect(area);

        let tl0 = is_top_left(v1.pos, v2.pos);
        let tl1 = is_top_left(v2.pos, v0.pos);
        let tl2 = is_top_left(v0.pos, v1.pos);
        let n = layers.len().min(MAX_SAMPLED_LAYERS);

        for y in bbox.y0..bbox.y1 {
            for x in bbox.x0..bbox.x1 {
                let p = Vec2::pixel_center(x, y);
                let w0 = Vec2::edge(v1.pos, v2.pos, p);
                let w1 = Vec2::edge(v2.pos, v0.pos, p);
                let w2 = Vec2::edge(v0.pos, v1.pos, p);
                if !(covers(w0, tl0) && covers(w1, tl1) && covers(w2, tl2)) {
                    continue;
                }
                if let Some(clip) = &self.clip {
                    if !clip.contains_pixel(x, y) {
                        continue;
                    }
                }

                let (l0, l1, l2) = (w0 / a, w1 / a, w2 / a);
                let mut tex = [[0.0f32; 2]; MAX_SAMPLED_LAYERS];
                for (i, st) in tex.iter_mut().enumerate().take(n) {
                    for c in 0..2 {
                        st[c] = l0 * v0.tex[i][c] + l1 * v1.tex[i][c] + l2 * v2.tex[i][c];
                    }
                }

                let src = self.shade(&v0, &tex[..n], &layers[..n]);
                let dst = surface.get(x, y);
                surface.put(x, y, blend(src, dst, mode));
            }
        }
    }

    /// One-pixel line between two device points (diagnostics only).
    fn raster_line(surface: &mut Surface, a: Vec2, b: Vec2, color: [u8; 4]) {
        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as i32;
        let bounds = surface.bounds();
        for i in 0..=steps {
            let f = i as f32 / steps as f32;
            let x = (a.x + (b.x - a.x) * f).floor() as i32;
            let y = (a.y + (b.y - a.y) * f).floor() as i32;
            if bounds.contains(x, y) {
                surface.put(x, y, color);
            }
        }
    }
}

impl DrawBackend for SoftwareBackend {
    fn caps(&self) -> BackendCaps {
        self.caps
    }

    fn create_buffer(&mut self, size: usize, _usage: BufferUsage) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, vec![0; size]);
        id
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        match self.buffers.get_mut(&buffer) {
            Some(buf) if offset + data.len() <= buf.len() => {
                buf[offset..offset + data.len()].copy_from_slice(data);
            }
            Some(buf) => log::warn!(
                "software backend: write of {} bytes at {offset} overflows buffer of {}",
                data.len(),
                buf.len()
            ),
            None => log::warn!("software backend: write to unknown buffer {buffer:?}"),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        self.textures.insert(texture, Surface::new(width, height));
    }

    fn write_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<()> {
        let surface = self
            .textures
            .get_mut(texture)
            .context("write_texture: unknown texture")?;
        if rgba.len() != surface.rgba.len() {
            bail!(
                "write_texture: expected {} bytes for {}x{}, got {}",
                surface.rgba.len(),
                surface.width,
                surface.height,
                rgba.len()
            );
        }
        surface.rgba.copy_from_slice(rgba);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
    }

    fn clear(&mut self, target: TextureId, color: PackedColor, bounds: Option<PixelBounds>) {
        let Some(surface) = self.textures.get_mut(target) else {
            log::warn!("software backend: clear of unknown texture");
            return;
        };
        let area = bounds.map_or(surface.bounds(), |b| b.intersect(surface.bounds()));
        let px = color.to_rgba8();
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                surface.put(x, y, px);
            }
        }
    }

    fn read_pixel(&mut self, target: TextureId, x: i32, y: i32) -> Result<PackedColor> {
        let surface = self.textures.get(target).context("read_pixel: unknown texture")?;
        if !surface.bounds().contains(x, y) {
            bail!("read_pixel: ({x}, {y}) outside {}x{}", surface.width, surface.height);
        }
        Ok(PackedColor::from_rgba8(surface.get(x, y)))
    }

    fn begin_flush(&mut self, target: &FlushTarget) {
        self.target = Some(*target);
        self.clip = None;
        self.modelview = Matrix::IDENTITY;
        self.pipeline = None;
        self.layout = None;
    }

    fn flush_clip(&mut self, clip: Option<&ClipStack>) {
        self.stats.clip_changes += 1;
        self.clip = clip.cloned();
    }

    fn flush_modelview(&mut self, modelview: &Matrix) {
        self.modelview = *modelview;
    }

    fn flush_pipeline(&mut self, pipeline: &Pipeline, n_layers: usize) {
        self.stats.pipeline_changes += 1;
        if !self.warned_linear_filter && pipeline.layers().iter().any(|l| l.filter == Filter::Linear) {
            log::debug!("software backend: linear filtering sampled as nearest");
            self.warned_linear_filter = true;
        }
        if !self.warned_user_program && pipeline.user_program().is_some() {
            log::debug!("software backend: user programs are ignored");
            self.warned_user_program = true;
        }
        self.pipeline = Some(pipeline.clone());
        self.n_layers = n_layers;
    }

    fn bind_vertices(&mut self, layout: &VertexLayout) {
        self.layout = Some(*layout);
    }

    fn draw(&mut self, call: DrawCall) {
        self.stats.draws += 1;
        match call {
            DrawCall::TriangleFan { .. } => self.stats.fans += 1,
            DrawCall::IndexedTriangles { .. } => self.stats.indexed += 1,
            DrawCall::Quads { .. } => self.stats.quads += 1,
        }

        let (Some(target), Some(layout), Some(pipeline)) = (self.target, self.layout, self.pipeline.clone()) else {
            log::warn!("software backend: draw outside a configured flush");
            return;
        };
        let Some(mut surface) = self.textures.remove(target.texture) else {
            log::warn!("software backend: draw to unknown target");
            return;
        };

        let area = PixelBounds::covering(target.viewport.rect()).intersect(surface.bounds());
        let layers = &pipeline.layers()[..self.n_layers.min(pipeline.n_layers())];
        let tris = self.triangles(call);
        if let Some(data) = self.buffers.get(&layout.buffer) {
            for [a, b, c] in &tris {
                let tri = [a, b, c].map(|&i| self.fetch_vertex(data, &layout, &target, i));
                self.raster_triangle(&mut surface, area, tri, layers, pipeline.blend());
            }
        } else {
            log::warn!("software backend: draw with unknown vertex buffer {:?}", layout.buffer);
        }
        self.stats.triangles += tris.len();

        self.textures.insert(target.texture, surface);
    }

    fn draw_outline(&mut self, first_vertex: u32, n_quads: u32, color: PackedColor) {
        self.stats.outlines += 1;
        let (Some(target), Some(layout)) = (self.target, self.layout) else {
            return;
        };
        let Some(mut surface) = self.textures.remove(target.texture) else {
            return;
        };
        if let Some(data) = self.buffers.get(&layout.buffer) {
            for q in 0..n_quads {
                let corners: [Vec2; 4] = std::array::from_fn(|i| {
                    self.fetch_vertex(data, &layout, &target, first_vertex + q * 4 + i as u32).pos
                });
                for i in 0..4 {
                    Self::raster_line(&mut surface, corners[i], corners[(i + 1) % 4], color.to_rgba8());
                }
            }
        }
        self.textures.insert(target.texture, surface);
    }

    fn end_flush(&mut self) {
        self.stats.flushes += 1;
        self.target = None;
        self.clip = None;
        self.pipeline = None;
        self.layout = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::journal::test_support::texture_id;

    fn flush_target(texture: TextureId, w: u32, h: u32) -> FlushTarget {
        FlushTarget {
            texture,
            width: w,
            height: h,
            viewport: Viewport::new(0.0, 0.0, w as f32, h as f32),
            projection: Matrix::ortho(0.0, w as f32, h as f32, 0.0, -1.0, 1.0),
        }
    }

    /// Draws one quad through the raw backend interface.
    fn draw_quad(b: &mut SoftwareBackend, target: &FlushTarget, rect: [f32; 4], color: [u8; 4], pipeline: &Pipeline) {
        let [x1, y1, x2, y2] = rect;
        let c = f32::from_bits(PackedColor::from_rgba8(color).to_bits());
        // pos(2) + colour + 2 padded layers of (s, t)
        let corners = [(x1, y1, 0.0, 0.0), (x1, y2, 0.0, 1.0), (x2, y2, 1.0, 1.0), (x2, y1, 1.0, 0.0)];
        let mut data = Vec::new();
        for (x, y, s, t) in corners {
            data.extend_from_slice(&[x, y, c, s, t, 0.0, 0.0]);
        }
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let buffer = b.create_buffer(bytes.len(), BufferUsage::Vertex);
        b.write_buffer(buffer, 0, bytes);

        b.begin_flush(target);
        b.flush_clip(None);
        b.flush_pipeline(pipeline, pipeline.n_layers());
        b.bind_vertices(&VertexLayout {
            buffer,
            offset: 0,
            stride: 7 * 4,
            position_components: 2,
            n_layers: pipeline.n_layers(),
        });
        b.draw(DrawCall::TriangleFan { first_vertex: 0, vertex_count: 4 });
        b.end_flush();
        b.destroy_buffer(buffer);
    }

    fn coverage(b: &SoftwareBackend, tex: TextureId, w: i32, h: i32) -> usize {
        let mut n = 0;
        for y in 0..h {
            for x in 0..w {
                if b.pixel(tex, x, y).is_some_and(|p| p[3] != 0) {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn integer_quad_covers_exact_pixels() {
        let mut b = SoftwareBackend::new();
        let tex = texture_id();
        b.create_texture(tex, 16, 16);
        let target = flush_target(tex, 16, 16);
        draw_quad(&mut b, &target, [2.0, 3.0, 6.0, 5.0], [255, 0, 0, 255], &Pipeline::new());
        assert_eq!(coverage(&b, tex, 16, 16), 8);
        assert_eq!(b.pixel(tex, 2, 3), Some([255, 0, 0, 255]));
        assert_eq!(b.pixel(tex, 6, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn translucent_quad_blends_once_per_pixel() {
        let mut b = SoftwareBackend::new();
        let tex = texture_id();
        b.create_texture(tex, 8, 8);
        b.clear(tex, PackedColor::from_rgba8([0, 0, 255, 255]), None);
        let target = flush_target(tex, 8, 8);
        draw_quad(&mut b, &target, [0.0, 0.0, 8.0, 8.0], [128, 0, 0, 128], &Pipeline::new());
        // Diagonal pixels are shared by both triangles and must blend exactly once.
        for i in 0..8 {
            assert_eq!(b.pixel(tex, i, i), Some([128, 0, 127, 255]));
        }
    }

    #[test]
    fn replace_blend_overwrites() {
        let mut b = SoftwareBackend::new();
        let tex = texture_id();
        b.create_texture(tex, 4, 4);
        b.clear(tex, PackedColor::from_rgba8([0, 0, 255, 255]), None);
        let mut p = Pipeline::new();
        p.set_blend(BlendMode::Replace);
        draw_quad(&mut b, &flush_target(tex, 4, 4), [0.0, 0.0, 4.0, 4.0], [0, 0, 0, 0], &p);
        assert_eq!(b.pixel(tex, 1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn textured_quad_modulates_vertex_colour() {
        let mut b = SoftwareBackend::new();
        let src = texture_id();
        b.create_texture(src, 2, 1);
        b.write_texture(src, &[255, 255, 255, 255, 0, 255, 0, 255]).expect("size matches");
        let dst = texture_id();
        b.create_texture(dst, 4, 4);
        let mut p = Pipeline::new();
        p.set_layer_texture(0, src);
        draw_quad(&mut b, &flush_target(dst, 4, 4), [0.0, 0.0, 4.0, 4.0], [255, 255, 255, 255], &p);
        assert_eq!(b.pixel(dst, 0, 0), Some([255, 255, 255, 255]));
        assert_eq!(b.pixel(dst, 3, 0), Some([0, 255, 0, 255]));
    }

    #[test]
    fn clip_limits_coverage() {
        let mut b = SoftwareBackend::new();
        let tex = texture_id();
        b.create_texture(tex, 8, 8);
        let target = flush_target(tex, 8, 8);
        let clip = ClipStack::push_window_rect(None, PixelBounds::new(0, 0, 2, 8));

        let data: Vec<f32> = [(0.0, 0.0), (0.0, 8.0), (8.0, 8.0), (8.0, 0.0)]
            .iter()
            .flat_map(|&(x, y)| [x, y, f32::from_bits(0xffff_ffff), 0.0, 0.0, 0.0, 0.0])
            .collect();
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let buffer = b.create_buffer(bytes.len(), BufferUsage::Vertex);
        b.write_buffer(buffer, 0, bytes);
        b.begin_flush(&target);
        b.flush_clip(Some(&clip));
        b.flush_pipeline(&Pipeline::new(), 0);
        b.bind_vertices(&VertexLayout { buffer, offset: 0, stride: 28, position_components: 2, n_layers: 0 });
        b.draw(DrawCall::Quads { first_vertex: 0, vertex_count: 4 });
        b.end_flush();

        assert_eq!(coverage(&b, tex, 8, 8), 16);
    }

    #[test]
    fn texture_io_errors() {
        let mut b = SoftwareBackend::new();
        let tex = texture_id();
        b.create_texture(tex, 2, 2);
        assert!(b.write_texture(tex, &[0; 3]).is_err());
        assert!(b.read_pixel(tex, 2, 0).is_err());
        assert!(b.read_pixel(texture_id(), 0, 0).is_err());
        assert_eq!(b.read_pixel(tex, 1, 1).ok(), Some(PackedColor::TRANSPARENT));
    }
}
