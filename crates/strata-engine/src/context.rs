//! Explicit context owning the backend, framebuffers, textures and the
//! shared caches every journal flush uses.

use anyhow::{Context as _, Result};
use slotmap::SlotMap;

use crate::coords::{Matrix, PixelBounds, Rect, Viewport};
use crate::framebuffer::{ClearRecord, Framebuffer, FramebufferId};
use crate::journal::{FastRead, FlushStats, JournalConfig, PixelFormat};
use crate::paint::{Color, PackedColor};
use crate::pipeline::Pipeline;
use crate::render::{DrawBackend, QuadIndexBuffer};
use crate::texture::{TextureId, Textures};

/// Converts a premultiplied RGBA8 pixel into `format`.
///
/// `A8` places alpha in byte 0 and zeroes the rest.
fn convert_pixel(px: PackedColor, format: PixelFormat) -> [u8; 4] {
    match format {
        PixelFormat::Rgba8888Pre => px.to_rgba8(),
        PixelFormat::Rgba8888 => px.unpremultiplied(),
        PixelFormat::Bgra8888 => {
            let [r, g, b, a] = px.unpremultiplied();
            [b, g, r, a]
        }
        PixelFormat::A8 => [px.alpha(), 0, 0, 0],
    }
}

/// Rendering context over a [`DrawBackend`].
pub struct Context<B: DrawBackend> {
    backend: B,
    config: JournalConfig,
    framebuffers: SlotMap<FramebufferId, Framebuffer>,
    textures: Textures,
    quad_indices: QuadIndexBuffer,
    /// Flat, untextured, source-over: the only state the fast read path trusts.
    default_pipeline: Pipeline,
    stats: FlushStats,
}

impl<B: DrawBackend> Context<B> {
    pub fn new(backend: B, config: JournalConfig) -> Self {
        log::debug!("context created with {config:?}");
        Self {
            backend,
            config,
            framebuffers: SlotMap::with_key(),
            textures: Textures::new(),
            quad_indices: QuadIndexBuffer::new(),
            default_pipeline: Pipeline::new(),
            stats: FlushStats::default(),
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Totals over every flush so far.
    #[inline]
    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    #[inline]
    pub fn default_pipeline(&self) -> &Pipeline {
        &self.default_pipeline
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub fn create_texture(&mut self, width: u32, height: u32) -> TextureId {
        let id = self.textures.insert(width, height);
        self.backend.create_texture(id, width, height);
        id
    }

    /// Replaces a texture's contents (premultiplied RGBA8 rows).
    ///
    /// Pending quads that sample or render into the texture are flushed first.
    pub fn write_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<()> {
        self.textures.get(texture).context("write_texture: unknown texture")?;
        self.flush_readers_of(texture)?;
        if let Some(producer) = self.textures.render_target_of(texture) {
            self.flush(producer)?;
            // The upload replaces whatever the last clear left behind.
            self.framebuffer_mut(producer)?.set_last_clear(None);
        }
        self.backend.write_texture(texture, rgba)
    }

    pub fn destroy_texture(&mut self, texture: TextureId) -> Result<()> {
        self.textures.get(texture).context("destroy_texture: unknown texture")?;
        self.flush_readers_of(texture)?;
        if let Some(producer) = self.textures.render_target_of(texture) {
            self.destroy_framebuffer(producer)?;
        }
        // A non-offscreen framebuffer takes its texture with it.
        if self.textures.remove(texture).is_none() {
            return Ok(());
        }
        self.backend.destroy_texture(texture);
        Ok(())
    }

    fn flush_readers_of(&mut self, texture: TextureId) -> Result<()> {
        let readers: Vec<FramebufferId> = self
            .framebuffers
            .iter()
            .filter(|(_, fb)| {
                fb.journal()
                    .entries()
                    .iter()
                    .any(|e| e.pipeline().layers().iter().any(|l| l.texture == texture))
            })
            .map(|(id, _)| id)
            .collect();
        for id in readers {
            self.flush(id)?;
        }
        Ok(())
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    /// Creates a framebuffer with its own backing texture.
    pub fn create_framebuffer(&mut self, width: u32, height: u32) -> FramebufferId {
        let texture = self.create_texture(width, height);
        let id = self
            .framebuffers
            .insert(Framebuffer::new(texture, width, height, false, self.config));
        self.textures.set_render_target(texture, Some(id));
        id
    }

    /// Creates a framebuffer rendering into an existing texture.
    ///
    /// Quads sampling `texture` from other framebuffers then depend on this one.
    pub fn create_offscreen(&mut self, texture: TextureId) -> Result<FramebufferId> {
        let info = self.textures.get(texture).context("create_offscreen: unknown texture")?;
        anyhow::ensure!(
            info.render_target.is_none(),
            "create_offscreen: texture already has a framebuffer"
        );
        let (w, h) = (info.width, info.height);
        let id = self.framebuffers.insert(Framebuffer::new(texture, w, h, true, self.config));
        self.textures.set_render_target(texture, Some(id));
        Ok(id)
    }

    /// Flushes pending quads and forgets the framebuffer. Its texture survives
    /// for offscreen framebuffers.
    pub fn destroy_framebuffer(&mut self, fb: FramebufferId) -> Result<()> {
        self.flush(fb)?;
        let mut f = self
            .framebuffers
            .remove(fb)
            .context("destroy_framebuffer: unknown framebuffer")?;
        f.journal_mut().release_buffers(&mut self.backend);
        self.textures.set_render_target(f.target(), None);
        if !f.is_offscreen() {
            self.textures.remove(f.target());
            self.backend.destroy_texture(f.target());
        }
        Ok(())
    }

    pub fn framebuffer(&self, fb: FramebufferId) -> Result<&Framebuffer> {
        self.framebuffers.get(fb).context("unknown framebuffer")
    }

    fn framebuffer_mut(&mut self, fb: FramebufferId) -> Result<&mut Framebuffer> {
        self.framebuffers.get_mut(fb).context("unknown framebuffer")
    }

    pub fn framebuffer_texture(&self, fb: FramebufferId) -> Result<TextureId> {
        Ok(self.framebuffer(fb)?.target())
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Logs one quad against `fb`'s current modelview and clip.
    ///
    /// See [`Journal::log_quad`](crate::journal::Journal::log_quad) for the
    /// argument layout. Layer textures rendered by other framebuffers with
    /// pending quads become flush dependencies of `fb`.
    pub fn log_quad(
        &mut self,
        fb: FramebufferId,
        position: [f32; 4],
        pipeline: &Pipeline,
        n_layers: usize,
        override_texture: Option<TextureId>,
        tex_coords: &[f32],
    ) -> Result<()> {
        self.framebuffer(fb)?;

        let mut sampled: Vec<TextureId> =
            pipeline.layers().iter().take(n_layers).map(|l| l.texture).collect();
        // The override replaces layer 0, creating it when the pipeline has none.
        if let Some(t) = override_texture.filter(|_| n_layers > 0) {
            match sampled.first_mut() {
                Some(first) => *first = t,
                None => sampled.push(t),
            }
        }
        let producers: Vec<FramebufferId> = sampled
            .into_iter()
            .filter_map(|t| self.textures.render_target_of(t))
            .filter(|&p| p != fb)
            .filter(|&p| self.framebuffers.get(p).is_some_and(|f| !f.journal().is_empty()))
            .collect();

        let f = self.framebuffer_mut(fb)?;
        for p in producers {
            f.add_dependency(p);
        }
        f.log_quad(fb, position, pipeline, n_layers, override_texture, tex_coords);

        if !self.config.batching {
            self.flush(fb)?;
        }
        Ok(())
    }

    /// Untextured-coordinate convenience: every layer samples its whole texture.
    pub fn draw_rectangle(&mut self, fb: FramebufferId, rect: [f32; 4], pipeline: &Pipeline) -> Result<()> {
        self.log_quad(fb, rect, pipeline, pipeline.n_layers(), None, &[])
    }

    /// `tex_coords` holds `[s1, t1, s2, t2]` per layer.
    pub fn draw_textured_rectangle(
        &mut self,
        fb: FramebufferId,
        rect: [f32; 4],
        pipeline: &Pipeline,
        tex_coords: &[f32],
    ) -> Result<()> {
        self.log_quad(fb, rect, pipeline, pipeline.n_layers(), None, tex_coords)
    }

    // ── flushing ──────────────────────────────────────────────────────────

    /// Flushes `fb`'s journal, after the journals it depends on.
    pub fn flush(&mut self, fb: FramebufferId) -> Result<FlushStats> {
        // Taken before recursing so cycles terminate.
        let dependencies = self.framebuffer_mut(fb)?.take_dependencies();
        for producer in dependencies {
            if self.framebuffers.contains_key(producer) {
                log::trace!("flushing dependency {producer:?} before {fb:?}");
                self.flush(producer)?;
            }
        }

        let f = self.framebuffers.get_mut(fb).context("unknown framebuffer")?;
        if f.journal().is_empty() {
            return Ok(FlushStats::default());
        }
        let target = f.flush_target();
        let stats = f
            .journal_mut()
            .flush(fb, &target, &mut self.backend, &mut self.quad_indices);
        f.set_last_clear(None);
        self.stats.merge(&stats);
        Ok(stats)
    }

    pub fn flush_all(&mut self) -> Result<()> {
        let ids: Vec<FramebufferId> = self.framebuffers.keys().collect();
        for id in ids {
            self.flush(id)?;
        }
        Ok(())
    }

    /// Drops `fb`'s pending quads without drawing them.
    pub fn discard(&mut self, fb: FramebufferId) -> Result<()> {
        self.framebuffer_mut(fb)?.journal_mut().discard();
        Ok(())
    }

    // ── framebuffer state ─────────────────────────────────────────────────

    /// Flushes first: the viewport is read at flush time.
    pub fn set_viewport(&mut self, fb: FramebufferId, viewport: Viewport) -> Result<()> {
        anyhow::ensure!(viewport.is_valid(), "set_viewport: degenerate viewport {viewport:?}");
        self.flush(fb)?;
        self.framebuffer_mut(fb)?.set_viewport(viewport);
        Ok(())
    }

    /// Flushes first: the projection is read at flush time.
    pub fn set_projection(&mut self, fb: FramebufferId, projection: Matrix) -> Result<()> {
        self.flush(fb)?;
        self.framebuffer_mut(fb)?.set_projection(projection);
        Ok(())
    }

    pub fn push_matrix(&mut self, fb: FramebufferId) -> Result<()> {
        self.framebuffer_mut(fb)?.push_matrix();
        Ok(())
    }

    pub fn pop_matrix(&mut self, fb: FramebufferId) -> Result<()> {
        self.framebuffer_mut(fb)?.pop_matrix();
        Ok(())
    }

    pub fn set_modelview(&mut self, fb: FramebufferId, m: Matrix) -> Result<()> {
        self.framebuffer_mut(fb)?.set_modelview(m);
        Ok(())
    }

    pub fn translate(&mut self, fb: FramebufferId, x: f32, y: f32) -> Result<()> {
        self.framebuffer_mut(fb)?.translate(x, y, 0.0);
        Ok(())
    }

    pub fn scale(&mut self, fb: FramebufferId, x: f32, y: f32) -> Result<()> {
        self.framebuffer_mut(fb)?.scale(x, y, 1.0);
        Ok(())
    }

    pub fn rotate_z(&mut self, fb: FramebufferId, degrees: f32) -> Result<()> {
        self.framebuffer_mut(fb)?.rotate_z(degrees);
        Ok(())
    }

    pub fn push_clip_rectangle(&mut self, fb: FramebufferId, rect: [f32; 4]) -> Result<()> {
        self.framebuffer_mut(fb)?.push_clip_rectangle(rect);
        Ok(())
    }

    pub fn push_clip_window_rect(&mut self, fb: FramebufferId, bounds: PixelBounds) -> Result<()> {
        self.framebuffer_mut(fb)?.push_clip_window_rect(bounds);
        Ok(())
    }

    pub fn push_clip_path(&mut self, fb: FramebufferId, device_bounds: Rect) -> Result<()> {
        self.framebuffer_mut(fb)?.push_clip_path(device_bounds);
        Ok(())
    }

    pub fn pop_clip(&mut self, fb: FramebufferId) -> Result<()> {
        self.framebuffer_mut(fb)?.pop_clip();
        Ok(())
    }

    // ── clear / read ──────────────────────────────────────────────────────

    /// Clears the pixels the current clip lets through.
    ///
    /// Pending quads are discarded when the clear is known to overwrite all of
    /// them, and flushed otherwise.
    pub fn clear(&mut self, fb: FramebufferId, color: Color) -> Result<()> {
        let f = self.framebuffer(fb)?;
        let bounds = f.clip_bounds();
        let full = PixelBounds::new(0, 0, f.width() as i32, f.height() as i32);
        let target = f.target();

        if !f.journal().is_empty() {
            if bounds == full || f.journal().all_entries_within_bounds(bounds) {
                log::debug!("clear supersedes {} pending quads", f.journal().len());
                self.discard(fb)?;
            } else {
                self.flush(fb)?;
            }
        }

        let packed = color.clamped().to_packed();
        self.backend.clear(target, packed, (bounds != full).then_some(bounds));
        self.framebuffer_mut(fb)?
            .set_last_clear(Some(ClearRecord { color: packed, bounds }));
        Ok(())
    }

    /// Reads one pixel, answering from pending quads or the last clear when
    /// possible and flushing otherwise.
    pub fn read_pixel(&mut self, fb: FramebufferId, x: i32, y: i32, format: PixelFormat) -> Result<[u8; 4]> {
        let f = self.framebuffers.get_mut(fb).context("unknown framebuffer")?;
        let viewport = f.viewport();
        let projection = *f.projection();

        let answer = f
            .journal_mut()
            .try_read_pixel(x, y, format, viewport, &projection, &self.default_pipeline);
        match answer {
            FastRead::Hit(px) => return Ok(convert_pixel(px, format)),
            FastRead::Miss => {
                if let Some(clear) = f.last_clear().filter(|c| c.bounds.contains(x, y)) {
                    return Ok(convert_pixel(clear.color, format));
                }
            }
            FastRead::Unknown => {}
        }

        self.flush(fb)?;
        let target = self.framebuffer(fb)?.target();
        let px = self
            .backend
            .read_pixel(target, x, y)
            .with_context(|| format!("reading pixel ({x}, {y})"))?;
        Ok(convert_pixel(px, format))
    }

    /// Flushes everything, releases pooled GPU buffers and returns the backend.
    pub fn teardown(mut self) -> Result<B> {
        self.flush_all()?;
        for (_, f) in self.framebuffers.iter_mut() {
            f.journal_mut().release_buffers(&mut self.backend);
        }
        self.quad_indices.release(&mut self.backend);
        log::debug!(
            "context teardown: {} quads in {} draws over its lifetime",
            self.stats.quads,
            self.stats.draw_calls
        );
        Ok(self.backend)
    }
}
