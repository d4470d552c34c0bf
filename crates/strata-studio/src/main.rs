use anyhow::Result;
use strata_engine::context::Context;
use strata_engine::device::{Gpu, GpuInit};
use strata_engine::journal::{JournalConfig, PixelFormat};
use strata_engine::logging::{init_logging, LoggingConfig};
use strata_engine::paint::Color;
use strata_engine::pipeline::{Layer, Pipeline, Wrap};
use strata_engine::render::{DrawBackend, SoftwareBackend, WgpuBackend};

const SIZE: u32 = 256;
const CELLS: u32 = 16;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let use_wgpu = std::env::args().skip(1).any(|a| a == "--wgpu");
    let config = JournalConfig::from_env();
    log::info!("journal config: {config:?}");

    if use_wgpu {
        let gpu = Gpu::new_headless_blocking(GpuInit::default())?;
        let info = gpu.adapter_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);
        run(Context::new(WgpuBackend::new(&gpu), config))
    } else {
        run(Context::new(SoftwareBackend::new(), config))
    }
}

/// Paints a checker tile offscreen, then a grid of translucent cells, a
/// rotated sprite sampling the tile and a clipped strip on top of it.
fn run<B: DrawBackend>(mut ctx: Context<B>) -> Result<()> {
    // ── offscreen tile ────────────────────────────────────────────────────
    let tile_tex = ctx.create_texture(32, 32);
    let tile = ctx.create_offscreen(tile_tex)?;
    ctx.clear(tile, Color::from_premul(0.1, 0.1, 0.1, 1.0))?;
    for i in 0..4 {
        let o = i as f32 * 8.0;
        let shade = 0.25 + 0.25 * i as f32;
        let pipeline = Pipeline::with_color(Color::from_premul(shade, shade, 0.0, 1.0));
        ctx.draw_rectangle(tile, [o, o, o + 8.0, o + 8.0], &pipeline)?;
    }

    // ── main target ───────────────────────────────────────────────────────
    let fb = ctx.create_framebuffer(SIZE, SIZE);
    ctx.clear(fb, Color::from_premul(0.0, 0.0, 0.0, 1.0))?;

    let cell = SIZE as f32 / CELLS as f32;
    for y in 0..CELLS {
        for x in 0..CELLS {
            let (fx, fy) = (x as f32 * cell, y as f32 * cell);
            let (r, g) = (x as f32 / CELLS as f32, y as f32 / CELLS as f32);
            let pipeline = Pipeline::with_color(Color::from_straight(r, g, 0.5, 0.75));
            ctx.draw_rectangle(fb, [fx + 1.0, fy + 1.0, fx + cell - 1.0, fy + cell - 1.0], &pipeline)?;
        }
    }

    let mut sprite = Pipeline::new();
    sprite.set_layer(0, Layer::new(tile_tex).with_wrap(Wrap::Repeat));
    ctx.push_matrix(fb)?;
    ctx.translate(fb, SIZE as f32 / 2.0, SIZE as f32 / 2.0)?;
    ctx.rotate_z(fb, 30.0)?;
    ctx.draw_textured_rectangle(fb, [-48.0, -48.0, 48.0, 48.0], &sprite, &[0.0, 0.0, 3.0, 3.0])?;
    ctx.pop_matrix(fb)?;

    ctx.push_clip_rectangle(fb, [0.0, 200.0, SIZE as f32, 232.0])?;
    let strip = Pipeline::with_color(Color::from_premul(0.0, 0.4, 0.8, 1.0));
    for i in 0..8 {
        let x = i as f32 * 32.0;
        ctx.draw_rectangle(fb, [x, 190.0, x + 24.0, 240.0], &strip)?;
    }
    ctx.pop_clip(fb)?;

    // Answered from the journal: the strip is opaque and untextured.
    let probe = ctx.read_pixel(fb, 4, 210, PixelFormat::Rgba8888)?;
    log::info!("strip pixel before flush: {probe:?}");

    let stats = ctx.flush(fb)?;
    log::info!(
        "flushed {} quads in {} draws ({} clip / {} stride / {} layer / {} pipeline / {} modelview batches, {} software-clipped)",
        stats.quads,
        stats.draw_calls,
        stats.clip_batches,
        stats.stride_batches,
        stats.layer_batches,
        stats.pipeline_batches,
        stats.modelview_batches,
        stats.software_clipped,
    );

    let center = ctx.read_pixel(fb, SIZE as i32 / 2, SIZE as i32 / 2, PixelFormat::Rgba8888)?;
    log::info!("centre pixel: {center:?}");

    ctx.teardown()?;
    Ok(())
}
