//! Colour model shared by pipelines, the journal and backends.
//!
//! - [`Color`]: linear premultiplied RGBA in `f32`, used by pipeline state
//! - [`PackedColor`]: the same colour quantized to RGBA8, as stored in the
//!   journal's vertex log and uploaded as a per-vertex attribute

pub mod color;
mod packed;

pub use color::Color;
pub use packed::PackedColor;
