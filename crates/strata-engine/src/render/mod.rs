//! Draw backends the journal submits to.
//!
//! [`DrawBackend`] is the seam: the journal only speaks in buffers, vertex
//! layouts and draw calls. Two implementations live here:
//!
//! - [`WgpuBackend`] renders into wgpu textures through one render pass per flush.
//! - [`SoftwareBackend`] rasterizes on the CPU with integer blending. Tests use it
//!   to compare pixels exactly.
//!
//! Convention:
//! - Render targets store premultiplied RGBA8, top-left origin, +Y down.
//! - Quads are 4 vertices; indexed draws use [`QUAD_INDICES`] per quad.

mod backend;
mod common;
mod gpu;
mod software;

pub use backend::{
    BackendCaps, BufferId, BufferUsage, DrawBackend, DrawCall, DrawStrategy, FlushTarget,
    VertexLayout,
};
pub use common::{quad_indices, QuadIndexBuffer, MAX_QUADS_PER_INDEXED_DRAW, QUAD_INDICES};
pub use gpu::WgpuBackend;
pub use software::{SoftwareBackend, SoftwareStats};
