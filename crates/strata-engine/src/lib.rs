//! Strata engine crate.
//!
//! A deferred render command journal: quads are logged per framebuffer and
//! submitted in as few draw calls as possible when something forces a flush
//! (a state change that cannot be journaled, a read, a dependency, or an
//! explicit call). Batching is invisible in the output pixels.
//!
//! [`Context`] is the entry point. It owns a [`render::DrawBackend`], the
//! framebuffers and the texture registry.

pub mod clip;
pub mod context;
pub mod coords;
pub mod device;
pub mod framebuffer;
pub mod journal;
pub mod logging;
pub mod paint;
pub mod pipeline;
pub mod render;
pub mod texture;

pub use context::Context;
