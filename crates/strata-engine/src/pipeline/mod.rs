//! Pipeline state: the fixed description of how a quad is shaded.
//!
//! A [`Pipeline`] is a cheap handle to a persistent, structurally shared state
//! node. Mutating a handle never affects other handles: state is copied on
//! write only while another handle (typically a journal snapshot) still refers
//! to the same node, and the layer list is shared between copies until a
//! layer itself changes.
//!
//! Equality and hashing are parameterized by [`StateMask`] so the journal can
//! compare pipelines while ignoring the flat colour, which it carries per vertex.

mod layer;
mod state;

pub use layer::{Filter, Layer, Wrap};
pub use state::{BlendMode, Pipeline, ProgramId, StateMask};
