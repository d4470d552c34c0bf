//! Immutable clip stack.
//!
//! Each push produces a new ref-counted node that links to its parent, so a
//! journal entry can hold on to "the clip active when I was logged" for free,
//! and two entries share a clip exactly when they share a node.

mod stack;

pub use stack::{Ancestors, ClipKind, ClipStack, RectangleClip};
