//! Headless GPU device management.
//!
//! This module is responsible for creating the wgpu Instance/Adapter/Device/Queue
//! used by the wgpu draw backend. Surfaces and presentation are out of scope.

mod gpu;

pub use gpu::{Gpu, GpuInit};
