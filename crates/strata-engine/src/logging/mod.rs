//! Logging utilities.
//!
//! This module centralizes logger initialization. Everything else in the crate
//! only uses the `log` facade: flush summaries at `debug`, per-batch detail
//! at `trace`, one-time backend approximation notes at `debug`.

mod init;

pub use init::{init_logging, LoggingConfig};
