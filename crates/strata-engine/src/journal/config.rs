/// Journal behaviour switches.
///
/// Every optimisation can be turned off independently; output pixels must not
/// change when one is. `show_batches` is a diagnostic overlay.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JournalConfig {
    /// Defer quads and batch them. When off, every quad is flushed as soon as it is logged.
    pub batching: bool,
    /// Fold small rectangle-clip runs into the quad geometry.
    pub software_clip: bool,
    /// Apply the modelview on the CPU at upload time.
    pub software_transform: bool,
    /// Answer single-pixel reads from the unflushed log when possible.
    pub fast_read_pixel: bool,
    /// Outline each submitted batch.
    pub show_batches: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            batching: true,
            software_clip: true,
            software_transform: true,
            fast_read_pixel: true,
            show_batches: false,
        }
    }
}

/// Environment variable holding comma-separated debug switches.
pub const DEBUG_ENV_VAR: &str = "STRATA_DEBUG";

impl JournalConfig {
    /// Defaults, adjusted by [`DEBUG_ENV_VAR`] when set.
    pub fn from_env() -> Self {
        match std::env::var(DEBUG_ENV_VAR) {
            Ok(spec) => Self::default().with_debug_flags(&spec),
            Err(_) => Self::default(),
        }
    }

    /// Applies switches such as `"disable-batching,rectangles"`.
    ///
    /// Unknown switches are logged and ignored.
    pub fn with_debug_flags(mut self, spec: &str) -> Self {
        for flag in spec.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match flag {
                "disable-batching" => self.batching = false,
                "disable-software-clip" => self.software_clip = false,
                "disable-software-transform" => self.software_transform = false,
                "disable-fast-read-pixel" => self.fast_read_pixel = false,
                "rectangles" => self.show_batches = true,
                other => log::warn!("{DEBUG_ENV_VAR}: unknown switch {other:?}"),
            }
        }
        self
    }
}
