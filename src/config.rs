use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::processing::kernels::ResampleKernel;

/// Highest auto-advance interval reachable from the number keys.
pub const MAX_AUTO_ADVANCE_SECS: u8 = 9;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Directory scanned recursively for slides.
    pub photo_library_path: PathBuf,
    /// Filter used for native-size and downscaled slides.
    pub resample_kernel: ResampleKernel,
    /// Whether slides start out fitted to the window.
    pub scaling: bool,
    /// Random order at startup; sorted by path otherwise.
    pub shuffle: bool,
    /// Optional deterministic seed for shuffling.
    pub startup_shuffle_seed: Option<u64>,
    /// Auto-advance interval in seconds (0 disables).
    pub auto_advance_secs: u8,
    /// Period of the clock tick driving auto-advance and prefetch hand-off.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Allow the GPU super-sampling pass for upscales.
    pub super_sampling: bool,
    /// Show the status line at startup.
    pub show_info: bool,
    /// Start in borderless fullscreen.
    pub fullscreen: bool,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.auto_advance_secs <= MAX_AUTO_ADVANCE_SECS,
            "auto-advance-secs must be between 0 and {MAX_AUTO_ADVANCE_SECS}"
        );
        ensure!(
            self.tick_interval > Duration::ZERO,
            "tick-interval must be positive"
        );
        ensure!(
            !self.photo_library_path.as_os_str().is_empty(),
            "photo-library-path must be set (or pass a directory on the command line)"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: PathBuf::new(),
            resample_kernel: ResampleKernel::default(),
            scaling: true,
            shuffle: true,
            startup_shuffle_seed: None,
            auto_advance_secs: 0,
            tick_interval: Duration::from_millis(100),
            super_sampling: true,
            show_info: false,
            fullscreen: false,
        }
    }
}
