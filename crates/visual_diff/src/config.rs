//! Visual comparison settings.

use core::time::Duration;
use std::env;
use std::path::PathBuf;

/// Reference captures are usually exported at 2x.
pub const DEFAULT_DEVICE_SCALE_FACTOR: f64 = 2.0;
/// Pause after network idle so web fonts can settle.
pub const DEFAULT_SETTLE_MS: u64 = 500;
/// Per-pixel color threshold, normalized to `[0, 1]`.
pub const DEFAULT_PIXEL_THRESHOLD: f64 = 0.1;
/// Maximum mismatched share of pixels, in percent, that still passes.
pub const DEFAULT_MISMATCH_THRESHOLD: f64 = 5.0;
/// Upper bound on waiting for the `networkIdle` lifecycle event.
pub const DEFAULT_NETWORK_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Settings for rendering and diffing.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualDiffConfig {
    pub device_scale_factor: f64,
    pub settle_delay_ms: u64,
    pub pixel_threshold: f64,
    pub mismatch_threshold: f64,
    pub network_idle_timeout_ms: u64,
    /// Explicit browser binary; otherwise one is searched for on `PATH`.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for VisualDiffConfig {
    fn default() -> Self {
        Self {
            device_scale_factor: DEFAULT_DEVICE_SCALE_FACTOR,
            settle_delay_ms: DEFAULT_SETTLE_MS,
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            mismatch_threshold: DEFAULT_MISMATCH_THRESHOLD,
            network_idle_timeout_ms: DEFAULT_NETWORK_IDLE_TIMEOUT_MS,
            chrome_executable: None,
        }
    }
}

fn positive_f64(name: &str) -> Option<f64> {
    env::var(name)
        .ok()
        .and_then(|val| val.parse::<f64>().ok())
        .filter(|val| val.is_finite() && *val > 0.0)
}

fn non_negative_f64(name: &str) -> Option<f64> {
    env::var(name)
        .ok()
        .and_then(|val| val.parse::<f64>().ok())
        .filter(|val| val.is_finite() && *val >= 0.0)
}

impl VisualDiffConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `VISUAL_DIFF_SCALE_FACTOR`: device scale factor, > 0 (default: 2)
    /// - `VISUAL_DIFF_SETTLE_MS`: post-idle settle delay (default: 500)
    /// - `VISUAL_DIFF_PIXEL_THRESHOLD`: per-pixel threshold in `[0, 1]` (default: 0.1)
    /// - `VISUAL_DIFF_MISMATCH_THRESHOLD`: passing mismatch percent (default: 5)
    /// - `VISUAL_DIFF_NETWORK_IDLE_TIMEOUT_MS`: network-idle wait cap (default: 30000)
    /// - `CHROME_BIN`: browser executable
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            device_scale_factor: positive_f64("VISUAL_DIFF_SCALE_FACTOR")
                .unwrap_or(defaults.device_scale_factor),
            settle_delay_ms: env::var("VISUAL_DIFF_SETTLE_MS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(defaults.settle_delay_ms),
            pixel_threshold: non_negative_f64("VISUAL_DIFF_PIXEL_THRESHOLD")
                .map_or(defaults.pixel_threshold, |val| val.min(1.0)),
            mismatch_threshold: non_negative_f64("VISUAL_DIFF_MISMATCH_THRESHOLD")
                .unwrap_or(defaults.mismatch_threshold),
            network_idle_timeout_ms: env::var("VISUAL_DIFF_NETWORK_IDLE_TIMEOUT_MS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(defaults.network_idle_timeout_ms),
            chrome_executable: env::var("CHROME_BIN")
                .ok()
                .filter(|val| !val.is_empty())
                .map(PathBuf::from),
        }
    }

    #[inline]
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[inline]
    #[must_use]
    pub const fn network_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.network_idle_timeout_ms)
    }
}
