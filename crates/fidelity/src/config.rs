//! Runtime configuration for the validation loop and batch runner.
//!
//! Defaults match the documented policy; every knob can be overridden from the
//! environment or constructed programmatically.

use core::time::Duration;
use std::env;

/// Default fidelity score the convergence loop aims for.
pub const DEFAULT_TARGET_SCORE: u8 = 95;
/// Default number of validate/fix passes before giving up.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
/// Default number of design units run side by side in a batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;
/// Default pause before re-running a rate-limited unit.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;
/// Default total attempts for a rate-limited unit (first run included).
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Scores below this make color variables worth adding.
pub const COLOR_VARIABLE_SCORE_CEILING: u8 = 90;
/// File name of the JSON report written next to the stylesheet.
pub const REPORT_FILE_NAME: &str = "design-fidelity-report.json";

/// Configuration for the validation loop and batch orchestration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FidelityConfig {
    /// Score at which the convergence loop stops early (0-100).
    pub target_score: u8,
    /// Cap on validate/fix passes.
    pub max_iterations: u32,
    /// Copy the stylesheet to `<path>.backup` before each fix pass.
    pub backup_before_fix: bool,
    /// Write `design-fidelity-report.json` after each validation pass.
    pub write_reports: bool,
    /// Units per batch.
    pub batch_concurrency: usize,
    /// Delay between rate-limited attempts, in seconds.
    pub retry_delay_secs: u64,
    /// Total attempts for a rate-limited unit.
    pub retry_attempts: u32,
}

impl Default for FidelityConfig {
    fn default() -> Self {
        Self {
            target_score: DEFAULT_TARGET_SCORE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            backup_before_fix: true,
            write_reports: true,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl FidelityConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `FIDELITY_TARGET_SCORE`: target score, clamped to 100 (default: 95)
    /// - `FIDELITY_MAX_ITERATIONS`: iteration cap, at least 1 (default: 3)
    /// - `FIDELITY_NO_BACKUP`: set to "1" to skip `.backup` copies
    /// - `FIDELITY_NO_REPORT`: set to "1" to skip writing JSON reports
    /// - `FIDELITY_BATCH_CONCURRENCY`: units per batch, at least 1 (default: 3)
    /// - `FIDELITY_RETRY_DELAY_SECS`: delay before a rate-limit retry (default: 60)
    /// - `FIDELITY_RETRY_ATTEMPTS`: total attempts for a rate-limited unit (default: 3)
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let target_score = env::var("FIDELITY_TARGET_SCORE")
            .ok()
            .and_then(|val| val.parse::<u8>().ok())
            .unwrap_or(DEFAULT_TARGET_SCORE)
            .min(100);
        let max_iterations = env::var("FIDELITY_MAX_ITERATIONS")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_ITERATIONS)
            .max(1);
        let backup_before_fix = env::var("FIDELITY_NO_BACKUP").ok().as_deref() != Some("1");
        let write_reports = env::var("FIDELITY_NO_REPORT").ok().as_deref() != Some("1");
        let batch_concurrency = env::var("FIDELITY_BATCH_CONCURRENCY")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_BATCH_CONCURRENCY)
            .max(1);
        let retry_delay_secs = env::var("FIDELITY_RETRY_DELAY_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_DELAY_SECS);
        let retry_attempts = env::var("FIDELITY_RETRY_ATTEMPTS")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRY_ATTEMPTS)
            .max(1);
        Self {
            target_score,
            max_iterations,
            backup_before_fix,
            write_reports,
            batch_concurrency,
            retry_delay_secs,
            retry_attempts,
        }
    }

    /// Builder-style override of the target score.
    #[must_use]
    pub fn with_target_score(mut self, target_score: u8) -> Self {
        self.target_score = target_score.min(100);
        self
    }

    /// Builder-style override of the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Delay between rate-limited attempts as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_policy() {
        let config = FidelityConfig::default();
        assert_eq!(config.target_score, 95);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.batch_concurrency, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(60));
        assert!(config.backup_before_fix);
    }

    #[test]
    fn builders_clamp() {
        let config = FidelityConfig::default()
            .with_target_score(250)
            .with_max_iterations(0);
        assert_eq!(config.target_score, 100);
        assert_eq!(config.max_iterations, 1);
    }
}
