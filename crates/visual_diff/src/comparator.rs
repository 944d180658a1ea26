//! Reference-versus-rendered layout comparison and its artifacts.

use core::fmt::{self, Display, Formatter};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::VisualDiffConfig;
use crate::error::{Result, VisualDiffError};
use crate::pixelmatch::{MatchOptions, pixelmatch};
use crate::raster::Raster;
use crate::render::MarkupRenderer;
use crate::viewport::Viewport;

pub const SCREENSHOT_FILE_NAME: &str = "generated-screenshot.png";
pub const DIFF_FILE_NAME: &str = "layout-diff.png";

/// Statistics for one comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    pub mismatched_pixels: u64,
    /// Percentage with exactly two decimals, e.g. `"3.25"`.
    pub mismatch_percent: String,
    pub passed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffResult {
    pub summary: DiffSummary,
    pub diff: Raster,
}

/// Two-decimal rendering with ties rounded up.
fn format_percent(value: f64) -> String {
    format!("{:.2}", (value * 100.0).round() / 100.0)
}

/// Diff `generated` against `reference`, resampling `generated` to the
/// reference size first when they differ.
///
/// # Errors
///
/// Returns [`VisualDiffError::InvalidRaster`] for an empty reference.
pub fn compare_rasters(reference: &Raster, generated: &Raster, config: &VisualDiffConfig) -> Result<DiffResult> {
    if reference.is_empty() {
        return Err(VisualDiffError::InvalidRaster {
            reason: format!("reference raster is {}x{}", reference.width, reference.height),
        });
    }

    let resized;
    let generated = if generated.width == reference.width && generated.height == reference.height {
        generated
    } else {
        info!(
            "[VISUAL] Size differs: reference {}x{}, generated {}x{}; resizing generated",
            reference.width, reference.height, generated.width, generated.height
        );
        resized = generated.resize_nearest(reference.width, reference.height);
        &resized
    };

    let options = MatchOptions::default().with_threshold(config.pixel_threshold);
    let matched = pixelmatch(reference, generated, &options)?;

    let total_pixels = reference.pixel_count();
    let percent = matched.mismatched as f64 / total_pixels as f64 * 100.0;
    Ok(DiffResult {
        summary: DiffSummary {
            width: reference.width,
            height: reference.height,
            total_pixels,
            mismatched_pixels: matched.mismatched,
            mismatch_percent: format_percent(percent),
            passed: percent <= config.mismatch_threshold,
        },
        diff: matched.diff,
    })
}

/// A finished layout comparison with the locations of its inputs and
/// artifacts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutComparison {
    #[serde(flatten)]
    pub summary: DiffSummary,
    pub viewport: Viewport,
    pub mismatch_threshold: f64,
    pub reference_path: PathBuf,
    pub screenshot_path: PathBuf,
    pub diff_path: PathBuf,
}

impl Display for LayoutComparison {
    fn fmt(&self, out: &mut Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        let status = if self.summary.passed { "PASS" } else { "FAIL" };
        writeln!(out, "{rule}")?;
        writeln!(out, "Layout comparison: {status}")?;
        writeln!(out, "{rule}")?;
        writeln!(out, "Compared size:     {}x{}", self.summary.width, self.summary.height)?;
        writeln!(
            out,
            "Viewport:          {}x{} @{}x",
            self.viewport.width, self.viewport.height, self.viewport.device_scale_factor
        )?;
        writeln!(out, "Total pixels:      {}", self.summary.total_pixels)?;
        writeln!(out, "Mismatched pixels: {}", self.summary.mismatched_pixels)?;
        writeln!(out, "Mismatch:          {}%", self.summary.mismatch_percent)?;
        writeln!(out, "Allowed:           {}%", self.mismatch_threshold)?;
        writeln!(out)?;
        writeln!(out, "Reference:  {}", self.reference_path.display())?;
        writeln!(out, "Screenshot: {}", self.screenshot_path.display())?;
        writeln!(out, "Diff:       {}", self.diff_path.display())?;
        if !self.summary.passed {
            writeln!(out)?;
            writeln!(out, "Layout differs beyond the allowed threshold. Check the diff image, especially:")?;
            writeln!(out, "  - grid and flex column counts")?;
            writeln!(out, "  - percentage widths")?;
            writeln!(out, "  - element counts")?;
        }
        Ok(())
    }
}

/// Renders markup with `R` and compares it to a reference capture.
pub struct LayoutComparator<R> {
    renderer: R,
    config: VisualDiffConfig,
}

impl<R: MarkupRenderer> LayoutComparator<R> {
    pub const fn new(renderer: R, config: VisualDiffConfig) -> Self {
        Self { renderer, config }
    }

    pub const fn config(&self) -> &VisualDiffConfig {
        &self.config
    }

    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Render `markup` at the viewport matching `reference`, compare, and
    /// write `generated-screenshot.png` and `layout-diff.png` into
    /// `output_dir` (default: the markup's directory).
    ///
    /// # Errors
    ///
    /// Returns [`VisualDiffError::NotFound`] for missing inputs,
    /// [`VisualDiffError::RenderFailure`] when rendering fails, and I/O or
    /// image errors while reading or writing PNGs.
    pub async fn compare_layout(
        &self,
        reference: &Path,
        markup: &Path,
        output_dir: Option<&Path>,
    ) -> Result<LayoutComparison> {
        let reference_raster = Raster::load_png(reference)?;
        if !markup.exists() {
            return Err(VisualDiffError::NotFound {
                path: markup.to_path_buf(),
            });
        }
        info!(
            "[VISUAL] Reference {} is {}x{}",
            reference.display(),
            reference_raster.width,
            reference_raster.height
        );

        let viewport = Viewport::for_reference(
            reference_raster.width,
            reference_raster.height,
            self.config.device_scale_factor,
        );
        let generated = self.renderer.render(markup, viewport).await?;

        let output_dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| markup.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let screenshot_path = output_dir.join(SCREENSHOT_FILE_NAME);
        let diff_path = output_dir.join(DIFF_FILE_NAME);

        generated.write_png_if_changed(&screenshot_path)?;
        info!(
            "[VISUAL] Screenshot saved to {} ({}x{})",
            screenshot_path.display(),
            generated.width,
            generated.height
        );

        let result = compare_rasters(&reference_raster, &generated, &self.config)?;
        result.diff.write_png_if_changed(&diff_path)?;
        info!(
            "[VISUAL] {} of {} pixels differ ({}%)",
            result.summary.mismatched_pixels, result.summary.total_pixels, result.summary.mismatch_percent
        );

        Ok(LayoutComparison {
            summary: result.summary,
            viewport,
            mismatch_threshold: self.config.mismatch_threshold,
            reference_path: reference.to_path_buf(),
            screenshot_path,
            diff_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(format_percent(0.0), "0.00");
        assert_eq!(format_percent(100.0), "100.00");
        assert_eq!(format_percent(1.0 / 3.0 * 100.0), "33.33");
        assert_eq!(format_percent(0.125), "0.13");
    }

    #[test]
    fn identical_rasters_pass_with_zero_percent() -> Result<()> {
        let img = Raster::filled(8, 8, [40, 80, 120, 255]);
        let result = compare_rasters(&img, &img, &VisualDiffConfig::default())?;
        assert_eq!(result.summary.mismatched_pixels, 0);
        assert_eq!(result.summary.mismatch_percent, "0.00");
        assert!(result.summary.passed);
        Ok(())
    }

    #[test]
    fn generated_is_resampled_to_reference_size() -> Result<()> {
        let reference = Raster::filled(8, 6, [0, 0, 0, 255]);
        let generated = Raster::filled(4, 3, [0, 0, 0, 255]);
        let result = compare_rasters(&reference, &generated, &VisualDiffConfig::default())?;
        assert_eq!((result.summary.width, result.summary.height), (8, 6));
        assert_eq!(result.summary.total_pixels, 48);
        assert_eq!(result.summary.mismatched_pixels, 0);
        Ok(())
    }

    #[test]
    fn pass_boundary_is_inclusive() -> Result<()> {
        let reference = Raster::filled(10, 10, [255, 255, 255, 255]);
        let mut generated = reference.clone();
        for px in generated.pixels.chunks_exact_mut(4).take(5) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
        let result = compare_rasters(&reference, &generated, &VisualDiffConfig::default())?;
        assert_eq!(result.summary.mismatched_pixels, 5);
        assert_eq!(result.summary.mismatch_percent, "5.00");
        assert!(result.summary.passed);

        let strict = VisualDiffConfig {
            mismatch_threshold: 4.99,
            ..VisualDiffConfig::default()
        };
        assert!(!compare_rasters(&reference, &generated, &strict)?.summary.passed);
        Ok(())
    }

    #[test]
    fn empty_reference_is_rejected() {
        let empty = Raster::filled(0, 0, [0; 4]);
        assert!(matches!(
            compare_rasters(&empty, &empty, &VisualDiffConfig::default()),
            Err(VisualDiffError::InvalidRaster { .. })
        ));
    }
}
