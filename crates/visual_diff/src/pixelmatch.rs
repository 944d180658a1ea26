//! Perceptual per-pixel comparison in YIQ space with anti-aliasing detection.
//!
//! Each pixel pair is scored by a weighted YIQ distance. Pairs above the
//! threshold count as mismatches unless either side looks like an
//! anti-aliased edge, in which case they are drawn in the anti-alias color
//! and not counted.

use crate::error::{Result, VisualDiffError};
use crate::raster::Raster;

/// Largest possible YIQ delta between two colors.
const MAX_YIQ_DELTA: f64 = 35215.0;

#[derive(Clone, Debug, PartialEq)]
pub struct MatchOptions {
    /// Matching threshold in `[0, 1]`; smaller is more sensitive.
    pub threshold: f64,
    /// Opacity of the faded original under matched pixels.
    pub alpha: f64,
    pub aa_color: [u8; 3],
    pub diff_color: [u8; 3],
    /// Color for mismatches where the second image is darker. Falls back to
    /// `diff_color`.
    pub diff_color_alt: Option<[u8; 3]>,
    /// Count anti-aliased pixels as mismatches.
    pub include_aa: bool,
    /// Draw only mismatches onto a transparent background.
    pub diff_mask: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            alpha: 0.1,
            aa_color: [255, 255, 0],
            diff_color: [255, 0, 0],
            diff_color_alt: None,
            include_aa: false,
            diff_mask: false,
        }
    }
}

impl MatchOptions {
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Mismatch count plus the diff visualization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelMatch {
    pub mismatched: u64,
    pub diff: Raster,
}

/// Compare two equally sized rasters.
///
/// # Errors
///
/// Returns [`VisualDiffError::DimensionMismatch`] when sizes differ and
/// [`VisualDiffError::InvalidRaster`] when a buffer does not hold
/// `width * height` RGBA pixels.
pub fn pixelmatch(expected: &Raster, actual: &Raster, options: &MatchOptions) -> Result<PixelMatch> {
    if expected.width != actual.width || expected.height != actual.height {
        return Err(VisualDiffError::DimensionMismatch {
            expected_width: expected.width,
            expected_height: expected.height,
            actual_width: actual.width,
            actual_height: actual.height,
        });
    }
    let width = expected.width as usize;
    let height = expected.height as usize;
    let len = width * height * 4;
    for raster in [expected, actual] {
        if raster.pixels.len() != len {
            return Err(VisualDiffError::InvalidRaster {
                reason: format!(
                    "{}x{} raster holds {} bytes, expected {len}",
                    raster.width,
                    raster.height,
                    raster.pixels.len()
                ),
            });
        }
    }

    let img1 = expected.pixels.as_slice();
    let img2 = actual.pixels.as_slice();
    let mut out = vec![0_u8; len];

    if img1 == img2 {
        if !options.diff_mask {
            for pos in (0..len).step_by(4) {
                draw_gray_pixel(img1, pos, options.alpha, &mut out);
            }
        }
        return Ok(PixelMatch {
            mismatched: 0,
            diff: Raster {
                width: expected.width,
                height: expected.height,
                pixels: out,
            },
        });
    }

    let max_delta = MAX_YIQ_DELTA * options.threshold * options.threshold;
    let grid = Grid { width, height };
    let mut mismatched = 0_u64;

    for y in 0..height {
        for x in 0..width {
            let pos = (y * width + x) * 4;
            let delta = color_delta(img1, img2, pos, pos, false);

            if delta.abs() > max_delta {
                let is_aa = !options.include_aa
                    && (grid.antialiased(img1, x, y, img2) || grid.antialiased(img2, x, y, img1));
                if is_aa {
                    if !options.diff_mask {
                        draw_pixel(&mut out, pos, options.aa_color);
                    }
                } else {
                    let color = if delta < 0.0 {
                        options.diff_color_alt.unwrap_or(options.diff_color)
                    } else {
                        options.diff_color
                    };
                    draw_pixel(&mut out, pos, color);
                    mismatched += 1;
                }
            } else if !options.diff_mask {
                draw_gray_pixel(img1, pos, options.alpha, &mut out);
            }
        }
    }

    Ok(PixelMatch {
        mismatched,
        diff: Raster {
            width: expected.width,
            height: expected.height,
            pixels: out,
        },
    })
}

#[derive(Clone, Copy)]
struct Grid {
    width: usize,
    height: usize,
}

impl Grid {
    /// Inclusive 3x3 window around `(x, y)`, clipped to the image, and whether
    /// the pixel lies on the border.
    fn window(self, x: usize, y: usize) -> (usize, usize, usize, usize, bool) {
        let x0 = x.saturating_sub(1);
        let y0 = y.saturating_sub(1);
        let x2 = (x + 1).min(self.width - 1);
        let y2 = (y + 1).min(self.height - 1);
        let on_edge = x == x0 || x == x2 || y == y0 || y == y2;
        (x0, y0, x2, y2, on_edge)
    }

    const fn pos(self, x: usize, y: usize) -> usize {
        (y * self.width + x) * 4
    }

    /// Whether `(x, y)` in `img` looks like an anti-aliased edge pixel, given
    /// the other image for sibling checks.
    fn antialiased(self, img: &[u8], x: usize, y: usize, other: &[u8]) -> bool {
        let (x0, y0, x2, y2, on_edge) = self.window(x, y);
        let center = self.pos(x, y);
        let mut zeroes = u8::from(on_edge);
        let mut min = 0.0_f64;
        let mut max = 0.0_f64;
        let mut min_at = (0, 0);
        let mut max_at = (0, 0);

        for nx in x0..=x2 {
            for ny in y0..=y2 {
                if nx == x && ny == y {
                    continue;
                }
                let delta = color_delta(img, img, center, self.pos(nx, ny), true);
                if delta == 0.0 {
                    zeroes += 1;
                    if zeroes > 2 {
                        return false;
                    }
                } else if delta < min {
                    min = delta;
                    min_at = (nx, ny);
                } else if delta > max {
                    max = delta;
                    max_at = (nx, ny);
                }
            }
        }

        // No darker or no brighter neighbor: not an edge.
        if min == 0.0 || max == 0.0 {
            return false;
        }

        (self.has_many_siblings(img, min_at.0, min_at.1) && self.has_many_siblings(other, min_at.0, min_at.1))
            || (self.has_many_siblings(img, max_at.0, max_at.1) && self.has_many_siblings(other, max_at.0, max_at.1))
    }

    /// More than two neighbors with exactly the same RGBA value.
    fn has_many_siblings(self, img: &[u8], x: usize, y: usize) -> bool {
        let (x0, y0, x2, y2, on_edge) = self.window(x, y);
        let center = self.pos(x, y);
        let mut zeroes = u8::from(on_edge);

        for nx in x0..=x2 {
            for ny in y0..=y2 {
                if nx == x && ny == y {
                    continue;
                }
                let other = self.pos(nx, ny);
                if img.get(center..center + 4) == img.get(other..other + 4) {
                    zeroes += 1;
                }
                if zeroes > 2 {
                    return true;
                }
            }
        }
        false
    }
}

fn channels(img: &[u8], pos: usize) -> [f64; 4] {
    let px = img.get(pos..pos + 4).unwrap_or(&[0; 4]);
    [f64::from(px[0]), f64::from(px[1]), f64::from(px[2]), f64::from(px[3])]
}

/// Squared YIQ distance between two pixels, negative when the first is
/// brighter. With `y_only` the signed luma difference is returned instead.
fn color_delta(img1: &[u8], img2: &[u8], pos1: usize, pos2: usize, y_only: bool) -> f64 {
    if img1.get(pos1..pos1 + 4) == img2.get(pos2..pos2 + 4) {
        return 0.0;
    }
    let [mut r1, mut g1, mut b1, a1] = channels(img1, pos1);
    let [mut r2, mut g2, mut b2, a2] = channels(img2, pos2);

    // Composite translucent pixels over white.
    if a1 < 255.0 {
        let alpha = a1 / 255.0;
        r1 = blend(r1, alpha);
        g1 = blend(g1, alpha);
        b1 = blend(b1, alpha);
    }
    if a2 < 255.0 {
        let alpha = a2 / 255.0;
        r2 = blend(r2, alpha);
        g2 = blend(g2, alpha);
        b2 = blend(b2, alpha);
    }

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let luma = y1 - y2;
    if y_only {
        return luma;
    }

    let in_phase = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let quadrature = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * luma * luma + 0.299 * in_phase * in_phase + 0.1957 * quadrature * quadrature;

    if y1 > y2 { -delta } else { delta }
}

fn rgb2y(red: f64, green: f64, blue: f64) -> f64 {
    red * 0.298_895_31 + green * 0.586_622_47 + blue * 0.114_482_23
}

fn rgb2i(red: f64, green: f64, blue: f64) -> f64 {
    red * 0.595_977_99 - green * 0.274_176_10 - blue * 0.321_801_89
}

fn rgb2q(red: f64, green: f64, blue: f64) -> f64 {
    red * 0.211_470_17 - green * 0.522_617_11 + blue * 0.311_146_94
}

fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

/// Clamp and round half to even, matching a clamped byte-array store.
fn to_byte(value: f64) -> u8 {
    value.clamp(0.0, 255.0).round_ties_even() as u8
}

fn draw_pixel(out: &mut [u8], pos: usize, [red, green, blue]: [u8; 3]) {
    if let Some(px) = out.get_mut(pos..pos + 4) {
        px.copy_from_slice(&[red, green, blue, 255]);
    }
}

fn draw_gray_pixel(img: &[u8], pos: usize, alpha: f64, out: &mut [u8]) {
    let [red, green, blue, opacity] = channels(img, pos);
    let gray = to_byte(blend(rgb2y(red, green, blue), alpha * opacity / 255.0));
    draw_pixel(out, pos, [gray, gray, gray]);
}
