//! Compares expected design attributes against implementation evidence and
//! computes the fidelity score.

use log::{debug, info};
use serde::Serialize;

use crate::design_tree::{ColorSample, ExpectedAttributeSet, FontSample};
use crate::implementation::FoundAttributeSet;

/// Summary counts and the score.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FidelityReport {
    pub expected_color_count: usize,
    pub found_color_count: usize,
    pub missing_color_count: usize,
    pub expected_font_count: usize,
    pub found_font_count: usize,
    pub warnings: Vec<String>,
    pub fidelity_score: u8,
}

/// Outcome of one comparison pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub report: FidelityReport,
    /// Expected colors with no matching token, in expected order.
    pub missing_colors: Vec<ColorSample>,
    /// Expected fonts of known size whose `{size}px` was not found.
    pub missing_fonts: Vec<FontSample>,
}

/// `round((1 - missing / expected) * 100)`, or 100 when nothing is expected.
pub fn fidelity_score(expected: usize, missing: usize) -> u8 {
    if expected == 0 {
        return 100;
    }
    let ratio = 1.0 - (missing.min(expected) as f64 / expected as f64);
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Whether `sample` counts as present in the implementation.
///
/// Matching is case-insensitive substring containment of either the rgba or
/// the hex form, so `#ff0000` is found inside `#ff0000aa` and inside
/// `border-color: #ff0000 !important`.
pub fn color_is_found(sample: &ColorSample, found: &FoundAttributeSet) -> bool {
    let rgba = sample.rgba.to_lowercase();
    let hex = sample.hex.to_lowercase();
    found.colors.iter().any(|token| {
        let token = token.to_lowercase();
        token.contains(&rgba) || token.contains(&hex)
    })
}

/// Compare expected against found. Pure and deterministic.
pub fn analyze(expected: &ExpectedAttributeSet, found: &FoundAttributeSet) -> Analysis {
    let missing_colors: Vec<ColorSample> = expected
        .colors
        .iter()
        .filter(|sample| !color_is_found(sample, found))
        .cloned()
        .collect();

    let missing_fonts: Vec<FontSample> = expected
        .fonts
        .iter()
        .filter(|font| {
            font.size
                .as_px()
                .is_some_and(|size| !found.has_font_size(&size))
        })
        .cloned()
        .collect();

    let mut warnings = expected.warnings.clone();
    if !missing_fonts.is_empty() {
        let sizes: Vec<String> = missing_fonts
            .iter()
            .filter_map(|font| font.size.as_px())
            .collect();
        warnings.push(format!("Missing font sizes: {}", sizes.join(", ")));
    }

    let report = FidelityReport {
        expected_color_count: expected.colors.len(),
        found_color_count: found.colors.len(),
        missing_color_count: missing_colors.len(),
        expected_font_count: expected.fonts.len(),
        found_font_count: found.font_sizes.len(),
        warnings,
        fidelity_score: fidelity_score(expected.colors.len(), missing_colors.len()),
    };

    info!(
        "[FIDELITY] score {}% ({} of {} expected colors missing)",
        report.fidelity_score, report.missing_color_count, report.expected_color_count
    );
    for sample in &missing_colors {
        debug!(
            "[FIDELITY] missing {} ({}) on {} [{}]",
            sample.rgba, sample.hex, sample.element, sample.source
        );
    }

    Analysis {
        report,
        missing_colors,
        missing_fonts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design_tree::{ColorKind, FontSize, FontWeight};
    use crate::implementation::extract_found;

    fn color(rgba: &str, hex: &str) -> ColorSample {
        ColorSample {
            rgba: rgba.to_owned(),
            hex: hex.to_owned(),
            element: "Box".to_owned(),
            kind: ColorKind::Fill,
            source: "test.json".to_owned(),
        }
    }

    fn font(size: FontSize) -> FontSample {
        FontSample {
            family: "Inter".to_owned(),
            weight: FontWeight::default(),
            size,
            element: "Title".to_owned(),
            source: "test.json".to_owned(),
        }
    }

    #[test]
    fn empty_expectation_scores_100() {
        let analysis = analyze(&ExpectedAttributeSet::default(), &extract_found("", None));
        assert_eq!(analysis.report.fidelity_score, 100);
        assert!(analysis.missing_colors.is_empty());
    }

    #[test]
    fn score_follows_formula() {
        for expected in 1..=12_usize {
            for missing in 0..=expected {
                let score = fidelity_score(expected, missing);
                let formula =
                    ((1.0 - missing as f64 / expected as f64) * 100.0).round() as u8;
                assert_eq!(score, formula, "{missing}/{expected}");
                assert!(score <= 100);
            }
        }
        assert_eq!(fidelity_score(3, 1), 67);
        assert_eq!(fidelity_score(8, 1), 88);
    }

    #[test]
    fn hex_or_rgba_substring_matches() {
        let found = extract_found(".a { color: #FF0000; } .b { fill: rgba(0, 0, 255, 1); }", None);
        assert!(color_is_found(&color("rgba(255, 0, 0, 1)", "#ff0000"), &found));
        assert!(color_is_found(&color("rgba(0, 0, 255, 1)", "#0000ff"), &found));
        assert!(!color_is_found(&color("rgba(0, 255, 0, 1)", "#00ff00"), &found));
    }

    #[test]
    fn colors_outside_color_properties_count() {
        let found = extract_found(".card { box-shadow: 0 2px 4px rgb(0 128 0); border: 1px solid rgba(255,0,0,1); }", None);
        assert!(color_is_found(&color("rgba(0, 128, 0, 1)", "#008000"), &found));
        assert!(color_is_found(&color("rgba(255, 0, 0, 1)", "#ff0000"), &found));
    }

    #[test]
    fn containment_admits_longer_tokens() {
        let found = extract_found(".a { border-color: #ff0000 !important; }", None);
        assert!(color_is_found(&color("rgba(255, 0, 0, 1)", "#ff0000"), &found));
    }

    #[test]
    fn missing_font_sizes_aggregate_into_one_warning() {
        let expected = ExpectedAttributeSet {
            fonts: vec![
                font(FontSize::Known(16.0)),
                font(FontSize::Known(24.0)),
                font(FontSize::Known(14.0)),
                font(FontSize::Unknown),
            ],
            ..ExpectedAttributeSet::default()
        };
        let found = extract_found("p { font-size: 14px; }", None);
        let analysis = analyze(&expected, &found);
        assert_eq!(analysis.missing_fonts.len(), 2);
        assert_eq!(analysis.report.warnings, ["Missing font sizes: 16px, 24px"]);
        assert_eq!(analysis.report.fidelity_score, 100);
    }

    #[test]
    fn found_font_count_counts_sizes_not_families() {
        let css = "h1 { font-size: 32px; } p { font-size: 16px !important; } body { font-family: Inter; }";
        let analysis = analyze(&ExpectedAttributeSet::default(), &extract_found(css, None));
        assert_eq!(analysis.report.found_font_count, 2);
    }

    #[test]
    fn analysis_is_deterministic() {
        let expected = ExpectedAttributeSet {
            colors: vec![
                color("rgba(255, 0, 0, 1)", "#ff0000"),
                color("rgba(0, 0, 0, 1)", "#000000"),
            ],
            ..ExpectedAttributeSet::default()
        };
        let found = extract_found("body { color: #000; } .x { color: #000000; }", None);
        let first = analyze(&expected, &found);
        let second = analyze(&expected, &found);
        assert_eq!(first, second);
        assert_eq!(first.report.fidelity_score, 50);
        assert_eq!(first.missing_colors[0].hex, "#ff0000");
    }
}
