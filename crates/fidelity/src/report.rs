//! Validation outcome, its JSON report file, and text summaries.

use chrono::Utc;
use core::fmt;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::analysis::{Analysis, FidelityReport};
use crate::autofix::{AutoFixOutcome, write_text_if_changed};
use crate::config::{COLOR_VARIABLE_SCORE_CEILING, REPORT_FILE_NAME};
use crate::design_tree::{ColorSample, FontSample};
use crate::error::{FidelityError, Result};
use crate::suggestions::{FixSuggestion, generate_suggestions};

/// Missing colors listed in a summary before eliding the rest.
const SUMMARY_COLOR_LIMIT: usize = 5;
/// Suggestions listed in a summary before eliding the rest.
const SUMMARY_SUGGESTION_LIMIT: usize = 3;
/// Score at or above which a summary calls the result excellent.
const EXCELLENT_SCORE: u8 = 95;
/// Score at or above which a summary calls the result good.
const GOOD_SCORE: u8 = 85;

/// A suggestion as it appears in reports, with its rendered text.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedSuggestion {
    #[serde(flatten)]
    pub fix: FixSuggestion,
    pub description: String,
    pub css_rule: String,
}

impl From<FixSuggestion> for ReportedSuggestion {
    fn from(fix: FixSuggestion) -> Self {
        Self {
            description: fix.description(),
            css_rule: fix.css_rule(),
            fix,
        }
    }
}

/// Everything one validation pass produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    #[serde(flatten)]
    pub report: FidelityReport,
    pub missing_colors: Vec<ColorSample>,
    pub missing_fonts: Vec<FontSample>,
    pub suggestions: Vec<ReportedSuggestion>,
    /// RFC 3339 time the outcome was produced.
    pub timestamp: String,
}

impl ValidationOutcome {
    /// Build an outcome from an analysis, generating its suggestions.
    pub fn from_analysis(analysis: Analysis) -> Self {
        let suggestions = generate_suggestions(&analysis)
            .into_iter()
            .map(ReportedSuggestion::from)
            .collect();
        Self {
            report: analysis.report,
            missing_colors: analysis.missing_colors,
            missing_fonts: analysis.missing_fonts,
            suggestions,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn score(&self) -> u8 {
        self.report.fidelity_score
    }

    /// Whether the score is low enough for `--color-*` variables to be added.
    pub fn wants_color_variables(&self) -> bool {
        self.score() < COLOR_VARIABLE_SCORE_CEILING && !self.missing_colors.is_empty()
    }

    /// The suggestions in the form the fix applier takes.
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        self.suggestions
            .iter()
            .map(|reported| reported.fix.clone())
            .collect()
    }

    /// Multi-line human-readable summary.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = &self.report;
        let verdict = if report.fidelity_score >= EXCELLENT_SCORE {
            "excellent"
        } else if report.fidelity_score >= GOOD_SCORE {
            "good"
        } else {
            "needs work"
        };

        writeln!(out, "Design fidelity report")?;
        writeln!(out, "{}", "=".repeat(40))?;
        writeln!(out, "Fidelity score: {}% ({verdict})", report.fidelity_score)?;
        writeln!(out, "Expected colors: {}", report.expected_color_count)?;
        writeln!(out, "Found colors: {}", report.found_color_count)?;
        writeln!(out, "Missing colors: {}", report.missing_color_count)?;

        if !self.missing_colors.is_empty() {
            writeln!(out, "\nMissing colors ({}):", self.missing_colors.len())?;
            for color in self.missing_colors.iter().take(SUMMARY_COLOR_LIMIT) {
                writeln!(out, "  {} ({}) - {}", color.rgba, color.hex, color.element)?;
            }
            if self.missing_colors.len() > SUMMARY_COLOR_LIMIT {
                writeln!(
                    out,
                    "  ... and {} more",
                    self.missing_colors.len() - SUMMARY_COLOR_LIMIT
                )?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(out, "\nSuggested fixes ({}):", self.suggestions.len())?;
            for (index, suggestion) in self
                .suggestions
                .iter()
                .take(SUMMARY_SUGGESTION_LIMIT)
                .enumerate()
            {
                writeln!(out, "{}. {}", index + 1, suggestion.description)?;
            }
            if self.suggestions.len() > SUMMARY_SUGGESTION_LIMIT {
                writeln!(
                    out,
                    "... and {} more",
                    self.suggestions.len() - SUMMARY_SUGGESTION_LIMIT
                )?;
            }
        }

        for warning in &report.warnings {
            writeln!(out, "\nWarning: {warning}")?;
        }

        write!(
            out,
            "\nNext step: {}",
            if report.fidelity_score >= EXCELLENT_SCORE {
                "none, fidelity is excellent"
            } else {
                "run auto_fix_design_issues to apply the suggestions"
            }
        )
    }
}

/// `design-fidelity-report.json` in the stylesheet's directory.
pub fn report_path(stylesheet: &Path) -> PathBuf {
    stylesheet
        .parent()
        .map_or_else(|| PathBuf::from(REPORT_FILE_NAME), |dir| dir.join(REPORT_FILE_NAME))
}

/// Write `outcome` as pretty JSON next to the stylesheet.
///
/// # Errors
///
/// Returns [`FidelityError::Serialize`] if the outcome cannot be encoded, or
/// [`FidelityError::Io`] if the file cannot be written.
pub fn write_report(stylesheet: &Path, outcome: &ValidationOutcome) -> Result<PathBuf> {
    let path = report_path(stylesheet);
    let json = serde_json::to_string_pretty(outcome).map_err(|source| FidelityError::Serialize {
        what: "fidelity report",
        source,
    })?;
    write_text_if_changed(&path, &json)?;
    debug!("[FIDELITY] report written to {}", path.display());
    Ok(path)
}

/// Display adapter summarizing an auto-fix run.
pub struct AutoFixSummary<'run> {
    pub stylesheet: &'run Path,
    pub outcome: &'run AutoFixOutcome,
}

impl fmt::Display for AutoFixSummary<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.stylesheet.file_name().map_or_else(
            || self.stylesheet.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        writeln!(out, "Auto-fix complete")?;
        writeln!(out, "File: {file}")?;
        write!(out, "Fixes applied: {}", self.outcome.applied_count)?;
        for (index, fix) in self.outcome.applied_fixes.iter().enumerate() {
            write!(
                out,
                "\n{}. {}: {} -> {}: {} ({:?})",
                index + 1,
                fix.kind,
                fix.element,
                fix.property,
                fix.value,
                fix.action
            )?;
        }
        Ok(())
    }
}
