//! The named operations, and a transport-neutral JSON tool-call dispatcher.
//!
//! Every operation returns a typed value; [`dispatch`] wraps the same values
//! as JSON plus a text summary for callers that speak tool calls.

use core::fmt;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::autofix::{AutoFixOutcome, ColorVariableOutcome, apply_color_variables, apply_fixes, backup};
use crate::config::{DEFAULT_TARGET_SCORE, FidelityConfig};
use crate::convergence::{ConvergenceOutcome, converge};
use crate::design_tree::ColorSample;
use crate::error::{FidelityError, Result};
use crate::report::{AutoFixSummary, ValidationOutcome};
use crate::suggestions::FixSuggestion;
use crate::workspace::DesignWorkspace;

/// Validate one design unit and write its report.
///
/// # Errors
///
/// Returns [`FidelityError::NotFound`] if any given path is missing,
/// [`FidelityError::Parse`] for an invalid design tree, and
/// [`FidelityError::Io`] on read or report-write failure.
pub fn validate(
    design_tree: &Path,
    stylesheet: &Path,
    markup: Option<&Path>,
    config: &FidelityConfig,
) -> Result<ValidationOutcome> {
    DesignWorkspace::new(design_tree, stylesheet)
        .with_markup(markup.map(Path::to_path_buf))
        .validate(config)
}

/// Apply `suggestions` to the stylesheet, optionally backing it up first.
///
/// # Errors
///
/// Returns [`FidelityError::NotFound`] if the stylesheet is missing, and any
/// backup, patch, or write failure.
pub fn auto_fix(stylesheet: &Path, suggestions: &[FixSuggestion], make_backup: bool) -> Result<AutoFixOutcome> {
    if make_backup {
        backup(stylesheet)?;
    }
    apply_fixes(stylesheet, suggestions)
}

/// Run the convergence loop toward `target_score`.
///
/// # Errors
///
/// Returns the first hard failure of the loop.
pub fn complete_workflow(
    design_tree: &Path,
    stylesheet: &Path,
    markup: Option<&Path>,
    target_score: u8,
    config: &FidelityConfig,
) -> Result<ConvergenceOutcome> {
    let config = config.clone().with_target_score(target_score);
    let workspace =
        DesignWorkspace::new(design_tree, stylesheet).with_markup(markup.map(Path::to_path_buf));
    let outcome = converge(workspace, &config)?;
    info!(
        "[FIDELITY] workflow finished at {}% after {} passes (target {}%)",
        outcome.final_score, outcome.iterations, config.target_score
    );
    Ok(outcome)
}

/// Add `--color-<name>` custom properties for `missing_colors`.
///
/// # Errors
///
/// Returns [`FidelityError::NotFound`] if the stylesheet is missing, and any
/// backup or write failure.
pub fn smart_fix(stylesheet: &Path, missing_colors: &[ColorSample], make_backup: bool) -> Result<ColorVariableOutcome> {
    if make_backup {
        backup(stylesheet)?;
    }
    apply_color_variables(stylesheet, missing_colors)
}

/// Display adapter for a workflow outcome.
pub struct WorkflowSummary<'run>(pub &'run ConvergenceOutcome);

impl fmt::Display for WorkflowSummary<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = self.0;
        writeln!(out, "Workflow complete")?;
        writeln!(out, "{}", "-".repeat(30))?;
        writeln!(out, "Target score: {}%", outcome.state.target_score)?;
        for (pass, score) in outcome.score_history.iter().enumerate() {
            writeln!(out, "Pass {}: {score}%", pass + 1)?;
        }
        writeln!(out, "Final score: {}%", outcome.final_score)?;
        writeln!(out, "Passes: {}", outcome.iterations)?;
        writeln!(out, "Fixes applied: {}", outcome.fixes_applied)?;
        for warning in &outcome.warnings {
            writeln!(out, "Warning: {warning}")?;
        }
        if outcome.target_reached {
            write!(out, "Target reached")
        } else {
            write!(
                out,
                "Target not reached ({} iteration limit)",
                outcome.state.max_iterations
            )
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_target_score() -> u8 {
    DEFAULT_TARGET_SCORE
}

/// Arguments of `validate_design_fidelity`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateArgs {
    #[serde(alias = "figmaJsonPath")]
    pub design_tree_path: PathBuf,
    #[serde(alias = "cssPath")]
    pub stylesheet_path: PathBuf,
    #[serde(default, alias = "htmlPath")]
    pub markup_path: Option<PathBuf>,
}

/// Arguments of `auto_fix_design_issues`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixArgs {
    #[serde(alias = "cssPath")]
    pub stylesheet_path: PathBuf,
    pub suggestions: Vec<FixSuggestion>,
    #[serde(default = "default_true", alias = "backupOriginal")]
    pub backup: bool,
}

/// Arguments of `complete_design_workflow`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowArgs {
    #[serde(alias = "figmaJsonPath")]
    pub design_tree_path: PathBuf,
    #[serde(alias = "cssPath")]
    pub stylesheet_path: PathBuf,
    #[serde(default, alias = "htmlPath")]
    pub markup_path: Option<PathBuf>,
    #[serde(default = "default_target_score")]
    pub target_score: u8,
}

/// Arguments of `add_color_variables`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorVariableArgs {
    #[serde(alias = "cssPath")]
    pub stylesheet_path: PathBuf,
    pub missing_colors: Vec<ColorSample>,
    #[serde(default = "default_true", alias = "backupOriginal")]
    pub backup: bool,
}

/// A tool call: `{"name": "...", "arguments": {...}}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    ValidateDesignFidelity(ValidateArgs),
    AutoFixDesignIssues(AutoFixArgs),
    CompleteDesignWorkflow(WorkflowArgs),
    AddColorVariables(ColorVariableArgs),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidateDesignFidelity(_) => "validate_design_fidelity",
            Self::AutoFixDesignIssues(_) => "auto_fix_design_issues",
            Self::CompleteDesignWorkflow(_) => "complete_design_workflow",
            Self::AddColorVariables(_) => "add_color_variables",
        }
    }
}

/// Response to a tool call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub summary: String,
    pub result: Value,
    pub is_error: bool,
}

impl ToolResponse {
    fn error(call: &str, err: &FidelityError) -> Self {
        Self {
            summary: format!("{call} failed: {err}"),
            result: Value::Null,
            is_error: true,
        }
    }
}

fn to_json<T: Serialize>(value: &T, what: &'static str) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| FidelityError::Serialize { what, source })
}

/// Run a tool call. Operation failures come back as an error response rather
/// than an `Err`, matching how tool transports report them.
pub fn dispatch(call: &ToolCall, config: &FidelityConfig) -> ToolResponse {
    let name = call.name();
    let response = match call {
        ToolCall::ValidateDesignFidelity(args) => validate(
            &args.design_tree_path,
            &args.stylesheet_path,
            args.markup_path.as_deref(),
            config,
        )
        .and_then(|outcome| {
            Ok(ToolResponse {
                summary: outcome.summary(),
                result: to_json(&outcome, "validation outcome")?,
                is_error: false,
            })
        }),
        ToolCall::AutoFixDesignIssues(args) => {
            auto_fix(&args.stylesheet_path, &args.suggestions, args.backup).and_then(|outcome| {
                Ok(ToolResponse {
                    summary: AutoFixSummary {
                        stylesheet: &args.stylesheet_path,
                        outcome: &outcome,
                    }
                    .to_string(),
                    result: to_json(&outcome, "auto-fix outcome")?,
                    is_error: false,
                })
            })
        }
        ToolCall::CompleteDesignWorkflow(args) => complete_workflow(
            &args.design_tree_path,
            &args.stylesheet_path,
            args.markup_path.as_deref(),
            args.target_score,
            config,
        )
        .and_then(|outcome| {
            Ok(ToolResponse {
                summary: WorkflowSummary(&outcome).to_string(),
                result: to_json(&outcome, "workflow outcome")?,
                is_error: false,
            })
        }),
        ToolCall::AddColorVariables(args) => {
            smart_fix(&args.stylesheet_path, &args.missing_colors, args.backup).and_then(|outcome| {
                Ok(ToolResponse {
                    summary: format!(
                        "Added {} color variables to {}",
                        outcome.added_variables.len(),
                        args.stylesheet_path.display()
                    ),
                    result: to_json(&outcome, "color variable outcome")?,
                    is_error: false,
                })
            })
        }
    };
    response.unwrap_or_else(|err| ToolResponse::error(name, &err))
}

/// Parse a tool call from JSON text and run it.
///
/// # Errors
///
/// Returns [`FidelityError::Parse`] if `input` is not a known tool call; the
/// `path` names the pseudo-file `<tool-call>`.
pub fn dispatch_json(input: &str, config: &FidelityConfig) -> Result<ToolResponse> {
    let call: ToolCall = serde_json::from_str(input).map_err(|source| FidelityError::Parse {
        path: PathBuf::from("<tool-call>"),
        source,
    })?;
    info!("[FIDELITY] tool call {}", call.name());
    Ok(dispatch(&call, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::error::Error;
    use core::result;
    use serde_json::json;

    type TestResult = result::Result<(), Box<dyn Error>>;

    #[test]
    fn tool_calls_accept_legacy_argument_names() -> TestResult {
        let call: ToolCall = serde_json::from_value(json!({
            "name": "complete_design_workflow",
            "arguments": {"figmaJsonPath": "a.json", "cssPath": "style.css"}
        }))?;
        assert_eq!(
            call,
            ToolCall::CompleteDesignWorkflow(WorkflowArgs {
                design_tree_path: PathBuf::from("a.json"),
                stylesheet_path: PathBuf::from("style.css"),
                markup_path: None,
                target_score: 95,
            })
        );
        Ok(())
    }

    #[test]
    fn auto_fix_defaults_to_backup() -> TestResult {
        let call: ToolCall = serde_json::from_value(json!({
            "name": "auto_fix_design_issues",
            "arguments": {"stylesheetPath": "style.css", "suggestions": []}
        }))?;
        let ToolCall::AutoFixDesignIssues(args) = call else {
            return Err("wrong variant".into());
        };
        assert!(args.backup);
        Ok(())
    }

    #[test]
    fn unknown_tool_is_a_parse_error() {
        let result = dispatch_json(r#"{"name": "explode", "arguments": {}}"#, &FidelityConfig::default());
        assert!(matches!(result, Err(FidelityError::Parse { .. })));
    }

    #[test]
    fn missing_files_become_error_responses() -> TestResult {
        let response = dispatch_json(
            r#"{"name": "validate_design_fidelity", "arguments": {"designTreePath": "/nonexistent/a.json", "stylesheetPath": "/nonexistent/a.css"}}"#,
            &FidelityConfig::default(),
        )?;
        assert!(response.is_error);
        assert!(response.summary.contains("file not found"));
        Ok(())
    }
}
