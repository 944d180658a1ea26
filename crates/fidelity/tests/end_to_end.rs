#![allow(
    clippy::tests_outside_test_module,
    reason = "integration tests live at the top level of their file"
)]

use core::error::Error;
use fidelity::autofix::{BACKUP_SUFFIX, FixAction};
use fidelity::config::REPORT_FILE_NAME;
use fidelity::facade::{auto_fix, dispatch_json, smart_fix, validate};
use fidelity::{FidelityConfig, FidelityError, FixKind};
use serde_json::{Value, json};
use std::fs::{read_to_string, write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

const RED_BOX: &str = r#"{
  "nodes": {
    "1:2": {
      "document": {
        "type": "FRAME",
        "name": "Page",
        "children": [{
          "type": "RECTANGLE",
          "name": "Box",
          "fills": [{"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0}, "opacity": 1}],
          "absoluteBoundingBox": {"width": 120.4, "height": 80.6}
        }]
      }
    }
  }
}"#;

fn fixture(css: &str) -> Result<(TempDir, PathBuf, PathBuf), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let design = dir.path().join("design.json");
    let stylesheet = dir.path().join("style.css");
    write(&design, RED_BOX)?;
    write(&stylesheet, css)?;
    Ok((dir, design, stylesheet))
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_str(&read_to_string(path)?)?)
}

#[test]
fn red_box_is_reported_and_fixed() -> TestResult {
    let (dir, design, stylesheet) = fixture(".box {\n  border-radius: 4px;\n}\n")?;
    let config = FidelityConfig::default();

    let outcome = validate(&design, &stylesheet, None, &config)?;
    assert_eq!(outcome.missing_colors.len(), 1);
    assert_eq!(outcome.missing_colors[0].rgba, "rgba(255, 0, 0, 1)");
    assert_eq!(outcome.missing_colors[0].source, "design.json");
    assert_eq!(outcome.score(), 0);
    assert_eq!(outcome.suggestions.len(), 1);
    assert_eq!(outcome.suggestions[0].fix.kind, FixKind::Color);

    let report = read_json(&dir.path().join(REPORT_FILE_NAME))?;
    assert_eq!(report["fidelityScore"], 0);
    assert_eq!(report["missingColors"][0]["element"], "Box");

    let fixed = auto_fix(&stylesheet, &outcome.fix_suggestions(), true)?;
    assert_eq!(fixed.applied_count, 1);
    assert_eq!(fixed.applied_fixes[0].action, FixAction::Updated);

    let css = read_to_string(&stylesheet)?;
    assert!(css.contains(".box {\n  border-radius: 4px;\n  background-color: rgba(255, 0, 0, 1);"));
    let backup = read_to_string(format!("{}{BACKUP_SUFFIX}", stylesheet.display()))?;
    assert_eq!(backup, ".box {\n  border-radius: 4px;\n}\n");

    let rescored = validate(&design, &stylesheet, None, &config)?;
    assert!(rescored.missing_colors.is_empty());
    assert_eq!(rescored.score(), 100);
    Ok(())
}

#[test]
fn markup_colors_count_as_found() -> TestResult {
    let (dir, design, stylesheet) = fixture("")?;
    let markup = dir.path().join("index.html");
    write(&markup, r#"<div class="box" style="background: #FF0000"></div>"#)?;
    let outcome = validate(&design, &stylesheet, Some(&markup), &FidelityConfig::default())?;
    assert_eq!(outcome.score(), 100);
    Ok(())
}

#[test]
fn missing_inputs_are_not_found() -> TestResult {
    let (dir, design, _stylesheet) = fixture("")?;
    let absent = dir.path().join("absent.css");
    let result = validate(&design, &absent, None, &FidelityConfig::default());
    assert!(matches!(result, Err(FidelityError::NotFound { path }) if path == absent));
    Ok(())
}

#[test]
fn invalid_json_is_a_parse_error() -> TestResult {
    let (_dir, design, stylesheet) = fixture("")?;
    write(&design, "{ not json")?;
    let result = validate(&design, &stylesheet, None, &FidelityConfig::default());
    assert!(matches!(result, Err(FidelityError::Parse { .. })));
    Ok(())
}

#[test]
fn unrecognized_shape_is_a_warning() -> TestResult {
    let (_dir, design, stylesheet) = fixture("")?;
    write(&design, r#"{"meta": {"version": 2}}"#)?;
    let outcome = validate(&design, &stylesheet, None, &FidelityConfig::default())?;
    assert_eq!(outcome.score(), 100);
    assert_eq!(outcome.report.warnings.len(), 1);
    Ok(())
}

#[test]
fn unchanged_stylesheet_is_not_rewritten() -> TestResult {
    let (_dir, _design, stylesheet) = fixture(".box { color: red; }")?;
    let fixed = auto_fix(&stylesheet, &[], false)?;
    assert_eq!(fixed.applied_count, 0);
    assert_eq!(read_to_string(&stylesheet)?, ".box { color: red; }");
    assert!(!Path::new(&format!("{}{BACKUP_SUFFIX}", stylesheet.display())).exists());
    Ok(())
}

#[test]
fn color_variables_are_prepended() -> TestResult {
    let (_dir, design, stylesheet) = fixture("body { margin: 0; }")?;
    let outcome = validate(&design, &stylesheet, None, &FidelityConfig::default())?;
    let added = smart_fix(&stylesheet, &outcome.missing_colors, false)?;
    assert_eq!(added.added_variables, ["--color-box: #ff0000;"]);
    assert!(read_to_string(&stylesheet)?.starts_with(":root {\n  --color-box: #ff0000;\n}\n\nbody"));
    Ok(())
}

#[test]
fn tool_call_round_trip_fixes_the_stylesheet() -> TestResult {
    let (_dir, design, stylesheet) = fixture(".box { }")?;
    let config = FidelityConfig::default();

    let validation = dispatch_json(
        &json!({
            "name": "validate_design_fidelity",
            "arguments": {"figmaJsonPath": design, "cssPath": stylesheet}
        })
        .to_string(),
        &config,
    )?;
    assert!(!validation.is_error);
    assert!(validation.summary.contains("Fidelity score: 0%"));

    let fix = dispatch_json(
        &json!({
            "name": "auto_fix_design_issues",
            "arguments": {
                "cssPath": stylesheet,
                "suggestions": validation.result["suggestions"],
                "backupOriginal": false
            }
        })
        .to_string(),
        &config,
    )?;
    assert!(!fix.is_error);
    assert_eq!(fix.result["appliedCount"], 1);
    assert!(fix.summary.contains("color: Box -> background-color: rgba(255, 0, 0, 1)"));
    Ok(())
}
