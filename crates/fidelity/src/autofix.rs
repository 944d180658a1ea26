//! In-memory stylesheet patching for fix suggestions.
//!
//! Rule blocks are located textually: a block runs from `.<class> {` to the
//! first `}` after it. Nested blocks (CSS nesting, `@media` bodies that contain
//! the selector) are not understood; the first inner `}` ends the match.

use indexmap::IndexSet;
use log::{debug, info};
use regex::{Captures, Regex};
use serde::Serialize;
use std::fs::{copy, read, read_to_string, write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::design_tree::ColorSample;
use crate::error::{FidelityError, Result};
use crate::suggestions::{FixKind, FixSuggestion, sanitize_class_name};

static ROOT_BLOCK: LazyLock<Regex> = LazyLock::new(|| pattern(r":root\s*\{[^}]*\}"));

#[expect(clippy::expect_used, reason = "built-in pattern is a literal exercised by the tests")]
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("built-in pattern must compile")
}

/// Suffix appended to the stylesheet path for the pre-fix copy.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Whether a fix rewrote an existing block or appended a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixAction {
    Created,
    Updated,
}

/// Record of one applied suggestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFix {
    #[serde(rename = "type")]
    pub kind: FixKind,
    pub element: String,
    pub selector: String,
    pub property: String,
    pub value: String,
    pub action: FixAction,
}

/// Result of applying a suggestion list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixOutcome {
    pub applied_count: usize,
    pub applied_fixes: Vec<AppliedFix>,
}

/// Patched text plus what was done to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchedStylesheet {
    pub content: String,
    pub outcome: AutoFixOutcome,
}

/// Apply suggestions to stylesheet text without touching the filesystem.
///
/// Suggestions are applied grouped by kind (color, then font, then layout),
/// keeping their relative order within a kind.
///
/// # Errors
///
/// Returns [`FidelityError::PatchFailure`] if a selector pattern cannot be
/// built for a suggestion.
pub fn apply_to_text(stylesheet: &str, suggestions: &[FixSuggestion]) -> Result<PatchedStylesheet> {
    let mut content = stylesheet.to_owned();
    let mut applied_fixes = Vec::with_capacity(suggestions.len());

    for kind in [FixKind::Color, FixKind::Font, FixKind::Layout] {
        for suggestion in suggestions.iter().filter(|fix| fix.kind == kind) {
            let (patched, fix) = apply_one(&content, suggestion)?;
            debug!(
                "[AUTOFIX] {:?} {} {}: {}",
                fix.action, fix.selector, fix.property, fix.value
            );
            content = patched;
            applied_fixes.push(fix);
        }
    }

    Ok(PatchedStylesheet {
        content,
        outcome: AutoFixOutcome {
            applied_count: applied_fixes.len(),
            applied_fixes,
        },
    })
}

/// A `/* ... */` comment that cannot run past its own terminator.
const COMMENT: &str = r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/";

fn apply_one(content: &str, suggestion: &FixSuggestion) -> Result<(String, AppliedFix)> {
    let class = sanitize_class_name(&suggestion.target_element_name);
    let property = suggestion.effective_property();
    let value = &suggestion.expected_value;

    let block = patch_regex(&format!(r"\.{}\s*\{{[^}}]*\}}", regex::escape(&class)))?;
    // Comments between the delimiter and the declaration are kept; a comment
    // trailing the declaration on its line goes with it.
    let existing = patch_regex(&format!(
        r"([{{;])((?:\s*{COMMENT})*)\s*{}\s*:[^;}}]*;?(?:[ \t]*{COMMENT})?",
        regex::escape(property)
    ))?;

    let comment = match (suggestion.kind, suggestion.auxiliary_hex.as_deref()) {
        (FixKind::Color, Some(hex)) => format!("/* {hex} - Auto-fixed */"),
        _ => "/* Auto-fixed */".to_owned(),
    };

    let (patched, action) = if block.is_match(content) {
        let updated = block.replace_all(content, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let body = whole.strip_suffix('}').unwrap_or(whole);
            let cleaned = existing.replace_all(body, "${1}${2}");
            format!("{}\n  {property}: {value}; {comment}\n}}", cleaned.trim())
        });
        (updated.into_owned(), FixAction::Updated)
    } else {
        let hex_comment = suggestion
            .auxiliary_hex
            .as_deref()
            .map(|hex| format!(" /* {hex} */"))
            .unwrap_or_default();
        let created = format!(
            "{content}\n/* Auto-generated: {} */\n.{class} {{\n  {property}: {value};{hex_comment}\n}}",
            suggestion.target_element_name
        );
        (created, FixAction::Created)
    };

    Ok((
        patched,
        AppliedFix {
            kind: suggestion.kind,
            element: suggestion.target_element_name.clone(),
            selector: format!(".{class}"),
            property: property.to_owned(),
            value: value.clone(),
            action,
        },
    ))
}

fn patch_regex(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|err| FidelityError::PatchFailure {
        path: PathBuf::new(),
        reason: err.to_string(),
    })
}

/// Apply suggestions to the stylesheet at `path`.
///
/// All patching happens in memory; the file is rewritten only when the content
/// actually changed, so a failed patch leaves it untouched.
///
/// # Errors
///
/// Returns [`FidelityError::NotFound`] if `path` does not exist, and
/// [`FidelityError::Io`] or [`FidelityError::PatchFailure`] on read, patch, or
/// write failure.
pub fn apply_fixes(path: &Path, suggestions: &[FixSuggestion]) -> Result<AutoFixOutcome> {
    let original = read_stylesheet(path)?;
    let patched = apply_to_text(&original, suggestions).map_err(|err| match err {
        FidelityError::PatchFailure { reason, .. } => FidelityError::PatchFailure {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    if write_text_if_changed(path, &patched.content)? {
        info!(
            "[AUTOFIX] applied {} fixes to {}",
            patched.outcome.applied_count,
            path.display()
        );
    }
    Ok(patched.outcome)
}

/// Copy `path` to `<path>.backup`, replacing any previous backup.
///
/// # Errors
///
/// Returns [`FidelityError::NotFound`] if `path` does not exist, or
/// [`FidelityError::Io`] if the copy fails.
pub fn backup(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(FidelityError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let mut target = path.as_os_str().to_owned();
    target.push(BACKUP_SUFFIX);
    let target = PathBuf::from(target);
    copy(path, &target).map_err(|err| FidelityError::io(&target, err))?;
    debug!("[AUTOFIX] backed up {} to {}", path.display(), target.display());
    Ok(target)
}

/// Write `content` to `path` unless the file already holds exactly that.
/// Returns whether a write happened.
///
/// # Errors
///
/// Returns [`FidelityError::Io`] if the write fails.
pub fn write_text_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = read(path)
        && existing == content.as_bytes()
    {
        return Ok(false);
    }
    write(path, content).map_err(|err| FidelityError::io(path, err))?;
    Ok(true)
}

pub(crate) fn read_stylesheet(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(FidelityError::NotFound {
            path: path.to_path_buf(),
        });
    }
    read_to_string(path).map_err(|err| FidelityError::io(path, err))
}

/// Outcome of the color-variable enhancement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorVariableOutcome {
    /// Declarations added, e.g. `--color-box: #ff0000;`.
    pub added_variables: Vec<String>,
    /// Whether an existing `:root` block received them.
    pub merged_into_root: bool,
}

/// Custom-property declarations for missing colors, one per class name.
pub fn build_color_variables(colors: &[ColorSample]) -> Vec<String> {
    let mut seen = IndexSet::new();
    colors
        .iter()
        .filter_map(|color| {
            let class = sanitize_class_name(&color.element);
            seen.insert(class.clone())
                .then(|| format!("--color-{class}: {};", color.hex))
        })
        .collect()
}

/// Insert declarations into the first `:root` block, or prepend a new one.
/// Declarations whose variable name already appears in the text are skipped.
pub fn insert_color_variables(stylesheet: &str, declarations: &[String]) -> (String, ColorVariableOutcome) {
    let fresh: Vec<String> = declarations
        .iter()
        .filter(|decl| {
            decl.split_once(':')
                .is_none_or(|(name, _)| !stylesheet.contains(&format!("{name}:")))
        })
        .cloned()
        .collect();
    if fresh.is_empty() {
        return (stylesheet.to_owned(), ColorVariableOutcome::default());
    }
    let lines: Vec<String> = fresh.iter().map(|decl| format!("  {decl}")).collect();
    let lines = lines.join("\n");

    let (content, merged_into_root) = match ROOT_BLOCK.find(stylesheet) {
        Some(root) => {
            let body = root.as_str().strip_suffix('}').unwrap_or(root.as_str());
            let merged = format!("{}\n{lines}\n}}", body.trim_end());
            let mut content = String::with_capacity(stylesheet.len() + lines.len() + 2);
            content.push_str(&stylesheet[..root.start()]);
            content.push_str(&merged);
            content.push_str(&stylesheet[root.end()..]);
            (content, true)
        }
        None => (format!(":root {{\n{lines}\n}}\n\n{stylesheet}"), false),
    };

    (
        content,
        ColorVariableOutcome {
            added_variables: fresh,
            merged_into_root,
        },
    )
}

/// Add color custom properties for `colors` to the stylesheet at `path`.
///
/// # Errors
///
/// Returns [`FidelityError::NotFound`] if `path` does not exist, or
/// [`FidelityError::Io`] on read or write failure.
pub fn apply_color_variables(path: &Path, colors: &[ColorSample]) -> Result<ColorVariableOutcome> {
    let original = read_stylesheet(path)?;
    let (content, outcome) = insert_color_variables(&original, &build_color_variables(colors));
    if write_text_if_changed(path, &content)? {
        info!(
            "[AUTOFIX] added {} color variables to {}",
            outcome.added_variables.len(),
            path.display()
        );
    }
    Ok(outcome)
}
