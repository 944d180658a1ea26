//! File-backed design unit: one design tree, one stylesheet, optional markup.

use log::{debug, info};
use serde_json::Value;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use crate::analysis::analyze;
use crate::autofix::{AutoFixOutcome, apply_fixes, backup, read_stylesheet};
use crate::config::FidelityConfig;
use crate::design_tree::extract_expected;
use crate::error::{FidelityError, Result};
use crate::implementation::extract_found;
use crate::report::{ValidationOutcome, write_report};
use crate::suggestions::FixSuggestion;

/// Paths making up one design unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesignWorkspace {
    pub design_tree: PathBuf,
    pub stylesheet: PathBuf,
    pub markup: Option<PathBuf>,
}

impl DesignWorkspace {
    pub fn new(design_tree: impl Into<PathBuf>, stylesheet: impl Into<PathBuf>) -> Self {
        Self {
            design_tree: design_tree.into(),
            stylesheet: stylesheet.into(),
            markup: None,
        }
    }

    #[must_use]
    pub fn with_markup(mut self, markup: Option<PathBuf>) -> Self {
        self.markup = markup;
        self
    }

    /// Human-readable label for logs and batch outcomes.
    pub fn label(&self) -> String {
        self.stylesheet.display().to_string()
    }

    /// Fail with [`FidelityError::NotFound`] for the first missing input.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::NotFound`] naming the missing path.
    pub fn check_inputs(&self) -> Result<()> {
        let required = [Some(&self.design_tree), Some(&self.stylesheet), self.markup.as_ref()];
        for path in required.into_iter().flatten() {
            if !path.exists() {
                return Err(FidelityError::NotFound { path: path.clone() });
            }
        }
        Ok(())
    }

    /// Read every input, extract, and analyze. Writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::NotFound`] for a missing input,
    /// [`FidelityError::Parse`] if the design tree is not JSON, and
    /// [`FidelityError::Io`] on read failure.
    pub fn analyze(&self) -> Result<ValidationOutcome> {
        self.check_inputs()?;
        let document = read_json(&self.design_tree)?;
        let stylesheet = read_stylesheet(&self.stylesheet)?;
        let markup = self
            .markup
            .as_deref()
            .map(|path| read_to_string(path).map_err(|err| FidelityError::io(path, err)))
            .transpose()?;

        let source = self
            .design_tree
            .file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
        let expected = extract_expected(&document, &source);
        let found = extract_found(&stylesheet, markup.as_deref());
        Ok(ValidationOutcome::from_analysis(analyze(&expected, &found)))
    }

    /// Analyze and, when enabled, write the JSON report next to the stylesheet.
    ///
    /// # Errors
    ///
    /// See [`Self::analyze`]; also fails if the report cannot be written.
    pub fn validate(&self, config: &FidelityConfig) -> Result<ValidationOutcome> {
        let outcome = self.analyze()?;
        if config.write_reports {
            write_report(&self.stylesheet, &outcome)?;
        }
        info!(
            "[FIDELITY] {} scored {}%",
            self.stylesheet.display(),
            outcome.score()
        );
        Ok(outcome)
    }

    /// Back up (when enabled) and patch the stylesheet.
    ///
    /// # Errors
    ///
    /// Returns any backup, read, patch, or write failure.
    pub fn fix(&self, suggestions: &[FixSuggestion], config: &FidelityConfig) -> Result<AutoFixOutcome> {
        if config.backup_before_fix {
            backup(&self.stylesheet)?;
        }
        apply_fixes(&self.stylesheet, suggestions)
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = read_to_string(path).map_err(|err| FidelityError::io(path, err))?;
    let value = serde_json::from_str(&text).map_err(|source| FidelityError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("[FIDELITY] parsed design tree {}", path.display());
    Ok(value)
}
