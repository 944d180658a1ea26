//! Bounded validate/fix loop.
//!
//! `Running` moves to exactly one terminal status. Reaching the target stops
//! before the iteration counter moves; every pass that does not reach it counts
//! one iteration whether or not there was anything to fix.

use log::{error, info, warn};
use serde::Serialize;

use crate::autofix::AutoFixOutcome;
use crate::config::FidelityConfig;
use crate::error::Result;
use crate::report::ValidationOutcome;
use crate::suggestions::FixSuggestion;
use crate::workspace::DesignWorkspace;

/// Where the loop stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConvergenceStatus {
    Running,
    TargetReached,
    IterationLimitReached,
    HardFailure,
}

impl ConvergenceStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::Running
    }
}

/// Progress of one loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceState {
    pub iteration_index: u32,
    pub current_score: u8,
    pub target_score: u8,
    pub max_iterations: u32,
    pub status: ConvergenceStatus,
}

impl ConvergenceState {
    pub fn new(target_score: u8, max_iterations: u32) -> Self {
        Self {
            iteration_index: 0,
            current_score: 0,
            target_score,
            max_iterations,
            status: ConvergenceStatus::Running,
        }
    }
}

/// What the loop validates and patches.
pub trait FixTarget {
    /// One validation pass.
    ///
    /// # Errors
    ///
    /// Any read, parse, or report failure.
    fn validate(&mut self) -> Result<ValidationOutcome>;

    /// Apply suggestions.
    ///
    /// # Errors
    ///
    /// Any backup, read, patch, or write failure.
    fn apply(&mut self, suggestions: &[FixSuggestion]) -> Result<AutoFixOutcome>;
}

/// A [`DesignWorkspace`] paired with the config that governs reports and
/// backups.
pub struct WorkspaceTarget<'cfg> {
    pub workspace: DesignWorkspace,
    pub config: &'cfg FidelityConfig,
}

impl FixTarget for WorkspaceTarget<'_> {
    fn validate(&mut self) -> Result<ValidationOutcome> {
        self.workspace.validate(self.config)
    }

    fn apply(&mut self, suggestions: &[FixSuggestion]) -> Result<AutoFixOutcome> {
        self.workspace.fix(suggestions, self.config)
    }
}

/// Result of a finished loop.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceOutcome {
    pub final_score: u8,
    pub target_reached: bool,
    /// Validation passes performed.
    pub iterations: u32,
    pub state: ConvergenceState,
    /// Score of each validation pass, in order.
    pub score_history: Vec<u8>,
    pub fixes_applied: usize,
    pub warnings: Vec<String>,
    /// The last validation pass, if any completed.
    #[serde(skip)]
    pub last_validation: Option<ValidationOutcome>,
}

/// Drives a [`FixTarget`] toward a target score.
pub struct ConvergenceLoop<T> {
    target: T,
    state: ConvergenceState,
    score_history: Vec<u8>,
    fixes_applied: usize,
    warnings: Vec<String>,
    last_validation: Option<ValidationOutcome>,
}

impl<T: FixTarget> ConvergenceLoop<T> {
    pub fn new(target: T, target_score: u8, max_iterations: u32) -> Self {
        Self {
            target,
            state: ConvergenceState::new(target_score.min(100), max_iterations.max(1)),
            score_history: Vec::new(),
            fixes_applied: 0,
            warnings: Vec::new(),
            last_validation: None,
        }
    }

    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }

    /// Run one validate (and, if needed, fix) pass.
    ///
    /// Does nothing once a terminal status is reached.
    ///
    /// # Errors
    ///
    /// Propagates the failure that moved the loop to `HardFailure`.
    pub fn step(&mut self) -> Result<ConvergenceStatus> {
        if self.state.status.is_terminal() {
            return Ok(self.state.status);
        }
        self.pass().inspect_err(|err| {
            error!("[LOOP] pass {} failed: {err}", self.state.iteration_index + 1);
            self.state.status = ConvergenceStatus::HardFailure;
        })
    }

    fn pass(&mut self) -> Result<ConvergenceStatus> {
        let outcome = self.target.validate()?;
        let score = outcome.score();

        if let Some(&previous) = self.score_history.last()
            && score < previous
        {
            let warning = format!(
                "Score regressed from {previous}% to {score}% after iteration {}",
                self.state.iteration_index
            );
            warn!("[LOOP] {warning}");
            self.warnings.push(warning);
        }
        self.score_history.push(score);
        self.state.current_score = score;
        info!(
            "[LOOP] pass {}: score {score}% (target {}%), {} suggestions",
            self.state.iteration_index + 1,
            self.state.target_score,
            outcome.suggestions.len()
        );

        if score >= self.state.target_score {
            self.last_validation = Some(outcome);
            self.state.status = ConvergenceStatus::TargetReached;
            return Ok(self.state.status);
        }

        let suggestions = outcome.fix_suggestions();
        self.last_validation = Some(outcome);
        if suggestions.is_empty() {
            info!("[LOOP] nothing to fix");
        } else {
            let applied = self.target.apply(&suggestions)?;
            self.fixes_applied += applied.applied_count;
        }

        self.state.iteration_index += 1;
        if self.state.iteration_index >= self.state.max_iterations {
            self.state.status = ConvergenceStatus::IterationLimitReached;
        }
        Ok(self.state.status)
    }

    /// Step until a terminal status.
    ///
    /// # Errors
    ///
    /// Returns the first hard failure.
    pub fn run(mut self) -> Result<ConvergenceOutcome> {
        while !self.step()?.is_terminal() {}
        Ok(self.into_outcome())
    }

    /// Snapshot of the loop as an outcome, terminal or not.
    pub fn into_outcome(self) -> ConvergenceOutcome {
        ConvergenceOutcome {
            final_score: self.state.current_score,
            target_reached: self.state.status == ConvergenceStatus::TargetReached,
            iterations: self.score_history.len() as u32,
            state: self.state,
            score_history: self.score_history,
            fixes_applied: self.fixes_applied,
            warnings: self.warnings,
            last_validation: self.last_validation,
        }
    }
}

/// Run the loop over files with `config`'s target and iteration cap.
///
/// # Errors
///
/// Returns the first hard failure.
pub fn converge(workspace: DesignWorkspace, config: &FidelityConfig) -> Result<ConvergenceOutcome> {
    let target = WorkspaceTarget { workspace, config };
    ConvergenceLoop::new(target, config.target_score, config.max_iterations).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analysis, FidelityReport};
    use crate::error::FidelityError;
    use crate::report::ReportedSuggestion;
    use crate::suggestions::FixKind;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    /// Replays a fixed score sequence; fails once it runs out.
    struct Scripted {
        scores: VecDeque<u8>,
    }

    impl Scripted {
        fn new(scores: &[u8]) -> Self {
            Self {
                scores: scores.iter().copied().collect(),
            }
        }
    }

    fn outcome(score: u8) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::from_analysis(Analysis {
            report: FidelityReport {
                fidelity_score: score,
                ..FidelityReport::default()
            },
            missing_colors: Vec::new(),
            missing_fonts: Vec::new(),
        });
        outcome.suggestions.push(ReportedSuggestion::from(FixSuggestion {
            kind: FixKind::Color,
            target_element_name: "Box".to_owned(),
            property: "background-color".to_owned(),
            expected_value: "rgba(255, 0, 0, 1)".to_owned(),
            auxiliary_hex: None,
            font_weight: None,
        }));
        outcome
    }

    impl FixTarget for Scripted {
        fn validate(&mut self) -> Result<ValidationOutcome> {
            self.scores.pop_front().map(outcome).ok_or(FidelityError::NotFound {
                path: PathBuf::from("exhausted"),
            })
        }

        fn apply(&mut self, suggestions: &[FixSuggestion]) -> Result<AutoFixOutcome> {
            Ok(AutoFixOutcome {
                applied_count: suggestions.len(),
                applied_fixes: Vec::new(),
            })
        }
    }

    #[test]
    fn reaching_target_does_not_count_an_iteration() -> Result<()> {
        let result = ConvergenceLoop::new(Scripted::new(&[40, 96]), 95, 3).run()?;
        assert!(result.target_reached);
        assert_eq!(result.state.status, ConvergenceStatus::TargetReached);
        assert_eq!(result.state.iteration_index, 1);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.final_score, 96);
        Ok(())
    }

    #[test]
    fn limit_stops_after_max_iterations() -> Result<()> {
        let result = ConvergenceLoop::new(Scripted::new(&[10, 20, 30, 40]), 95, 3).run()?;
        assert_eq!(result.state.status, ConvergenceStatus::IterationLimitReached);
        assert_eq!(result.state.iteration_index, 3);
        assert_eq!(result.score_history, [10, 20, 30]);
        assert_eq!(result.fixes_applied, 3);
        assert!(!result.target_reached);
        Ok(())
    }

    #[test]
    fn regression_is_a_warning_not_a_stop() -> Result<()> {
        let result = ConvergenceLoop::new(Scripted::new(&[60, 50, 97]), 95, 3).run()?;
        assert!(result.target_reached);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("60% to 50%"));
        Ok(())
    }

    #[test]
    fn failure_is_terminal() {
        let mut looper = ConvergenceLoop::new(Scripted::new(&[10]), 95, 5);
        assert!(matches!(looper.step(), Ok(ConvergenceStatus::Running)));
        assert!(matches!(looper.step(), Err(FidelityError::NotFound { .. })));
        assert_eq!(looper.state().status, ConvergenceStatus::HardFailure);
        assert!(matches!(looper.step(), Ok(ConvergenceStatus::HardFailure)));
    }
}
