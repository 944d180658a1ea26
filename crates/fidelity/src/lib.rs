//! Design-fidelity validation and auto-remediation.
//!
//! A design tree (JSON node hierarchy) is reduced to the colors, fonts, and
//! sizes it expects; a stylesheet (plus optional markup) is scanned for the
//! colors and fonts it actually contains. The gap becomes a fidelity score and
//! a list of fix suggestions, which can be patched into the stylesheet and
//! re-measured in a bounded loop.

pub mod analysis;
pub mod autofix;
pub mod batch;
pub mod config;
pub mod convergence;
pub mod design_tree;
pub mod error;
pub mod facade;
pub mod implementation;
pub mod report;
pub mod suggestions;
pub mod workspace;

pub use analysis::{Analysis, FidelityReport, analyze, fidelity_score};
pub use autofix::{AppliedFix, AutoFixOutcome, FixAction, apply_fixes, apply_to_text};
pub use config::FidelityConfig;
pub use convergence::{ConvergenceLoop, ConvergenceOutcome, ConvergenceState, ConvergenceStatus, FixTarget};
pub use design_tree::{ExpectedAttributeSet, extract_expected};
pub use error::{FidelityError, Result};
pub use implementation::{FoundAttributeSet, extract_found};
pub use report::ValidationOutcome;
pub use suggestions::{FixKind, FixSuggestion, generate_suggestions, sanitize_class_name};
pub use workspace::DesignWorkspace;
