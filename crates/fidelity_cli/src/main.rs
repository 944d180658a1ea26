//! Command-line front end for design-fidelity validation and auto-fix.

mod manifest;

use manifest::load_manifest;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use fidelity::batch::{UnitDigest, run_workflows};
use fidelity::facade::{WorkflowSummary, auto_fix, complete_workflow, dispatch_json, smart_fix, validate};
use fidelity::report::AutoFixSummary;
use fidelity::FidelityConfig;
use log::{error, info};
use std::io::{Read as _, Write as _, stdin, stdout};
use std::path::PathBuf;
use std::process::ExitCode;

/// Design-fidelity validation and auto-remediation
#[derive(Parser, Debug)]
#[clap(name = "fidelity")]
struct Cli {
    /// Skip `.backup` copies before modifying a stylesheet.
    #[clap(long, global = true)]
    no_backup: bool,

    /// Print JSON instead of a text summary.
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

/// Paths of one design unit.
#[derive(clap::Args, Debug)]
struct UnitArgs {
    /// Design tree JSON document.
    #[clap(long, value_name = "FILE")]
    design: PathBuf,

    /// Stylesheet to check (and patch).
    #[clap(long, value_name = "FILE")]
    stylesheet: PathBuf,

    /// Optional markup whose inline colors also count as present.
    #[clap(long, value_name = "FILE")]
    markup: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a stylesheet against a design tree and write the report.
    Validate(UnitArgs),

    /// Validate once and apply every suggested fix.
    Fix {
        #[clap(flatten)]
        unit: UnitArgs,

        /// Also add `--color-*` custom properties for missing colors when the
        /// score is below 90.
        #[clap(long)]
        color_variables: bool,
    },

    /// Validate and fix until the target score or the iteration limit.
    Workflow {
        #[clap(flatten)]
        unit: UnitArgs,

        /// Target fidelity score (0-100).
        #[clap(long, env = "FIDELITY_TARGET_SCORE")]
        target: Option<u8>,

        /// Maximum validate/fix passes.
        #[clap(long, env = "FIDELITY_MAX_ITERATIONS")]
        max_iterations: Option<u32>,
    },

    /// Run the workflow for every unit of a JSON manifest.
    Batch {
        /// JSON array of `{designTreePath, stylesheetPath, markupPath?}`.
        manifest: PathBuf,

        /// Units per batch.
        #[clap(long, env = "FIDELITY_BATCH_CONCURRENCY")]
        concurrency: Option<usize>,
    },

    /// Read a JSON tool call from stdin and write the JSON response.
    Call,
}

fn print(text: &str) -> Result<()> {
    writeln!(stdout().lock(), "{text}")?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    print(&serde_json::to_string_pretty(value)?)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = FidelityConfig::from_env();
    if cli.no_backup {
        config.backup_before_fix = false;
    }

    match cli.command {
        Command::Validate(unit) => {
            let outcome = validate(&unit.design, &unit.stylesheet, unit.markup.as_deref(), &config)
                .with_context(|| format!("validating {}", unit.stylesheet.display()))?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                print(&outcome.summary())?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Fix { unit, color_variables } => {
            let outcome = validate(&unit.design, &unit.stylesheet, unit.markup.as_deref(), &config)
                .with_context(|| format!("validating {}", unit.stylesheet.display()))?;
            let fixed = auto_fix(&unit.stylesheet, &outcome.fix_suggestions(), config.backup_before_fix)
                .with_context(|| format!("patching {}", unit.stylesheet.display()))?;
            let wanted = color_variables && outcome.wants_color_variables();
            if color_variables && !wanted {
                info!("[FIDELITY] score {}%, color variables not needed", outcome.score());
            }
            // The stylesheet was already backed up before the fixes.
            let variables = wanted
                .then(|| smart_fix(&unit.stylesheet, &outcome.missing_colors, false))
                .transpose()
                .with_context(|| format!("adding color variables to {}", unit.stylesheet.display()))?;

            if cli.json {
                print_json(&serde_json::json!({
                    "autoFix": fixed,
                    "colorVariables": variables,
                }))?;
            } else {
                print(
                    &AutoFixSummary {
                        stylesheet: &unit.stylesheet,
                        outcome: &fixed,
                    }
                    .to_string(),
                )?;
                if let Some(added) = variables {
                    print(&format!("Color variables added: {}", added.added_variables.len()))?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Workflow {
            unit,
            target,
            max_iterations,
        } => {
            if let Some(limit) = max_iterations {
                config = config.with_max_iterations(limit);
            }
            let target_score = target.unwrap_or(config.target_score);
            let outcome = complete_workflow(
                &unit.design,
                &unit.stylesheet,
                unit.markup.as_deref(),
                target_score,
                &config,
            )
            .with_context(|| format!("running workflow for {}", unit.stylesheet.display()))?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                print(&WorkflowSummary(&outcome).to_string())?;
            }
            Ok(if outcome.target_reached {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Batch { manifest, concurrency } => {
            if let Some(size) = concurrency {
                config.batch_concurrency = size.max(1);
            }
            let units = load_manifest(&manifest)?;
            info!("[BATCH] {} units from {}", units.len(), manifest.display());
            let digests: Vec<UnitDigest> = run_workflows(units, &config).await.iter().map(UnitDigest::from).collect();
            let all_reached = digests.iter().all(|digest| digest.target_reached == Some(true));

            if cli.json {
                print_json(&digests)?;
            } else {
                for digest in &digests {
                    let line = match (&digest.error, digest.final_score) {
                        (Some(err), _) => format!("{}: failed after {} attempts: {err}", digest.unit, digest.attempts),
                        (None, Some(score)) => format!("{}: {score}%", digest.unit),
                        (None, None) => format!("{}: no score", digest.unit),
                    };
                    print(&line)?;
                }
            }
            Ok(if all_reached { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Call => {
            let mut input = String::new();
            stdin().read_to_string(&mut input).context("reading tool call from stdin")?;
            let response = dispatch_json(&input, &config)?;
            print_json(&response)?;
            Ok(if response.is_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _log_init: Result<(), _> = Builder::from_env(Env::default().filter_or("RUST_LOG", "info"))
        .is_test(false)
        .try_init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            error!("[FIDELITY] {err:#}");
            ExitCode::FAILURE
        }
    }
}
