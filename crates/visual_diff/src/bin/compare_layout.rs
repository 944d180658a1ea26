//! Compare a reference capture against rendered markup.
//!
//! Exits 0 when the mismatch is within the threshold, 1 otherwise.

use anyhow::{Context as _, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;
use std::io::{Write as _, stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use visual_diff::{ChromeRenderer, LayoutComparator, VisualDiffConfig};

/// Layout comparison: reference capture vs generated markup.
#[derive(Parser, Debug)]
#[clap(name = "compare_layout")]
struct Args {
    /// Reference capture (PNG), usually exported at 2x.
    reference: PathBuf,

    /// Markup file to render.
    markup: PathBuf,

    /// Allowed mismatch percentage.
    #[clap(long, env = "VISUAL_DIFF_MISMATCH_THRESHOLD")]
    threshold: Option<f64>,

    /// Directory for generated-screenshot.png and layout-diff.png.
    /// Defaults to the markup's directory.
    #[clap(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print the result as JSON instead of a text report.
    #[clap(long)]
    json: bool,
}

async fn run(args: Args) -> Result<bool> {
    let mut config = VisualDiffConfig::from_env();
    if let Some(threshold) = args.threshold {
        config.mismatch_threshold = threshold;
    }

    let comparator = LayoutComparator::new(ChromeRenderer::new(config.clone()), config);
    let comparison = comparator
        .compare_layout(&args.reference, &args.markup, args.output.as_deref())
        .await
        .with_context(|| format!("comparing {} with {}", args.reference.display(), args.markup.display()))?;

    let mut out = stdout().lock();
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&comparison)?)?;
    } else {
        write!(out, "{comparison}")?;
    }
    Ok(comparison.summary.passed)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _log_init: Result<(), _> = Builder::from_env(Env::default().filter_or("RUST_LOG", "info"))
        .is_test(false)
        .try_init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("[VISUAL] {err:#}");
            ExitCode::FAILURE
        }
    }
}
