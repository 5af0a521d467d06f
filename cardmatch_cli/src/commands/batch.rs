//! The `batch` subcommand: match a file of label texts, one per line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cardmatch_lib::{MatchOptions, MatchOutcome, MatchingPipeline, SqliteStore};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::{print_batch_table, print_json, OutputFormat};

/// Arguments for the `batch` subcommand.
#[derive(Args)]
pub struct BatchArgs {
    /// Input file with one label text per line; blank lines are skipped
    pub input: PathBuf,

    /// Strategy name (see `cardmatch strategies`)
    #[arg(long, default_value = "balanced")]
    pub strategy: String,

    /// Maximum number of results per line
    #[arg(long)]
    pub limit: Option<usize>,

    /// Minimum confidence to keep a match
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Database matcher budget in milliseconds, applied per line
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

pub async fn run(args: &BatchArgs, db: &Path, format: &OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(&args.input)?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let store = SqliteStore::open(db)?;
    store.init()?;
    let pipeline = MatchingPipeline::new(Arc::new(store))?;
    let options = MatchOptions {
        limit: args.limit,
        threshold: args.threshold,
        exact_timeout: args.timeout_ms.map(Duration::from_millis),
    };

    let bar = ProgressBar::new(lines.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);

    let mut outcomes: Vec<MatchOutcome> = Vec::with_capacity(lines.len());
    for line in lines {
        let outcome = pipeline.match_text(line, &args.strategy, &options).await?;
        bar.inc(1);
        outcomes.push(outcome);
    }
    bar.finish_and_clear();

    match format {
        OutputFormat::Json => print_json(&outcomes)?,
        OutputFormat::Table => print_batch_table(&outcomes),
    }
    Ok(())
}
