//! The `match` subcommand: match one piece of label text.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cardmatch_lib::{MatchOptions, MatchingPipeline, SqliteStore};
use clap::Args;

use crate::output::{print_json, print_outcome_table, OutputFormat};

/// Arguments for the `match` subcommand.
#[derive(Args)]
pub struct MatchArgs {
    /// Label text to match
    pub text: String,

    /// Strategy name (see `cardmatch strategies`)
    #[arg(long, default_value = "balanced")]
    pub strategy: String,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Minimum confidence to keep a match
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Database matcher budget in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

pub async fn run(args: &MatchArgs, db: &Path, format: &OutputFormat) -> Result<()> {
    let store = SqliteStore::open(db)?;
    store.init()?;
    let pipeline = MatchingPipeline::new(Arc::new(store))?;

    let options = MatchOptions {
        limit: args.limit,
        threshold: args.threshold,
        exact_timeout: args.timeout_ms.map(Duration::from_millis),
    };
    let outcome = pipeline
        .match_text(&args.text, &args.strategy, &options)
        .await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => print_outcome_table(&outcome),
    }
    Ok(())
}
