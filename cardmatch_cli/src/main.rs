mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "cardmatch")]
#[command(about = "Match graded-card label text against a reference database")]
struct Cli {
    /// Output format: table or json
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// SQLite reference database path
    #[arg(long, default_value = "cardmatch.db", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match one piece of label text
    Match(commands::match_text::MatchArgs),
    /// Match a file of label texts, one per line
    Batch(commands::batch::BatchArgs),
    /// Import reference sets and cards from a JSON file
    Seed(commands::seed::SeedArgs),
    /// List the built-in matching strategies
    Strategies(commands::strategies::StrategiesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cardmatch=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };

    match &cli.command {
        Commands::Match(args) => commands::match_text::run(args, &cli.db, &format).await?,
        Commands::Batch(args) => commands::batch::run(args, &cli.db, &format).await?,
        Commands::Seed(args) => commands::seed::run(args, &cli.db)?,
        Commands::Strategies(args) => commands::strategies::run(args, &format)?,
    }

    Ok(())
}
