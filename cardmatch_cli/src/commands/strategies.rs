//! The `strategies` subcommand: list the built-in matching strategies.

use anyhow::Result;
use cardmatch_lib::{Strategy, StrategyTable};
use clap::Args;

use crate::output::{print_json, print_strategies_table, OutputFormat};

/// Arguments for the `strategies` subcommand.
#[derive(Args)]
pub struct StrategiesArgs {}

pub fn run(_args: &StrategiesArgs, format: &OutputFormat) -> Result<()> {
    let table = StrategyTable::load_default()?;
    let strategies: Vec<&Strategy> = table
        .names()
        .into_iter()
        .filter_map(|name| table.get(name))
        .collect();

    match format {
        OutputFormat::Json => print_json(&strategies)?,
        OutputFormat::Table => print_strategies_table(&strategies),
    }
    Ok(())
}
