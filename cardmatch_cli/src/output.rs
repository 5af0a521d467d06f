use anyhow::Result;
use cardmatch_lib::{MatchOutcome, ScoredMatch, Strategy};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Tabled, Serialize)]
struct MatchRow {
    #[tabled(rename = "Rank")]
    #[serde(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Name")]
    #[serde(rename = "Name")]
    name: String,
    #[tabled(rename = "Number")]
    #[serde(rename = "Number")]
    number: String,
    #[tabled(rename = "Set")]
    #[serde(rename = "Set")]
    set: String,
    #[tabled(rename = "Kind")]
    #[serde(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Method")]
    #[serde(rename = "Method")]
    method: String,
    #[tabled(rename = "Confidence")]
    #[serde(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Tier")]
    #[serde(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Dups")]
    #[serde(rename = "Dups")]
    duplicates: u32,
}

#[derive(Tabled, Serialize)]
struct BatchRow {
    #[tabled(rename = "Text")]
    #[serde(rename = "Text")]
    text: String,
    #[tabled(rename = "Top Match")]
    #[serde(rename = "Top Match")]
    top_match: String,
    #[tabled(rename = "Confidence")]
    #[serde(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Tier")]
    #[serde(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Matches")]
    #[serde(rename = "Matches")]
    matches: usize,
}

#[derive(Tabled, Serialize)]
struct StrategyRow {
    #[tabled(rename = "Name")]
    #[serde(rename = "Name")]
    name: String,
    #[tabled(rename = "Matchers")]
    #[serde(rename = "Matchers")]
    matchers: String,
    #[tabled(rename = "Scoring")]
    #[serde(rename = "Scoring")]
    scoring: String,
    #[tabled(rename = "Fuzzy Thresh")]
    #[serde(rename = "Fuzzy Thresh")]
    fuzzy_threshold: String,
    #[tabled(rename = "Conf Thresh")]
    #[serde(rename = "Conf Thresh")]
    confidence_threshold: String,
    #[tabled(rename = "Max")]
    #[serde(rename = "Max")]
    max_results: usize,
}

// -- Row builders --

fn enum_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn build_match_rows(matches: &[ScoredMatch]) -> Vec<MatchRow> {
    matches
        .iter()
        .map(|m| MatchRow {
            rank: m.rank,
            name: m.candidate.name.clone().unwrap_or_default(),
            number: m.candidate.number.clone().unwrap_or_default(),
            set: m
                .candidate
                .set_info
                .as_ref()
                .map(|s| s.set_name.clone())
                .unwrap_or_default(),
            kind: enum_label(&m.candidate.kind),
            method: enum_label(&m.candidate.method),
            confidence: format!("{:.2}", m.confidence),
            tier: enum_label(&m.tier),
            duplicates: m.duplicate_count,
        })
        .collect()
}

fn build_batch_rows(outcomes: &[MatchOutcome]) -> Vec<BatchRow> {
    outcomes
        .iter()
        .map(|o| {
            let top = o.matches.first();
            BatchRow {
                text: truncate(&o.parsed.original_text, 40),
                top_match: top
                    .and_then(|m| m.candidate.name.clone())
                    .unwrap_or_default(),
                confidence: top
                    .map(|m| format!("{:.2}", m.confidence))
                    .unwrap_or_else(|| "-".to_string()),
                tier: top.map(|m| enum_label(&m.tier)).unwrap_or_default(),
                matches: o.matches.len(),
            }
        })
        .collect()
}

fn build_strategy_rows(strategies: &[&Strategy]) -> Vec<StrategyRow> {
    strategies
        .iter()
        .map(|s| StrategyRow {
            name: s.name.clone(),
            matchers: s
                .matchers
                .iter()
                .map(enum_label)
                .collect::<Vec<_>>()
                .join(", "),
            scoring: enum_label(&s.scoring),
            fuzzy_threshold: format!("{:.2}", s.fuzzy_threshold),
            confidence_threshold: format!("{:.2}", s.confidence_threshold),
            max_results: s.max_results,
        })
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    }
}

// -- Printers --

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_outcome_table(outcome: &MatchOutcome) {
    if outcome.matches.is_empty() {
        println!(
            "No matches (parse confidence {:.2}).",
            outcome.parsed.confidence
        );
        return;
    }
    let mut table = Table::new(build_match_rows(&outcome.matches));
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} matches in {} ms, top confidence {:.2}",
        outcome.metadata.total_matches,
        outcome.metadata.processing_time_ms,
        outcome.metadata.top_confidence
    );
}

pub fn print_batch_table(outcomes: &[MatchOutcome]) {
    if outcomes.is_empty() {
        println!("No input lines.");
        return;
    }
    let mut table = Table::new(build_batch_rows(outcomes));
    table.with(Style::rounded());
    println!("{table}");
}

pub fn print_strategies_table(strategies: &[&Strategy]) {
    let mut table = Table::new(build_strategy_rows(strategies));
    table.with(Style::rounded());
    println!("{table}");
}
