//! Named matching strategies, loaded from an embedded TOML table.
//!
//! A strategy bundles which matchers run, their thresholds, the field
//! priority for fuzzy matching, and the scoring mode. The table is loaded
//! once at startup and treated as immutable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("failed to parse strategy TOML: {0}")]
    TomlParse(String),
    #[error("duplicate strategy name: {0:?}")]
    DuplicateName(String),
    #[error("invalid strategy {name:?}: {reason}")]
    Invalid { name: String, reason: String },
}

/// A matcher the pipeline can run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    Database,
    Fuzzy,
}

/// Score-adjustment mode applied by the confidence scorer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    Balanced,
    FuzzyBiased,
    ExactPriority,
    SetPriority,
    Optimal,
}

/// A parsed field the fuzzy matcher can prioritize.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    SetName,
    SubjectName,
    CardNumber,
    Year,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Strategy {
    pub name: String,
    pub parser: String,
    pub matchers: Vec<MatcherKind>,
    pub scoring: ScoringMode,
    pub field_priority: Vec<FieldKey>,
    pub fuzzy_threshold: f64,
    pub max_results: usize,
    pub confidence_threshold: f64,
}

#[derive(Deserialize)]
struct StrategyFile {
    strategy: Vec<Strategy>,
}

/// Immutable name-to-strategy lookup table.
pub struct StrategyTable {
    strategies: HashMap<String, Strategy>,
}

impl StrategyTable {
    /// Load the built-in strategy table embedded at compile time.
    pub fn load_default() -> Result<Self, StrategyError> {
        Self::from_toml(include_str!("../seed_data/strategies.toml"))
    }

    pub fn from_toml(content: &str) -> Result<Self, StrategyError> {
        let file: StrategyFile =
            toml::from_str(content).map_err(|e| StrategyError::TomlParse(e.to_string()))?;

        let mut strategies = HashMap::new();
        for strategy in file.strategy {
            validate(&strategy)?;
            if strategies.contains_key(&strategy.name) {
                return Err(StrategyError::DuplicateName(strategy.name));
            }
            strategies.insert(strategy.name.clone(), strategy);
        }
        Ok(Self { strategies })
    }

    pub fn get(&self, name: &str) -> Option<&Strategy> {
        self.strategies.get(name)
    }

    /// Strategy names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

fn validate(strategy: &Strategy) -> Result<(), StrategyError> {
    let fail = |reason: &str| {
        Err(StrategyError::Invalid {
            name: strategy.name.clone(),
            reason: reason.to_string(),
        })
    };
    if strategy.name.trim().is_empty() {
        return fail("name is empty");
    }
    if strategy.matchers.is_empty() {
        return fail("no matchers configured");
    }
    if !(0.0..=1.0).contains(&strategy.fuzzy_threshold) {
        return fail("fuzzy_threshold outside [0, 1]");
    }
    if !(0.0..=1.0).contains(&strategy.confidence_threshold) {
        return fail("confidence_threshold outside [0, 1]");
    }
    if strategy.max_results == 0 {
        return fail("max_results is zero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_loads() {
        let table = StrategyTable::load_default().unwrap();
        assert_eq!(
            table.names(),
            vec![
                "balanced",
                "exact-priority",
                "fuzzy-aggressive",
                "optimal",
                "set-priority"
            ]
        );
    }

    #[test]
    fn balanced_strategy_shape() {
        let table = StrategyTable::load_default().unwrap();
        let balanced = table.get("balanced").unwrap();
        assert_eq!(
            balanced.matchers,
            vec![MatcherKind::Database, MatcherKind::Fuzzy]
        );
        assert_eq!(balanced.scoring, ScoringMode::Balanced);
        assert_eq!(balanced.fuzzy_threshold, 0.6);
        assert_eq!(balanced.max_results, 10);
    }

    #[test]
    fn unknown_name_is_none() {
        let table = StrategyTable::load_default().unwrap();
        assert!(table.get("nonexistent-strategy").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let toml = r#"
[[strategy]]
name = "dup"
parser = "psa-label"
matchers = ["fuzzy"]
scoring = "balanced"
field_priority = ["set_name"]
fuzzy_threshold = 0.6
max_results = 10
confidence_threshold = 0.3

[[strategy]]
name = "dup"
parser = "psa-label"
matchers = ["fuzzy"]
scoring = "balanced"
field_priority = ["set_name"]
fuzzy_threshold = 0.6
max_results = 10
confidence_threshold = 0.3
"#;
        let result = StrategyTable::from_toml(toml);
        assert!(matches!(result, Err(StrategyError::DuplicateName(_))));
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let toml = r#"
[[strategy]]
name = "bad"
parser = "psa-label"
matchers = ["fuzzy"]
scoring = "balanced"
field_priority = ["set_name"]
fuzzy_threshold = 1.5
max_results = 10
confidence_threshold = 0.3
"#;
        assert!(matches!(
            StrategyTable::from_toml(toml),
            Err(StrategyError::Invalid { .. })
        ));
    }

    #[test]
    fn empty_matchers_rejected() {
        let toml = r#"
[[strategy]]
name = "bad"
parser = "psa-label"
matchers = []
scoring = "balanced"
field_priority = ["set_name"]
fuzzy_threshold = 0.6
max_results = 10
confidence_threshold = 0.3
"#;
        assert!(matches!(
            StrategyTable::from_toml(toml),
            Err(StrategyError::Invalid { .. })
        ));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            StrategyTable::from_toml("not toml ["),
            Err(StrategyError::TomlParse(_))
        ));
    }
}
