//! Orchestrates parse, match, and score for one piece of label text.
//!
//! Matcher failures degrade gracefully: a matcher that errors or times out
//! is logged and skipped, and the pipeline returns whatever the remaining
//! matchers produced. The only hard failure `match_text` reports is an
//! unknown strategy name.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task;
use tokio::time;
use tracing::{debug, warn};

use crate::error::{MatchError, MatcherError};
use crate::exact::ExactMatcher;
use crate::fuzzy::FuzzyMatcher;
use crate::parser;
use crate::scorer::ConfidenceScorer;
use crate::store::ReferenceStore;
use crate::strategy::{MatcherKind, StrategyError, StrategyTable};
use crate::types::{MatchCandidate, MatchMetadata, MatchOutcome, Vocabulary};

/// Per-call overrides. Anything left unset falls back to the strategy's own
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    /// Wall-clock budget for the database matcher. The fuzzy matcher works
    /// off an in-memory vocabulary and is not budgeted.
    pub exact_timeout: Option<Duration>,
}

/// The full text-to-ranked-matches pipeline.
pub struct MatchingPipeline {
    store: Arc<dyn ReferenceStore>,
    strategies: StrategyTable,
}

impl MatchingPipeline {
    /// Build a pipeline over the given store with the built-in strategies.
    pub fn new(store: Arc<dyn ReferenceStore>) -> Result<Self, StrategyError> {
        Ok(Self {
            store,
            strategies: StrategyTable::load_default()?,
        })
    }

    pub fn with_strategies(store: Arc<dyn ReferenceStore>, strategies: StrategyTable) -> Self {
        Self { store, strategies }
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Match one piece of raw label text under the named strategy.
    pub async fn match_text(
        &self,
        raw_text: &str,
        strategy_name: &str,
        options: &MatchOptions,
    ) -> Result<MatchOutcome, MatchError> {
        let started = Instant::now();
        let strategy = self
            .strategies
            .get(strategy_name)
            .ok_or_else(|| MatchError::UnknownStrategy(strategy_name.to_string()))?
            .clone();
        let limit = options.limit.unwrap_or(strategy.max_results);
        let threshold = options.threshold.unwrap_or(strategy.confidence_threshold);

        let vocab = match self.store.vocabulary() {
            Ok(vocab) => vocab,
            Err(err) => {
                warn!(%err, "vocabulary unavailable, parsing without known values");
                Vocabulary::default()
            }
        };
        let parsed = parser::parse(raw_text, &vocab);
        debug!(
            confidence = parsed.confidence,
            set = parsed.set_name.as_deref(),
            subject = parsed.subject_name.as_deref(),
            "parsed label text"
        );

        // Spawn every configured matcher up front so they run concurrently
        // on the blocking pool, then join in configuration order.
        let tasks: Vec<(MatcherKind, MatcherHandle)> = strategy
            .matchers
            .iter()
            .map(|matcher| {
                let handle = match matcher {
                    MatcherKind::Database => self.spawn_database(&parsed, &strategy),
                    MatcherKind::Fuzzy => self.spawn_fuzzy(&parsed, &strategy, &vocab),
                };
                (*matcher, handle)
            })
            .collect();

        let mut candidates: Vec<MatchCandidate> = Vec::new();
        for (matcher, handle) in tasks {
            let result = match (matcher, options.exact_timeout) {
                (MatcherKind::Database, Some(budget)) => match time::timeout(budget, handle).await
                {
                    Ok(joined) => flatten_join(joined),
                    Err(_) => Err(MatcherError::Task("database matcher timed out".to_string())),
                },
                _ => flatten_join(handle.await),
            };
            match result {
                Ok(found) => {
                    debug!(matcher = ?matcher, count = found.len(), "matcher finished");
                    candidates.extend(found);
                }
                Err(err) => {
                    warn!(matcher = ?matcher, %err, "matcher failed, continuing without it");
                }
            }
        }

        let matches = ConfidenceScorer.score(&parsed, candidates, &strategy, limit, threshold);
        let metadata = MatchMetadata {
            total_matches: matches.len(),
            top_confidence: matches.first().map_or(0.0, |m| m.confidence),
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        Ok(MatchOutcome {
            strategy: strategy.name.clone(),
            parsed,
            matches,
            metadata,
        })
    }

    fn spawn_database(
        &self,
        parsed: &crate::types::ParsedFields,
        strategy: &crate::strategy::Strategy,
    ) -> MatcherHandle {
        let store = Arc::clone(&self.store);
        let parsed = parsed.clone();
        let strategy = strategy.clone();
        task::spawn_blocking(move || ExactMatcher::new(store).run(&parsed, &strategy))
    }

    fn spawn_fuzzy(
        &self,
        parsed: &crate::types::ParsedFields,
        strategy: &crate::strategy::Strategy,
        vocab: &Vocabulary,
    ) -> MatcherHandle {
        let parsed = parsed.clone();
        let strategy = strategy.clone();
        let vocab = vocab.clone();
        task::spawn_blocking(move || Ok(FuzzyMatcher.run(&parsed, &strategy, &vocab)))
    }
}

type MatcherHandle = task::JoinHandle<Result<Vec<MatchCandidate>, MatcherError>>;

fn flatten_join(
    joined: Result<Result<Vec<MatchCandidate>, MatcherError>, task::JoinError>,
) -> Result<Vec<MatchCandidate>, MatcherError> {
    joined.map_err(|err| MatcherError::Task(err.to_string()))?
}
