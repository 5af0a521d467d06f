//! Library layer for Card Match: parses graded-card label text and matches
//! it against a reference database of sets and cards.
//!
//! The pipeline runs a text parser, a database matcher, and a fuzzy
//! vocabulary matcher under a named strategy, then consolidates and scores
//! candidates into a ranked, confidence-tiered match list.

pub mod cache;
pub mod error;
pub mod exact;
pub mod fuzzy;
pub mod parser;
pub mod pipeline;
pub mod scorer;
pub mod similarity;
pub mod store;
pub mod strategy;
pub mod types;

pub use error::{MatchError, MatcherError};
pub use exact::ExactMatcher;
pub use fuzzy::FuzzyMatcher;
pub use pipeline::{MatchOptions, MatchingPipeline};
pub use scorer::ConfidenceScorer;
pub use store::{NewCard, NewSet, ReferenceStore, SqliteStore, StoreError};
pub use strategy::{
    FieldKey, MatcherKind, ScoringMode, Strategy, StrategyError, StrategyTable,
};
pub use types::{
    CardRecord, ConfidenceTier, Enhancement, MatchCandidate, MatchKind, MatchMetadata,
    MatchMethod, MatchOutcome, MatchSource, ParsedFields, ScoreBreakdown, ScoredMatch, SetInfo,
    SetRecord, Vocabulary,
};
