//! Core data types shared across the matching pipeline.

use serde::{Deserialize, Serialize};

/// Structured fields extracted from one piece of raw label text.
///
/// Created fresh per parse call and never mutated afterwards. `language` is
/// `None` when no explicit language token was found ("English" is implied);
/// only an explicit token counts toward parse confidence.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ParsedFields {
    pub original_text: String,
    pub normalized_text: String,
    pub set_name: Option<String>,
    pub subject_name: Option<String>,
    pub card_number: Option<String>,
    pub year: Option<i32>,
    pub grade: Option<f64>,
    pub rarity: Option<String>,
    pub language: Option<String>,
    pub is_holo: bool,
    pub is_first_edition: bool,
    /// Self-assessed parse completeness in [0, 1].
    pub confidence: f64,
}

impl ParsedFields {
    /// An empty parse result for blank or unusable input.
    pub fn empty(original: &str) -> Self {
        Self {
            original_text: original.to_string(),
            normalized_text: String::new(),
            set_name: None,
            subject_name: None,
            card_number: None,
            year: None,
            grade: None,
            rarity: None,
            language: None,
            is_holo: false,
            is_first_edition: false,
            confidence: 0.0,
        }
    }

    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or("English")
    }
}

/// A known set from the reference database.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetRecord {
    pub set_id: i64,
    pub name: String,
    pub year: Option<i32>,
    pub series: Option<String>,
    pub card_count: Option<i64>,
}

/// A known card from the reference database.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CardRecord {
    pub card_id: i64,
    pub set_id: i64,
    pub name: String,
    pub number: Option<String>,
    pub rarity: Option<String>,
    pub language: Option<String>,
    pub is_holo: bool,
    pub is_first_edition: bool,
    pub image_url: Option<String>,
    pub price_cents: Option<i64>,
    pub availability: Option<String>,
}

/// Deduplicated vocabulary of known values, used by the parser and the
/// fuzzy matcher as ground truth.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Vocabulary {
    pub set_names: Vec<String>,
    pub subject_names: Vec<String>,
    pub card_numbers: Vec<String>,
    pub years: Vec<i32>,
}

/// What kind of reference entity a candidate points at.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Set,
    Card,
    Subject,
    CardNumber,
}

/// Which matcher produced a candidate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Database,
    Fuzzy,
}

/// How the candidate was found. Drives the match-type component of the
/// confidence score.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Database,
    Partial,
    Fuzzy,
    Fallback,
}

impl MatchMethod {
    pub fn type_weight(self) -> f64 {
        match self {
            Self::Exact => 1.0,
            Self::Database => 0.9,
            Self::Partial => 0.5,
            Self::Fuzzy => 0.7,
            Self::Fallback => 0.3,
        }
    }
}

/// Post-match enhancement applied by a matcher.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Enhancement {
    CrossReference,
}

/// Parent-set context attached to card candidates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetInfo {
    pub set_name: String,
    pub year: Option<i32>,
    pub series: Option<String>,
}

/// One proposed match, produced by a single matcher from a single parse.
///
/// `raw_score` is matcher-specific (roughly 0-100) and is not the final
/// confidence; the scorer recomputes confidence from the fields themselves.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub kind: MatchKind,
    pub source: MatchSource,
    pub method: MatchMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub is_holo: bool,
    pub is_first_edition: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_info: Option<SetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_tier: Option<String>,
    pub raw_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<Enhancement>,
}

impl MatchCandidate {
    /// A candidate with everything optional unset. Matchers fill in what
    /// they know.
    pub fn new(kind: MatchKind, source: MatchSource, method: MatchMethod) -> Self {
        Self {
            kind,
            source,
            method,
            set_id: None,
            card_id: None,
            name: None,
            number: None,
            rarity: None,
            language: None,
            is_holo: false,
            is_first_edition: false,
            set_info: None,
            image_url: None,
            price_cents: None,
            availability: None,
            price_tier: None,
            age_tier: None,
            raw_score: 0.0,
            enhancement: None,
        }
    }

    /// The year associated with this candidate, if any (top-level set
    /// candidates keep it in `set_info`).
    pub fn year(&self) -> Option<i32> {
        self.set_info.as_ref().and_then(|s| s.year)
    }
}

/// Coarse confidence bucket used for result-list quota allocation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Self::Excellent
        } else if confidence >= 0.7 {
            Self::Good
        } else if confidence >= 0.5 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Component breakdown of a final confidence score.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub field_score: f64,
    pub match_type_score: f64,
    pub quality_score: f64,
    pub context_score: f64,
    /// 0.1 per extra matcher agreeing on the same entity, capped at 0.3.
    pub duplicate_bonus: f64,
}

/// A scored, ranked match ready to return to the caller.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    #[serde(flatten)]
    pub candidate: MatchCandidate,
    pub confidence: f64,
    pub breakdown: ScoreBreakdown,
    pub duplicate_count: u32,
    pub rank: usize,
    pub tier: ConfidenceTier,
    pub is_top_result: bool,
}

/// Timing and summary metadata for one pipeline invocation.
#[derive(Serialize, Debug, Clone)]
pub struct MatchMetadata {
    pub total_matches: usize,
    pub top_confidence: f64,
    pub processing_time_ms: u64,
}

/// Full result of one `match_text` call.
#[derive(Serialize, Debug, Clone)]
pub struct MatchOutcome {
    pub strategy: String,
    pub parsed: ParsedFields,
    pub matches: Vec<ScoredMatch>,
    pub metadata: MatchMetadata,
}
