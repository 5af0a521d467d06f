//! Fuzzy matcher: scores parsed fields against the known vocabulary.
//!
//! Unlike the database matcher this never touches the store directly; it
//! works off the deduplicated [`Vocabulary`] snapshot the pipeline hands
//! it, so it keeps producing candidates even when reference queries fail.

use crate::similarity::{card_number_similarity, combined_similarity, expand_set_abbreviation};
use crate::strategy::{FieldKey, Strategy};
use crate::types::{
    Enhancement, MatchCandidate, MatchKind, MatchMethod, MatchSource, ParsedFields, Vocabulary,
};

/// Cap on candidates emitted per parsed field.
const MAX_PER_FIELD: usize = 10;

/// Similarity-to-raw-score scale.
const RAW_SCALE: f64 = 100.0;

/// A set candidate above this raw score is eligible for cross-referencing.
const CROSS_REF_SET_RAW: f64 = 80.0;

/// Minimum raw score for a subject or number candidate to corroborate a set.
const CROSS_REF_SUPPORT_RAW: f64 = 60.0;

const CROSS_REF_BONUS: f64 = 10.0;

/// Vocabulary-driven fuzzy matcher.
pub struct FuzzyMatcher;

impl FuzzyMatcher {
    /// Produce fuzzy candidates for every field the strategy prioritizes.
    ///
    /// Fields are processed in `field_priority` order and each contributes
    /// at most [`MAX_PER_FIELD`] candidates above the strategy's fuzzy
    /// threshold. Strong set candidates corroborated by a strong subject or
    /// number candidate get a cross-reference bonus, which can push their
    /// raw score past 100.
    pub fn run(
        &self,
        parsed: &ParsedFields,
        strategy: &Strategy,
        vocab: &Vocabulary,
    ) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();
        for field in &strategy.field_priority {
            match field {
                FieldKey::SetName => {
                    if let Some(set_name) = parsed.set_name.as_deref() {
                        let query = expand_set_abbreviation(set_name).unwrap_or(set_name);
                        for (value, sim) in top_scored(
                            &vocab.set_names,
                            strategy.fuzzy_threshold,
                            |entry| combined_similarity(query, entry),
                        ) {
                            let mut cand = MatchCandidate::new(
                                MatchKind::Set,
                                MatchSource::Fuzzy,
                                MatchMethod::Fuzzy,
                            );
                            cand.name = Some(value.to_string());
                            cand.raw_score = sim * RAW_SCALE;
                            candidates.push(cand);
                        }
                    }
                }
                FieldKey::SubjectName => {
                    if let Some(subject) = parsed.subject_name.as_deref() {
                        for (value, sim) in top_scored(
                            &vocab.subject_names,
                            strategy.fuzzy_threshold,
                            |entry| combined_similarity(subject, entry),
                        ) {
                            let mut cand = MatchCandidate::new(
                                MatchKind::Subject,
                                MatchSource::Fuzzy,
                                MatchMethod::Fuzzy,
                            );
                            cand.name = Some(value.to_string());
                            cand.raw_score = sim * RAW_SCALE;
                            candidates.push(cand);
                        }
                    }
                }
                FieldKey::CardNumber => {
                    if let Some(number) = parsed.card_number.as_deref() {
                        for (value, sim) in top_scored(
                            &vocab.card_numbers,
                            strategy.fuzzy_threshold,
                            |entry| card_number_similarity(number, entry),
                        ) {
                            let mut cand = MatchCandidate::new(
                                MatchKind::CardNumber,
                                MatchSource::Fuzzy,
                                MatchMethod::Fuzzy,
                            );
                            cand.number = Some(value.to_string());
                            cand.raw_score = sim * RAW_SCALE;
                            candidates.push(cand);
                        }
                    }
                }
                // Years have no fuzzy form of their own; a parsed year
                // corroborates other candidates through context scoring.
                FieldKey::Year => {}
            }
        }
        cross_reference(&mut candidates);
        candidates
    }
}

/// Score every vocabulary entry, keep those at or above the threshold, and
/// return the best few sorted by score (name as tiebreak, for stable
/// output).
fn top_scored<'a, F>(entries: &'a [String], threshold: f64, score: F) -> Vec<(&'a str, f64)>
where
    F: Fn(&str) -> f64,
{
    let mut scored: Vec<(&str, f64)> = entries
        .iter()
        .filter_map(|entry| {
            let sim = score(entry);
            (sim >= threshold).then_some((entry.as_str(), sim))
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.truncate(MAX_PER_FIELD);
    scored
}

/// Boost strong set candidates when a strong subject or number candidate
/// agrees that the label is self-consistent.
fn cross_reference(candidates: &mut [MatchCandidate]) {
    let corroborated = candidates.iter().any(|c| {
        matches!(c.kind, MatchKind::Subject | MatchKind::CardNumber)
            && c.raw_score > CROSS_REF_SUPPORT_RAW
    });
    if !corroborated {
        return;
    }
    for cand in candidates.iter_mut() {
        if cand.kind == MatchKind::Set && cand.raw_score > CROSS_REF_SET_RAW {
            cand.raw_score += CROSS_REF_BONUS;
            cand.enhancement = Some(Enhancement::CrossReference);
        }
    }
}
