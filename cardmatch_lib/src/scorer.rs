//! Confidence scoring, consolidation, and ranking of match candidates.
//!
//! Matcher raw scores are advisory only. The scorer recomputes a confidence
//! in [0, 1] from five components (field agreement, match type, record
//! quality, label context, duplicate corroboration), applies the strategy's
//! scoring-mode adjustment, then fills the result list by tier quota so a
//! handful of excellent matches cannot be crowded out by a long tail of
//! fair ones.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::similarity::{
    card_number_similarity, combined_similarity, rarity_similarity, set_name_similarity,
};
use crate::strategy::{ScoringMode, Strategy};
use crate::types::{
    ConfidenceTier, MatchCandidate, MatchKind, MatchMethod, MatchSource, ParsedFields,
    ScoreBreakdown, ScoredMatch,
};

/// Component blend weights. They sum to 1.0.
const WEIGHT_FIELD: f64 = 0.40;
const WEIGHT_TYPE: f64 = 0.25;
const WEIGHT_QUALITY: f64 = 0.20;
const WEIGHT_CONTEXT: f64 = 0.10;
const WEIGHT_DUPLICATE: f64 = 0.05;

/// Per-field weights inside the field-agreement component. Only fields
/// present on both sides count; the score is normalized over used weights.
/// Reference records carry no grade, so grades never contribute here.
const FIELD_SET: f64 = 0.35;
const FIELD_SUBJECT: f64 = 0.25;
const FIELD_NUMBER: f64 = 0.20;
const FIELD_YEAR: f64 = 0.10;
const FIELD_RARITY: f64 = 0.05;
const FIELD_LANGUAGE: f64 = 0.02;

/// Record-quality component pieces.
const QUALITY_BASE: f64 = 0.5;
const QUALITY_IMAGE: f64 = 0.1;
const QUALITY_PRICE: f64 = 0.1;
const QUALITY_AVAILABLE: f64 = 0.1;
const QUALITY_LISTED: f64 = 0.05;
const QUALITY_COMPLETENESS_MAX: f64 = 0.2;

/// Label-context component pieces.
const CONTEXT_YEAR_EXACT: f64 = 0.3;
const CONTEXT_YEAR_NEAR: f64 = 0.15;
const CONTEXT_YEAR_CLOSE: f64 = 0.05;
const CONTEXT_SERIES: f64 = 0.2;
const CONTEXT_LANGUAGE: f64 = 0.1;
const CONTEXT_RARITY_MAX: f64 = 0.15;
const CONTEXT_HOLO: f64 = 0.1;
const CONTEXT_FIRST_EDITION: f64 = 0.15;

/// Scoring-mode multipliers.
const FUZZY_BIAS_BOOST: f64 = 1.10;
const EXACT_PRIORITY_BOOST: f64 = 1.15;
const SET_PRIORITY_BOOST: f64 = 1.05;
const OPTIMAL_DAMPEN: f64 = 0.95;
const OPTIMAL_EXACT_BOOST: f64 = 1.15;
const OPTIMAL_EXACT_FLOOR: f64 = 0.85;

/// Duplicate-corroboration component: each extra matcher agreeing on the
/// same entity adds a step, capped well below 1.0 so corroboration can
/// nudge a ranking but never dominate it.
const DUPLICATE_STEP: f64 = 0.1;
const DUPLICATE_CAP: f64 = 0.3;

/// Tier quota fractions for result-list fill.
const EXCELLENT_SHARE: f64 = 0.4;
const GOOD_SHARE: f64 = 0.6;

/// Scores, consolidates, and ranks candidates into the final match list.
pub struct ConfidenceScorer;

struct Scored {
    candidate: MatchCandidate,
    breakdown: ScoreBreakdown,
    confidence: f64,
    duplicate_count: u32,
}

impl ConfidenceScorer {
    /// Turn raw candidates into a ranked, threshold-filtered result list of
    /// at most `limit` entries.
    pub fn score(
        &self,
        parsed: &ParsedFields,
        candidates: Vec<MatchCandidate>,
        strategy: &Strategy,
        limit: usize,
        threshold: f64,
    ) -> Vec<ScoredMatch> {
        let mut scored: Vec<Scored> = consolidate(candidates)
            .into_iter()
            .map(|(candidate, duplicate_count)| {
                score_one(parsed, candidate, duplicate_count, strategy.scoring)
            })
            .filter(|s| s.confidence >= threshold)
            .collect();
        scored.sort_by(compare_scored);

        let selected = fill_by_tier(scored, limit);
        selected
            .into_iter()
            .enumerate()
            .map(|(i, s)| ScoredMatch {
                tier: ConfidenceTier::from_confidence(s.confidence),
                candidate: s.candidate,
                confidence: s.confidence,
                breakdown: s.breakdown,
                duplicate_count: s.duplicate_count,
                rank: i + 1,
                is_top_result: i == 0,
            })
            .collect()
    }
}

fn score_one(
    parsed: &ParsedFields,
    candidate: MatchCandidate,
    duplicate_count: u32,
    mode: ScoringMode,
) -> Scored {
    let field = field_score(parsed, &candidate);
    let match_type = candidate.method.type_weight();
    let quality = quality_score(&candidate);
    let context = context_score(parsed, &candidate);
    let duplicate =
        (f64::from(duplicate_count.saturating_sub(1)) * DUPLICATE_STEP).min(DUPLICATE_CAP);

    let base = WEIGHT_FIELD * field
        + WEIGHT_TYPE * match_type
        + WEIGHT_QUALITY * quality
        + WEIGHT_CONTEXT * context
        + WEIGHT_DUPLICATE * duplicate;
    let confidence = (base * mode_multiplier(mode, &candidate, base)).clamp(0.0, 1.0);

    Scored {
        candidate,
        breakdown: ScoreBreakdown {
            field_score: field,
            match_type_score: match_type,
            quality_score: quality,
            context_score: context,
            duplicate_bonus: duplicate,
        },
        confidence,
        duplicate_count,
    }
}

/// Weighted agreement between what was parsed off the label and what the
/// candidate record says, normalized over the fields both sides have.
fn field_score(parsed: &ParsedFields, candidate: &MatchCandidate) -> f64 {
    let mut total = 0.0;
    let mut used = 0.0;

    if let (Some(p), Some(c)) = (parsed.set_name.as_deref(), candidate_set_name(candidate)) {
        total += FIELD_SET * set_name_similarity(p, c);
        used += FIELD_SET;
    }
    if let (Some(p), Some(c)) = (parsed.subject_name.as_deref(), candidate_subject(candidate)) {
        total += FIELD_SUBJECT * combined_similarity(p, c);
        used += FIELD_SUBJECT;
    }
    if let (Some(p), Some(c)) = (parsed.card_number.as_deref(), candidate.number.as_deref()) {
        total += FIELD_NUMBER * card_number_similarity(p, c);
        used += FIELD_NUMBER;
    }
    if let (Some(p), Some(c)) = (parsed.year, candidate.year()) {
        total += FIELD_YEAR * if p == c { 1.0 } else { 0.0 };
        used += FIELD_YEAR;
    }
    if let (Some(p), Some(c)) = (parsed.rarity.as_deref(), candidate.rarity.as_deref()) {
        total += FIELD_RARITY * rarity_similarity(p, c);
        used += FIELD_RARITY;
    }
    if let (Some(p), Some(c)) = (parsed.language.as_deref(), candidate.language.as_deref()) {
        total += FIELD_LANGUAGE * if p.eq_ignore_ascii_case(c) { 1.0 } else { 0.0 };
        used += FIELD_LANGUAGE;
    }

    if used == 0.0 {
        0.0
    } else {
        total / used
    }
}

fn candidate_set_name(candidate: &MatchCandidate) -> Option<&str> {
    if let Some(info) = &candidate.set_info {
        return Some(&info.set_name);
    }
    if candidate.kind == MatchKind::Set {
        return candidate.name.as_deref();
    }
    None
}

fn candidate_subject(candidate: &MatchCandidate) -> Option<&str> {
    if matches!(candidate.kind, MatchKind::Card | MatchKind::Subject) {
        candidate.name.as_deref()
    } else {
        None
    }
}

/// How complete and well-attested the reference record itself is.
fn quality_score(candidate: &MatchCandidate) -> f64 {
    let mut score = QUALITY_BASE;
    if candidate.image_url.is_some() {
        score += QUALITY_IMAGE;
    }
    if candidate.price_cents.is_some() {
        score += QUALITY_PRICE;
    }
    match candidate.availability.as_deref() {
        Some("available") => score += QUALITY_AVAILABLE,
        Some(_) => score += QUALITY_LISTED,
        None => {}
    }
    let present = [
        candidate.name.is_some(),
        candidate.number.is_some(),
        candidate.rarity.is_some(),
        candidate.year().is_some(),
        candidate.set_info.is_some(),
    ];
    let completeness = present.iter().filter(|p| **p).count() as f64 / present.len() as f64;
    (score + completeness * QUALITY_COMPLETENESS_MAX).min(1.0)
}

/// Corroboration between the candidate and label details the field score
/// does not cover directly.
fn context_score(parsed: &ParsedFields, candidate: &MatchCandidate) -> f64 {
    let mut score = 0.0;
    if let (Some(p), Some(c)) = (parsed.year, candidate.year()) {
        let diff = (p - c).abs();
        if diff == 0 {
            score += CONTEXT_YEAR_EXACT;
        } else if diff <= 2 {
            score += CONTEXT_YEAR_NEAR;
        } else if diff <= 5 {
            score += CONTEXT_YEAR_CLOSE;
        }
    }
    if let Some(series) = candidate.set_info.as_ref().and_then(|s| s.series.as_deref()) {
        if parsed
            .normalized_text
            .to_uppercase()
            .contains(&series.to_uppercase())
        {
            score += CONTEXT_SERIES;
        }
    }
    if let (Some(p), Some(c)) = (parsed.language.as_deref(), candidate.language.as_deref()) {
        if p.eq_ignore_ascii_case(c) {
            score += CONTEXT_LANGUAGE;
        }
    }
    if let (Some(p), Some(c)) = (parsed.rarity.as_deref(), candidate.rarity.as_deref()) {
        score += rarity_similarity(p, c) * CONTEXT_RARITY_MAX;
    }
    if parsed.is_holo && candidate.is_holo {
        score += CONTEXT_HOLO;
    }
    if parsed.is_first_edition && candidate.is_first_edition {
        score += CONTEXT_FIRST_EDITION;
    }
    score.min(1.0)
}

fn mode_multiplier(mode: ScoringMode, candidate: &MatchCandidate, base: f64) -> f64 {
    match mode {
        ScoringMode::Balanced => 1.0,
        ScoringMode::FuzzyBiased => {
            if candidate.source == MatchSource::Fuzzy {
                FUZZY_BIAS_BOOST
            } else {
                1.0
            }
        }
        ScoringMode::ExactPriority => {
            if candidate.method == MatchMethod::Exact {
                EXACT_PRIORITY_BOOST
            } else {
                1.0
            }
        }
        ScoringMode::SetPriority => {
            if candidate.source == MatchSource::Database && candidate.set_info.is_some() {
                SET_PRIORITY_BOOST
            } else {
                1.0
            }
        }
        ScoringMode::Optimal => {
            let mut multiplier = OPTIMAL_DAMPEN;
            if candidate.method == MatchMethod::Exact && base >= OPTIMAL_EXACT_FLOOR {
                multiplier *= OPTIMAL_EXACT_BOOST;
            }
            multiplier
        }
    }
}

/// Collapse candidates that point at the same entity across matchers. The
/// strongest raw score wins the slot; the duplicate count and any fields
/// the winner is missing are folded in from the rest.
fn consolidate(candidates: Vec<MatchCandidate>) -> Vec<(MatchCandidate, u32)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<(MatchCandidate, u32)> = Vec::new();
    for candidate in candidates {
        match index.entry(dedup_key(&candidate)) {
            Entry::Occupied(slot) => {
                let (existing, count) = &mut merged[*slot.get()];
                *count += 1;
                if candidate.raw_score > existing.raw_score {
                    let weaker = std::mem::replace(existing, candidate);
                    fill_missing(existing, weaker);
                } else {
                    fill_missing(existing, candidate);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push((candidate, 1));
            }
        }
    }
    merged
}

fn dedup_key(candidate: &MatchCandidate) -> String {
    let set_identity = candidate
        .set_info
        .as_ref()
        .map(|s| s.set_name.clone())
        .or_else(|| {
            if candidate.kind == MatchKind::Set {
                candidate.name.clone()
            } else {
                None
            }
        })
        .or_else(|| candidate.set_id.map(|id| id.to_string()))
        .unwrap_or_default();
    format!(
        "{}|{}|{}",
        candidate.name.as_deref().unwrap_or("").to_lowercase(),
        candidate.number.as_deref().unwrap_or("").to_lowercase(),
        set_identity.to_lowercase()
    )
}

fn fill_missing(into: &mut MatchCandidate, from: MatchCandidate) {
    if into.set_id.is_none() {
        into.set_id = from.set_id;
    }
    if into.card_id.is_none() {
        into.card_id = from.card_id;
    }
    if into.name.is_none() {
        into.name = from.name;
    }
    if into.number.is_none() {
        into.number = from.number;
    }
    if into.rarity.is_none() {
        into.rarity = from.rarity;
    }
    if into.language.is_none() {
        into.language = from.language;
    }
    if into.set_info.is_none() {
        into.set_info = from.set_info;
    }
    if into.image_url.is_none() {
        into.image_url = from.image_url;
    }
    if into.price_cents.is_none() {
        into.price_cents = from.price_cents;
    }
    if into.availability.is_none() {
        into.availability = from.availability;
    }
    if into.price_tier.is_none() {
        into.price_tier = from.price_tier;
    }
    if into.age_tier.is_none() {
        into.age_tier = from.age_tier;
    }
    if into.enhancement.is_none() {
        into.enhancement = from.enhancement;
    }
    into.is_holo |= from.is_holo;
    into.is_first_edition |= from.is_first_edition;
}

fn compare_scored(a: &Scored, b: &Scored) -> std::cmp::Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.candidate.name.cmp(&b.candidate.name))
        .then_with(|| a.candidate.number.cmp(&b.candidate.number))
}

/// Fill the result list by tier quota: roughly 40% of the slots go to
/// excellent matches, 60% of the remainder to good ones, the rest to fair,
/// then unfilled slots are backfilled in tier order. The final list is
/// re-sorted by confidence.
fn fill_by_tier(scored: Vec<Scored>, limit: usize) -> Vec<Scored> {
    let mut buckets: [Vec<Scored>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
    for s in scored {
        let slot = match ConfidenceTier::from_confidence(s.confidence) {
            ConfidenceTier::Excellent => 0,
            ConfidenceTier::Good => 1,
            ConfidenceTier::Fair => 2,
            ConfidenceTier::Poor => 3,
        };
        buckets[slot].push(s);
    }

    let mut selected: Vec<Scored> = Vec::new();
    let excellent_quota = ((limit as f64) * EXCELLENT_SHARE).ceil() as usize;
    take_up_to(&mut buckets[0], &mut selected, excellent_quota.min(limit));

    let remaining = limit - selected.len();
    let good_quota = ((remaining as f64) * GOOD_SHARE).ceil() as usize;
    take_up_to(&mut buckets[1], &mut selected, good_quota.min(remaining));

    let remaining = limit - selected.len();
    take_up_to(&mut buckets[2], &mut selected, remaining);

    for bucket in &mut buckets {
        let remaining = limit - selected.len();
        if remaining == 0 {
            break;
        }
        take_up_to(bucket, &mut selected, remaining);
    }

    selected.sort_by(compare_scored);
    selected
}

fn take_up_to(bucket: &mut Vec<Scored>, selected: &mut Vec<Scored>, count: usize) {
    let take = count.min(bucket.len());
    selected.extend(bucket.drain(..take));
}
