//! Database-backed matcher: three-tier search against the reference store.
//!
//! Tier 1 finds sets by loose name match and/or year. Tier 2 searches cards
//! scoped to those sets. Tier 3 falls back to an unscoped card search when
//! the scoped one comes up empty, optionally narrowed by year-derived sets.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MatcherError;
use crate::similarity::{card_number_similarity, set_name_similarity};
use crate::store::ReferenceStore;
use crate::strategy::Strategy;
use crate::types::{
    CardRecord, MatchCandidate, MatchKind, MatchMethod, MatchSource, ParsedFields, SetInfo,
    SetRecord,
};

/// Raw-score weights for set candidates.
const SET_NAME_WEIGHT: f64 = 70.0;
const SET_YEAR_WEIGHT: f64 = 30.0;

/// Raw-score weights for card candidates.
const CARD_NAME_WEIGHT: f64 = 40.0;
const CARD_NUMBER_WEIGHT: f64 = 35.0;
const CARD_SET_WEIGHT: f64 = 15.0;
const CARD_YEAR_WEIGHT: f64 = 10.0;

const MAX_RAW_SCORE: f64 = 100.0;

const EXACT_EPSILON: f64 = 1e-9;

pub struct ExactMatcher {
    store: Arc<dyn ReferenceStore>,
}

impl ExactMatcher {
    pub fn new(store: Arc<dyn ReferenceStore>) -> Self {
        Self { store }
    }

    pub fn run(
        &self,
        parsed: &ParsedFields,
        _strategy: &Strategy,
    ) -> Result<Vec<MatchCandidate>, MatcherError> {
        let mut candidates = Vec::new();

        // Tier 1: sets by name and/or year.
        let sets = if parsed.set_name.is_some() || parsed.year.is_some() {
            self.store.find_sets(parsed.set_name.as_deref(), parsed.year)?
        } else {
            Vec::new()
        };
        for set in &sets {
            candidates.push(set_candidate(set, parsed));
        }

        let wants_cards = parsed.subject_name.is_some() || parsed.card_number.is_some();
        if !wants_cards {
            return Ok(candidates);
        }

        // Tier 2: cards scoped to the matched sets.
        let set_ids: Vec<i64> = sets.iter().map(|s| s.set_id).collect();
        let scoped = self.store.find_cards_in_sets(
            &set_ids,
            parsed.subject_name.as_deref(),
            parsed.card_number.as_deref(),
        )?;

        let sets_by_id: HashMap<i64, &SetRecord> = sets.iter().map(|s| (s.set_id, s)).collect();

        if !scoped.is_empty() {
            for card in &scoped {
                let parent = sets_by_id.get(&card.set_id).copied().cloned();
                candidates.push(card_candidate(card, parent, parsed, true, false));
            }
            return Ok(candidates);
        }

        // Tier 3: unscoped fallback, narrowed by year-derived sets when
        // that leaves anything.
        let mut unscoped = self.store.find_cards(
            parsed.subject_name.as_deref(),
            parsed.card_number.as_deref(),
        )?;
        if let Some(year) = parsed.year {
            let year_sets = self.store.find_sets(None, Some(year))?;
            if !year_sets.is_empty() {
                let year_ids: Vec<i64> = year_sets.iter().map(|s| s.set_id).collect();
                let narrowed: Vec<CardRecord> = unscoped
                    .iter()
                    .filter(|c| year_ids.contains(&c.set_id))
                    .cloned()
                    .collect();
                if !narrowed.is_empty() {
                    unscoped = narrowed;
                }
            }
        }
        for card in &unscoped {
            let parent = self.store.set_by_id(card.set_id)?;
            candidates.push(card_candidate(card, parent, parsed, false, true));
        }

        Ok(candidates)
    }
}

fn set_candidate(set: &SetRecord, parsed: &ParsedFields) -> MatchCandidate {
    let name_sim = parsed
        .set_name
        .as_deref()
        .map(|n| set_name_similarity(n, &set.name))
        .unwrap_or(0.0);
    let year_matches = parsed.year.is_some() && parsed.year == set.year;

    let method = if name_sim >= 1.0 - EXACT_EPSILON {
        MatchMethod::Exact
    } else if parsed.set_name.is_some() {
        MatchMethod::Partial
    } else {
        MatchMethod::Database
    };

    let year_component = if year_matches { 1.0 } else { 0.0 };
    let raw = (SET_NAME_WEIGHT * name_sim + SET_YEAR_WEIGHT * year_component).min(MAX_RAW_SCORE);

    let mut candidate = MatchCandidate::new(MatchKind::Set, MatchSource::Database, method);
    candidate.set_id = Some(set.set_id);
    candidate.name = Some(set.name.clone());
    candidate.set_info = Some(SetInfo {
        set_name: set.name.clone(),
        year: set.year,
        series: set.series.clone(),
    });
    candidate.age_tier = set.year.map(age_tier);
    candidate.raw_score = raw;
    candidate
}

fn card_candidate(
    card: &CardRecord,
    parent: Option<SetRecord>,
    parsed: &ParsedFields,
    set_matched: bool,
    fallback: bool,
) -> MatchCandidate {
    let name_sim = parsed
        .subject_name
        .as_deref()
        .map(|n| set_name_similarity_free(n, &card.name))
        .unwrap_or(0.0);
    let number_sim = match (parsed.card_number.as_deref(), card.number.as_deref()) {
        (Some(a), Some(b)) => card_number_similarity(a, b),
        _ => 0.0,
    };
    let set_year = parent.as_ref().and_then(|s| s.year);
    let year_matches = parsed.year.is_some() && parsed.year == set_year;

    let fields_perfect = (parsed.subject_name.is_none() || name_sim >= 1.0 - EXACT_EPSILON)
        && (parsed.card_number.is_none() || number_sim >= 1.0 - EXACT_EPSILON)
        && (parsed.subject_name.is_some() || parsed.card_number.is_some());
    let method = if fields_perfect {
        MatchMethod::Exact
    } else if fallback {
        MatchMethod::Fallback
    } else {
        MatchMethod::Database
    };

    let set_component = if set_matched { 1.0 } else { 0.0 };
    let year_component = if year_matches { 1.0 } else { 0.0 };
    let raw = (CARD_NAME_WEIGHT * name_sim
        + CARD_NUMBER_WEIGHT * number_sim
        + CARD_SET_WEIGHT * set_component
        + CARD_YEAR_WEIGHT * year_component)
        .min(MAX_RAW_SCORE);

    let mut candidate = MatchCandidate::new(MatchKind::Card, MatchSource::Database, method);
    candidate.card_id = Some(card.card_id);
    candidate.set_id = Some(card.set_id);
    candidate.name = Some(card.name.clone());
    candidate.number = card.number.clone();
    candidate.rarity = card.rarity.clone();
    candidate.language = card.language.clone();
    candidate.is_holo = card.is_holo;
    candidate.is_first_edition = card.is_first_edition;
    candidate.image_url = card.image_url.clone();
    candidate.price_cents = card.price_cents;
    candidate.availability = card.availability.clone();
    candidate.price_tier = card.price_cents.map(price_tier);
    candidate.age_tier = set_year.map(age_tier);
    candidate.set_info = parent.map(|s| SetInfo {
        set_name: s.name,
        year: s.year,
        series: s.series,
    });
    candidate.raw_score = raw;
    candidate
}

/// Plain name similarity for subjects; the set-abbreviation table does not
/// apply to card names.
fn set_name_similarity_free(a: &str, b: &str) -> f64 {
    if a.trim().eq_ignore_ascii_case(b.trim()) {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}

fn price_tier(price_cents: i64) -> String {
    if price_cents >= 50_000 {
        "premium".to_string()
    } else if price_cents >= 5_000 {
        "mid".to_string()
    } else {
        "budget".to_string()
    }
}

fn age_tier(year: i32) -> String {
    if year <= 2002 {
        "vintage".to_string()
    } else if year <= 2010 {
        "classic".to_string()
    } else {
        "modern".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::store::{NewCard, NewSet, SqliteStore};
    use crate::strategy::StrategyTable;

    fn store() -> Arc<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().unwrap();
        let base = store
            .upsert_set(&NewSet {
                name: "Base Set".to_string(),
                year: Some(1999),
                series: Some("Base".to_string()),
                card_count: Some(102),
            })
            .unwrap();
        let jungle = store
            .upsert_set(&NewSet {
                name: "Jungle".to_string(),
                year: Some(1999),
                series: Some("Base".to_string()),
                card_count: Some(64),
            })
            .unwrap();
        store
            .upsert_card(
                base,
                &NewCard {
                    name: "Charizard".to_string(),
                    number: Some("4/102".to_string()),
                    rarity: Some("Holo Rare".to_string()),
                    language: None,
                    is_holo: true,
                    is_first_edition: false,
                    image_url: Some("https://img.example/charizard.png".to_string()),
                    price_cents: Some(150_000),
                    availability: Some("available".to_string()),
                },
            )
            .unwrap();
        store
            .upsert_card(
                jungle,
                &NewCard {
                    name: "Snorlax".to_string(),
                    number: Some("11/64".to_string()),
                    rarity: Some("Rare".to_string()),
                    language: None,
                    is_holo: false,
                    is_first_edition: false,
                    image_url: None,
                    price_cents: Some(2_000),
                    availability: None,
                },
            )
            .unwrap();
        Arc::new(store)
    }

    fn balanced() -> crate::strategy::Strategy {
        StrategyTable::load_default()
            .unwrap()
            .get("balanced")
            .unwrap()
            .clone()
    }

    #[test]
    fn scoped_card_match_scores_full() {
        let store = store();
        let vocab = store.vocabulary().unwrap();
        let parsed = parser::parse("CHARIZARD 4/102 BASE SET 1999 PSA 9", &vocab);
        let matcher = ExactMatcher::new(store);
        let candidates = matcher.run(&parsed, &balanced()).unwrap();

        let card = candidates
            .iter()
            .find(|c| c.kind == MatchKind::Card)
            .expect("card candidate");
        assert_eq!(card.name.as_deref(), Some("Charizard"));
        assert_eq!(card.number.as_deref(), Some("4/102"));
        assert_eq!(card.method, MatchMethod::Exact);
        assert_eq!(card.raw_score, 100.0);
        let set_info = card.set_info.as_ref().expect("set info");
        assert_eq!(set_info.set_name, "Base Set");
        assert_eq!(set_info.year, Some(1999));
        assert_eq!(card.price_tier.as_deref(), Some("premium"));
        assert_eq!(card.age_tier.as_deref(), Some("vintage"));
    }

    #[test]
    fn set_candidates_score_name_and_year() {
        let store = store();
        let vocab = store.vocabulary().unwrap();
        let parsed = parser::parse("BASE SET 1999", &vocab);
        let candidates = ExactMatcher::new(store).run(&parsed, &balanced()).unwrap();

        let set = candidates
            .iter()
            .find(|c| c.name.as_deref() == Some("Base Set"))
            .expect("base set candidate");
        assert_eq!(set.kind, MatchKind::Set);
        assert_eq!(set.method, MatchMethod::Exact);
        assert_eq!(set.raw_score, 100.0);

        // Jungle comes back on the year alone, with only the year weight.
        let jungle = candidates
            .iter()
            .find(|c| c.name.as_deref() == Some("Jungle"))
            .expect("jungle candidate");
        assert!(jungle.raw_score < set.raw_score);
    }

    #[test]
    fn unscoped_fallback_when_set_unknown() {
        let store = store();
        let vocab = store.vocabulary().unwrap();
        // The set pattern grabs the subject run, but no such set exists;
        // tier 1 yields nothing and tier 3 runs unscoped.
        let parsed = parser::parse("SNORLAX 11/64", &vocab);
        let candidates = ExactMatcher::new(store).run(&parsed, &balanced()).unwrap();

        let card = candidates
            .iter()
            .find(|c| c.kind == MatchKind::Card)
            .expect("fallback card");
        assert_eq!(card.name.as_deref(), Some("Snorlax"));
        assert_eq!(card.method, MatchMethod::Exact);
        let set_info = card.set_info.as_ref().expect("parent set joined");
        assert_eq!(set_info.set_name, "Jungle");
    }

    #[test]
    fn year_derived_sets_scope_card_search() {
        let store = store();
        let vocab = store.vocabulary().unwrap();
        let parsed = parser::parse("SNORLAX 1999", &vocab);
        let candidates = ExactMatcher::new(store).run(&parsed, &balanced()).unwrap();
        assert!(candidates
            .iter()
            .any(|c| c.kind == MatchKind::Card && c.name.as_deref() == Some("Snorlax")));
    }

    #[test]
    fn no_fields_no_candidates() {
        let store = store();
        let parsed = ParsedFields::empty("");
        let candidates = ExactMatcher::new(store).run(&parsed, &balanced()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn tier_helpers() {
        assert_eq!(price_tier(150_000), "premium");
        assert_eq!(price_tier(10_000), "mid");
        assert_eq!(price_tier(100), "budget");
        assert_eq!(age_tier(1999), "vintage");
        assert_eq!(age_tier(2007), "classic");
        assert_eq!(age_tier(2023), "modern");
    }
}
