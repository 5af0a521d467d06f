//! End-to-end pipeline tests against a seeded in-memory reference store.

use std::sync::Arc;
use std::time::Duration;

use cardmatch_lib::{
    ConfidenceTier, MatchError, MatchOptions, MatchSource, MatchingPipeline, NewCard, NewSet,
    ReferenceStore, SqliteStore, StoreError, StrategyTable, Vocabulary,
};

fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open store");
    store.init().expect("init schema");
    let base = store
        .upsert_set(&NewSet {
            name: "Base Set".to_string(),
            year: Some(1999),
            series: Some("Base".to_string()),
            card_count: Some(102),
        })
        .expect("insert Base Set");
    let jungle = store
        .upsert_set(&NewSet {
            name: "Jungle".to_string(),
            year: Some(1999),
            series: Some("Base".to_string()),
            card_count: Some(64),
        })
        .expect("insert Jungle");
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
        .expect("insert Charizard");
    store
        .upsert_card(
            jungle,
            &NewCard {
                name: "Pikachu".to_string(),
                number: Some("60/64".to_string()),
                rarity: Some("Common".to_string()),
                language: None,
                is_holo: false,
                is_first_edition: false,
                image_url: None,
                price_cents: None,
                availability: None,
            },
        )
        .expect("insert Pikachu");
    store
}

fn pipeline() -> MatchingPipeline {
    MatchingPipeline::new(Arc::new(seeded_store())).expect("built-in strategies load")
}

#[tokio::test]
async fn clean_label_matches_with_excellent_confidence() {
    let outcome = pipeline()
        .match_text(
            "CHARIZARD 4/102 BASE SET 1999 PSA 9",
            "exact-priority",
            &MatchOptions::default(),
        )
        .await
        .expect("match succeeds");

    assert_eq!(outcome.strategy, "exact-priority");
    assert_eq!(outcome.parsed.set_name.as_deref(), Some("Base Set"));
    assert_eq!(outcome.parsed.subject_name.as_deref(), Some("Charizard"));
    assert_eq!(outcome.parsed.card_number.as_deref(), Some("4/102"));
    assert_eq!(outcome.parsed.year, Some(1999));
    assert_eq!(outcome.parsed.grade, Some(9.0));

    let top = outcome.matches.first().expect("at least one match");
    assert!(top.is_top_result);
    assert_eq!(top.rank, 1);
    assert_eq!(top.candidate.name.as_deref(), Some("Charizard"));
    assert_eq!(top.candidate.number.as_deref(), Some("4/102"));
    assert_eq!(
        top.candidate.set_info.as_ref().map(|s| s.set_name.as_str()),
        Some("Base Set")
    );
    assert!(top.confidence >= 0.9, "got {}", top.confidence);
    assert_eq!(top.tier, ConfidenceTier::Excellent);
    assert_eq!(outcome.metadata.top_confidence, top.confidence);
    assert_eq!(outcome.metadata.total_matches, outcome.matches.len());
}

#[tokio::test]
async fn empty_text_yields_empty_result() {
    let outcome = pipeline()
        .match_text("", "balanced", &MatchOptions::default())
        .await
        .expect("empty input is not an error");
    assert_eq!(outcome.parsed.confidence, 0.0);
    assert!(outcome.matches.is_empty());
    assert_eq!(outcome.metadata.total_matches, 0);
    assert_eq!(outcome.metadata.top_confidence, 0.0);
}

#[tokio::test]
async fn unknown_strategy_fails_fast() {
    let err = pipeline()
        .match_text("CHARIZARD", "no-such-strategy", &MatchOptions::default())
        .await
        .expect_err("unknown strategy is an error");
    assert!(matches!(err, MatchError::UnknownStrategy(name) if name == "no-such-strategy"));
}

#[tokio::test]
async fn misspelled_set_still_finds_card() {
    let outcome = pipeline()
        .match_text(
            "CHARIZARD 4/102 BASE ST 1999",
            "balanced",
            &MatchOptions::default(),
        )
        .await
        .expect("match succeeds");

    assert_eq!(outcome.parsed.set_name.as_deref(), Some("Base St"));
    let top_three: Vec<_> = outcome.matches.iter().take(3).collect();
    assert!(
        top_three
            .iter()
            .any(|m| m.candidate.name.as_deref() == Some("Charizard")
                && m.candidate.number.as_deref() == Some("4/102")),
        "Charizard should rank in the top three"
    );

    // The database and fuzzy matchers both propose Base Set; the scorer
    // consolidates them into one entry.
    let base_set = outcome
        .matches
        .iter()
        .find(|m| {
            m.candidate.name.as_deref() == Some("Base Set") && m.candidate.number.is_none()
        })
        .expect("consolidated Base Set match");
    assert!(base_set.duplicate_count >= 2);
}

struct FailingStore {
    vocab: Vocabulary,
}

impl ReferenceStore for FailingStore {
    fn vocabulary(&self) -> Result<Vocabulary, StoreError> {
        Ok(self.vocab.clone())
    }

    fn find_sets(
        &self,
        _name: Option<&str>,
        _year: Option<i32>,
    ) -> Result<Vec<cardmatch_lib::SetRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn find_cards_in_sets(
        &self,
        _set_ids: &[i64],
        _name: Option<&str>,
        _number: Option<&str>,
    ) -> Result<Vec<cardmatch_lib::CardRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn find_cards(
        &self,
        _name: Option<&str>,
        _number: Option<&str>,
    ) -> Result<Vec<cardmatch_lib::CardRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn set_by_id(&self, _set_id: i64) -> Result<Option<cardmatch_lib::SetRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[tokio::test]
async fn database_failure_degrades_to_fuzzy_results() {
    let store = FailingStore {
        vocab: Vocabulary {
            set_names: vec!["Base Set".to_string()],
            subject_names: vec!["Charizard".to_string()],
            card_numbers: vec!["4/102".to_string()],
            years: vec![1999],
        },
    };
    let pipeline = MatchingPipeline::new(Arc::new(store)).expect("strategies load");
    let outcome = pipeline
        .match_text(
            "CHARIZARD 4/102 BASE SET 1999",
            "balanced",
            &MatchOptions::default(),
        )
        .await
        .expect("matcher failure is not fatal");

    assert!(
        !outcome.matches.is_empty(),
        "fuzzy matcher should still produce results"
    );
    assert!(outcome
        .matches
        .iter()
        .all(|m| m.candidate.source == MatchSource::Fuzzy));
}

struct SlowStore {
    inner: SqliteStore,
}

impl ReferenceStore for SlowStore {
    fn vocabulary(&self) -> Result<Vocabulary, StoreError> {
        self.inner.vocabulary()
    }

    fn find_sets(
        &self,
        name: Option<&str>,
        year: Option<i32>,
    ) -> Result<Vec<cardmatch_lib::SetRecord>, StoreError> {
        std::thread::sleep(Duration::from_millis(300));
        self.inner.find_sets(name, year)
    }

    fn find_cards_in_sets(
        &self,
        set_ids: &[i64],
        name: Option<&str>,
        number: Option<&str>,
    ) -> Result<Vec<cardmatch_lib::CardRecord>, StoreError> {
        self.inner.find_cards_in_sets(set_ids, name, number)
    }

    fn find_cards(
        &self,
        name: Option<&str>,
        number: Option<&str>,
    ) -> Result<Vec<cardmatch_lib::CardRecord>, StoreError> {
        self.inner.find_cards(name, number)
    }

    fn set_by_id(&self, set_id: i64) -> Result<Option<cardmatch_lib::SetRecord>, StoreError> {
        self.inner.set_by_id(set_id)
    }
}

#[tokio::test]
async fn database_timeout_degrades_to_fuzzy_results() {
    let pipeline = MatchingPipeline::new(Arc::new(SlowStore {
        inner: seeded_store(),
    }))
    .expect("strategies load");
    let options = MatchOptions {
        exact_timeout: Some(Duration::from_millis(10)),
        ..MatchOptions::default()
    };
    let outcome = pipeline
        .match_text("CHARIZARD 4/102 BASE SET 1999", "balanced", &options)
        .await
        .expect("timeout is not fatal");

    assert!(!outcome.matches.is_empty());
    assert!(outcome
        .matches
        .iter()
        .all(|m| m.candidate.source == MatchSource::Fuzzy));
}

#[tokio::test]
async fn matchers_run_concurrently() {
    // Two database matchers against a store whose set lookup sleeps 300ms.
    // Run one after the other they would need 600ms; spawned together the
    // whole call finishes in roughly one sleep.
    let toml = r#"
[[strategy]]
name = "double-database"
parser = "psa-label"
matchers = ["database", "database"]
scoring = "balanced"
field_priority = ["set_name"]
fuzzy_threshold = 0.6
max_results = 10
confidence_threshold = 0.3
"#;
    let strategies = StrategyTable::from_toml(toml).expect("strategy parses");
    let pipeline = MatchingPipeline::with_strategies(
        Arc::new(SlowStore {
            inner: seeded_store(),
        }),
        strategies,
    );

    let started = std::time::Instant::now();
    let outcome = pipeline
        .match_text(
            "CHARIZARD 4/102 BASE SET 1999",
            "double-database",
            &MatchOptions::default(),
        )
        .await
        .expect("match succeeds");
    let elapsed = started.elapsed();

    assert!(!outcome.matches.is_empty());
    assert!(
        elapsed < Duration::from_millis(500),
        "expected overlapping matcher runs, took {elapsed:?}"
    );
}

#[tokio::test]
async fn options_override_strategy_limits() {
    let options = MatchOptions {
        limit: Some(1),
        ..MatchOptions::default()
    };
    let outcome = pipeline()
        .match_text("CHARIZARD 4/102 BASE SET 1999", "balanced", &options)
        .await
        .expect("match succeeds");
    assert_eq!(outcome.matches.len(), 1);
    assert!(outcome.matches[0].is_top_result);
}

#[tokio::test]
async fn repeated_calls_are_deterministic() {
    let pipeline = pipeline();
    let text = "CHARIZARD 4/102 BASE ST 1999";
    let first = pipeline
        .match_text(text, "balanced", &MatchOptions::default())
        .await
        .expect("first run");
    let second = pipeline
        .match_text(text, "balanced", &MatchOptions::default())
        .await
        .expect("second run");

    assert_eq!(first.parsed, second.parsed);
    assert_eq!(first.matches, second.matches);
}

#[tokio::test]
async fn ranking_is_consistent_with_confidence() {
    let outcome = pipeline()
        .match_text(
            "CHARIZARD 4/102 BASE ST 1999",
            "balanced",
            &MatchOptions::default(),
        )
        .await
        .expect("match succeeds");

    for (i, m) in outcome.matches.iter().enumerate() {
        assert_eq!(m.rank, i + 1);
        assert_eq!(m.tier, ConfidenceTier::from_confidence(m.confidence));
        assert_eq!(m.is_top_result, i == 0);
    }
    for pair in outcome.matches.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
}
