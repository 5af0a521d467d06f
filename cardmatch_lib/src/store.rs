//! Reference-data store: known sets and cards used as matching ground truth.
//!
//! The pipeline only depends on the [`ReferenceStore`] trait; the SQLite
//! implementation lives here too. Matching never mutates the store, and
//! query results are memoized in a TTL cache that is cleared on writes and
//! on explicit [`SqliteStore::refresh`].

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::cache::QueryCache;
use crate::types::{CardRecord, SetRecord, Vocabulary};

/// Row cap for loose reference queries.
const MAX_ROWS: usize = 50;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("reference store lock poisoned")]
    Poisoned,
}

/// Read-only query surface the matchers run against.
pub trait ReferenceStore: Send + Sync {
    /// Deduplicated known values for the parser and fuzzy matcher.
    fn vocabulary(&self) -> Result<Vocabulary, StoreError>;

    /// Sets whose name loosely matches and/or whose year equals the given
    /// values. Returns nothing when both are absent.
    fn find_sets(&self, name: Option<&str>, year: Option<i32>) -> Result<Vec<SetRecord>, StoreError>;

    /// Cards scoped to the given sets whose name or number loosely match.
    fn find_cards_in_sets(
        &self,
        set_ids: &[i64],
        name: Option<&str>,
        number: Option<&str>,
    ) -> Result<Vec<CardRecord>, StoreError>;

    /// Unscoped card search by name or number.
    fn find_cards(&self, name: Option<&str>, number: Option<&str>) -> Result<Vec<CardRecord>, StoreError>;

    fn set_by_id(&self, set_id: i64) -> Result<Option<SetRecord>, StoreError>;
}

/// A set to insert, without its assigned id.
#[derive(Deserialize, Debug, Clone)]
pub struct NewSet {
    pub name: String,
    pub year: Option<i32>,
    pub series: Option<String>,
    pub card_count: Option<i64>,
}

/// A card to insert, without its assigned id.
#[derive(Deserialize, Debug, Clone)]
pub struct NewCard {
    pub name: String,
    pub number: Option<String>,
    pub rarity: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub is_holo: bool,
    #[serde(default)]
    pub is_first_edition: bool,
    pub image_url: Option<String>,
    pub price_cents: Option<i64>,
    pub availability: Option<String>,
}

/// SQLite-backed reference store with a TTL query cache.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    cache: QueryCache,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            cache: QueryCache::new(DEFAULT_CACHE_TTL),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            cache: QueryCache::new(DEFAULT_CACHE_TTL),
        })
    }

    pub fn init(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(include_str!("../schema/sqlite.sql"))?;
        Ok(())
    }

    /// Drops all memoized query results; the next query re-reads SQLite.
    pub fn refresh(&self) {
        self.cache.clear();
    }

    pub fn upsert_set(&self, set: &NewSet) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sets (name, year, series, card_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
               year = excluded.year,
               series = excluded.series,
               card_count = excluded.card_count",
            params![set.name, set.year, set.series, set.card_count],
        )?;
        let set_id = conn.query_row(
            "SELECT set_id FROM sets WHERE name = ?1",
            params![set.name],
            |row| row.get(0),
        )?;
        drop(conn);
        self.cache.clear();
        Ok(set_id)
    }

    pub fn upsert_card(&self, set_id: i64, card: &NewCard) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cards (
               set_id, name, number, rarity, language, is_holo,
               is_first_edition, image_url, price_cents, availability
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(set_id, name, number) DO UPDATE SET
               rarity = excluded.rarity,
               language = excluded.language,
               is_holo = excluded.is_holo,
               is_first_edition = excluded.is_first_edition,
               image_url = excluded.image_url,
               price_cents = excluded.price_cents,
               availability = excluded.availability",
            params![
                set_id,
                card.name,
                card.number,
                card.rarity,
                card.language,
                card.is_holo,
                card.is_first_edition,
                card.image_url,
                card.price_cents,
                card.availability,
            ],
        )?;
        let card_id = conn.query_row(
            "SELECT card_id FROM cards WHERE set_id = ?1 AND name = ?2 AND number IS ?3",
            params![set_id, card.name, card.number],
            |row| row.get(0),
        )?;
        drop(conn);
        self.cache.clear();
        Ok(card_id)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn set_from_row(row: &Row<'_>) -> rusqlite::Result<SetRecord> {
    Ok(SetRecord {
        set_id: row.get(0)?,
        name: row.get(1)?,
        year: row.get(2)?,
        series: row.get(3)?,
        card_count: row.get(4)?,
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<CardRecord> {
    Ok(CardRecord {
        card_id: row.get(0)?,
        set_id: row.get(1)?,
        name: row.get(2)?,
        number: row.get(3)?,
        rarity: row.get(4)?,
        language: row.get(5)?,
        is_holo: row.get(6)?,
        is_first_edition: row.get(7)?,
        image_url: row.get(8)?,
        price_cents: row.get(9)?,
        availability: row.get(10)?,
    })
}

const CARD_COLUMNS: &str = "card_id, set_id, name, number, rarity, language, is_holo, \
                            is_first_edition, image_url, price_cents, availability";

fn string_column(conn: &Connection, sql: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let mut values = Vec::new();
    for value in stmt.query_map([], |row| row.get::<_, String>(0))? {
        values.push(value?);
    }
    Ok(values)
}

impl ReferenceStore for SqliteStore {
    fn vocabulary(&self) -> Result<Vocabulary, StoreError> {
        if let Some(vocab) = self.cache.get::<Vocabulary>("vocabulary") {
            return Ok(vocab);
        }
        let conn = self.lock()?;
        let set_names = string_column(&conn, "SELECT DISTINCT name FROM sets ORDER BY name")?;
        let subject_names = string_column(&conn, "SELECT DISTINCT name FROM cards ORDER BY name")?;
        let card_numbers = string_column(
            &conn,
            "SELECT DISTINCT number FROM cards WHERE number IS NOT NULL ORDER BY number",
        )?;
        let mut years = Vec::new();
        {
            let mut stmt =
                conn.prepare("SELECT DISTINCT year FROM sets WHERE year IS NOT NULL ORDER BY year")?;
            for year in stmt.query_map([], |row| row.get::<_, i32>(0))? {
                years.push(year?);
            }
        }
        drop(conn);

        let vocab = Vocabulary {
            set_names,
            subject_names,
            card_numbers,
            years,
        };
        self.cache.set("vocabulary", &vocab);
        Ok(vocab)
    }

    fn find_sets(&self, name: Option<&str>, year: Option<i32>) -> Result<Vec<SetRecord>, StoreError> {
        if name.is_none() && year.is_none() {
            return Ok(Vec::new());
        }
        let cache_key = format!("sets:{}:{}", name.unwrap_or(""), year.map_or(0, i64::from));
        if let Some(sets) = self.cache.get::<Vec<SetRecord>>(&cache_key) {
            return Ok(sets);
        }

        let conn = self.lock()?;
        let pattern = name.map(|n| format!("%{}%", n));
        let mut sets = Vec::new();
        {
            let (sql, bind): (String, Vec<&dyn rusqlite::ToSql>) = match (&pattern, &year) {
                (Some(p), Some(y)) => (
                    format!(
                        "SELECT set_id, name, year, series, card_count FROM sets
                         WHERE name LIKE ?1 OR year = ?2
                         ORDER BY name, set_id LIMIT {MAX_ROWS}"
                    ),
                    vec![p as &dyn rusqlite::ToSql, y as &dyn rusqlite::ToSql],
                ),
                (Some(p), None) => (
                    format!(
                        "SELECT set_id, name, year, series, card_count FROM sets
                         WHERE name LIKE ?1
                         ORDER BY name, set_id LIMIT {MAX_ROWS}"
                    ),
                    vec![p as &dyn rusqlite::ToSql],
                ),
                (None, Some(y)) => (
                    format!(
                        "SELECT set_id, name, year, series, card_count FROM sets
                         WHERE year = ?1
                         ORDER BY name, set_id LIMIT {MAX_ROWS}"
                    ),
                    vec![y as &dyn rusqlite::ToSql],
                ),
                (None, None) => unreachable!(),
            };
            let mut stmt = conn.prepare(&sql)?;
            for set in stmt.query_map(params_from_iter(bind), set_from_row)? {
                sets.push(set?);
            }
        }
        drop(conn);
        self.cache.set(&cache_key, &sets);
        Ok(sets)
    }

    fn find_cards_in_sets(
        &self,
        set_ids: &[i64],
        name: Option<&str>,
        number: Option<&str>,
    ) -> Result<Vec<CardRecord>, StoreError> {
        if set_ids.is_empty() || (name.is_none() && number.is_none()) {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let placeholders = vec!["?"; set_ids.len()].join(", ");
        let pattern = name.map(|n| format!("%{}%", n));

        let mut sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE set_id IN ({placeholders}) AND ("
        );
        let mut bind: Vec<&dyn rusqlite::ToSql> =
            set_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let mut clauses = Vec::new();
        if let Some(ref p) = pattern {
            clauses.push(format!("name LIKE ?{}", bind.len() + 1));
            bind.push(p as &dyn rusqlite::ToSql);
        }
        if let Some(ref n) = number {
            clauses.push(format!("number = ?{}", bind.len() + 1));
            bind.push(n as &dyn rusqlite::ToSql);
        }
        sql.push_str(&clauses.join(" OR "));
        sql.push_str(&format!(") ORDER BY name, card_id LIMIT {MAX_ROWS}"));

        let mut cards = Vec::new();
        let mut stmt = conn.prepare(&sql)?;
        for card in stmt.query_map(params_from_iter(bind), card_from_row)? {
            cards.push(card?);
        }
        Ok(cards)
    }

    fn find_cards(&self, name: Option<&str>, number: Option<&str>) -> Result<Vec<CardRecord>, StoreError> {
        if name.is_none() && number.is_none() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let pattern = name.map(|n| format!("%{}%", n));

        let mut sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE ");
        let mut bind: Vec<&dyn rusqlite::ToSql> = Vec::new();
        let mut clauses = Vec::new();
        if let Some(ref p) = pattern {
            clauses.push(format!("name LIKE ?{}", bind.len() + 1));
            bind.push(p as &dyn rusqlite::ToSql);
        }
        if let Some(ref n) = number {
            clauses.push(format!("number = ?{}", bind.len() + 1));
            bind.push(n as &dyn rusqlite::ToSql);
        }
        sql.push_str(&clauses.join(" OR "));
        sql.push_str(&format!(" ORDER BY name, card_id LIMIT {MAX_ROWS}"));

        let mut cards = Vec::new();
        let mut stmt = conn.prepare(&sql)?;
        for card in stmt.query_map(params_from_iter(bind), card_from_row)? {
            cards.push(card?);
        }
        Ok(cards)
    }

    fn set_by_id(&self, set_id: i64) -> Result<Option<SetRecord>, StoreError> {
        let conn = self.lock()?;
        let set = conn
            .query_row(
                "SELECT set_id, name, year, series, card_count FROM sets WHERE set_id = ?1",
                params![set_id],
                set_from_row,
            )
            .optional()?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> SqliteStore {
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
            .unwrap();
        store
    }

    #[test]
    fn vocabulary_is_deduplicated_and_sorted() {
        let store = seeded_store();
        let vocab = store.vocabulary().unwrap();
        assert_eq!(vocab.set_names, vec!["Base Set", "Jungle"]);
        assert_eq!(vocab.subject_names, vec!["Charizard", "Pikachu"]);
        assert_eq!(vocab.card_numbers, vec!["4/102", "60/64"]);
        assert_eq!(vocab.years, vec![1999]);
    }

    #[test]
    fn find_sets_by_substring() {
        let store = seeded_store();
        let sets = store.find_sets(Some("base"), None).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "Base Set");
    }

    #[test]
    fn find_sets_by_year() {
        let store = seeded_store();
        let sets = store.find_sets(None, Some(1999)).unwrap();
        assert_eq!(sets.len(), 2);
    }

    #[test]
    fn find_sets_name_or_year() {
        let store = seeded_store();
        let sets = store.find_sets(Some("jungle"), Some(1999)).unwrap();
        assert_eq!(sets.len(), 2, "year match widens the candidate pool");
    }

    #[test]
    fn find_sets_without_criteria_is_empty() {
        let store = seeded_store();
        assert!(store.find_sets(None, None).unwrap().is_empty());
    }

    #[test]
    fn find_cards_scoped_to_sets() {
        let store = seeded_store();
        let sets = store.find_sets(Some("base"), None).unwrap();
        let ids: Vec<i64> = sets.iter().map(|s| s.set_id).collect();
        let cards = store
            .find_cards_in_sets(&ids, Some("charizard"), Some("4/102"))
            .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Charizard");

        let misses = store
            .find_cards_in_sets(&ids, Some("pikachu"), None)
            .unwrap();
        assert!(misses.is_empty(), "Pikachu lives in a different set");
    }

    #[test]
    fn find_cards_unscoped() {
        let store = seeded_store();
        let cards = store.find_cards(Some("pikachu"), None).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].number.as_deref(), Some("60/64"));
    }

    #[test]
    fn find_cards_by_number_only() {
        let store = seeded_store();
        let cards = store.find_cards(None, Some("4/102")).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Charizard");
    }

    #[test]
    fn set_by_id_roundtrip() {
        let store = seeded_store();
        let sets = store.find_sets(Some("base"), None).unwrap();
        let found = store.set_by_id(sets[0].set_id).unwrap();
        assert_eq!(found.unwrap().name, "Base Set");
        assert!(store.set_by_id(9999).unwrap().is_none());
    }

    #[test]
    fn upsert_invalidates_cached_vocabulary() {
        let store = seeded_store();
        let before = store.vocabulary().unwrap();
        assert_eq!(before.set_names.len(), 2);
        store
            .upsert_set(&NewSet {
                name: "Fossil".to_string(),
                year: Some(1999),
                series: Some("Base".to_string()),
                card_count: Some(62),
            })
            .unwrap();
        let after = store.vocabulary().unwrap();
        assert_eq!(after.set_names.len(), 3);
    }

    #[test]
    fn upsert_set_is_idempotent() {
        let store = seeded_store();
        let first = store
            .upsert_set(&NewSet {
                name: "Base Set".to_string(),
                year: Some(1999),
                series: Some("Base".to_string()),
                card_count: Some(102),
            })
            .unwrap();
        let second = store
            .upsert_set(&NewSet {
                name: "Base Set".to_string(),
                year: Some(1999),
                series: Some("Base".to_string()),
                card_count: Some(102),
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.vocabulary().unwrap().set_names.len(), 2);
    }
}
