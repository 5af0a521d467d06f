//! Parses noisy OCR/label text into structured candidate fields.
//!
//! Parsing never fails: malformed or empty input yields a `ParsedFields`
//! with everything unset and zero confidence. Extraction order matters for
//! ambiguous numbers: year and grade are claimed first and excluded from
//! the card-number fallback pool.

use std::sync::OnceLock;

use chrono::Datelike;
use regex::Regex;

use crate::similarity::expand_set_abbreviation;
use crate::types::{ParsedFields, Vocabulary};

/// Parse-confidence weights per extracted field.
const WEIGHT_SET_NAME: f64 = 0.25;
const WEIGHT_SUBJECT_NAME: f64 = 0.20;
const WEIGHT_CARD_NUMBER: f64 = 0.15;
const WEIGHT_YEAR: f64 = 0.15;
const WEIGHT_GRADE: f64 = 0.10;
const WEIGHT_RARITY: f64 = 0.10;
const WEIGHT_LANGUAGE: f64 = 0.05;

const EARLIEST_YEAR: i32 = 1998;

/// Rarity keywords, most specific first.
const RARITY_KEYWORDS: &[&str] = &[
    "SECRET RARE",
    "ULTRA RARE",
    "HOLO RARE",
    "RARE HOLO",
    "PROMO",
    "RARE",
    "UNCOMMON",
    "COMMON",
];

const LANGUAGE_KEYWORDS: &[&str] = &[
    "JAPANESE",
    "KOREAN",
    "CHINESE",
    "GERMAN",
    "FRENCH",
    "ITALIAN",
    "SPANISH",
    "PORTUGUESE",
    "DUTCH",
    "ENGLISH",
];

/// Words that never form a subject or set name on their own.
const STOPWORDS: &[&str] = &["PSA", "GRADE", "POKEMON", "NO", "HOLO", "EDITION", "1ST", "ED"];

fn year4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid regex"))
}

fn grade_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:PSA|GRADE)\s*:?\s*(10(?:\.0)?|[1-9](?:\.[05])?)\b").expect("valid regex")
    })
}

fn slash_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,3})\s*/\s*(\d{1,3})\b").expect("valid regex"))
}

fn hash_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\s*(\d{1,3})\b").expect("valid regex"))
}

fn no_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bNO\.?\s*(\d{1,3})\b").expect("valid regex"))
}

fn set_before_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Z&'.\-]*(?:\s+[A-Z][A-Z&'.\-]*){0,3})\s+(?:19|20)\d{2}\b")
            .expect("valid regex")
    })
}

fn set_before_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Z&'.\-]*(?:\s+[A-Z][A-Z&'.\-]*){0,3})\s+\d{1,3}\s*/\s*\d{1,3}\b")
            .expect("valid regex")
    })
}

fn subject_before_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Z'.\-]{2,}(?:\s+[A-Z][A-Z'.\-]{2,}){0,2})\s+#?\d")
            .expect("valid regex")
    })
}

/// Parse raw label text against a reference vocabulary.
pub fn parse(raw_text: &str, vocab: &Vocabulary) -> ParsedFields {
    let normalized = normalize(raw_text);
    if normalized.is_empty() {
        return ParsedFields::empty(raw_text);
    }

    // Numbers are claimed in priority order: year, grade, card number.
    let (year, year_token_value) = extract_year(&normalized);
    let grade = extract_grade(&normalized);
    let card_number = extract_card_number(&normalized, year_token_value, grade);

    let set_name = extract_set_name(&normalized, vocab);
    let subject_name = extract_subject_name(&normalized, vocab, set_name.as_deref());
    let rarity = extract_rarity(&normalized);
    let language = extract_language(&normalized);
    let is_holo = contains_word(&normalized, "HOLO") || contains_word(&normalized, "HOLOGRAPHIC");
    let is_first_edition = normalized.contains("1ST EDITION")
        || normalized.contains("1ST ED")
        || normalized.contains("FIRST EDITION");

    let mut confidence = 0.0;
    if set_name.is_some() {
        confidence += WEIGHT_SET_NAME;
    }
    if subject_name.is_some() {
        confidence += WEIGHT_SUBJECT_NAME;
    }
    if card_number.is_some() {
        confidence += WEIGHT_CARD_NUMBER;
    }
    if year.is_some() {
        confidence += WEIGHT_YEAR;
    }
    if grade.is_some() {
        confidence += WEIGHT_GRADE;
    }
    if rarity.is_some() {
        confidence += WEIGHT_RARITY;
    }
    if language.is_some() {
        confidence += WEIGHT_LANGUAGE;
    }

    ParsedFields {
        original_text: raw_text.to_string(),
        normalized_text: normalized,
        set_name,
        subject_name,
        card_number,
        year,
        grade,
        rarity,
        language,
        is_holo,
        is_first_edition,
        confidence,
    }
}

fn normalize(raw: &str) -> String {
    raw.to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the year and, for two-digit forms, the raw token value so the
/// card-number fallback can exclude it.
fn extract_year(text: &str) -> (Option<i32>, Option<i64>) {
    let current_year = chrono::Utc::now().year();

    for cap in year4_re().captures_iter(text) {
        if let Ok(year) = cap[1].parse::<i32>() {
            if (EARLIEST_YEAR..=current_year).contains(&year) {
                return (Some(year), None);
            }
        }
    }

    // Two-digit fallback, only as a standalone token (optionally
    // apostrophe-prefixed, e.g. "'99"). Century heuristic: >=98 is 1900s,
    // <=current two-digit year is 2000s.
    for token in text.split_whitespace() {
        let token = token.strip_prefix('\'').unwrap_or(token);
        if token.len() == 2 && token.chars().all(|c| c.is_ascii_digit()) {
            let value: i32 = match token.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let year = if value >= 98 {
                1900 + value
            } else if value <= current_year % 100 {
                2000 + value
            } else {
                continue;
            };
            if (EARLIEST_YEAR..=current_year).contains(&year) {
                return (Some(year), Some(value as i64));
            }
        }
    }

    (None, None)
}

fn extract_grade(text: &str) -> Option<f64> {
    let cap = grade_re().captures(text)?;
    let grade: f64 = cap[1].parse().ok()?;
    let half_steps = grade * 2.0;
    if (1.0..=10.0).contains(&grade) && (half_steps - half_steps.round()).abs() < 1e-9 {
        Some(grade)
    } else {
        None
    }
}

fn extract_card_number(
    text: &str,
    year_token_value: Option<i64>,
    grade: Option<f64>,
) -> Option<String> {
    if let Some(cap) = slash_number_re().captures(text) {
        return Some(format!("{}/{}", &cap[1], &cap[2]));
    }
    if let Some(cap) = hash_number_re().captures(text) {
        return Some(cap[1].to_string());
    }
    if let Some(cap) = no_number_re().captures(text) {
        return Some(cap[1].to_string());
    }

    // Fallback: first isolated integer in [1, 500] not already claimed as
    // the year or grade.
    for token in text.split_whitespace() {
        if token.len() <= 3 && !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            let value: i64 = match token.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if !(1..=500).contains(&value) {
                continue;
            }
            if year_token_value == Some(value) {
                continue;
            }
            if grade.is_some_and(|g| (g - value as f64).abs() < 1e-9) {
                continue;
            }
            return Some(value.to_string());
        }
    }
    None
}

fn extract_set_name(text: &str, vocab: &Vocabulary) -> Option<String> {
    // Exact vocabulary scan first; longest match wins.
    if let Some(name) = longest_vocab_match(text, &vocab.set_names) {
        return Some(name);
    }

    // Abbreviation table, whole tokens only.
    for token in text.split_whitespace() {
        if let Some(full) = expand_set_abbreviation(token) {
            return Some(title_case(full));
        }
    }

    // Pattern fallback: a word run anchored on a year, then on a "#/#" token.
    for re in [set_before_year_re(), set_before_number_re()] {
        if let Some(cap) = re.captures(text) {
            let run = cap[1].trim().to_string();
            if !is_all_stopwords(&run) {
                return Some(title_case(&run));
            }
        }
    }
    None
}

fn extract_subject_name(text: &str, vocab: &Vocabulary, set_name: Option<&str>) -> Option<String> {
    if let Some(name) = longest_vocab_match(text, &vocab.subject_names) {
        return Some(name);
    }

    let cap = subject_before_number_re().captures(text)?;
    let run = cap[1].trim().to_string();
    if is_all_stopwords(&run) {
        return None;
    }
    // Do not reuse the word run already claimed as the set name.
    if let Some(set_name) = set_name {
        if set_name.to_uppercase() == run {
            return None;
        }
    }
    Some(title_case(&run))
}

fn extract_rarity(text: &str) -> Option<String> {
    RARITY_KEYWORDS
        .iter()
        .find(|kw| contains_word(text, kw))
        .map(|kw| title_case(kw))
}

fn extract_language(text: &str) -> Option<String> {
    LANGUAGE_KEYWORDS
        .iter()
        .find(|kw| contains_word(text, kw))
        .map(|kw| title_case(kw))
}

/// Longest vocabulary entry appearing in the text on word boundaries,
/// returned in its reference casing.
fn longest_vocab_match(text: &str, vocab: &[String]) -> Option<String> {
    let mut best: Option<&String> = None;
    for name in vocab {
        if name.is_empty() {
            continue;
        }
        if contains_word(text, &name.to_uppercase()) {
            match best {
                Some(current) if current.len() >= name.len() => {}
                _ => best = Some(name),
            }
        }
    }
    best.cloned()
}

/// Substring search constrained to non-alphanumeric boundaries.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let ok_before = begin == 0
            || !haystack[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let ok_after = end == haystack.len()
            || !haystack[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if ok_before && ok_after {
            return true;
        }
        start = begin + needle.len().max(1);
    }
    false
}

fn is_all_stopwords(run: &str) -> bool {
    run.split_whitespace().all(|w| STOPWORDS.contains(&w))
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
