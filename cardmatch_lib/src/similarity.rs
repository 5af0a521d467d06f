//! String-similarity primitives used by the fuzzy matcher and scorer.
//!
//! Each algorithm is one enum variant; the combined score used for fuzzy
//! vocabulary matching is a fixed weighted blend of all four. All functions
//! return values in [0, 1] and are case-insensitive.

use std::collections::HashSet;

/// One similarity algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    /// `(max_len - edit_distance) / max_len`.
    LevenshteinRatio,
    Jaro,
    /// Substring containment, falling back to longest-common-substring
    /// ratio when neither string contains the other.
    Containment,
    /// Jaccard overlap of whitespace-split token sets.
    TokenSet,
}

/// Blend weights for the combined fuzzy score.
const COMBINED_WEIGHTS: &[(SimilarityMetric, f64)] = &[
    (SimilarityMetric::LevenshteinRatio, 0.30),
    (SimilarityMetric::Jaro, 0.25),
    (SimilarityMetric::Containment, 0.25),
    (SimilarityMetric::TokenSet, 0.20),
];

/// Known set-name abbreviations, as they appear on grading labels.
pub(crate) const SET_ABBREVIATIONS: &[(&str, &str)] = &[
    ("BS", "BASE SET"),
    ("BS2", "BASE SET 2"),
    ("JU", "JUNGLE"),
    ("FO", "FOSSIL"),
    ("TR", "TEAM ROCKET"),
    ("GH", "GYM HEROES"),
    ("GC", "GYM CHALLENGE"),
    ("NG", "NEO GENESIS"),
    ("ND", "NEO DISCOVERY"),
    ("NR", "NEO REVELATION"),
    ("NDE", "NEO DESTINY"),
    ("LC", "LEGENDARY COLLECTION"),
    ("SM", "SUN & MOON"),
    ("SWSH", "SWORD & SHIELD"),
];

/// Known rarity abbreviations.
const RARITY_ABBREVIATIONS: &[(&str, &str)] = &[
    ("C", "COMMON"),
    ("U", "UNCOMMON"),
    ("R", "RARE"),
    ("HR", "HOLO RARE"),
    ("UR", "ULTRA RARE"),
    ("SR", "SECRET RARE"),
];

impl SimilarityMetric {
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        match self {
            Self::LevenshteinRatio => strsim::normalized_levenshtein(&a, &b),
            Self::Jaro => strsim::jaro(&a, &b),
            Self::Containment => containment(&a, &b),
            Self::TokenSet => token_set(&a, &b),
        }
    }
}

/// Weighted blend of all four metrics.
pub fn combined_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    COMBINED_WEIGHTS
        .iter()
        .map(|(metric, weight)| weight * metric.score(a, b))
        .sum()
}

fn containment(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let longer_len = longer.chars().count() as f64;
    if longer.contains(shorter) {
        shorter.chars().count() as f64 / longer_len
    } else {
        longest_common_substring(a, b) as f64 / longer_len
    }
}

fn longest_common_substring(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    let mut best = 0;
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] { prev[j - 1] + 1 } else { 0 };
            best = best.max(curr[j]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

fn token_set(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

/// Specialized comparator for card numbers like "4/102".
///
/// Exact match scores 1.0. Otherwise: primary-number equality contributes
/// 0.7, "/" format consistency 0.2, and residual string similarity the
/// remaining 0.1.
pub fn card_number_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_uppercase();
    let b = b.trim().to_uppercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let mut score = 0.0;
    if let (Some(pa), Some(pb)) = (primary_number(&a), primary_number(&b)) {
        if pa == pb {
            score += 0.7;
        }
    }
    if a.contains('/') == b.contains('/') {
        score += 0.2;
    }
    score + 0.1 * strsim::normalized_levenshtein(&a, &b)
}

fn primary_number(number: &str) -> Option<i64> {
    let head = number.split('/').next()?;
    head.trim().parse::<i64>().ok()
}

/// Set-name comparator: expand known abbreviations on both sides, then
/// exact equality or Levenshtein ratio.
pub fn set_name_similarity(a: &str, b: &str) -> f64 {
    let a = expand_set_name(a);
    let b = expand_set_name(b);
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Expand a set-name abbreviation if the whole token is one.
pub fn expand_set_abbreviation(token: &str) -> Option<&'static str> {
    let token = token.trim().to_uppercase();
    SET_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == token)
        .map(|(_, full)| *full)
}

fn expand_set_name(name: &str) -> String {
    match expand_set_abbreviation(name) {
        Some(full) => full.to_string(),
        None => name.trim().to_uppercase(),
    }
}

/// Rarity comparator: abbreviation-aware equality, else Levenshtein ratio.
pub fn rarity_similarity(a: &str, b: &str) -> f64 {
    let a = expand_rarity(a);
    let b = expand_rarity(b);
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

fn expand_rarity(rarity: &str) -> String {
    let upper = rarity.trim().to_uppercase();
    RARITY_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == upper)
        .map(|(_, full)| full.to_string())
        .unwrap_or(upper)
}
