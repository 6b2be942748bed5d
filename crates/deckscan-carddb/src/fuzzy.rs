//! Fuzzy name scoring.
//!
//! The score blends Jaro-Winkler similarity with trigram overlap and a
//! phonetic collision bonus. The formula is deterministic and, together
//! with [`rank`], defines a stable total order over candidates: score
//! descending, then shorter canonical name, then lexicographic.

use crate::phonetic::phonetic_key;

/// Weight of the Jaro-Winkler component.
const JW_WEIGHT: f64 = 0.9;
/// Weight of the trigram Dice component.
const TRIGRAM_WEIGHT: f64 = 0.1;
/// Added when phonetic keys collide.
const PHONETIC_BONUS: f64 = 0.05;

/// Score a normalised query against a normalised candidate, in `[0, 1]`.
#[must_use]
pub fn score(query: &str, candidate: &str) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if query == candidate {
        return 1.0;
    }
    let jw = strsim::jaro_winkler(query, candidate);
    let dice = trigram_dice(query, candidate);
    let base = JW_WEIGHT.mul_add(jw, TRIGRAM_WEIGHT * dice);
    let bonus = if phonetic_key(query) == phonetic_key(candidate) {
        PHONETIC_BONUS
    } else {
        0.0
    };
    (base + bonus).min(1.0)
}

/// Sorted trigram list of a padded string.
#[must_use]
pub fn trigrams(s: &str) -> Vec<String> {
    let padded: Vec<char> = format!(" {s} ").chars().collect();
    if padded.len() < 3 {
        return Vec::new();
    }
    let mut grams: Vec<String> = padded.windows(3).map(|w| w.iter().collect()).collect();
    grams.sort_unstable();
    grams
}

/// Dice coefficient over trigram multisets.
fn trigram_dice(a: &str, b: &str) -> f64 {
    let ga = trigrams(a);
    let gb = trigrams(b);
    if ga.is_empty() || gb.is_empty() {
        return 0.0;
    }
    let mut shared = 0usize;
    let (mut i, mut j) = (0usize, 0usize);
    while i < ga.len() && j < gb.len() {
        match ga[i].cmp(&gb[j]) {
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    #[allow(clippy::cast_precision_loss)]
    {
        2.0 * shared as f64 / (ga.len() + gb.len()) as f64
    }
}

/// The pinned candidate total order: score descending, then shorter name,
/// then lexicographic ascending.
#[must_use]
pub fn rank(a: &(f64, &str), b: &(f64, &str)) -> std::cmp::Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| a.1.len().cmp(&b.1.len()))
        .then_with(|| a.1.cmp(b.1))
}
