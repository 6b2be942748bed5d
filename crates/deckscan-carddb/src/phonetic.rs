//! Phonetic keys for the fuzzy-score collision bonus.
//!
//! A compact consonant-class code in the Soundex family: names that sound
//! alike collapse to the same key, which earns a small score bonus during
//! fuzzy matching. The exact classes matter less than determinism and
//! stability across rebuilds.

/// Maximum key length; longer names truncate.
const MAX_KEY_LEN: usize = 8;

/// Compute the phonetic key of a (normalised or raw) name.
///
/// Letters are mapped to consonant classes, vowels survive only in leading
/// position, runs collapse, and non-letters separate words without
/// contributing to the key.
#[must_use]
pub fn phonetic_key(name: &str) -> String {
    let mut key = String::with_capacity(MAX_KEY_LEN);
    let mut last: Option<char> = None;
    let mut word_start = true;

    for c in name.chars() {
        if key.len() >= MAX_KEY_LEN {
            break;
        }
        let upper = c.to_ascii_uppercase();
        if !upper.is_ascii_alphabetic() {
            word_start = true;
            last = None;
            continue;
        }
        let class = match upper {
            'B' | 'P' => 'B',
            'F' | 'V' => 'F',
            'C' | 'K' | 'Q' | 'G' | 'J' => 'K',
            'S' | 'Z' | 'X' => 'S',
            'D' | 'T' => 'D',
            'M' | 'N' => 'M',
            'L' => 'L',
            'R' => 'R',
            'H' | 'W' | 'Y' => '\0',
            vowel => {
                if word_start {
                    vowel
                } else {
                    '\0'
                }
            }
        };
        word_start = false;
        if class == '\0' {
            continue;
        }
        if last != Some(class) {
            key.push(class);
            last = Some(class);
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similar_sounding_names_collide() {
        assert_eq!(phonetic_key("forest"), phonetic_key("forst"));
        assert_eq!(phonetic_key("lightning bolt"), phonetic_key("lightening bolt"));
    }

    #[test]
    fn different_names_diverge() {
        assert_ne!(phonetic_key("island"), phonetic_key("swamp"));
        assert_ne!(phonetic_key("opt"), phonetic_key("negate"));
    }

    #[test]
    fn deterministic_and_bounded() {
        let key = phonetic_key("Delver of Secrets // Insectile Aberration");
        assert_eq!(key, phonetic_key("Delver of Secrets // Insectile Aberration"));
        assert!(key.len() <= MAX_KEY_LEN);
    }

    #[test]
    fn leading_vowel_survives() {
        assert_eq!(phonetic_key("island"), "ISLMD");
        assert_eq!(phonetic_key("opt"), "OBD");
    }
}
