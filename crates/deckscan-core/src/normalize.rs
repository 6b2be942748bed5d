//! Card-name normalisation.
//!
//! Pure text transformation used both when building corpus indices and when
//! resolving OCR output, so the two sides always agree on the key space.
//! The transformation is idempotent: `normalize(normalize(x)) == normalize(x)`.

use unicode_normalization::char::canonical_combining_class;
use unicode_normalization::UnicodeNormalization;

/// Separator used for the canonical double-faced form `"A // B"`.
pub const FACE_SEPARATOR: &str = " // ";

/// Normalise a card name for index lookup.
///
/// Applied in order: NFKD decomposition with combining marks stripped, NFC
/// recomposition, lowercasing, unicode dash/quote folding, whitespace
/// collapse, and double-faced `//` canonicalisation.
#[must_use]
pub fn normalize(name: &str) -> String {
    let stripped: String = name
        .nfkd()
        .filter(|c| canonical_combining_class(*c) == 0)
        .collect::<String>()
        .nfc()
        .collect();

    let folded: String = stripped
        .to_lowercase()
        .chars()
        .map(fold_punctuation)
        .collect();

    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    canonicalize_faces(&collapsed)
}

fn fold_punctuation(c: char) -> char {
    match c {
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
        _ => c,
    }
}

/// Rewrite any `//` separator to exactly one space on either side.
fn canonicalize_faces(name: &str) -> String {
    if !name.contains("//") {
        return name.to_string();
    }
    let parts: Vec<&str> = name.split("//").map(str::trim).collect();
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(FACE_SEPARATOR)
}

/// Split a (normalised or raw) name into its faces.
///
/// `"fire // ice"` yields `("fire", Some("ice"))`; a single-faced name
/// yields `(name, None)`.
#[must_use]
pub fn split_faces(name: &str) -> (String, Option<String>) {
    match name.split_once("//") {
        Some((front, back)) => (
            front.trim().to_string(),
            Some(back.trim().to_string()).filter(|b| !b.is_empty()),
        ),
        None => (name.trim().to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(normalize("Lim-Dûl's Vault"), "lim-dul's vault");
        assert_eq!(normalize("Séance"), "seance");
        assert_eq!(normalize("Jötun Grunt"), "jotun grunt");
    }

    #[test]
    fn folds_unicode_punctuation() {
        assert_eq!(normalize("Lim\u{2011}D\u{fb}l\u{2019}s Vault"), "lim-dul's vault");
        assert_eq!(normalize("\u{201C}Ach! Hans, Run!\u{201D}"), "\"ach! hans, run!\"");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  Opt \t "), "opt");
        assert_eq!(normalize("Snapcaster   Mage"), "snapcaster mage");
    }

    #[test]
    fn canonicalizes_double_faced_forms() {
        assert_eq!(normalize("Fire//Ice"), "fire // ice");
        assert_eq!(normalize("Fire  //   Ice"), "fire // ice");
        assert_eq!(normalize("Delver of Secrets // Insectile Aberration"),
                   "delver of secrets // insectile aberration");
    }

    #[test]
    fn split_faces_both_forms() {
        assert_eq!(split_faces("fire // ice"), ("fire".into(), Some("ice".into())));
        assert_eq!(split_faces("opt"), ("opt".into(), None));
        assert_eq!(split_faces("fire //"), ("fire".into(), None));
    }

    proptest! {
        #[test]
        fn idempotent(s in "\\PC{0,60}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn output_has_no_double_spaces(s in "\\PC{0,60}") {
            let n = normalize(&s);
            prop_assert!(!n.contains("  "));
            prop_assert_eq!(n.trim(), &n);
        }
    }
}
