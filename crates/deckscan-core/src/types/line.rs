//! Parsed decklist lines.

use serde::{Deserialize, Serialize};

/// Deck section a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Main deck.
    Main,
    /// Sideboard.
    Side,
}

/// One fuzzy-resolution candidate for a parsed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable card identifier from the card database.
    pub card_id: String,
    /// Canonical card name.
    pub name: String,
    /// Match score in `[0, 1]`.
    pub score: f64,
}

/// A quantity/name tuple recovered from OCR output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// Card count. Parse-time values are within `[1, 99]`; merged duplicate
    /// lines may exceed that range.
    pub quantity: u32,
    /// Name text as recognised, annotations stripped.
    pub raw_name: String,
    /// Section the line was read in.
    pub section: Section,
    /// Ordered fuzzy candidates attached by the resolver. Empty until the
    /// fuzzy stage runs and for lines resolved exactly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
}

impl ParsedLine {
    /// Create a parsed line with no candidates.
    #[must_use]
    pub const fn new(quantity: u32, raw_name: String, section: Section) -> Self {
        Self {
            quantity,
            raw_name,
            section,
            candidates: Vec::new(),
        }
    }
}

/// Source-format guess derived from aggregate span characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    /// MTG Arena client screenshot.
    Arena,
    /// MTGO client screenshot.
    Mtgo,
    /// Moxfield web export.
    Moxfield,
    /// MTGGoldfish web export.
    Mtggoldfish,
    /// Archidekt web export.
    Archidekt,
    /// Photograph of a physical list.
    Photograph,
    /// No recognisable cues.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_omitted_from_json_when_empty() {
        let line = ParsedLine::new(4, "opt".into(), Section::Main);
        let json = serde_json::to_string(&line).unwrap();
        assert!(!json.contains("candidates"));
    }

    #[test]
    fn section_serde() {
        assert_eq!(serde_json::to_string(&Section::Side).unwrap(), "\"side\"");
    }
}
