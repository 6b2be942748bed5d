//! Deck export serializers.
//!
//! Four line-oriented target formats share one input contract: a
//! [`NormalizedDeck`] whose sections are emitted main-first, each section
//! sorted by quantity descending then canonical name ascending. Output is
//! deterministic to the byte; golden fixtures in the tests pin every format.

mod arena;
mod deckstats;
mod mtgo;
mod tappedout;

pub use arena::ArenaSerializer;
pub use deckstats::DeckstatsSerializer;
pub use mtgo::MtgoSerializer;
pub use tappedout::TappedoutSerializer;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::types::{NormalizedDeck, ResolvedCard, Section};

/// Supported export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// MTG Arena import format (`Deck` / `Sideboard` headers).
    Arena,
    /// Classic MTGO text (`SB:` prefixed sideboard lines).
    Mtgo,
    /// Deckstats text (`<qty>x` counts, `Sideboard:` header).
    Deckstats,
    /// TappedOut plain text (`Sideboard` header).
    Tappedout,
}

impl ExportFormat {
    /// All formats, in documentation order.
    pub const ALL: [Self; 4] = [Self::Arena, Self::Mtgo, Self::Deckstats, Self::Tappedout];

    /// Stable lowercase name, also accepted by [`std::str::FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arena => "arena",
            Self::Mtgo => "mtgo",
            Self::Deckstats => "deckstats",
            Self::Tappedout => "tappedout",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arena" | "mtga" => Ok(Self::Arena),
            "mtgo" => Ok(Self::Mtgo),
            "deckstats" => Ok(Self::Deckstats),
            "tappedout" => Ok(Self::Tappedout),
            other => Err(ScanError::ExportInvalid(format!(
                "unknown export format: {other}"
            ))),
        }
    }
}

/// Serialise `deck` into the requested format.
///
/// # Errors
///
/// Returns [`ScanError::ExportInvalid`] when the deck is malformed (zero
/// quantities or duplicate card ids within a section).
pub fn export_deck(deck: &NormalizedDeck, format: ExportFormat) -> Result<String, ScanError> {
    if !deck.is_well_formed() {
        return Err(ScanError::ExportInvalid(
            "deck has zero quantities or duplicate card ids within a section".to_string(),
        ));
    }
    let text = match format {
        ExportFormat::Arena => ArenaSerializer.serialize(deck),
        ExportFormat::Mtgo => MtgoSerializer.serialize(deck),
        ExportFormat::Deckstats => DeckstatsSerializer.serialize(deck),
        ExportFormat::Tappedout => TappedoutSerializer.serialize(deck),
    };
    Ok(text)
}

/// Cards of one section in the documented stable order.
pub(crate) fn ordered(deck: &NormalizedDeck, section: Section) -> Vec<&ResolvedCard> {
    deck.sorted_section(section)
}
