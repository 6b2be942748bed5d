//! TappedOut plain text format.
//!
//! Plain `<qty> <name>` lines with a bare `Sideboard` header:
//!
//! ```text
//! 4 Island
//! 4 Opt
//!
//! Sideboard
//! 2 Negate
//! ```

use crate::types::{NormalizedDeck, Section};

use super::ordered;

/// Serialises decks into the TappedOut text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct TappedoutSerializer;

impl TappedoutSerializer {
    /// Render `deck` as TappedOut text.
    #[must_use]
    pub fn serialize(&self, deck: &NormalizedDeck) -> String {
        let mut out = String::new();
        let main = ordered(deck, Section::Main);
        for (i, card) in main.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("{} {}", card.quantity, card.canonical_name));
        }
        let side = ordered(deck, Section::Side);
        if !side.is_empty() {
            if !main.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str("Sideboard");
            for card in side {
                out.push('\n');
                out.push_str(&format!("{} {}", card.quantity, card.canonical_name));
            }
        }
        out
    }
}
