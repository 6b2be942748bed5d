//! # deckscan-carddb
//!
//! The card-identity layer: a read-mostly local corpus built from the
//! Scryfall bulk dump, fuzzy name matching over it, and a paced,
//! circuit-broken online client for the lookups the corpus cannot settle.

pub mod client;
pub mod corpus;
pub mod fuzzy;
pub mod pacing;
pub mod phonetic;

use thiserror::Error;

use deckscan_core::ScanError;

pub use client::{NamedCard, ScryfallClient};
pub use corpus::{CardCorpus, CardEntry, CardHit};

/// Card-database failures, offline and online.
#[derive(Error, Debug)]
pub enum CardDbError {
    /// Read attempted before the first corpus build completed.
    #[error("card corpus not ready; run a bulk build first")]
    NotReady,

    /// The bulk dump or cache file could not be parsed.
    #[error("corpus data malformed: {0}")]
    Malformed(String),

    /// Transport-level failure talking to the online database.
    #[error("card database transport: {0}")]
    Http(String),

    /// Unexpected HTTP status from the online database.
    #[error("card database returned HTTP {0}")]
    Status(u16),

    /// The circuit breaker is open; online resolution is skipped.
    #[error("card database circuit breaker open")]
    BreakerOpen,

    /// Cache file I/O.
    #[error("corpus cache IO: {0}")]
    Io(#[from] std::io::Error),

    /// Cache (de)serialisation.
    #[error("corpus cache JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CardDbError> for ScanError {
    fn from(err: CardDbError) -> Self {
        Self::CardDb(err.to_string())
    }
}
