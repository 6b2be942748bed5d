//! The local card corpus.
//!
//! Built from the Scryfall bulk "oracle cards" dump, rebuilt atomically by
//! snapshot swap, and read without locks held across lookups. Until the
//! first build completes the corpus refuses reads with
//! [`CardDbError::NotReady`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use deckscan_core::normalize::normalize;

use crate::fuzzy;
use crate::CardDbError;

/// One canonical card identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEntry {
    /// Scryfall oracle id; the stable card identifier.
    pub oracle_id: String,
    /// Canonical name; for double-faced cards the joined `A // B` form.
    pub name: String,
    /// Set code of the representative printing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_code: Option<String>,
    /// Collector number of the representative printing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_number: Option<String>,
}

/// A successful lookup, scored when it came from the fuzzy path.
#[derive(Debug, Clone, PartialEq)]
pub struct CardHit {
    /// Stable card identifier.
    pub oracle_id: String,
    /// Canonical name.
    pub name: String,
    /// Set code, when known.
    pub set_code: Option<String>,
    /// Collector number, when known.
    pub collector_number: Option<String>,
    /// Fuzzy score; `1.0` for exact hits.
    pub score: f64,
}

/// Immutable index over one corpus build.
struct Snapshot {
    entries: Vec<CardEntry>,
    exact: HashMap<String, u32>,
    trigram: HashMap<String, Vec<u32>>,
    built_at: DateTime<Utc>,
}

/// Subset of a Scryfall bulk card object the corpus needs.
#[derive(Debug, Deserialize)]
struct BulkCard {
    oracle_id: Option<String>,
    name: String,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    set: Option<String>,
    #[serde(default)]
    collector_number: Option<String>,
}

/// Serialised cache layout.
#[derive(Serialize, Deserialize)]
struct CacheFile {
    built_at: DateTime<Utc>,
    entries: Vec<CardEntry>,
}

/// Read-mostly store of canonical card identities.
pub struct CardCorpus {
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl Default for CardCorpus {
    fn default() -> Self {
        Self::new()
    }
}

impl CardCorpus {
    /// An empty, not-yet-ready corpus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
        }
    }

    /// True once the first build has been published.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.snapshot.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Number of cards in the current snapshot; zero before the first build.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().map_or(0, |s| s.entries.len())
    }

    /// True before the first build or for an empty dump.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build time of the current snapshot.
    #[must_use]
    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.current().map(|s| s.built_at)
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().ok().and_then(|s| s.clone())
    }

    /// Parse a Scryfall bulk dump and publish a fresh snapshot. Returns the
    /// entry count.
    ///
    /// # Errors
    ///
    /// [`CardDbError::Malformed`] when the payload is not a bulk card array.
    pub fn build_from_bulk_json(&self, bulk: &[u8]) -> Result<usize, CardDbError> {
        let cards: Vec<BulkCard> = serde_json::from_slice(bulk)
            .map_err(|e| CardDbError::Malformed(format!("bulk dump: {e}")))?;

        let mut seen = std::collections::HashSet::with_capacity(cards.len());
        let mut entries = Vec::with_capacity(cards.len());
        for card in cards {
            let Some(oracle_id) = card.oracle_id else {
                continue;
            };
            if let Some(lang) = &card.lang {
                if lang != "en" {
                    continue;
                }
            }
            if !seen.insert(oracle_id.clone()) {
                continue;
            }
            entries.push(CardEntry {
                oracle_id,
                name: card.name,
                set_code: card.set,
                collector_number: card.collector_number,
            });
        }
        let count = entries.len();
        self.publish(entries, Utc::now());
        Ok(count)
    }

    /// Publish a snapshot directly from entries. Used by cache loads and
    /// tests.
    pub fn build_from_entries(&self, entries: Vec<CardEntry>) {
        self.publish(entries, Utc::now());
    }

    /// Atomic snapshot swap: readers keep whatever `Arc` they already hold.
    fn publish(&self, entries: Vec<CardEntry>, built_at: DateTime<Utc>) {
        let mut exact: HashMap<String, u32> = HashMap::with_capacity(entries.len() * 2);
        let mut trigram: HashMap<String, Vec<u32>> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let idx = idx as u32;
            let joined = normalize(&entry.name);
            for gram in fuzzy::trigrams(&joined) {
                trigram.entry(gram).or_default().push(idx);
            }
            exact.entry(joined.clone()).or_insert(idx);
            // Each face of a double-faced card is lookup-able on its own.
            if joined.contains("//") {
                for face in joined.split("//") {
                    let face = face.trim();
                    if !face.is_empty() {
                        exact.entry(face.to_string()).or_insert(idx);
                    }
                }
            }
        }
        for postings in trigram.values_mut() {
            postings.dedup();
        }

        let snapshot = Arc::new(Snapshot {
            entries,
            exact,
            trigram,
            built_at,
        });
        if let Ok(mut guard) = self.snapshot.write() {
            log::info!(
                "published card corpus snapshot: {} entries",
                snapshot.entries.len()
            );
            *guard = Some(snapshot);
        }
    }

    /// Exact lookup by normalised name (joined form or either face).
    ///
    /// # Errors
    ///
    /// [`CardDbError::NotReady`] before the first build.
    pub fn lookup_exact(&self, normalized_name: &str) -> Result<Option<CardHit>, CardDbError> {
        let snapshot = self.current().ok_or(CardDbError::NotReady)?;
        Ok(snapshot
            .exact
            .get(normalized_name)
            .map(|&idx| hit(&snapshot.entries[idx as usize], 1.0)))
    }

    /// Top-`k` fuzzy candidates for a normalised name, best first.
    ///
    /// Candidates are pre-filtered through the trigram index, scored with
    /// [`fuzzy::score`], and ordered by the pinned total order (score
    /// descending, shorter name, lexicographic).
    ///
    /// # Errors
    ///
    /// [`CardDbError::NotReady`] before the first build.
    pub fn fuzzy_candidates(
        &self,
        normalized_name: &str,
        k: usize,
    ) -> Result<Vec<CardHit>, CardDbError> {
        let snapshot = self.current().ok_or(CardDbError::NotReady)?;
        if k == 0 || normalized_name.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidate_ids: Vec<u32> = fuzzy::trigrams(normalized_name)
            .iter()
            .filter_map(|gram| snapshot.trigram.get(gram))
            .flatten()
            .copied()
            .collect();
        candidate_ids.sort_unstable();
        candidate_ids.dedup();

        let mut scored: Vec<(f64, &CardEntry)> = candidate_ids
            .into_iter()
            .map(|idx| {
                let entry = &snapshot.entries[idx as usize];
                (fuzzy::score(normalized_name, &normalize(&entry.name)), entry)
            })
            .collect();
        scored.sort_by(|a, b| fuzzy::rank(&(a.0, a.1.name.as_str()), &(b.0, b.1.name.as_str())));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| hit(entry, score))
            .collect())
    }

    /// Write the current snapshot to a cache file, atomically.
    ///
    /// # Errors
    ///
    /// [`CardDbError::NotReady`] before the first build, or I/O failures.
    pub fn save_cache(&self, path: &Path) -> Result<(), CardDbError> {
        let snapshot = self.current().ok_or(CardDbError::NotReady)?;
        let cache = CacheFile {
            built_at: snapshot.built_at,
            entries: snapshot.entries.clone(),
        };
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&cache)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load and publish a snapshot from a cache file.
    ///
    /// # Errors
    ///
    /// I/O or deserialisation failures; the current snapshot is untouched
    /// on error.
    pub fn load_cache(&self, path: &Path) -> Result<usize, CardDbError> {
        let bytes = std::fs::read(path)?;
        let cache: CacheFile = serde_json::from_slice(&bytes)?;
        let count = cache.entries.len();
        self.publish(cache.entries, cache.built_at);
        Ok(count)
    }
}

fn hit(entry: &CardEntry, score: f64) -> CardHit {
    CardHit {
        oracle_id: entry.oracle_id.clone(),
        name: entry.name.clone(),
        set_code: entry.set_code.clone(),
        collector_number: entry.collector_number.clone(),
        score,
    }
}
