//! Decklist parsing: OCR spans to `(quantity, name, section)` tuples.
//!
//! Tolerant by design: lines that fit no grammar are dropped and counted,
//! never fatal. Section segmentation, source-format hinting, the MTGO
//! "59+1 basic lands" correction, and adjacent-duplicate merging all
//! happen here, in that order.

use once_cell::sync::Lazy;
use regex::Regex;

use deckscan_core::normalize::normalize;
use deckscan_core::types::{DeckWarning, FormatHint, OcrRun, ParsedLine, Section, WarningCode};

/// `<qty>[x]? <name>` with the quantity range checked after capture so that
/// `00` and `100` are rejected by value, not by the pattern.
static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d{1,3})\s*x?\s+(.+?)\s*$").expect("line regex"));

/// Trailing set/collector annotations in parentheses or brackets.
static ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[][^\)\]]*[\)\]]\s*$").expect("annotation regex"));

/// A sideboard divider token, optionally decorated (`Sideboard`, `SB:`,
/// `Side board (15)`).
static DIVIDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(side\s?board|sb)\b\s*:?\s*(\(\d+\))?\s*$").expect("divider regex"));

/// `SB: <qty> <name>` convention: a single side-section line.
static SB_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*sb:\s*(.+)$").expect("sb line regex"));

/// MTGO pane headers such as `24 Lands` or `18 Creatures`.
static MTGO_PANE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\d+\s+(lands?|creatures?|spells?|instants?|sorceries|other)\b")
        .expect("pane regex")
});

/// Structural header tokens that are expected non-card lines, not noise.
const HEADER_TOKENS: [&str; 3] = ["deck", "companion", "commander"];

/// Basic land names eligible for the MTGO 59+1 correction.
const BASIC_LANDS: [&str; 10] = [
    "plains",
    "island",
    "swamp",
    "mountain",
    "forest",
    "snow-covered plains",
    "snow-covered island",
    "snow-covered swamp",
    "snow-covered mountain",
    "snow-covered forest",
];

/// Mean confidences below this suggest a photographed list.
const PHOTOGRAPH_CONFIDENCE: f32 = 0.70;

/// Everything the parser recovered from one OCR run.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// Main-deck lines in reading order.
    pub main: Vec<ParsedLine>,
    /// Sideboard lines in reading order.
    pub side: Vec<ParsedLine>,
    /// Source-format guess.
    pub hint: FormatHint,
    /// Lines that fit no grammar.
    pub unparseable: usize,
    /// Warnings raised during parsing.
    pub warnings: Vec<DeckWarning>,
}

/// Parse one qty-name line. Returns `None` when the text does not fit the
/// grammar or the quantity falls outside `[1, 99]`.
#[must_use]
pub fn parse_line(text: &str) -> Option<(u32, String)> {
    let stripped = strip_annotations(text);
    let captures = LINE_RE.captures(&stripped)?;
    let quantity: u32 = captures.get(1)?.as_str().parse().ok()?;
    if !(1..=99).contains(&quantity) {
        return None;
    }
    let name = captures.get(2)?.as_str().trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some((quantity, name))
}

fn strip_annotations(text: &str) -> String {
    let mut current = text.trim().to_string();
    while let Some(m) = ANNOTATION_RE.find(&current) {
        if m.start() == 0 {
            break;
        }
        current.truncate(m.start());
        current = current.trim_end().to_string();
    }
    current
}

/// Count spans that parse as qty-name lines; the strategy's selection and
/// fallback triggers run on this.
#[must_use]
pub fn count_qty_lines(run: &OcrRun, min_span_confidence: f32) -> usize {
    run.usable_spans(min_span_confidence)
        .filter(|s| {
            let text = s.text.trim();
            if MTGO_PANE_RE.is_match(text) {
                return false;
            }
            parse_line(text).is_some()
                || SB_LINE_RE
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .is_some_and(|rest| parse_line(rest.as_str()).is_some())
        })
        .count()
}

/// Parse a full OCR run into sectioned lines plus diagnostics.
#[must_use]
pub fn parse_run(run: &OcrRun, min_span_confidence: f32) -> ParseOutcome {
    let hint = detect_hint(run, min_span_confidence);

    let mut main: Vec<ParsedLine> = Vec::new();
    let mut side: Vec<ParsedLine> = Vec::new();
    let mut unparseable = 0usize;
    let mut section = Section::Main;

    for span in run.usable_spans(min_span_confidence) {
        let text = span.text.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(captures) = SB_LINE_RE.captures(text) {
            let rest = captures.get(1).map_or("", |m| m.as_str());
            match parse_line(rest) {
                Some((quantity, name)) => {
                    side.push(ParsedLine::new(quantity, name, Section::Side));
                }
                None => unparseable += 1,
            }
            continue;
        }

        if DIVIDER_RE.is_match(text) {
            section = Section::Side;
            continue;
        }

        // MTGO pane headers ("24 Lands") fit the qty-name grammar but are
        // structural, never cards.
        if MTGO_PANE_RE.is_match(text) {
            continue;
        }

        match parse_line(text) {
            Some((quantity, name)) => {
                let line = ParsedLine::new(quantity, name, section);
                match section {
                    Section::Main => main.push(line),
                    Section::Side => side.push(line),
                }
            }
            None => {
                let lowered = text.to_lowercase();
                if !HEADER_TOKENS.iter().any(|t| lowered == *t) {
                    unparseable += 1;
                }
            }
        }
    }

    let mut warnings = Vec::new();
    if unparseable > 0 {
        warnings.push(DeckWarning::new(
            WarningCode::UnparseableLines,
            format!("{unparseable} line(s) did not parse"),
        ));
    }

    if hint == FormatHint::Mtgo {
        apply_mtgo_land_fix(&mut main, &mut warnings);
    }

    merge_adjacent_duplicates(&mut main);
    merge_adjacent_duplicates(&mut side);

    ParseOutcome {
        main,
        side,
        hint,
        unparseable,
        warnings,
    }
}

/// Guess the source format from sentinel strings and aggregate span
/// characteristics. Deterministic for a given run.
fn detect_hint(run: &OcrRun, min_span_confidence: f32) -> FormatHint {
    let mut saw_deck_header = false;
    let mut saw_sideboard_header = false;
    let mut saw_mtgo_pane = false;

    for span in run.usable_spans(min_span_confidence) {
        let lowered = span.text.to_lowercase();
        if lowered.contains("moxfield") {
            return FormatHint::Moxfield;
        }
        if lowered.contains("mtggoldfish") {
            return FormatHint::Mtggoldfish;
        }
        if lowered.contains("archidekt") {
            return FormatHint::Archidekt;
        }
        let trimmed = lowered.trim();
        if trimmed == "deck" {
            saw_deck_header = true;
        }
        if trimmed == "sideboard" {
            saw_sideboard_header = true;
        }
        if lowered.contains("mtgo") || MTGO_PANE_RE.is_match(span.text.trim()) {
            saw_mtgo_pane = true;
        }
    }

    if saw_deck_header && saw_sideboard_header {
        return FormatHint::Arena;
    }
    if saw_mtgo_pane {
        return FormatHint::Mtgo;
    }
    if run.mean_confidence < PHOTOGRAPH_CONFIDENCE && !run.is_empty() {
        return FormatHint::Photograph;
    }
    FormatHint::Unknown
}

fn is_basic_land(raw_name: &str) -> bool {
    let normalized = normalize(raw_name);
    BASIC_LANDS.contains(&normalized.as_str())
}

/// Correct the MTGO rendering defect that splits a basic land into a
/// 59-copy line plus a 1-copy line.
///
/// The fix only rewrites when corroborating evidence exists: another,
/// different basic land in the same section. The corrected count is the
/// one that brings the main section to 60 cards; when that lands outside
/// `[1, 99]` the pair is left alone and flagged suspect instead.
fn apply_mtgo_land_fix(main: &mut Vec<ParsedLine>, warnings: &mut Vec<DeckWarning>) {
    let pair = main.windows(2).enumerate().find_map(|(i, pair)| {
        let (a, b) = (&pair[0], &pair[1]);
        let quantities = (a.quantity, b.quantity);
        let split = quantities == (59, 1) || quantities == (1, 59);
        if split && is_basic_land(&a.raw_name) && normalize(&a.raw_name) == normalize(&b.raw_name) {
            Some(i)
        } else {
            None
        }
    });
    let Some(index) = pair else {
        return;
    };

    let land = normalize(&main[index].raw_name);
    let has_evidence = main
        .iter()
        .enumerate()
        .any(|(i, line)| i != index && i != index + 1 && is_basic_land(&line.raw_name)
            && normalize(&line.raw_name) != land);

    if !has_evidence {
        warnings.push(DeckWarning::new(
            WarningCode::MtgoLandSuspect,
            format!("59+1 split of {land} left untouched: no corroborating basics"),
        ));
        return;
    }

    let other_sum: u32 = main
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index && *i != index + 1)
        .map(|(_, line)| line.quantity)
        .sum();
    let corrected = 60u32.saturating_sub(other_sum);
    if !(1..=99).contains(&corrected) {
        warnings.push(DeckWarning::new(
            WarningCode::MtgoLandSuspect,
            format!("59+1 split of {land} left untouched: implied count {corrected}"),
        ));
        return;
    }

    let raw_name = main[index].raw_name.clone();
    main.splice(
        index..index + 2,
        [ParsedLine::new(corrected, raw_name, Section::Main)],
    );
    warnings.push(DeckWarning::new(
        WarningCode::MtgoLandFixApplied,
        format!("rewrote 59+1 {land} to {corrected}"),
    ));
    log::info!("applied MTGO land fix: {land} -> {corrected}");
}

/// Merge adjacent duplicate lines `(q1, n)` + `(q2, n)` into `(q1+q2, n)`.
fn merge_adjacent_duplicates(lines: &mut Vec<ParsedLine>) {
    let mut merged: Vec<ParsedLine> = Vec::with_capacity(lines.len());
    for line in lines.drain(..) {
        match merged.last_mut() {
            Some(last)
                if normalize(&last.raw_name) == normalize(&line.raw_name)
                    && last.section == line.section =>
            {
                last.quantity += line.quantity;
            }
            _ => merged.push(line),
        }
    }
    *lines = merged;
}
