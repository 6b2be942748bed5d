//! CTC decoding for the recognition model.

use std::path::Path;

use ndarray::ArrayView2;

use crate::OcrError;

/// Column-position gap beyond which two characters belong to different
/// words. Characters inside a word sit 2-3 columns apart; word boundaries
/// show gaps of 9+.
const WORD_GAP_COLUMNS: usize = 8;

/// Load the character dictionary: CTC blank at index 0, the model's
/// characters, then space.
pub(crate) fn load_dict(path: &Path) -> Result<Vec<String>, OcrError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| OcrError::ModelLoad(format!("character dictionary: {e}")))?;
    let mut dict = Vec::with_capacity(raw.lines().count() + 2);
    dict.push("blank".to_string());
    for line in raw.lines() {
        let ch = line.trim_end_matches(['\r', '\n']);
        if !ch.is_empty() {
            dict.push(ch.to_string());
        }
    }
    dict.push(" ".to_string());
    Ok(dict)
}

/// Greedy CTC decode of one `[time, classes]` logit matrix.
///
/// Collapses repeats, drops blanks, inserts spaces at wide column gaps, and
/// returns the text with the mean per-character probability.
pub(crate) fn decode(dict: &[String], preds: ArrayView2<'_, f32>) -> (String, f32) {
    let steps = preds.shape()[0];

    let mut picked: Vec<(usize, usize, f32)> = Vec::new(); // (class, column, prob)
    let mut previous = 0usize;
    for t in 0..steps {
        let row = preds.row(t);
        let (class, prob) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map_or((0, 0.0), |(i, p)| (i, *p));
        // CTC collapse: drop blanks and repeats of the previous class.
        if class != 0 && class != previous && class < dict.len() {
            picked.push((class, t, prob));
        }
        previous = class;
    }

    let mut text = String::new();
    let mut confidence_sum = 0.0f32;
    for (i, (class, column, prob)) in picked.iter().enumerate() {
        if i > 0 {
            let gap = column - picked[i - 1].1;
            if gap > WORD_GAP_COLUMNS {
                text.push(' ');
            }
        }
        text.push_str(&dict[*class]);
        confidence_sum += prob;
    }

    #[allow(clippy::cast_precision_loss)]
    let confidence = if picked.is_empty() {
        0.0
    } else {
        confidence_sum / picked.len() as f32
    };
    (text, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn dict() -> Vec<String> {
        let mut d = vec!["blank".to_string()];
        for c in ["o", "p", "t"] {
            d.push(c.to_string());
        }
        d.push(" ".to_string());
        d
    }

    fn logits(classes: usize, sequence: &[(usize, f32)]) -> Array2<f32> {
        let mut preds = Array2::<f32>::zeros((sequence.len(), classes));
        for (t, (class, prob)) in sequence.iter().enumerate() {
            preds[[t, *class]] = *prob;
        }
        preds
    }

    #[test]
    fn collapses_repeats_and_blanks() {
        // o o <blank> p p t  ->  "opt"
        let preds = logits(
            5,
            &[(1, 0.9), (1, 0.9), (0, 0.8), (2, 0.8), (2, 0.8), (3, 0.7)],
        );
        let (text, conf) = decode(&dict(), preds.view());
        assert_eq!(text, "opt");
        assert!((conf - (0.9 + 0.8 + 0.7) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn wide_gaps_become_spaces() {
        let mut sequence = vec![(1usize, 0.9f32)];
        sequence.extend(std::iter::repeat((0, 0.5)).take(10));
        sequence.push((3, 0.9));
        let preds = logits(5, &sequence);
        let (text, _) = decode(&dict(), preds.view());
        assert_eq!(text, "o t");
    }

    #[test]
    fn empty_logits_decode_to_empty() {
        let preds = Array2::<f32>::zeros((4, 5));
        let (text, conf) = decode(&dict(), preds.view());
        assert_eq!(text, "");
        assert_eq!(conf, 0.0);
    }

    #[test]
    fn dict_wraps_blank_and_space() {
        let tmp = std::env::temp_dir().join("deckscan-keys-test.txt");
        std::fs::write(&tmp, "a\nb\nc\n").unwrap();
        let dict = load_dict(&tmp).unwrap();
        std::fs::remove_file(&tmp).ok();
        assert_eq!(dict.first().unwrap(), "blank");
        assert_eq!(dict.last().unwrap(), " ");
        assert_eq!(dict.len(), 5);
    }
}
