//! Single-level categorical split against a binary label.
//!
//! Each candidate split separates the rows holding one category of a
//! predictor from all other rows. The split with the largest Gini impurity
//! reduction wins; ties keep the earlier predictor, then the lower code.
//! Splitting on categories directly means the chosen value never has to be
//! recovered from a numeric threshold.

use crate::encoder::EncodedPredictor;

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    /// Index into the predictor slice the split was fitted on.
    pub feature: usize,
    pub code: usize,
    pub gain: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

/// Best informative split, or `None` when no split lowers impurity.
///
/// `labels` and every predictor's codes must have the same length.
pub fn fit_split(features: &[EncodedPredictor], labels: &[bool]) -> Option<Split> {
    let total = labels.len();
    let positives = labels.iter().filter(|label| **label).count();
    if total == 0 || positives == 0 || positives == total {
        return None;
    }
    let parent = gini(positives, total);

    let mut best: Option<Split> = None;
    for (feature, encoded) in features.iter().enumerate() {
        let mut counts = vec![0usize; encoded.table.len()];
        let mut hits = vec![0usize; encoded.table.len()];
        for (code, label) in encoded.codes.iter().zip(labels) {
            if let Some(slot) = counts.get_mut(*code) {
                *slot += 1;
                if *label {
                    hits[*code] += 1;
                }
            }
        }
        for code in 0..counts.len() {
            let inside = counts[code];
            if inside == 0 || inside == total {
                continue;
            }
            let outside = total - inside;
            let weighted = (inside as f64 * gini(hits[code], inside)
                + outside as f64 * gini(positives - hits[code], outside))
                / total as f64;
            let gain = parent - weighted;
            let improves = match best {
                Some(current) => gain > current.gain + MIN_GAIN,
                None => gain > MIN_GAIN,
            };
            if improves {
                best = Some(Split {
                    feature,
                    code,
                    gain,
                });
            }
        }
    }
    best
}
