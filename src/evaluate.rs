//! Power and FDR against known ground truth.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};

/// Confusion counts for one method on one replicate.
///
/// A taxon counts as detected when its estimated direction is non-zero; the
/// sign does not have to match the true one. Sign agreement is still worth
/// inspecting, so it is tallied separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    /// Truly differential taxa that were detected.
    pub true_positives: usize,
    /// Null taxa that were detected.
    pub false_positives: usize,
    /// Truly differential taxa that were missed.
    pub false_negatives: usize,
    /// Detected differential taxa whose sign matches the truth.
    pub sign_agreements: usize,
}

/// Power and FDR of one method on one replicate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PowerFdr {
    /// TP / (TP + FN); NaN when nothing is truly differential.
    pub power: f64,
    /// FP / (TP + FP); NaN when nothing was detected.
    pub fdr: f64,
    /// The underlying counts.
    pub confusion: Confusion,
}

impl PowerFdr {
    /// The all-NaN result recorded when a method fails outright.
    pub fn missing() -> Self {
        Self {
            power: f64::NAN,
            fdr: f64::NAN,
            confusion: Confusion::default(),
        }
    }
}

/// Score estimated directions against true directions.
///
/// Both slices are aligned to the same taxon order; a length mismatch is an
/// error rather than a silent truncation.
pub fn evaluate(estimated: &[i8], truth: &[i8]) -> Result<PowerFdr> {
    if estimated.len() != truth.len() {
        return Err(BenchError::DimensionMismatch {
            expected: truth.len(),
            actual: estimated.len(),
        });
    }

    let mut confusion = Confusion::default();
    for (&est, &tru) in estimated.iter().zip(truth.iter()) {
        match (tru != 0, est != 0) {
            (true, true) => {
                confusion.true_positives += 1;
                if est == tru {
                    confusion.sign_agreements += 1;
                }
            }
            (true, false) => confusion.false_negatives += 1,
            (false, true) => confusion.false_positives += 1,
            (false, false) => {}
        }
    }

    let n_diff = confusion.true_positives + confusion.false_negatives;
    let n_detected = confusion.true_positives + confusion.false_positives;
    let power = if n_diff > 0 {
        confusion.true_positives as f64 / n_diff as f64
    } else {
        f64::NAN
    };
    let fdr = if n_detected > 0 {
        confusion.false_positives as f64 / n_detected as f64
    } else {
        f64::NAN
    };

    Ok(PowerFdr {
        power,
        fdr,
        confusion,
    })
}
