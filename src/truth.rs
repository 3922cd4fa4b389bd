//! Ground-truth effect assignment for simulated taxa.

use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Admissible non-zero log-fold-change magnitudes, signed.
///
/// A differential taxon draws its effect uniformly from this set; the set is
/// shared between the exposure and confounder draws.
pub const DEFAULT_LFC_SET: [f64; 4] = [-2.0, -1.0, 1.0, 2.0];

/// Ground truth attached to one synthetic dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Exposure log-fold-change per taxon (0 for null taxa).
    pub exposure_lfc: Vec<f64>,
    /// Confounder log-fold-change per taxon (0 for null taxa).
    pub confounder_lfc: Vec<f64>,
}

impl GroundTruth {
    /// Draw ground truth for `n_taxa` taxa with differential proportion `diff_prop`.
    ///
    /// Each taxon is null with probability `1 - diff_prop`, otherwise its LFC
    /// is drawn uniformly from `lfc_set`. The exposure and confounder draws
    /// are independent.
    pub fn draw(
        n_taxa: usize,
        diff_prop: f64,
        lfc_set: &[f64],
        rng: &mut Xoshiro256PlusPlus,
    ) -> Self {
        let exposure_lfc = draw_effect_vector(n_taxa, diff_prop, lfc_set, rng);
        let confounder_lfc = draw_effect_vector(n_taxa, diff_prop, lfc_set, rng);
        Self {
            exposure_lfc,
            confounder_lfc,
        }
    }

    /// True direction of the exposure effect per taxon (-1, 0, +1).
    pub fn true_directions(&self) -> Vec<i8> {
        self.exposure_lfc.iter().map(|&v| sign_of(v)).collect()
    }

    /// Number of truly differential taxa for the exposure.
    pub fn n_differential(&self) -> usize {
        self.exposure_lfc.iter().filter(|&&v| v != 0.0).count()
    }
}

fn draw_effect_vector(
    n_taxa: usize,
    diff_prop: f64,
    lfc_set: &[f64],
    rng: &mut Xoshiro256PlusPlus,
) -> Vec<f64> {
    (0..n_taxa)
        .map(|_| {
            if rng.gen::<f64>() < diff_prop {
                lfc_set[rng.gen_range(0..lfc_set.len())]
            } else {
                0.0
            }
        })
        .collect()
}

#[inline]
fn sign_of(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}
