//! Holm step-down multiple-testing correction.

/// Result of Holm correction.
#[derive(Debug, Clone)]
pub struct HolmCorrected {
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Holm-adjusted p-values, in the original order.
    pub adjusted: Vec<f64>,
    /// Number of tests.
    pub n_tests: usize,
}

impl HolmCorrected {
    /// Count significant results at a threshold.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.adjusted.iter().filter(|&&q| q < alpha).count()
    }

    /// Significance indicator per test at a threshold.
    ///
    /// NaN p-values (untestable taxa) are never significant.
    pub fn significant_at(&self, alpha: f64) -> Vec<bool> {
        self.adjusted.iter().map(|&q| q < alpha).collect()
    }
}

/// Apply Holm step-down adjustment.
///
/// For p-values sorted ascending, the adjusted value at rank `i` (1-based) is
/// `max(adjusted[i-1], (n - i + 1) * p[i])`, capped at 1. NaN inputs are kept
/// out of the ranking and stay NaN in the output.
pub fn correct_holm(p_values: &[f64]) -> HolmCorrected {
    let n_total = p_values.len();

    // Rank only the finite p-values; NaN marks an untestable taxon.
    let mut indices: Vec<usize> = (0..n_total).filter(|&i| !p_values[i].is_nan()).collect();
    indices.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n = indices.len();
    let mut adjusted = vec![f64::NAN; n_total];
    let mut running_max = 0.0_f64;

    for (rank, &orig_idx) in indices.iter().enumerate() {
        let stepdown = (n - rank) as f64 * p_values[orig_idx];
        running_max = running_max.max(stepdown).min(1.0);
        adjusted[orig_idx] = running_max;
    }

    HolmCorrected {
        p_values: p_values.to_vec(),
        adjusted,
        n_tests: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_holm_basic() {
        // Classic example: p = [0.01, 0.02, 0.03, 0.04]
        let corrected = correct_holm(&[0.01, 0.02, 0.03, 0.04]);
        assert_relative_eq!(corrected.adjusted[0], 0.04);
        assert_relative_eq!(corrected.adjusted[1], 0.06);
        assert_relative_eq!(corrected.adjusted[2], 0.06);
        assert_relative_eq!(corrected.adjusted[3], 0.06);
    }

    #[test]
    fn test_holm_monotone_and_capped() {
        let corrected = correct_holm(&[0.5, 0.001, 0.9, 0.04]);
        // Adjusted values respect the p-value ordering.
        assert!(corrected.adjusted[1] <= corrected.adjusted[3]);
        assert!(corrected.adjusted[3] <= corrected.adjusted[0]);
        assert!(corrected.adjusted.iter().all(|&q| q <= 1.0));
    }

    #[test]
    fn test_holm_unordered_input() {
        let corrected = correct_holm(&[0.04, 0.01]);
        assert_relative_eq!(corrected.adjusted[0], 0.04);
        assert_relative_eq!(corrected.adjusted[1], 0.02);
    }

    #[test]
    fn test_holm_nan_passthrough() {
        let corrected = correct_holm(&[0.01, f64::NAN, 0.02]);
        assert_eq!(corrected.n_tests, 2);
        assert!(corrected.adjusted[1].is_nan());
        assert_relative_eq!(corrected.adjusted[0], 0.02);
        assert!(!corrected.significant_at(0.05)[1]);
    }

    #[test]
    fn test_holm_empty() {
        let corrected = correct_holm(&[]);
        assert_eq!(corrected.n_tests, 0);
        assert!(corrected.adjusted.is_empty());
    }
}
