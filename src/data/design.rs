//! Design matrix for the fixed `~ exposure + confounder` model.

use crate::data::SampleFrame;
use nalgebra::DMatrix;

/// Coefficient index of the intercept.
pub const COEF_INTERCEPT: usize = 0;
/// Coefficient index of the binary exposure.
pub const COEF_EXPOSURE: usize = 1;
/// Coefficient index of the continuous confounder.
pub const COEF_CONFOUNDER: usize = 2;

/// Dense design matrix (samples × coefficients) with named columns.
///
/// Every method in this crate fits the same two-covariate model, so the
/// design is built directly from the typed [`SampleFrame`] rather than from
/// a formula string.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: DMatrix<f64>,
    coefficient_names: Vec<String>,
}

impl DesignMatrix {
    /// Build the intercept + exposure + confounder design from a sample frame.
    pub fn from_samples(samples: &SampleFrame) -> Self {
        let n = samples.n_samples();
        let mut matrix = DMatrix::zeros(n, 3);
        for i in 0..n {
            matrix[(i, COEF_INTERCEPT)] = 1.0;
            matrix[(i, COEF_EXPOSURE)] = samples.exposure[i] as f64;
            matrix[(i, COEF_CONFOUNDER)] = samples.confounder[i];
        }
        Self {
            matrix,
            coefficient_names: vec![
                "(Intercept)".to_string(),
                "exposure".to_string(),
                "confounder".to_string(),
            ],
        }
    }

    /// The underlying matrix.
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Coefficient names in column order.
    #[inline]
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Number of samples (rows).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns).
    #[inline]
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples() {
        let samples = SampleFrame {
            sample_ids: vec!["S1".into(), "S2".into()],
            exposure: vec![0, 1],
            confounder: vec![0.5, -1.0],
            log_depth_bias: vec![0.0, 0.0],
        };
        let design = DesignMatrix::from_samples(&samples);

        assert_eq!(design.n_samples(), 2);
        assert_eq!(design.n_coefficients(), 3);
        assert_eq!(design.matrix()[(0, COEF_INTERCEPT)], 1.0);
        assert_eq!(design.matrix()[(1, COEF_EXPOSURE)], 1.0);
        assert_eq!(design.matrix()[(0, COEF_CONFOUNDER)], 0.5);
        assert_eq!(design.coefficient_names()[COEF_EXPOSURE], "exposure");
    }
}
