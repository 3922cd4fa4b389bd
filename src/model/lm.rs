//! Per-taxon ordinary least squares on transformed abundances.

use crate::data::DesignMatrix;
use crate::error::{BenchError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// OLS fit for a single taxon.
#[derive(Debug, Clone)]
pub struct LmFitSingle {
    /// Estimated coefficients, in design-matrix column order.
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients.
    pub std_errors: Vec<f64>,
    /// Residuals in sample order.
    pub residuals: Vec<f64>,
    /// Residual degrees of freedom.
    pub df_residual: usize,
}

impl LmFitSingle {
    /// t-statistic for a coefficient.
    pub fn t_statistic(&self, index: usize) -> f64 {
        let se = self.std_errors[index];
        if se > 0.0 && se.is_finite() {
            self.coefficients[index] / se
        } else {
            f64::NAN
        }
    }
}

/// OLS fits for all taxa against a shared design.
#[derive(Debug, Clone)]
pub struct LmFit {
    /// Per-taxon fits, in row order of the response matrix.
    pub fits: Vec<LmFitSingle>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
}

impl LmFit {
    /// Estimates for one coefficient across all taxa.
    pub fn coefficients_for(&self, index: usize) -> Vec<f64> {
        self.fits.iter().map(|f| f.coefficients[index]).collect()
    }

    /// Standard errors for one coefficient across all taxa.
    pub fn std_errors_for(&self, index: usize) -> Vec<f64> {
        self.fits.iter().map(|f| f.std_errors[index]).collect()
    }
}

/// Fit OLS regressions row-wise.
///
/// `response` holds one row per taxon (taxa × samples); all rows share the
/// same design, so `(X'X)^-1` is computed once. Uses the normal equations,
/// which are well-conditioned for the small fixed design used here.
pub fn model_lm(response: &DMatrix<f64>, design: &DesignMatrix) -> Result<LmFit> {
    let n_taxa = response.nrows();
    let n_samples = response.ncols();
    let n_coef = design.n_coefficients();

    if design.n_samples() != n_samples {
        return Err(BenchError::DimensionMismatch {
            expected: n_samples,
            actual: design.n_samples(),
        });
    }

    let df_residual = n_samples.saturating_sub(n_coef);
    if df_residual == 0 {
        return Err(BenchError::Numerical(
            "Model is saturated (n_samples <= n_coefficients)".to_string(),
        ));
    }

    let x = design.matrix();
    let xtx = x.transpose() * x;
    let xtx_inv = xtx.try_inverse().ok_or_else(|| {
        BenchError::Numerical("Design matrix is singular (X'X not invertible)".to_string())
    })?;

    let fits: Vec<LmFitSingle> = (0..n_taxa)
        .into_par_iter()
        .map(|i| {
            let y: Vec<f64> = response.row(i).iter().copied().collect();
            fit_single(&y, x, &xtx_inv, n_coef, df_residual)
        })
        .collect();

    Ok(LmFit {
        fits,
        coefficient_names: design.coefficient_names().to_vec(),
    })
}

fn fit_single(
    y: &[f64],
    x: &DMatrix<f64>,
    xtx_inv: &DMatrix<f64>,
    n_coef: usize,
    df_residual: usize,
) -> LmFitSingle {
    let y_vec = DVector::from_column_slice(y);

    // beta = (X'X)^-1 X'y
    let beta = xtx_inv * (x.transpose() * &y_vec);

    let residuals_vec = &y_vec - x * &beta;
    let rss: f64 = residuals_vec.iter().map(|e| e * e).sum();
    let sigma = (rss / df_residual as f64).sqrt();

    let std_errors: Vec<f64> = (0..n_coef)
        .map(|j| sigma * xtx_inv[(j, j)].sqrt())
        .collect();

    LmFitSingle {
        coefficients: beta.iter().copied().collect(),
        std_errors,
        residuals: residuals_vec.iter().copied().collect(),
        df_residual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleFrame, COEF_EXPOSURE};
    use approx::assert_relative_eq;

    fn design_for(n: usize) -> DesignMatrix {
        let samples = SampleFrame {
            sample_ids: (0..n).map(|i| format!("s{}", i)).collect(),
            exposure: (0..n).map(|i| u8::from(i >= n / 2)).collect(),
            confounder: (0..n).map(|i| (i as f64) * 0.1 - 0.5).collect(),
            log_depth_bias: vec![0.0; n],
        };
        DesignMatrix::from_samples(&samples)
    }

    #[test]
    fn test_recovers_known_effect() {
        let n = 40;
        let design = design_for(n);
        let x = design.matrix();

        // y = 1.0 + 2.0 * exposure + 0.5 * confounder, no noise
        let mut response = DMatrix::zeros(1, n);
        for j in 0..n {
            response[(0, j)] = 1.0 + 2.0 * x[(j, 1)] + 0.5 * x[(j, 2)];
        }

        let fit = model_lm(&response, &design).unwrap();
        assert_relative_eq!(fit.fits[0].coefficients[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(fit.fits[0].coefficients[COEF_EXPOSURE], 2.0, epsilon = 1e-8);
        assert_relative_eq!(fit.fits[0].coefficients[2], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_saturated_model_rejected() {
        let design = design_for(3);
        let response = DMatrix::zeros(2, 3);
        assert!(model_lm(&response, &design).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let design = design_for(10);
        let response = DMatrix::zeros(2, 8);
        assert!(model_lm(&response, &design).is_err());
    }
}
