//! Beta-binomial GLM for taxon proportions with overdispersion.
//!
//! Models counts Y_i out of n_i reads with a logit link on the mean
//! proportion and a shared overdispersion parameter rho per taxon:
//! Var(Y_i/n_i) = mu_i(1-mu_i)[1 + (n_i - 1) rho] / n_i.

use crate::data::DesignMatrix;
use crate::error::{BenchError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_MU: f64 = 1e-10;
const MAX_MU: f64 = 1.0 - 1e-10;
const MIN_RHO: f64 = 1e-10;
const MAX_RHO: f64 = 1.0 - 1e-10;

/// Configuration for beta-binomial fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbConfig {
    /// Maximum IRLS iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the relative coefficient change.
    pub tol: f64,
}

impl Default for BbConfig {
    fn default() -> Self {
        Self {
            max_iter: 25,
            tol: 1e-8,
        }
    }
}

/// Beta-binomial fit for a single taxon.
#[derive(Debug, Clone)]
pub struct BbFitSingle {
    /// Estimated coefficients on the logit scale.
    pub coefficients: Vec<f64>,
    /// Standard errors from the Fisher information.
    pub std_errors: Vec<f64>,
    /// Estimated overdispersion rho.
    pub overdispersion: f64,
    /// Whether IRLS converged.
    pub converged: bool,
}

impl BbFitSingle {
    /// z-statistic for a coefficient.
    pub fn z_statistic(&self, index: usize) -> f64 {
        let se = self.std_errors[index];
        if se > 0.0 && se.is_finite() {
            self.coefficients[index] / se
        } else {
            f64::NAN
        }
    }

    fn failed(beta: &DVector<f64>, rho: f64, n_coef: usize) -> Self {
        Self {
            coefficients: beta.iter().copied().collect(),
            std_errors: vec![f64::NAN; n_coef],
            overdispersion: rho,
            converged: false,
        }
    }
}

/// Beta-binomial fits for all taxa.
#[derive(Debug, Clone)]
pub struct BbFit {
    /// Per-taxon fits, in row order of the count matrix.
    pub fits: Vec<BbFitSingle>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
}

/// Fit beta-binomial GLMs row-wise via IRLS.
///
/// `counts` holds raw counts per taxon (rows) and sample (columns);
/// `depths` are the per-sample library sizes (binomial denominators).
pub fn model_bb(
    counts: &DMatrix<f64>,
    depths: &[f64],
    design: &DesignMatrix,
    config: &BbConfig,
) -> Result<BbFit> {
    let n_taxa = counts.nrows();
    let n_samples = counts.ncols();
    let n_coef = design.n_coefficients();

    if design.n_samples() != n_samples {
        return Err(BenchError::DimensionMismatch {
            expected: n_samples,
            actual: design.n_samples(),
        });
    }
    if depths.len() != n_samples {
        return Err(BenchError::DimensionMismatch {
            expected: n_samples,
            actual: depths.len(),
        });
    }
    if n_samples.saturating_sub(n_coef) == 0 {
        return Err(BenchError::Numerical(
            "Model is saturated (n_samples <= n_coefficients)".to_string(),
        ));
    }

    let x = design.matrix();

    let fits: Vec<BbFitSingle> = (0..n_taxa)
        .into_par_iter()
        .map(|i| {
            let y: Vec<f64> = counts.row(i).iter().copied().collect();
            fit_single_bb(&y, depths, x, n_samples, n_coef, config)
        })
        .collect();

    Ok(BbFit {
        fits,
        coefficient_names: design.coefficient_names().to_vec(),
    })
}

fn fit_single_bb(
    y: &[f64],
    n: &[f64],
    x: &DMatrix<f64>,
    n_samples: usize,
    n_coef: usize,
    config: &BbConfig,
) -> BbFitSingle {
    // Start from the logit of the pooled mean proportion.
    let p_mean = {
        let num: f64 = y.iter().sum();
        let den: f64 = n.iter().sum();
        if den > 0.0 {
            (num / den).clamp(MIN_MU, MAX_MU)
        } else {
            0.5
        }
    };
    let mut beta = DVector::zeros(n_coef);
    beta[0] = (p_mean / (1.0 - p_mean)).ln();

    let mut mu = compute_mu(x, &beta);
    let mut rho = estimate_dispersion_mom(y, n, &mu);
    let mut converged = false;

    for _ in 0..config.max_iter {
        // Working weights and response for the logit link.
        let mut w = vec![0.0; n_samples];
        let mut z = vec![0.0; n_samples];
        for i in 0..n_samples {
            let ni = n[i];
            let mi = mu[i];
            let vif = 1.0 + (ni - 1.0).max(0.0) * rho;
            w[i] = if ni > 0.0 {
                ni / (mi * (1.0 - mi) * vif)
            } else {
                0.0
            };
            let eta = (mi / (1.0 - mi)).ln();
            let pi = if ni > 0.0 { y[i] / ni } else { mi };
            z[i] = eta + (pi - mi) / (mi * (1.0 - mi));
        }

        if w.iter().any(|&wi| !wi.is_finite() || wi < 0.0) {
            return BbFitSingle::failed(&beta, rho, n_coef);
        }

        // Weighted least squares: beta = (X'WX)^-1 X'Wz
        let mut xtwx: DMatrix<f64> = DMatrix::zeros(n_coef, n_coef);
        let mut xtwz: DVector<f64> = DVector::zeros(n_coef);
        for i in 0..n_samples {
            for j in 0..n_coef {
                for k in 0..n_coef {
                    xtwx[(j, k)] += x[(i, j)] * w[i] * x[(i, k)];
                }
                xtwz[j] += x[(i, j)] * w[i] * z[i];
            }
        }

        let beta_new = match xtwx.try_inverse() {
            Some(inv) => inv * xtwz,
            None => return BbFitSingle::failed(&beta, rho, n_coef),
        };

        let delta: f64 = (&beta_new - &beta).iter().map(|d| d.abs()).sum();
        let scale: f64 = beta.iter().map(|b| b.abs()).sum::<f64>().max(1.0);

        beta = beta_new;
        mu = compute_mu(x, &beta);
        rho = estimate_dispersion_mom(y, n, &mu);

        if delta / scale < config.tol {
            converged = true;
            break;
        }
    }

    let std_errors = fisher_std_errors(x, &mu, n, rho, n_samples, n_coef);

    BbFitSingle {
        coefficients: beta.iter().copied().collect(),
        std_errors,
        overdispersion: rho,
        converged,
    }
}

fn compute_mu(x: &DMatrix<f64>, beta: &DVector<f64>) -> DVector<f64> {
    let eta = x * beta;
    DVector::from_iterator(
        eta.len(),
        eta.iter().map(|e| {
            let p = 1.0 / (1.0 + (-e).exp());
            p.clamp(MIN_MU, MAX_MU)
        }),
    )
}

/// Method-of-moments dispersion from Pearson residual excess.
fn estimate_dispersion_mom(y: &[f64], n: &[f64], mu: &DVector<f64>) -> f64 {
    let n_obs = y.len() as f64;
    let mut sum_pearson_sq = 0.0;
    let mut sum_n_minus_1 = 0.0;

    for i in 0..y.len() {
        let ni = n[i];
        let mi = mu[i];
        if ni > 0.0 {
            let pi = y[i] / ni;
            let var_binomial = mi * (1.0 - mi) / ni;
            if var_binomial > 0.0 {
                let resid = (pi - mi) / var_binomial.sqrt();
                sum_pearson_sq += resid * resid;
            }
            sum_n_minus_1 += ni - 1.0;
        }
    }

    let excess = sum_pearson_sq - n_obs;
    if excess > 0.0 && sum_n_minus_1 > 0.0 {
        (excess / sum_n_minus_1).clamp(MIN_RHO, MAX_RHO)
    } else {
        MIN_RHO
    }
}

fn fisher_std_errors(
    x: &DMatrix<f64>,
    mu: &DVector<f64>,
    n: &[f64],
    rho: f64,
    n_samples: usize,
    n_coef: usize,
) -> Vec<f64> {
    let mut info: DMatrix<f64> = DMatrix::zeros(n_coef, n_coef);
    for i in 0..n_samples {
        let ni = n[i];
        if ni <= 0.0 {
            continue;
        }
        let mi = mu[i];
        let vif = 1.0 + (ni - 1.0).max(0.0) * rho;
        let wi = ni * mi * (1.0 - mi) / vif;
        for j in 0..n_coef {
            for k in 0..n_coef {
                info[(j, k)] += x[(i, j)] * wi * x[(i, k)];
            }
        }
    }

    match info.try_inverse() {
        Some(cov) => (0..n_coef).map(|j| cov[(j, j)].max(0.0).sqrt()).collect(),
        None => vec![f64::NAN; n_coef],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleFrame, COEF_EXPOSURE};

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
    fn test_detects_proportion_shift() {
        let n = 40;
        let design = design_for(n);
        let depths: Vec<f64> = vec![10_000.0; n];

        // Unexposed proportion 0.01, exposed 0.05.
        let mut counts = DMatrix::zeros(1, n);
        for j in 0..n {
            counts[(0, j)] = if j >= n / 2 { 500.0 } else { 100.0 };
        }

        let fit = model_bb(&counts, &depths, &design, &BbConfig::default()).unwrap();
        let single = &fit.fits[0];
        assert!(single.converged);
        // logit(0.05) - logit(0.01) ≈ 1.66
        let effect = single.coefficients[COEF_EXPOSURE];
        assert!((effect - 1.66).abs() < 0.2, "effect = {}", effect);
        assert!(single.z_statistic(COEF_EXPOSURE) > 3.0);
    }

    #[test]
    fn test_null_taxon_not_significant() {
        let n = 30;
        let design = design_for(n);
        let depths: Vec<f64> = vec![5_000.0; n];

        let mut counts = DMatrix::zeros(1, n);
        for j in 0..n {
            counts[(0, j)] = 50.0 + ((j % 3) as f64);
        }

        let fit = model_bb(&counts, &depths, &design, &BbConfig::default()).unwrap();
        let z = fit.fits[0].z_statistic(COEF_EXPOSURE);
        assert!(z.abs() < 2.0, "z = {}", z);
    }

    #[test]
    fn test_depth_length_mismatch() {
        let design = design_for(10);
        let counts = DMatrix::zeros(1, 10);
        assert!(model_bb(&counts, &[100.0; 8], &design, &BbConfig::default()).is_err());
    }
}
