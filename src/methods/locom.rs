//! LOCOM: permutation test on confounder-adjusted log relative abundances.
//!
//! This is the fragile method of the set: small or degenerate datasets make
//! it bail out entirely, and the runner records a missing result for the
//! whole replicate instead of aborting.

use crate::error::{BenchError, Result};
use crate::methods::{join_calls, DaCall, DaMethod, MethodResult, ALPHA};
use crate::simulate::SyntheticData;
use crate::correct::correct_holm;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// LOCOM adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locom {
    /// Minimum prevalence to test a taxon.
    pub prevalence_min: f64,
    /// Pseudo-fraction added to relative abundances before the log.
    pub pseudo_fraction: f64,
    /// Number of label permutations.
    pub n_permutations: usize,
}

impl Default for Locom {
    fn default() -> Self {
        Self {
            prevalence_min: 0.2,
            pseudo_fraction: 1e-6,
            n_permutations: 200,
        }
    }
}

impl Locom {
    fn failure(&self, reason: impl Into<String>) -> BenchError {
        BenchError::MethodFailure {
            method: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

impl DaMethod for Locom {
    fn name(&self) -> &'static str {
        "locom"
    }

    fn tolerates_failure(&self) -> bool {
        true
    }

    fn run(&self, data: &SyntheticData, rng: &mut Xoshiro256PlusPlus) -> Result<MethodResult> {
        let n_samples = data.counts.n_samples();
        let exposed: Vec<usize> = (0..n_samples)
            .filter(|&j| data.samples.exposure[j] == 1)
            .collect();
        let unexposed: Vec<usize> = (0..n_samples)
            .filter(|&j| data.samples.exposure[j] == 0)
            .collect();
        if exposed.len() < 2 || unexposed.len() < 2 {
            return Err(self.failure(format!(
                "needs at least 2 samples per group, got {} exposed / {} unexposed",
                exposed.len(),
                unexposed.len()
            )));
        }

        let prevalences = data.counts.prevalences();
        let keep: Vec<usize> = (0..data.counts.n_taxa())
            .filter(|&i| prevalences[i] >= self.prevalence_min)
            .collect();
        if keep.is_empty() {
            return Err(self.failure("no taxon passed the prevalence filter"));
        }
        let counts = data.counts.subset_taxa(&keep)?;

        // Log relative abundances, then residualize each taxon on the
        // confounder so the permutation null holds under confounding.
        let depths: Vec<f64> = data
            .counts
            .library_sizes()
            .into_iter()
            .map(|d| d as f64)
            .collect();
        if depths.iter().any(|&d| d <= 0.0) {
            return Err(self.failure("sample with zero library size"));
        }

        let mut residuals: Vec<Vec<f64>> = Vec::with_capacity(counts.n_taxa());
        for i in 0..counts.n_taxa() {
            let row = counts.row_dense(i);
            let logs: Vec<f64> = row
                .iter()
                .zip(depths.iter())
                .map(|(&c, &d)| (c as f64 / d + self.pseudo_fraction).ln())
                .collect();
            let res = residualize(&logs, &data.samples.confounder)
                .ok_or_else(|| self.failure("degenerate confounder (zero variance)"))?;
            residuals.push(res);
        }

        let observed: Vec<f64> = residuals
            .iter()
            .map(|res| group_diff(res, &exposed, &unexposed))
            .collect();
        if observed.iter().all(|s| !s.is_finite() || s.abs() < 1e-12) {
            return Err(self.failure("all test statistics degenerate"));
        }

        // Permutation p-values with the add-one correction.
        let mut exceed = vec![0usize; residuals.len()];
        let mut labels: Vec<usize> = (0..n_samples).collect();
        for _ in 0..self.n_permutations {
            labels.shuffle(rng);
            let perm_exposed = &labels[..exposed.len()];
            let perm_unexposed = &labels[exposed.len()..];
            for (i, res) in residuals.iter().enumerate() {
                let stat = group_diff(res, perm_exposed, perm_unexposed);
                if stat.abs() >= observed[i].abs() {
                    exceed[i] += 1;
                }
            }
        }
        let p_values: Vec<f64> = exceed
            .iter()
            .map(|&e| (e as f64 + 1.0) / (self.n_permutations as f64 + 1.0))
            .collect();

        let corrected = correct_holm(&p_values);
        let significant = corrected.significant_at(ALPHA);

        let tested: Vec<(String, DaCall)> = counts
            .taxon_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let call = if significant[i] {
                    DaCall::significant(observed[i].signum() as i8)
                } else {
                    DaCall::NULL_CALL
                };
                (id.clone(), call)
            })
            .collect();

        Ok(MethodResult {
            calls: join_calls(data.counts.taxon_ids(), tested, self.name()),
            screened_calls: None,
        })
    }
}

/// Residuals of a simple regression of `y` on an intercept plus `x`.
///
/// Returns `None` when `x` has no variance.
fn residualize(y: &[f64], x: &[f64]) -> Option<Vec<f64>> {
    let n = y.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|&v| (v - x_mean).powi(2)).sum();
    if sxx < 1e-12 {
        return None;
    }
    let sxy: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(&xv, &yv)| (xv - x_mean) * (yv - y_mean))
        .sum();
    let slope = sxy / sxx;
    Some(
        y.iter()
            .zip(x.iter())
            .map(|(&yv, &xv)| yv - y_mean - slope * (xv - x_mean))
            .collect(),
    )
}

/// Difference of group means over the given sample index sets.
fn group_diff(values: &[f64], group_a: &[usize], group_b: &[usize]) -> f64 {
    let mean_a = group_a.iter().map(|&j| values[j]).sum::<f64>() / group_a.len() as f64;
    let mean_b = group_b.iter().map(|&j| values[j]).sum::<f64>() / group_b.len() as f64;
    mean_a - mean_b
}
