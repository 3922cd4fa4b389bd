//! CORNCOB: beta-binomial regression on raw counts with a Wald test on the
//! exposure coefficient.

use crate::data::{DesignMatrix, COEF_EXPOSURE};
use crate::error::Result;
use crate::methods::{join_calls, DaCall, DaMethod, MethodResult, ALPHA};
use crate::model::{model_bb, BbConfig};
use crate::simulate::SyntheticData;
use crate::correct::correct_holm;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// CORNCOB adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corncob {
    /// Minimum prevalence to test a taxon.
    pub prevalence_min: f64,
    /// IRLS tuning for the beta-binomial fits.
    pub bb: BbConfig,
}

impl Default for Corncob {
    fn default() -> Self {
        Self {
            prevalence_min: 0.05,
            bb: BbConfig::default(),
        }
    }
}

impl DaMethod for Corncob {
    fn name(&self) -> &'static str {
        "corncob"
    }

    fn run(&self, data: &SyntheticData, _rng: &mut Xoshiro256PlusPlus) -> Result<MethodResult> {
        let prevalences = data.counts.prevalences();
        let keep: Vec<usize> = (0..data.counts.n_taxa())
            .filter(|&i| prevalences[i] >= self.prevalence_min)
            .collect();
        let counts = data.counts.subset_taxa(&keep)?;

        let depths: Vec<f64> = data
            .counts
            .library_sizes()
            .into_iter()
            .map(|d| d as f64)
            .collect();
        let design = DesignMatrix::from_samples(&data.samples);
        let fit = model_bb(&counts.to_dense(), &depths, &design, &self.bb)?;

        let normal =
            Normal::new(0.0, 1.0).map_err(|e| crate::error::BenchError::Numerical(e.to_string()))?;
        let p_values: Vec<f64> = fit
            .fits
            .iter()
            .map(|single| {
                // Fits that never converged get no p-value; Holm ignores
                // NaN entries and they come back as not-called.
                if !single.converged {
                    return f64::NAN;
                }
                let z = single.z_statistic(COEF_EXPOSURE);
                if z.is_finite() {
                    2.0 * (1.0 - normal.cdf(z.abs()))
                } else {
                    f64::NAN
                }
            })
            .collect();

        let corrected = correct_holm(&p_values);
        let significant = corrected.significant_at(ALPHA);

        let tested: Vec<(String, DaCall)> = counts
            .taxon_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let call = if significant[i] {
                    let sign = fit.fits[i].coefficients[COEF_EXPOSURE].signum() as i8;
                    DaCall::significant(sign)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::{simulate, SimConfig};
    use crate::template::TemplateModel;
    use crate::truth::{GroundTruth, DEFAULT_LFC_SET};
    use rand::SeedableRng;

    fn dataset(seed: u64, diff_prop: f64) -> SyntheticData {
        let template = TemplateModel::urt().unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let truth = GroundTruth::draw(template.n_taxa(), diff_prop, &DEFAULT_LFC_SET, &mut rng);
        simulate(&template, &truth, &SimConfig::new(40), &mut rng).unwrap()
    }

    #[test]
    fn test_corncob_covers_universe() {
        let data = dataset(31, 0.2);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let result = Corncob::default().run(&data, &mut rng).unwrap();
        assert_eq!(result.calls.len(), data.counts.n_taxa());
        assert!(result.screened_calls.is_none());
    }

    #[test]
    fn test_corncob_few_calls_under_null() {
        let data = dataset(32, 0.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let result = Corncob::default().run(&data, &mut rng).unwrap();
        let n_called = result.calls.iter().filter(|c| c.direction != 0).count();
        assert!(n_called <= 3, "{} calls under the null", n_called);
    }
}
