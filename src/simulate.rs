//! Synthetic count generation calibrated to a template dataset.
//!
//! One call produces one disposable dataset: a count matrix plus paired
//! sample and taxon frames carrying the injected covariates and biases.

use crate::data::{CountMatrix, SampleFrame, TaxonFrame};
use crate::error::{BenchError, Result};
use crate::template::TemplateModel;
use crate::truth::GroundTruth;
use log::warn;
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the synthetic generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Target number of samples.
    pub n_samples: usize,
    /// Log sampling-fraction bias range for unexposed samples.
    pub depth_bias_unexposed: (f64, f64),
    /// Log sampling-fraction bias range for exposed samples.
    ///
    /// Deliberately different from the unexposed range so that library size
    /// is confounded with the exposure.
    pub depth_bias_exposed: (f64, f64),
    /// Log sequencing-efficiency bias range per taxon.
    pub efficiency_bias: (f64, f64),
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            n_samples: 50,
            depth_bias_unexposed: (-1.0, 0.0),
            depth_bias_exposed: (-0.5, 0.5),
            efficiency_bias: (-0.5, 0.5),
        }
    }
}

impl SimConfig {
    /// Create a config for the given sample size, keeping default biases.
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, &(lo, hi)) in [
            ("depth_bias_unexposed", &self.depth_bias_unexposed),
            ("depth_bias_exposed", &self.depth_bias_exposed),
            ("efficiency_bias", &self.efficiency_bias),
        ] {
            if !(lo < hi) {
                return Err(BenchError::InvalidParameter(format!(
                    "{} range ({}, {}) is empty",
                    name, lo, hi
                )));
            }
        }
        Ok(())
    }
}

/// One synthetic dataset with its ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    /// Simulated counts (taxa × samples).
    pub counts: CountMatrix,
    /// Per-sample covariates and depth bias.
    pub samples: SampleFrame,
    /// Per-taxon effects and efficiency bias.
    pub taxa: TaxonFrame,
    /// Ground truth the taxa frame was built from.
    pub truth: GroundTruth,
}

impl SyntheticData {
    /// Write counts, sample frame, and taxon frame to a directory.
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.counts.to_tsv(dir.join("counts.tsv"))?;
        self.samples.to_tsv(dir.join("samples.tsv"))?;
        self.taxa.to_tsv(dir.join("taxa.tsv"))?;
        Ok(())
    }

    /// Drop samples whose library size falls below `min_library_size`.
    ///
    /// Returns the filtered dataset and the number of samples dropped. The
    /// drop is logged so a depth-starved simulation is visible in the run.
    pub fn filter_low_depth(&self, min_library_size: u64) -> Result<(Self, usize)> {
        let depths = self.counts.library_sizes();
        let keep: Vec<usize> = depths
            .iter()
            .enumerate()
            .filter(|(_, &d)| d >= min_library_size)
            .map(|(i, _)| i)
            .collect();
        let n_dropped = self.counts.n_samples() - keep.len();

        if n_dropped > 0 {
            warn!(
                "library-size filter dropped {} of {} samples (min {})",
                n_dropped,
                self.counts.n_samples(),
                min_library_size
            );
        }
        if keep.is_empty() {
            return Err(BenchError::EmptyData(
                "All samples fell below the library-size threshold".to_string(),
            ));
        }

        let filtered = Self {
            counts: self.counts.subset_samples(&keep)?,
            samples: self.samples.subset(&keep)?,
            taxa: self.taxa.clone(),
            truth: self.truth.clone(),
        };
        Ok((filtered, n_dropped))
    }
}

/// Simulate a count matrix under the template model and the given truth.
///
/// Procedure: draw per-taxon log abundances from the template summary, add
/// exposure and confounder effects scaled by each sample's covariate, add the
/// sample depth bias and taxon efficiency bias, then exponentiate and round.
pub fn simulate(
    template: &TemplateModel,
    truth: &GroundTruth,
    config: &SimConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<SyntheticData> {
    let d = template.n_taxa();
    let n = config.n_samples;
    if truth.exposure_lfc.len() != d {
        return Err(BenchError::DimensionMismatch {
            expected: d,
            actual: truth.exposure_lfc.len(),
        });
    }
    if n < 4 {
        return Err(BenchError::InvalidParameter(format!(
            "Sample size {} too small to split into exposure groups",
            n
        )));
    }
    config.validate()?;

    let sample_ids: Vec<String> = (0..n).map(|j| format!("sim_{:03}", j)).collect();

    // First half unexposed, second half exposed.
    let exposure: Vec<u8> = (0..n).map(|j| u8::from(j >= n / 2)).collect();

    let std_normal = Normal::new(0.0, 1.0).map_err(|e| BenchError::Numerical(e.to_string()))?;
    let confounder: Vec<f64> = (0..n).map(|_| std_normal.sample(rng)).collect();

    let log_depth_bias: Vec<f64> = exposure
        .iter()
        .map(|&x| {
            let (lo, hi) = if x == 1 {
                config.depth_bias_exposed
            } else {
                config.depth_bias_unexposed
            };
            rng.gen_range(lo..hi)
        })
        .collect();

    let (eff_lo, eff_hi) = config.efficiency_bias;
    let log_efficiency_bias: Vec<f64> = (0..d).map(|_| rng.gen_range(eff_lo..eff_hi)).collect();

    // Log-abundance matrix: baseline + effects + biases.
    let mut log_abundance = DMatrix::zeros(d, n);
    for i in 0..d {
        let base = Normal::new(template.log_mean[i], template.log_sd[i])
            .map_err(|e| BenchError::Numerical(e.to_string()))?;
        for j in 0..n {
            log_abundance[(i, j)] = base.sample(rng)
                + truth.exposure_lfc[i] * exposure[j] as f64
                + truth.confounder_lfc[i] * confounder[j]
                + log_depth_bias[j]
                + log_efficiency_bias[i];
        }
    }

    let counts_dense = log_abundance.map(|v| v.exp());
    let counts = CountMatrix::from_dense(
        &counts_dense,
        template.taxon_ids.clone(),
        sample_ids.clone(),
    )?;

    let samples = SampleFrame {
        sample_ids,
        exposure,
        confounder,
        log_depth_bias,
    };
    let taxa = TaxonFrame {
        taxon_ids: template.taxon_ids.clone(),
        exposure_lfc: truth.exposure_lfc.clone(),
        confounder_lfc: truth.confounder_lfc.clone(),
        log_efficiency_bias,
    };

    Ok(SyntheticData {
        counts,
        samples,
        taxa,
        truth: truth.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::truth::DEFAULT_LFC_SET;
    use rand::SeedableRng;

    fn small_template() -> TemplateModel {
        TemplateModel {
            taxon_ids: (0..30).map(|i| format!("OTU_{:03}", i)).collect(),
            log_mean: (0..30).map(|i| 2.0 + (i as f64) * 0.1).collect(),
            log_sd: vec![1.0; 30],
        }
    }

    #[test]
    fn test_shapes_and_groups() {
        let template = small_template();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let truth = GroundTruth::draw(30, 0.2, &DEFAULT_LFC_SET, &mut rng);
        let data = simulate(&template, &truth, &SimConfig::new(20), &mut rng).unwrap();

        assert_eq!(data.counts.n_taxa(), 30);
        assert_eq!(data.counts.n_samples(), 20);
        assert_eq!(data.samples.exposure.iter().filter(|&&x| x == 1).count(), 10);
        assert_eq!(data.taxa.n_taxa(), 30);
    }

    #[test]
    fn test_bit_identical_under_seed() {
        let template = small_template();

        let gen = |seed: u64| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let truth = GroundTruth::draw(30, 0.2, &DEFAULT_LFC_SET, &mut rng);
            simulate(&template, &truth, &SimConfig::new(16), &mut rng).unwrap()
        };

        let a = gen(99);
        let b = gen(99);
        for i in 0..30 {
            for j in 0..16 {
                assert_eq!(a.counts.get(i, j), b.counts.get(i, j));
            }
        }
        assert_eq!(a.samples.confounder, b.samples.confounder);
    }

    #[test]
    fn test_low_depth_filter() {
        let template = small_template();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let truth = GroundTruth::draw(30, 0.0, &DEFAULT_LFC_SET, &mut rng);
        let data = simulate(&template, &truth, &SimConfig::new(12), &mut rng).unwrap();

        // Threshold of zero keeps everything.
        let (kept, dropped) = data.filter_low_depth(0).unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(kept.counts.n_samples(), 12);

        // An absurd threshold errors out rather than returning empty data.
        assert!(data.filter_low_depth(u64::MAX).is_err());
    }

    #[test]
    fn test_degenerate_bias_range_rejected() {
        let template = small_template();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let truth = GroundTruth::draw(30, 0.2, &DEFAULT_LFC_SET, &mut rng);

        let mut config = SimConfig::new(12);
        config.efficiency_bias = (0.5, 0.5);
        let err = simulate(&template, &truth, &config, &mut rng).unwrap_err();
        assert!(matches!(err, BenchError::InvalidParameter(_)));

        let mut config = SimConfig::new(12);
        config.depth_bias_exposed = (0.5, -0.5);
        assert!(simulate(&template, &truth, &config, &mut rng).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let template = small_template();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let truth = GroundTruth::draw(10, 0.2, &DEFAULT_LFC_SET, &mut rng);
        assert!(simulate(&template, &truth, &SimConfig::new(20), &mut rng).is_err());
    }
}
