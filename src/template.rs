//! Template calibration from a real reference count table.
//!
//! The simulator does not touch the raw template counts directly; it draws
//! from a per-taxon log-normal summary estimated here.

use crate::data::CountMatrix;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};

/// Bundled upper-respiratory-tract reference count table.
const URT_TEMPLATE_TSV: &str = include_str!("../assets/urt_template.tsv");

/// Per-taxon log-abundance summary estimated from a template dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateModel {
    /// Taxon IDs carried over from the template.
    pub taxon_ids: Vec<String>,
    /// Mean of log1p counts per taxon.
    pub log_mean: Vec<f64>,
    /// Standard deviation of log1p counts per taxon.
    pub log_sd: Vec<f64>,
}

impl TemplateModel {
    /// Estimate the model from a template count matrix.
    ///
    /// Uses log1p so that zero counts contribute to the baseline rather than
    /// being dropped; the floor on the standard deviation keeps degenerate
    /// all-zero taxa usable by the simulator.
    pub fn from_counts(counts: &CountMatrix) -> Result<Self> {
        let n_samples = counts.n_samples();
        if n_samples < 2 {
            return Err(BenchError::EmptyData(
                "Template needs at least two samples".to_string(),
            ));
        }

        let mut log_mean = Vec::with_capacity(counts.n_taxa());
        let mut log_sd = Vec::with_capacity(counts.n_taxa());

        for row in 0..counts.n_taxa() {
            let logs: Vec<f64> = counts
                .row_dense(row)
                .iter()
                .map(|&c| ((c as f64) + 1.0).ln())
                .collect();
            let n = logs.len() as f64;
            let mean = logs.iter().sum::<f64>() / n;
            let var = logs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            log_mean.push(mean);
            log_sd.push(var.sqrt().max(0.1));
        }

        Ok(Self {
            taxon_ids: counts.taxon_ids().to_vec(),
            log_mean,
            log_sd,
        })
    }

    /// Load and calibrate the bundled URT template.
    pub fn urt() -> Result<Self> {
        let counts = CountMatrix::from_tsv_str(URT_TEMPLATE_TSV)?;
        Self::from_counts(&counts)
    }

    /// Number of taxa in the template.
    pub fn n_taxa(&self) -> usize {
        self.taxon_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urt_template_loads() {
        let model = TemplateModel::urt().unwrap();
        assert_eq!(model.n_taxa(), 100);
        assert_eq!(model.log_mean.len(), model.n_taxa());
        assert_eq!(model.log_sd.len(), model.n_taxa());
        assert!(model.log_sd.iter().all(|&sd| sd >= 0.1));
        assert!(model.log_mean.iter().all(|m| m.is_finite()));
    }

    #[test]
    fn test_from_counts_rejects_single_sample() {
        let mut tri = sprs::TriMat::new((2, 1));
        tri.add_triplet(0, 0, 5);
        let counts =
            CountMatrix::new(tri.to_csr(), vec!["a".into(), "b".into()], vec!["s".into()]).unwrap();
        assert!(TemplateModel::from_counts(&counts).is_err());
    }
}
