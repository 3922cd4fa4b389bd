//! Typed sample and taxon metadata frames for the simulation design.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Per-sample covariates and technical bias used in the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleFrame {
    /// Sample IDs in column order of the paired count matrix.
    pub sample_ids: Vec<String>,
    /// Binary exposure indicator (0 = unexposed, 1 = exposed).
    pub exposure: Vec<u8>,
    /// Continuous confounder (standard normal draw).
    pub confounder: Vec<f64>,
    /// Log sampling-fraction bias added to every taxon of the sample.
    pub log_depth_bias: Vec<f64>,
}

impl SampleFrame {
    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Subset to the given sample indices, preserving order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        for &i in indices {
            if i >= self.n_samples() {
                return Err(BenchError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    i
                )));
            }
        }
        Ok(Self {
            sample_ids: indices.iter().map(|&i| self.sample_ids[i].clone()).collect(),
            exposure: indices.iter().map(|&i| self.exposure[i]).collect(),
            confounder: indices.iter().map(|&i| self.confounder[i]).collect(),
            log_depth_bias: indices.iter().map(|&i| self.log_depth_bias[i]).collect(),
        })
    }

    /// Write the frame to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "sample_id\texposure\tconfounder\tlog_depth_bias")?;
        for i in 0..self.n_samples() {
            writeln!(
                writer,
                "{}\t{}\t{:.6}\t{:.6}",
                self.sample_ids[i], self.exposure[i], self.confounder[i], self.log_depth_bias[i]
            )?;
        }
        Ok(())
    }
}

/// Per-taxon ground-truth effects and technical bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonFrame {
    /// Taxon IDs in row order of the paired count matrix.
    pub taxon_ids: Vec<String>,
    /// True exposure log-fold-change per taxon (0 for null taxa).
    pub exposure_lfc: Vec<f64>,
    /// True confounder log-fold-change per taxon (0 for null taxa).
    pub confounder_lfc: Vec<f64>,
    /// Log sequencing-efficiency bias added to every sample of the taxon.
    pub log_efficiency_bias: Vec<f64>,
}

impl TaxonFrame {
    /// Number of taxa.
    pub fn n_taxa(&self) -> usize {
        self.taxon_ids.len()
    }

    /// True direction of the exposure effect per taxon (-1, 0, +1).
    pub fn true_directions(&self) -> Vec<i8> {
        self.exposure_lfc
            .iter()
            .map(|&lfc| {
                if lfc > 0.0 {
                    1
                } else if lfc < 0.0 {
                    -1
                } else {
                    0
                }
            })
            .collect()
    }

    /// Number of truly differential taxa (non-zero exposure LFC).
    pub fn n_differential(&self) -> usize {
        self.exposure_lfc.iter().filter(|&&v| v != 0.0).count()
    }

    /// Write the frame to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "taxon_id\texposure_lfc\tconfounder_lfc\tlog_efficiency_bias"
        )?;
        for i in 0..self.n_taxa() {
            writeln!(
                writer,
                "{}\t{:.4}\t{:.4}\t{:.6}",
                self.taxon_ids[i],
                self.exposure_lfc[i],
                self.confounder_lfc[i],
                self.log_efficiency_bias[i]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> SampleFrame {
        SampleFrame {
            sample_ids: vec!["S1".into(), "S2".into(), "S3".into()],
            exposure: vec![0, 1, 1],
            confounder: vec![-0.5, 0.0, 1.2],
            log_depth_bias: vec![0.1, 0.2, 0.3],
        }
    }

    #[test]
    fn test_subset_preserves_order() {
        let sub = frame().subset(&[2, 0]).unwrap();
        assert_eq!(sub.sample_ids, vec!["S3", "S1"]);
        assert_eq!(sub.exposure, vec![1, 0]);
    }

    #[test]
    fn test_subset_out_of_bounds() {
        assert!(frame().subset(&[5]).is_err());
    }

    #[test]
    fn test_true_directions() {
        let taxa = TaxonFrame {
            taxon_ids: vec!["a".into(), "b".into(), "c".into()],
            exposure_lfc: vec![2.0, 0.0, -1.0],
            confounder_lfc: vec![0.0, 0.0, 1.0],
            log_efficiency_bias: vec![0.0; 3],
        };
        assert_eq!(taxa.true_directions(), vec![1, 0, -1]);
        assert_eq!(taxa.n_differential(), 2);
    }
}
