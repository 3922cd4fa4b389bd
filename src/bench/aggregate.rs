//! Aggregation of per-replicate results into a summary table.

use crate::bench::runner::RunRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mean and spread of power and FDR for one (method, sample size) cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Method name; the screened ANCOM-BC2 call set aggregates under its
    /// own name so both variants show up side by side.
    pub method: String,
    /// Sample size of the cell.
    pub n_samples: usize,
    /// Replicate rows in the cell (missing values included).
    pub n_rows: usize,
    /// Rows whose power was missing.
    pub n_missing_power: usize,
    /// Rows whose FDR was missing.
    pub n_missing_fdr: usize,
    /// Mean power over defined values; NaN when none were defined.
    pub power_mean: f64,
    /// Sample standard deviation of power.
    pub power_sd: f64,
    /// Mean FDR over defined values; NaN when none were defined.
    pub fdr_mean: f64,
    /// Sample standard deviation of FDR.
    pub fdr_sd: f64,
    /// ln(mean power / mean FDR); NaN when either mean is missing or zero.
    pub log_power_fdr_ratio: f64,
}

/// Aggregate replicate rows by (method, sample size).
///
/// Missing power/FDR values are excluded from the means but counted, so a
/// method that failed often is visible in the summary rather than quietly
/// flattered by it.
pub fn aggregate(records: &[RunRecord]) -> Vec<AggregateRow> {
    let mut cells: HashMap<(String, usize), Vec<(f64, f64)>> = HashMap::new();
    for record in records {
        cells
            .entry((record.method.clone(), record.n_samples))
            .or_default()
            .push((record.power, record.fdr));
        if let (Some(power), Some(fdr)) = (record.screened_power, record.screened_fdr) {
            cells
                .entry((format!("{}_screened", record.method), record.n_samples))
                .or_default()
                .push((power, fdr));
        }
    }

    let mut rows: Vec<AggregateRow> = cells
        .into_iter()
        .map(|((method, n_samples), values)| {
            let powers: Vec<f64> = values.iter().map(|v| v.0).collect();
            let fdrs: Vec<f64> = values.iter().map(|v| v.1).collect();
            let (power_mean, power_sd, power_defined) = nan_mean_sd(&powers);
            let (fdr_mean, fdr_sd, fdr_defined) = nan_mean_sd(&fdrs);
            let log_power_fdr_ratio = if power_mean > 0.0 && fdr_mean > 0.0 {
                (power_mean / fdr_mean).ln()
            } else {
                f64::NAN
            };
            AggregateRow {
                method,
                n_samples,
                n_rows: values.len(),
                n_missing_power: values.len() - power_defined,
                n_missing_fdr: values.len() - fdr_defined,
                power_mean,
                power_sd,
                fdr_mean,
                fdr_sd,
                log_power_fdr_ratio,
            }
        })
        .collect();

    rows.sort_by(|a, b| a.method.cmp(&b.method).then(a.n_samples.cmp(&b.n_samples)));
    rows
}

/// Mean and sample standard deviation over the defined (non-NaN) values,
/// plus how many values were defined.
fn nan_mean_sd(values: &[f64]) -> (f64, f64, usize) {
    let defined: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if defined.is_empty() {
        return (f64::NAN, f64::NAN, 0);
    }
    let n = defined.len() as f64;
    let mean = defined.iter().sum::<f64>() / n;
    let sd = if defined.len() < 2 {
        0.0
    } else {
        (defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    };
    (mean, sd, defined.len())
}

/// Tabular rendering of an aggregate, one line per (method, sample size).
pub struct SummaryTable<'a>(pub &'a [AggregateRow]);

impl std::fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<20} {:>6} {:>8} {:>8} {:>8} {:>8} {:>10}",
            "method", "n", "power", "sd", "fdr", "sd", "ln(p/f)"
        )?;
        for row in self.0 {
            writeln!(
                f,
                "{:<20} {:>6} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>10.3}",
                row.method,
                row.n_samples,
                row.power_mean,
                row.power_sd,
                row.fdr_mean,
                row.fdr_sd,
                row.log_power_fdr_ratio
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(method: &str, n: usize, power: f64, fdr: f64) -> RunRecord {
        RunRecord {
            method: method.to_string(),
            n_samples: n,
            diff_prop: 0.2,
            iteration: 0,
            seed: 0,
            power,
            fdr,
            screened_power: None,
            screened_fdr: None,
        }
    }

    #[test]
    fn test_groups_by_method_and_sample_size() {
        let records = vec![
            record("linda", 20, 0.5, 0.1),
            record("linda", 20, 0.7, 0.3),
            record("linda", 50, 0.9, 0.05),
            record("corncob", 20, 0.4, 0.2),
        ];
        let rows = aggregate(&records);
        assert_eq!(rows.len(), 3);

        let linda20 = rows
            .iter()
            .find(|r| r.method == "linda" && r.n_samples == 20)
            .unwrap();
        assert_eq!(linda20.n_rows, 2);
        assert!((linda20.power_mean - 0.6).abs() < 1e-12);
        assert!((linda20.fdr_mean - 0.2).abs() < 1e-12);
        assert!((linda20.log_power_fdr_ratio - (0.6f64 / 0.2).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_missing_values_excluded_but_counted() {
        let records = vec![
            record("locom", 20, f64::NAN, f64::NAN),
            record("locom", 20, 0.5, 0.1),
        ];
        let rows = aggregate(&records);
        assert_eq!(rows[0].n_rows, 2);
        assert_eq!(rows[0].n_missing_power, 1);
        assert!((rows[0].power_mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_yields_nan_cell() {
        let records = vec![record("locom", 20, f64::NAN, f64::NAN)];
        let rows = aggregate(&records);
        assert!(rows[0].power_mean.is_nan());
        assert!(rows[0].log_power_fdr_ratio.is_nan());
    }

    #[test]
    fn test_screened_rows_aggregate_separately() {
        let mut rec = record("ancombc2", 20, 0.6, 0.1);
        rec.screened_power = Some(0.4);
        rec.screened_fdr = Some(0.05);
        let rows = aggregate(&[rec]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.method == "ancombc2_screened"));
    }
}
