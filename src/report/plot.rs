//! Combined power/FDR plot: one panel row per metric, one column per
//! differential proportion, lines over sample size colored by method.

use crate::bench::RunRecord;
use crate::error::{BenchError, Result};
use log::info;
use plotters::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

const NOMINAL_FDR: f64 = 0.05;

/// Render the benchmark plot to a PNG at `path`.
pub fn render_benchmark_plot(records: &[RunRecord], path: &Path) -> Result<()> {
    if records.is_empty() {
        return Err(BenchError::EmptyData("no records to plot".to_string()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let methods: Vec<String> = {
        let set: BTreeSet<&str> = records.iter().map(|r| r.method.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    };
    let diff_props: Vec<f64> = {
        let mut props: Vec<f64> = records.iter().map(|r| r.diff_prop).collect();
        props.sort_by(f64::total_cmp);
        props.dedup();
        props
    };
    let sample_sizes: Vec<usize> = {
        let set: BTreeSet<usize> = records.iter().map(|r| r.n_samples).collect();
        set.into_iter().collect()
    };
    let x_min = *sample_sizes.first().unwrap_or(&0) as f64;
    let x_max = *sample_sizes.last().unwrap_or(&1) as f64;

    let width = 400 * diff_props.len().max(1) as u32;
    let root = BitMapBackend::new(path, (width, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((2, diff_props.len()));

    for (metric_idx, metric) in ["power", "FDR"].iter().enumerate() {
        for (prop_idx, &diff_prop) in diff_props.iter().enumerate() {
            let panel = &panels[metric_idx * diff_props.len() + prop_idx];
            let mut chart = ChartBuilder::on(panel)
                .caption(
                    format!("{} | diff_prop = {}", metric, diff_prop),
                    ("sans-serif", 18),
                )
                .margin(10)
                .x_label_area_size(30)
                .y_label_area_size(40)
                .build_cartesian_2d(x_min..x_max, 0.0f64..1.05f64)
                .map_err(plot_err)?;

            chart
                .configure_mesh()
                .x_desc("sample size")
                .y_desc(*metric)
                .draw()
                .map_err(plot_err)?;

            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(x_min, NOMINAL_FDR), (x_max, NOMINAL_FDR)],
                    BLACK.mix(0.4),
                )))
                .map_err(plot_err)?;

            for (method_idx, method) in methods.iter().enumerate() {
                let color = Palette99::pick(method_idx).mix(0.9);
                let points: Vec<(f64, f64)> = sample_sizes
                    .iter()
                    .filter_map(|&n| {
                        let mean = cell_mean(records, method, diff_prop, n, metric_idx == 0)?;
                        Some((n as f64, mean))
                    })
                    .collect();
                if points.is_empty() {
                    continue;
                }
                chart
                    .draw_series(LineSeries::new(points, &color))
                    .map_err(plot_err)?
                    .label(method.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(plot_err)?;
        }
    }

    root.present().map_err(plot_err)?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Mean power or FDR of one method in one facet cell, skipping missing
/// values; `None` when no replicate had a defined value.
fn cell_mean(
    records: &[RunRecord],
    method: &str,
    diff_prop: f64,
    n_samples: usize,
    power: bool,
) -> Option<f64> {
    let values: Vec<f64> = records
        .iter()
        .filter(|r| {
            r.method == method && r.n_samples == n_samples && r.diff_prop.total_cmp(&diff_prop).is_eq()
        })
        .map(|r| if power { r.power } else { r.fdr })
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn plot_err(e: impl std::fmt::Display) -> BenchError {
    BenchError::Plot(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(method: &str, n: usize, prop: f64, power: f64, fdr: f64) -> RunRecord {
        RunRecord {
            method: method.to_string(),
            n_samples: n,
            diff_prop: prop,
            iteration: 0,
            seed: 0,
            power,
            fdr,
            screened_power: None,
            screened_fdr: None,
        }
    }

    #[test]
    fn test_renders_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.png");
        let records = vec![
            record("linda", 20, 0.05, 0.4, 0.1),
            record("linda", 50, 0.05, 0.7, 0.06),
            record("corncob", 20, 0.05, 0.3, 0.2),
            record("corncob", 50, 0.05, 0.6, 0.1),
            record("linda", 20, 0.2, 0.5, 0.1),
            record("linda", 50, 0.2, 0.8, 0.05),
        ];
        render_benchmark_plot(&records, &path).unwrap();
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_cell_mean_skips_missing() {
        let records = vec![
            record("linda", 20, 0.05, f64::NAN, f64::NAN),
            record("linda", 20, 0.05, 0.5, 0.1),
        ];
        assert_eq!(cell_mean(&records, "linda", 0.05, 20, true), Some(0.5));
        assert_eq!(cell_mean(&records, "corncob", 0.05, 20, true), None);
    }

    #[test]
    fn test_empty_records_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(render_benchmark_plot(&[], &dir.path().join("x.png")).is_err());
    }
}
