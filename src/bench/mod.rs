//! Benchmark orchestration: parameter grid, parallel runner, aggregation.

mod aggregate;
mod grid;
mod runner;

pub use aggregate::{aggregate, AggregateRow, SummaryTable};
pub use grid::{parameter_grid, task_rng, task_seed, BenchConfig, GridPoint};
pub use runner::{run_benchmark, run_benchmark_with, BenchResults, RunRecord};
