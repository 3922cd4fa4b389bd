//! Result reporting: per-method tables, summary table, combined plot.

mod plot;
mod tables;

pub use plot::render_benchmark_plot;
pub use tables::{write_method_tables, write_summary_table};
