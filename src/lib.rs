//! Benchmark of differential-abundance testing methods on synthetic
//! upper-respiratory-tract (URT) microbiome data.
//!
//! Five methods (ANCOM-BC2, ANCOM-BC, CORNCOB, LinDA, LOCOM) are run on
//! count tables simulated from a real URT template under a known ground
//! truth of differentially abundant taxa, with deliberate library-size
//! confounding and per-taxon efficiency biases. Each run is scored for
//! power and false discovery rate, aggregated across a parameter grid, and
//! rendered as tables and a combined plot.
//!
//! # Overview
//!
//! - **data**: count matrix and sample/taxon frames, design matrix
//! - **template**: log-abundance model calibrated to the bundled URT table
//! - **truth**: ground-truth log-fold-change generation
//! - **simulate**: synthetic count generation with confounded depth bias
//! - **model**: per-taxon linear and beta-binomial regression
//! - **normalize**: CLR and plain log transforms
//! - **correct**: Holm step-down correction
//! - **methods**: the five method adapters behind one call interface
//! - **evaluate**: power/FDR scoring against ground truth
//! - **bench**: parameter grid, parallel runner, aggregation
//! - **report**: per-method TSVs, summary table, combined plot
//!
//! # Example
//!
//! ```no_run
//! use urt_bench::prelude::*;
//!
//! let config = BenchConfig::quick().with_seed(1);
//! let results = run_benchmark(&config).unwrap();
//! let summary = aggregate(&results.records);
//! println!("{}", SummaryTable(&summary));
//! ```

pub mod bench;
pub mod correct;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod methods;
pub mod model;
pub mod normalize;
pub mod report;
pub mod simulate;
pub mod template;
pub mod truth;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::bench::{
        aggregate, parameter_grid, run_benchmark, run_benchmark_with, task_rng, task_seed,
        AggregateRow, BenchConfig, BenchResults, GridPoint, RunRecord, SummaryTable,
    };
    pub use crate::data::{
        CountMatrix, DesignMatrix, SampleFrame, TaxonFrame, COEF_CONFOUNDER, COEF_EXPOSURE,
        COEF_INTERCEPT,
    };
    pub use crate::error::{BenchError, Result};
    pub use crate::evaluate::{evaluate, Confusion, PowerFdr};
    pub use crate::methods::{
        all_methods, AncomBc, AncomBc2, Corncob, DaCall, DaMethod, Linda, Locom, MethodResult,
        ALPHA,
    };
    pub use crate::report::{render_benchmark_plot, write_method_tables, write_summary_table};
    pub use crate::simulate::{simulate, SimConfig, SyntheticData};
    pub use crate::template::TemplateModel;
    pub use crate::truth::{GroundTruth, DEFAULT_LFC_SET};
}
