//! Core data structures: count matrix, metadata frames, design matrix.

mod count_matrix;
mod design;
mod frames;

pub use count_matrix::CountMatrix;
pub use design::{DesignMatrix, COEF_CONFOUNDER, COEF_EXPOSURE, COEF_INTERCEPT};
pub use frames::{SampleFrame, TaxonFrame};
