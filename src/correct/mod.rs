//! Multiple-testing correction.

mod holm;

pub use holm::{correct_holm, HolmCorrected};
