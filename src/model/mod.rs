//! Regression models shared by the method adapters.

pub mod bb;
pub mod lm;

pub use bb::{model_bb, BbConfig, BbFit, BbFitSingle};
pub use lm::{model_lm, LmFit, LmFitSingle};
