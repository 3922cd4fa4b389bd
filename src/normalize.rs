//! Abundance transforms used by the method adapters.

use crate::data::CountMatrix;
use crate::error::{BenchError, Result};
use nalgebra::DMatrix;

/// Centered log-ratio transform.
///
/// Adds `pseudocount` to every entry, then per sample subtracts the mean of
/// the log counts so each column sums to zero on the log scale.
pub fn clr_transform(counts: &CountMatrix, pseudocount: f64) -> Result<DMatrix<f64>> {
    if pseudocount <= 0.0 {
        return Err(BenchError::InvalidParameter(
            "CLR pseudocount must be positive".to_string(),
        ));
    }

    let mut logs = counts.to_dense();
    logs.apply(|v| *v = (*v + pseudocount).ln());

    let n_taxa = logs.nrows();
    for col in 0..logs.ncols() {
        let mean = logs.column(col).sum() / n_taxa as f64;
        for row in 0..n_taxa {
            logs[(row, col)] -= mean;
        }
    }
    Ok(logs)
}

/// Log transform with pseudocount, no centering.
pub fn log_transform(counts: &CountMatrix, pseudocount: f64) -> Result<DMatrix<f64>> {
    if pseudocount <= 0.0 {
        return Err(BenchError::InvalidParameter(
            "Log pseudocount must be positive".to_string(),
        ));
    }
    let mut logs = counts.to_dense();
    logs.apply(|v| *v = (*v + pseudocount).ln());
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn counts() -> CountMatrix {
        let mut tri = TriMat::new((3, 2));
        tri.add_triplet(0, 0, 10);
        tri.add_triplet(1, 0, 100);
        tri.add_triplet(2, 0, 1);
        tri.add_triplet(0, 1, 5);
        tri.add_triplet(1, 1, 50);
        CountMatrix::new(
            tri.to_csr(),
            vec!["a".into(), "b".into(), "c".into()],
            vec!["s1".into(), "s2".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_clr_columns_centered() {
        let clr = clr_transform(&counts(), 0.5).unwrap();
        for col in 0..2 {
            let sum: f64 = clr.column(col).sum();
            assert!(sum.abs() < 1e-9, "column {} sum = {}", col, sum);
        }
    }

    #[test]
    fn test_clr_rejects_zero_pseudocount() {
        assert!(clr_transform(&counts(), 0.0).is_err());
    }

    #[test]
    fn test_log_transform_values() {
        let logs = log_transform(&counts(), 1.0).unwrap();
        assert!((logs[(0, 0)] - 11.0_f64.ln()).abs() < 1e-12);
        assert!((logs[(2, 1)] - 1.0_f64.ln()).abs() < 1e-12);
    }
}
