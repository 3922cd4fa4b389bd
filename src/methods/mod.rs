//! Method adapters: one per differential-abundance testing method.
//!
//! Every adapter fits `~ exposure + confounder`, corrects p-values with Holm,
//! and maps its native output into a uniform per-taxon [`DaCall`] so the
//! evaluator never sees method-specific shapes.

mod ancombc;
mod ancombc2;
mod corncob;
mod linda;
mod locom;

pub use ancombc::{AncomBc, AncomBcConfig};
pub use ancombc2::AncomBc2;
pub use corncob::Corncob;
pub use linda::Linda;
pub use locom::Locom;

use crate::error::Result;
use crate::simulate::SyntheticData;
use log::debug;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Significance level shared by all adapters (after Holm correction).
pub const ALPHA: f64 = 0.05;

/// Uniform per-taxon call produced by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaCall {
    /// Estimated direction of the exposure effect: -1, 0 (not called), +1.
    pub direction: i8,
    /// Whether the taxon survived the adapter's filters and was tested.
    pub passed_filter: bool,
}

impl DaCall {
    /// A taxon that was never tested (filtered out or missing from output).
    pub const NOT_TESTED: DaCall = DaCall {
        direction: 0,
        passed_filter: false,
    };

    /// A tested taxon that was not called differential.
    pub const NULL_CALL: DaCall = DaCall {
        direction: 0,
        passed_filter: true,
    };

    /// A significant call with the given sign.
    pub fn significant(direction: i8) -> Self {
        Self {
            direction,
            passed_filter: true,
        }
    }
}

/// Result of running one adapter on one dataset.
#[derive(Debug, Clone)]
pub struct MethodResult {
    /// Calls aligned to the dataset's taxon order, one per taxon.
    pub calls: Vec<DaCall>,
    /// Sensitivity-screened calls (ANCOM-BC2 only).
    pub screened_calls: Option<Vec<DaCall>>,
}

impl MethodResult {
    /// Estimated directions aligned to the taxon universe.
    pub fn directions(&self) -> Vec<i8> {
        self.calls.iter().map(|c| c.direction).collect()
    }

    /// Directions of the screened call set, if present.
    pub fn screened_directions(&self) -> Option<Vec<i8>> {
        self.screened_calls
            .as_ref()
            .map(|calls| calls.iter().map(|c| c.direction).collect())
    }
}

/// Common adapter interface.
pub trait DaMethod: Send + Sync {
    /// Short method name used in filenames and reports.
    fn name(&self) -> &'static str;

    /// Run the method on one synthetic dataset.
    ///
    /// The RNG is task-local; deterministic methods ignore it.
    fn run(&self, data: &SyntheticData, rng: &mut Xoshiro256PlusPlus) -> Result<MethodResult>;

    /// Whether the runner should absorb a failure of this method as a
    /// missing result instead of aborting the batch.
    fn tolerates_failure(&self) -> bool {
        false
    }
}

/// The five benchmarked methods, in reporting order.
pub fn all_methods() -> Vec<Box<dyn DaMethod>> {
    vec![
        Box::new(AncomBc2::default()),
        Box::new(AncomBc::default()),
        Box::new(Corncob::default()),
        Box::new(Linda::default()),
        Box::new(Locom::default()),
    ]
}

/// Join per-taxon calls back onto the full taxon universe.
///
/// Taxa the adapter never reported (filtered out, or dropped by the method's
/// own bookkeeping) are filled as not-tested. The fill is logged so an
/// identifier mismatch shows up in the run instead of silently deflating
/// power.
pub fn join_calls(universe: &[String], tested: Vec<(String, DaCall)>, method: &str) -> Vec<DaCall> {
    let by_id: HashMap<String, DaCall> = tested.into_iter().collect();
    let mut n_filled = 0usize;
    let calls: Vec<DaCall> = universe
        .iter()
        .map(|id| match by_id.get(id) {
            Some(&call) => call,
            None => {
                n_filled += 1;
                DaCall::NOT_TESTED
            }
        })
        .collect();

    if n_filled > 0 {
        debug!(
            "{}: filled {} of {} taxa as not-tested during result join",
            method,
            n_filled,
            universe.len()
        );
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_fills_missing_taxa() {
        let universe = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let tested = vec![
            ("a".to_string(), DaCall::significant(1)),
            ("c".to_string(), DaCall::NULL_CALL),
        ];
        let calls = join_calls(&universe, tested, "test");

        assert_eq!(calls[0], DaCall::significant(1));
        assert_eq!(calls[1], DaCall::NOT_TESTED);
        assert_eq!(calls[2], DaCall::NULL_CALL);
    }

    #[test]
    fn test_join_ignores_unknown_ids() {
        let universe = vec!["a".to_string()];
        let tested = vec![("zzz".to_string(), DaCall::significant(-1))];
        let calls = join_calls(&universe, tested, "test");
        assert_eq!(calls, vec![DaCall::NOT_TESTED]);
    }

    #[test]
    fn test_all_methods_order() {
        let methods = all_methods();
        let names: Vec<&str> = methods.iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["ancombc2", "ancombc", "corncob", "linda", "locom"]
        );
        assert!(methods.iter().filter(|m| m.tolerates_failure()).count() == 1);
    }
}
