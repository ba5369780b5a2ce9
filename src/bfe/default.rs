//! Heuristic selection of a batch evaluation strategy.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BatchFitnessEvaluator, MemberBfe, ThreadBfe};
use crate::error::{PelagoError, Result};
use crate::problem::Problem;
use crate::thread_safety::ThreadSafety;

/// Signature of the process-wide selection function consulted by
/// [`DefaultBfe`].
pub type BfeSelector = fn(&Problem, &[f64]) -> Result<Vec<f64>>;

static SELECTOR: RwLock<BfeSelector> = RwLock::new(default_bfe_impl);

/// The stock selection heuristic.
///
/// The problem's own `batch_fitness`, if present, has priority; otherwise
/// a threaded evaluation runs if the problem is thread-safe enough.
fn default_bfe_impl(p: &Problem, dvs: &[f64]) -> Result<Vec<f64>> {
    if p.has_batch_fitness() {
        debug!(problem = p.name(), "batch evaluation dispatched to the problem's batch_fitness");
        return MemberBfe.call(p, dvs);
    }
    if p.thread_safety() >= ThreadSafety::Basic {
        debug!(problem = p.name(), "batch evaluation dispatched to the threaded evaluator");
        return ThreadBfe.call(p, dvs);
    }
    Err(PelagoError::InvalidArgument(format!(
        "cannot execute fitness evaluations in batch mode for a problem of type '{}': the \
         problem does not implement the batch_fitness() member function, and its thread safety \
         level is not sufficient to run a thread-based batch fitness evaluation",
        p.name()
    )))
}

/// Replaces the process-wide selection function used by [`DefaultBfe`].
///
/// Intended to be installed once at process start, before evaluations
/// begin; installation is last-writer-wins and races with concurrent
/// evaluations are not guarded against.
pub fn set_default_bfe_impl(f: BfeSelector) {
    *SELECTOR.write().unwrap_or_else(PoisonError::into_inner) = f;
}

/// Batch fitness evaluator picking a concrete strategy per call.
///
/// Consults the selection function installed with
/// [`set_default_bfe_impl`]; the stock heuristic prefers [`MemberBfe`]
/// and falls back to [`ThreadBfe`].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct DefaultBfe;

impl BatchFitnessEvaluator for DefaultBfe {
    fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>> {
        let selector = *SELECTOR.read().unwrap_or_else(PoisonError::into_inner);
        selector(p, dvs)
    }

    fn name(&self) -> String {
        "Default batch fitness evaluator".to_string()
    }
}
