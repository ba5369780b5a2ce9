//! Multi-threaded batch fitness evaluation.

use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::BatchFitnessEvaluator;
use crate::error::{PelagoError, Result};
use crate::problem::Problem;
use crate::thread_safety::ThreadSafety;

/// Data-parallel batch fitness evaluator.
///
/// Splits the batch across the process-wide rayon pool and adapts its
/// sharing strategy to the problem's declared thread-safety tier:
///
/// - `Constant`: a single problem instance is shared by reference across
///   all workers, and each `fitness` call advances its evaluation counter
///   directly.
/// - `Basic`: each worker evaluates on its own clone of the problem; the
///   counters of the clones are lost, so the original is compensated with
///   one `increment_fevals(k)` after the parallel region.
/// - Anything weaker is rejected with `InvalidArgument`.
///
/// Outputs land at index-aligned offsets, so the result order mirrors the
/// input order regardless of scheduling.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ThreadBfe;

impl BatchFitnessEvaluator for ThreadBfe {
    fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>> {
        let nx = p.nx();
        let nf = p.nf();
        // Shape validation is the wrapping container's job.
        debug_assert_eq!(dvs.len() % nx, 0);
        let k = dvs.len() / nx;

        let out_len = k.checked_mul(nf).ok_or_else(|| {
            PelagoError::Overflow(
                "overflow detected in the computation of the size of the output of a \
                 multi-threaded batch fitness evaluation"
                    .to_string(),
            )
        })?;
        let mut fvs = vec![0.0; out_len];

        let tier = p.thread_safety();
        trace!(problem = p.name(), %tier, individuals = k, "threaded batch evaluation");
        if tier >= ThreadSafety::Constant {
            // Reentrant problem: every worker calls fitness on the same
            // instance, which counts its own evaluations.
            dvs.par_chunks(nx)
                .zip(fvs.par_chunks_mut(nf))
                .try_for_each(|(dv, out)| {
                    out.copy_from_slice(&p.fitness(dv)?);
                    Ok::<(), PelagoError>(())
                })?;
        } else if tier == ThreadSafety::Basic {
            // Non-reentrant problem: one clone per worker split, then one
            // compensating bump of the original's counter.
            dvs.par_chunks(nx)
                .zip(fvs.par_chunks_mut(nf))
                .try_for_each_init(
                    || p.clone(),
                    |local, (dv, out)| {
                        out.copy_from_slice(&local.fitness(dv)?);
                        Ok::<(), PelagoError>(())
                    },
                )?;
            p.increment_fevals(k as u64);
        } else {
            return Err(PelagoError::InvalidArgument(format!(
                "cannot use a multi-threaded batch fitness evaluator on the problem '{}': it \
                 provides only the '{}' thread safety guarantee, while at least 'basic' is \
                 required",
                p.name(),
                tier
            )));
        }

        Ok(fvs)
    }

    fn name(&self) -> String {
        "Multi-threaded batch fitness evaluator".to_string()
    }
}
