//! Batch fitness evaluation through the problem's own implementation.

use serde::{Deserialize, Serialize};

use super::BatchFitnessEvaluator;
use crate::error::Result;
use crate::problem::Problem;

/// Batch fitness evaluator delegating to the problem's `batch_fitness`.
///
/// Requires the problem to provide a batch implementation; a problem
/// without one reports `NotImplemented`. Errors from the problem surface
/// unchanged.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct MemberBfe;

impl BatchFitnessEvaluator for MemberBfe {
    fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>> {
        p.batch_fitness(dvs)
    }

    fn name(&self) -> String {
        "Member function batch fitness evaluator".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PelagoError;
    use crate::problem::UserProblem;
    use crate::thread_safety::ThreadSafety;

    #[derive(Clone, Serialize, Deserialize)]
    struct Doubler;

    impl UserProblem for Doubler {
        fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
            (vec![0.0], vec![100.0])
        }

        fn fitness(&self, _dv: &[f64]) -> Result<Vec<f64>> {
            // The scalar path must not be reachable through MemberBfe.
            Err(PelagoError::Other("scalar fitness should not run".to_string()))
        }

        fn has_batch_fitness(&self) -> bool {
            true
        }

        fn batch_fitness(&self, dvs: &[f64]) -> Result<Vec<f64>> {
            Ok(dvs.iter().map(|x| 2.0 * x).collect())
        }

        fn thread_safety(&self) -> ThreadSafety {
            ThreadSafety::None
        }
    }

    #[test]
    fn test_delegates_to_the_problem() {
        let p = Problem::new(Doubler).unwrap();
        let fvs = MemberBfe.call(&p, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(fvs, vec![2.0, 4.0, 6.0]);
        assert_eq!(p.fevals(), 3);
    }

    #[test]
    fn test_missing_batch_fitness_errors() {
        let p = Problem::default();
        let err = MemberBfe.call(&p, &[0.5]).unwrap_err();
        assert!(matches!(err, PelagoError::NotImplemented(_)));
    }
}
