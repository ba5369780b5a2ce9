//! # Plugin Serialization Registry
//!
//! Plugin objects (problems, algorithms, batch evaluators, island drivers)
//! are stored behind trait objects, so archives record them as a pair of a
//! stable string tag and a serde body. This module owns the process-wide
//! registries that map tags back to deserialization functions.
//!
//! Registration is a process-startup act: call the `register_*` function
//! for every user plugin type that should survive a save/load round trip,
//! before the first archive is read. The built-in drivers register
//! themselves the first time a registry is touched. Tags follow the
//! `"<kind> <type-name>"` convention, e.g. `"udbfe pelago::bfe::ThreadBfe"`.
//!
//! ## Examples
//!
//! ```rust
//! use pelago::{serial, BatchFitnessEvaluator, Problem, ThreadBfe, ThreadSafety};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct LoudBfe;
//!
//! impl BatchFitnessEvaluator for LoudBfe {
//!     fn call(&self, p: &Problem, dvs: &[f64]) -> pelago::error::Result<Vec<f64>> {
//!         ThreadBfe.call(p, dvs)
//!     }
//!     fn thread_safety(&self) -> ThreadSafety {
//!         ThreadSafety::Constant
//!     }
//! }
//!
//! serial::register_bfe::<LoudBfe>().unwrap();
//! ```

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::algorithm::{AlgorithmDriver, AlgorithmInner, NullAlgorithm, UserAlgorithm};
use crate::bfe::{BatchFitnessEvaluator, BfeDriver, BfeInner, DefaultBfe, MemberBfe, ThreadBfe};
use crate::error::{PelagoError, Result};
use crate::island::{ThreadIsland, UdiDriver, UdiInner, UserIsland};
use crate::problem::{NullProblem, ProblemDriver, ProblemInner, UserProblem};

/// On-disk form of a type-erased plugin: a registry tag plus the plugin's
/// own serde body.
#[derive(Serialize, Deserialize)]
pub(crate) struct TaggedArchive {
    pub tag: String,
    pub body: Value,
}

type DeserializeFn<T> = fn(Value) -> Result<Box<T>>;

/// A tag-to-constructor map for one plugin kind.
pub(crate) struct Registry<T: ?Sized> {
    map: RwLock<HashMap<String, DeserializeFn<T>>>,
}

impl<T: ?Sized> Registry<T> {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    fn insert(&self, tag: String, f: DeserializeFn<T>) -> Result<()> {
        self.map.write()?.insert(tag, f);
        Ok(())
    }

    pub(crate) fn deserialize(&self, tag: &str, body: Value) -> Result<Box<T>> {
        let map = self.map.read()?;
        let f = map.get(tag).ok_or_else(|| {
            PelagoError::Serialization(format!("no plugin type registered under the tag '{tag}'"))
        })?;
        f(body)
    }
}

pub(crate) fn problem_tag<T: 'static>() -> String {
    format!("udp {}", std::any::type_name::<T>())
}

pub(crate) fn algorithm_tag<T: 'static>() -> String {
    format!("uda {}", std::any::type_name::<T>())
}

pub(crate) fn bfe_tag<T: 'static>() -> String {
    format!("udbfe {}", std::any::type_name::<T>())
}

pub(crate) fn udi_tag<T: 'static>() -> String {
    format!("udi {}", std::any::type_name::<T>())
}

fn problem_from_value<T>(body: Value) -> Result<Box<dyn ProblemDriver>>
where
    T: UserProblem + Clone + Serialize + DeserializeOwned + 'static,
{
    Ok(Box::new(ProblemInner::new(serde_json::from_value::<T>(body)?)))
}

fn algorithm_from_value<T>(body: Value) -> Result<Box<dyn AlgorithmDriver>>
where
    T: UserAlgorithm + Clone + Serialize + DeserializeOwned + 'static,
{
    Ok(Box::new(AlgorithmInner::new(serde_json::from_value::<T>(
        body,
    )?)))
}

fn bfe_from_value<T>(body: Value) -> Result<Box<dyn BfeDriver>>
where
    T: BatchFitnessEvaluator + Clone + Serialize + DeserializeOwned + 'static,
{
    Ok(Box::new(BfeInner::new(serde_json::from_value::<T>(body)?)))
}

fn udi_from_value<T>(body: Value) -> Result<Box<dyn UdiDriver>>
where
    T: UserIsland + Clone + Serialize + DeserializeOwned + 'static,
{
    Ok(Box::new(UdiInner::new(serde_json::from_value::<T>(body)?)))
}

pub(crate) static PROBLEMS: LazyLock<Registry<dyn ProblemDriver>> = LazyLock::new(|| {
    let registry = Registry::new();
    let _ = registry.insert(problem_tag::<NullProblem>(), problem_from_value::<NullProblem>);
    registry
});

pub(crate) static ALGORITHMS: LazyLock<Registry<dyn AlgorithmDriver>> = LazyLock::new(|| {
    let registry = Registry::new();
    let _ = registry.insert(
        algorithm_tag::<NullAlgorithm>(),
        algorithm_from_value::<NullAlgorithm>,
    );
    registry
});

pub(crate) static BFES: LazyLock<Registry<dyn BfeDriver>> = LazyLock::new(|| {
    let registry = Registry::new();
    let _ = registry.insert(bfe_tag::<ThreadBfe>(), bfe_from_value::<ThreadBfe>);
    let _ = registry.insert(bfe_tag::<MemberBfe>(), bfe_from_value::<MemberBfe>);
    let _ = registry.insert(bfe_tag::<DefaultBfe>(), bfe_from_value::<DefaultBfe>);
    registry
});

pub(crate) static UDIS: LazyLock<Registry<dyn UdiDriver>> = LazyLock::new(|| {
    let registry = Registry::new();
    let _ = registry.insert(udi_tag::<ThreadIsland>(), udi_from_value::<ThreadIsland>);
    registry
});

/// Registers a user problem type for deserialization.
pub fn register_problem<T>() -> Result<()>
where
    T: UserProblem + Clone + Serialize + DeserializeOwned + 'static,
{
    PROBLEMS.insert(problem_tag::<T>(), problem_from_value::<T>)
}

/// Registers a user algorithm type for deserialization.
pub fn register_algorithm<T>() -> Result<()>
where
    T: UserAlgorithm + Clone + Serialize + DeserializeOwned + 'static,
{
    ALGORITHMS.insert(algorithm_tag::<T>(), algorithm_from_value::<T>)
}

/// Registers a user batch-fitness-evaluator type for deserialization.
pub fn register_bfe<T>() -> Result<()>
where
    T: BatchFitnessEvaluator + Clone + Serialize + DeserializeOwned + 'static,
{
    BFES.insert(bfe_tag::<T>(), bfe_from_value::<T>)
}

/// Registers a user island-driver type for deserialization.
pub fn register_udi<T>() -> Result<()>
where
    T: UserIsland + Clone + Serialize + DeserializeOwned + 'static,
{
    UDIS.insert(udi_tag::<T>(), udi_from_value::<T>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = BFES
            .deserialize("udbfe no::such::Type", Value::Null)
            .unwrap_err();
        assert!(matches!(err, PelagoError::Serialization(_)));
        assert!(err.to_string().contains("no::such::Type"));
    }

    #[test]
    fn test_builtin_bfes_are_preregistered() {
        let driver = BFES
            .deserialize(&bfe_tag::<ThreadBfe>(), serde_json::to_value(ThreadBfe).unwrap())
            .unwrap();
        assert_eq!(driver.type_tag(), bfe_tag::<ThreadBfe>());
    }
}
