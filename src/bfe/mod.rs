//! # Batch Fitness Evaluation
//!
//! A batch fitness evaluator (BFE) evaluates many decision vectors against
//! a single problem in one call, possibly in parallel. Users implement the
//! [`BatchFitnessEvaluator`] trait (a UDBFE) and hand it to the type-erased
//! [`Bfe`] container, which validates batch shapes on the way in and out
//! and caches the driver's name and thread-safety tier.
//!
//! Three drivers ship with the crate:
//!
//! - [`ThreadBfe`]: data-parallel evaluation on the rayon pool, adapting
//!   its sharing strategy to the problem's thread-safety tier.
//! - [`MemberBfe`]: delegates to the problem's own `batch_fitness`.
//! - [`DefaultBfe`]: picks one of the above per call through a replaceable
//!   process-wide heuristic.
//!
//! ## Example
//!
//! ```rust
//! use pelago::{Bfe, Problem, ThreadSafety, UserProblem};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Square;
//!
//! impl UserProblem for Square {
//!     fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
//!         (vec![-1.0], vec![1.0])
//!     }
//!
//!     fn fitness(&self, dv: &[f64]) -> pelago::error::Result<Vec<f64>> {
//!         Ok(vec![dv[0] * dv[0]])
//!     }
//!
//!     fn thread_safety(&self) -> ThreadSafety {
//!         ThreadSafety::Constant
//!     }
//! }
//!
//! let p = Problem::new(Square).unwrap();
//! let bfe = Bfe::default();
//! assert_eq!(bfe.call(&p, &[1.0, 2.0, 3.0]).unwrap(), vec![1.0, 4.0, 9.0]);
//! ```

pub mod default;
pub mod member;
pub mod thread;

pub use default::{set_default_bfe_impl, BfeSelector, DefaultBfe};
pub use member::MemberBfe;
pub use thread::ThreadBfe;

use std::any::Any;
use std::fmt;

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PelagoError, Result};
use crate::problem::Problem;
use crate::serial::{self, TaggedArchive};
use crate::thread_safety::ThreadSafety;

/// Contract for user-defined batch fitness evaluators.
///
/// Only [`call`](BatchFitnessEvaluator::call) is mandatory. The optional
/// methods default to `Basic` thread safety, the type's canonical name and
/// no extra info.
pub trait BatchFitnessEvaluator: Send + Sync {
    /// Evaluates the fitnesses of a batch of decision vectors.
    ///
    /// `dvs` is the concatenation of `k` decision vectors of length
    /// `p.nx()`; the result must be the concatenation of the `k` fitness
    /// vectors, in input order. Implementations invoked through a [`Bfe`]
    /// may assume the batch shape has already been validated.
    fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>>;

    /// Declared thread-safety tier of the evaluator itself.
    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Basic
    }

    /// Display name of the evaluator.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Optional free-form description.
    fn extra_info(&self) -> String {
        String::new()
    }
}

/// Object-safe shim between the container and a concrete
/// [`BatchFitnessEvaluator`].
pub(crate) trait BfeDriver: Send + Sync {
    fn clone_driver(&self) -> Box<dyn BfeDriver>;
    fn as_any(&self) -> &dyn Any;
    fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>>;
    fn thread_safety(&self) -> ThreadSafety;
    fn name(&self) -> String;
    fn extra_info(&self) -> String;
    fn type_tag(&self) -> String;
    fn to_body(&self) -> Result<serde_json::Value>;
}

impl std::fmt::Debug for dyn BfeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BfeDriver").field("type_tag", &self.type_tag()).finish()
    }
}

pub(crate) struct BfeInner<T> {
    value: T,
}

impl<T> BfeInner<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> BfeDriver for BfeInner<T>
where
    T: BatchFitnessEvaluator + Clone + Serialize + 'static,
{
    fn clone_driver(&self) -> Box<dyn BfeDriver> {
        Box::new(BfeInner::new(self.value.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }

    fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>> {
        self.value.call(p, dvs)
    }

    fn thread_safety(&self) -> ThreadSafety {
        self.value.thread_safety()
    }

    fn name(&self) -> String {
        self.value.name()
    }

    fn extra_info(&self) -> String {
        self.value.extra_info()
    }

    fn type_tag(&self) -> String {
        serial::bfe_tag::<T>()
    }

    fn to_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.value)?)
    }
}

/// A free function usable as a batch fitness evaluator.
pub type BfeFnPtr = fn(&Problem, &[f64]) -> Result<Vec<f64>>;

/// Driver wrapping a plain function pointer.
///
/// Function-pointer evaluators are callable and extractable like any other
/// driver but cannot be serialized: there is no stable way to reconstruct
/// a function pointer from an archive.
#[derive(Clone, Copy)]
pub struct BfeFn {
    f: BfeFnPtr,
}

impl BatchFitnessEvaluator for BfeFn {
    fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>> {
        (self.f)(p, dvs)
    }

    fn name(&self) -> String {
        "Function-pointer batch fitness evaluator".to_string()
    }
}

impl Serialize for BfeFn {
    fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Err(S::Error::custom(
            "function-pointer batch fitness evaluators cannot be serialized",
        ))
    }
}

/// Type-erased batch-fitness-evaluator container.
///
/// Wraps a user driver behind dynamic dispatch, caching its name and
/// thread-safety tier at construction. Every call is bracketed by the
/// input and output shape checks of §batch semantics: the input length
/// must be a multiple of the problem dimension (with integral values on
/// integer components), and the output length must be exactly
/// `(len / nx) * nf`.
pub struct Bfe {
    driver: Box<dyn BfeDriver>,
    name: String,
    thread_safety: ThreadSafety,
}

impl Bfe {
    /// Wraps a user evaluator, caching its name and thread-safety tier.
    pub fn new<T>(udbfe: T) -> Bfe
    where
        T: BatchFitnessEvaluator + Clone + Serialize + 'static,
    {
        Bfe::from_driver(Box::new(BfeInner::new(udbfe)))
    }

    /// Wraps a free function with the evaluator signature.
    pub fn from_fn(f: BfeFnPtr) -> Bfe {
        Bfe::new(BfeFn { f })
    }

    pub(crate) fn from_driver(driver: Box<dyn BfeDriver>) -> Bfe {
        let name = driver.name();
        let thread_safety = driver.thread_safety();
        Bfe {
            driver,
            name,
            thread_safety,
        }
    }

    /// Evaluates a batch of decision vectors against `p`.
    ///
    /// Validates the batch shape, delegates to the inner driver, then
    /// validates the shape of the returned fitnesses. Both validation
    /// failures are `InvalidArgument` errors; an invalid input is rejected
    /// before any fitness call happens, and an invalid output is
    /// discarded.
    pub fn call(&self, p: &Problem, dvs: &[f64]) -> Result<Vec<f64>> {
        check_input_dvs(p, dvs)?;
        let fvs = self.driver.call(p, dvs)?;
        check_output_fvs(p, dvs, &fvs)?;
        Ok(fvs)
    }

    /// Display name, cached at construction.
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Extra info from the underlying driver.
    pub fn get_extra_info(&self) -> String {
        self.driver.extra_info()
    }

    /// Declared thread-safety tier, cached at construction.
    pub fn get_thread_safety(&self) -> ThreadSafety {
        self.thread_safety
    }

    /// Returns a reference to the inner driver, if it is of type `T`.
    pub fn extract<T: 'static>(&self) -> Option<&T> {
        self.driver.as_any().downcast_ref::<T>()
    }

    /// Whether the inner driver is of type `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.extract::<T>().is_some()
    }
}

impl Clone for Bfe {
    fn clone(&self) -> Self {
        Bfe {
            driver: self.driver.clone_driver(),
            name: self.name.clone(),
            thread_safety: self.thread_safety,
        }
    }
}

impl Default for Bfe {
    fn default() -> Self {
        Bfe::new(DefaultBfe)
    }
}

impl fmt::Debug for Bfe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bfe")
            .field("name", &self.name)
            .field("thread_safety", &self.thread_safety)
            .finish()
    }
}

impl fmt::Display for Bfe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BFE name: {}\n\n\tThread safety: {}\n", self.name, self.thread_safety)?;
        let extra = self.get_extra_info();
        if !extra.is_empty() {
            write!(f, "\nExtra info:\n{extra}\n")?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct BfeArchive {
    plugin: TaggedArchive,
    name: String,
    thread_safety: ThreadSafety,
}

impl Serialize for Bfe {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let archive = BfeArchive {
            plugin: TaggedArchive {
                tag: self.driver.type_tag(),
                body: self.driver.to_body().map_err(S::Error::custom)?,
            },
            name: self.name.clone(),
            thread_safety: self.thread_safety,
        };
        archive.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bfe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let archive = BfeArchive::deserialize(deserializer)?;
        let driver = serial::BFES
            .deserialize(&archive.plugin.tag, archive.plugin.body)
            .map_err(D::Error::custom)?;
        Ok(Bfe {
            driver,
            name: archive.name,
            thread_safety: archive.thread_safety,
        })
    }
}

/// Validates the shape of an input batch for `p`.
///
/// The batch length must be a non-ragged multiple of the problem
/// dimension, and values on the integer components of every decision
/// vector must be integral. Fails with `InvalidArgument` and no side
/// effects.
pub fn check_input_dvs(p: &Problem, dvs: &[f64]) -> Result<()> {
    let nx = p.nx();
    if dvs.len() % nx != 0 {
        return Err(PelagoError::InvalidArgument(format!(
            "invalid batch for the problem '{}': the batch length {} is not an exact multiple of \
             the problem dimension {}",
            p.name(),
            dvs.len(),
            nx
        )));
    }
    let nix = p.nix();
    if nix > 0 {
        for (row, dv) in dvs.chunks_exact(nx).enumerate() {
            for (col, &value) in dv.iter().enumerate().skip(nx - nix) {
                if value.fract() != 0.0 {
                    return Err(PelagoError::InvalidArgument(format!(
                        "invalid batch for the problem '{}': the value {} at position {} of \
                         decision vector {} sits on an integer component but is not integral",
                        p.name(),
                        value,
                        col,
                        row
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Validates the shape of an output batch produced for `p` and `dvs`.
pub fn check_output_fvs(p: &Problem, dvs: &[f64], fvs: &[f64]) -> Result<()> {
    let k = dvs.len() / p.nx();
    let expected = k.checked_mul(p.nf()).ok_or_else(|| {
        PelagoError::Overflow(format!(
            "overflow in the computation of the expected output size of a batch fitness \
             evaluation for the problem '{}'",
            p.name()
        ))
    })?;
    if fvs.len() != expected {
        return Err(PelagoError::InvalidArgument(format!(
            "invalid output batch for the problem '{}': {} fitness values returned for {} \
             decision vectors, expected {}",
            p.name(),
            fvs.len(),
            k,
            expected
        )));
    }
    Ok(())
}
