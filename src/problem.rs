//! # Problem Facade
//!
//! The evolution core never sees concrete optimization problems. Users
//! implement the [`UserProblem`] trait (a UDP, in the framework jargon) and
//! hand it to the type-erased [`Problem`] container, which validates the
//! declared dimensions once, caches the attributes that are read on hot
//! paths (name, thread-safety tier, dimensions) outside the dynamic
//! dispatch, and counts fitness evaluations.
//!
//! ## Example
//!
//! ```rust
//! use pelago::{Problem, UserProblem};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Sphere {
//!     dim: usize,
//! }
//!
//! impl UserProblem for Sphere {
//!     fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
//!         (vec![-5.0; self.dim], vec![5.0; self.dim])
//!     }
//!
//!     fn fitness(&self, dv: &[f64]) -> pelago::error::Result<Vec<f64>> {
//!         Ok(vec![dv.iter().map(|x| x * x).sum()])
//!     }
//! }
//!
//! let p = Problem::new(Sphere { dim: 3 }).unwrap();
//! assert_eq!(p.nx(), 3);
//! assert_eq!(p.fitness(&[1.0, 2.0, 2.0]).unwrap(), vec![9.0]);
//! assert_eq!(p.fevals(), 1);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PelagoError, Result};
use crate::serial::{self, TaggedArchive};
use crate::thread_safety::ThreadSafety;

/// Contract for user-defined problems.
///
/// Only [`bounds`](UserProblem::bounds) and
/// [`fitness`](UserProblem::fitness) are mandatory. The remaining methods
/// have conservative defaults: one fitness component, no integer part, no
/// batch evaluation, `Basic` thread safety, the type's canonical name and
/// no extra info.
pub trait UserProblem: Send + Sync {
    /// Box bounds of the decision space; the common length of the two
    /// vectors is the problem dimension `nx`.
    fn bounds(&self) -> (Vec<f64>, Vec<f64>);

    /// Evaluates the fitness vector of a single decision vector.
    ///
    /// Implementations may assume `dv.len() == nx`; the container checks
    /// it before dispatching.
    fn fitness(&self, dv: &[f64]) -> Result<Vec<f64>>;

    /// Length of the fitness vector.
    fn nf(&self) -> usize {
        1
    }

    /// Number of trailing integer components in the decision vector.
    fn nix(&self) -> usize {
        0
    }

    /// Whether [`batch_fitness`](UserProblem::batch_fitness) is provided.
    fn has_batch_fitness(&self) -> bool {
        false
    }

    /// Evaluates a whole batch of decision vectors at once.
    ///
    /// `dvs` is the concatenation of `k` decision vectors; the result must
    /// be the concatenation of the `k` fitness vectors in the same order.
    fn batch_fitness(&self, dvs: &[f64]) -> Result<Vec<f64>> {
        let _ = dvs;
        Err(PelagoError::NotImplemented(format!(
            "the problem '{}' does not provide a batch_fitness() implementation",
            self.name()
        )))
    }

    /// Declared thread-safety tier. Must be stable for a given instance.
    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Basic
    }

    /// Display name of the problem.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Optional free-form description.
    fn extra_info(&self) -> String {
        String::new()
    }
}

/// Object-safe shim between the container and a concrete [`UserProblem`].
pub(crate) trait ProblemDriver: Send + Sync {
    fn clone_driver(&self) -> Box<dyn ProblemDriver>;
    fn as_any(&self) -> &dyn Any;
    fn bounds(&self) -> (Vec<f64>, Vec<f64>);
    fn fitness(&self, dv: &[f64]) -> Result<Vec<f64>>;
    fn nf(&self) -> usize;
    fn nix(&self) -> usize;
    fn has_batch_fitness(&self) -> bool;
    fn batch_fitness(&self, dvs: &[f64]) -> Result<Vec<f64>>;
    fn thread_safety(&self) -> ThreadSafety;
    fn name(&self) -> String;
    fn extra_info(&self) -> String;
    fn type_tag(&self) -> String;
    fn to_body(&self) -> Result<serde_json::Value>;
}

pub(crate) struct ProblemInner<T> {
    value: T,
}

impl<T> ProblemInner<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> ProblemDriver for ProblemInner<T>
where
    T: UserProblem + Clone + Serialize + 'static,
{
    fn clone_driver(&self) -> Box<dyn ProblemDriver> {
        Box::new(ProblemInner::new(self.value.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }

    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.value.bounds()
    }

    fn fitness(&self, dv: &[f64]) -> Result<Vec<f64>> {
        self.value.fitness(dv)
    }

    fn nf(&self) -> usize {
        self.value.nf()
    }

    fn nix(&self) -> usize {
        self.value.nix()
    }

    fn has_batch_fitness(&self) -> bool {
        self.value.has_batch_fitness()
    }

    fn batch_fitness(&self, dvs: &[f64]) -> Result<Vec<f64>> {
        self.value.batch_fitness(dvs)
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
        serial::problem_tag::<T>()
    }

    fn to_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.value)?)
    }
}

/// Type-erased problem container.
///
/// Holds a user problem behind dynamic dispatch, together with attributes
/// frozen at construction (`name`, thread-safety tier, dimensions) and an
/// atomic counter of fitness evaluations. Cloning deep-clones the user
/// problem and snapshots the counter.
pub struct Problem {
    driver: Box<dyn ProblemDriver>,
    name: String,
    thread_safety: ThreadSafety,
    nx: usize,
    nf: usize,
    nix: usize,
    fevals: AtomicU64,
}

impl Problem {
    /// Wraps a user problem, validating its declared dimensions.
    ///
    /// Rejects empty or mismatched bounds, non-finite or inverted bound
    /// pairs, a zero fitness dimension, an integer part larger than the
    /// decision vector, and non-integral integer-part bounds.
    pub fn new<T>(udp: T) -> Result<Problem>
    where
        T: UserProblem + Clone + Serialize + 'static,
    {
        Problem::from_driver(Box::new(ProblemInner::new(udp)), 0)
    }

    pub(crate) fn from_driver(driver: Box<dyn ProblemDriver>, fevals: u64) -> Result<Problem> {
        let name = driver.name();
        let (lb, ub) = driver.bounds();
        if lb.is_empty() {
            return Err(PelagoError::InvalidArgument(format!(
                "the problem '{name}' declares an empty decision space"
            )));
        }
        if lb.len() != ub.len() {
            return Err(PelagoError::InvalidArgument(format!(
                "the problem '{name}' declares {} lower bounds but {} upper bounds",
                lb.len(),
                ub.len()
            )));
        }
        for (i, (&l, &u)) in lb.iter().zip(ub.iter()).enumerate() {
            if !l.is_finite() || !u.is_finite() || l > u {
                return Err(PelagoError::InvalidArgument(format!(
                    "the problem '{name}' declares an invalid bound pair ({l}, {u}) at index {i}"
                )));
            }
        }
        let nx = lb.len();
        let nf = driver.nf();
        if nf == 0 {
            return Err(PelagoError::InvalidArgument(format!(
                "the problem '{name}' declares a zero-length fitness vector"
            )));
        }
        let nix = driver.nix();
        if nix > nx {
            return Err(PelagoError::InvalidArgument(format!(
                "the problem '{name}' declares {nix} integer components over a {nx}-dimensional \
                 decision vector"
            )));
        }
        for (i, (&l, &u)) in lb.iter().zip(ub.iter()).enumerate().skip(nx - nix) {
            if l.fract() != 0.0 || u.fract() != 0.0 {
                return Err(PelagoError::InvalidArgument(format!(
                    "the problem '{name}' declares non-integral bounds ({l}, {u}) for the integer \
                     component at index {i}"
                )));
            }
        }
        let thread_safety = driver.thread_safety();
        Ok(Problem {
            driver,
            name,
            thread_safety,
            nx,
            nf,
            nix,
            fevals: AtomicU64::new(fevals),
        })
    }

    /// Evaluates a single decision vector, counting the evaluation.
    pub fn fitness(&self, dv: &[f64]) -> Result<Vec<f64>> {
        if dv.len() != self.nx {
            return Err(PelagoError::InvalidArgument(format!(
                "a decision vector of length {} was passed to the problem '{}', whose dimension \
                 is {}",
                dv.len(),
                self.name,
                self.nx
            )));
        }
        let fv = self.driver.fitness(dv)?;
        if fv.len() != self.nf {
            return Err(PelagoError::InvalidArgument(format!(
                "the problem '{}' returned a fitness vector of length {}, expected {}",
                self.name,
                fv.len(),
                self.nf
            )));
        }
        self.fevals.fetch_add(1, Ordering::Relaxed);
        Ok(fv)
    }

    /// Whether the underlying problem provides batch evaluation.
    pub fn has_batch_fitness(&self) -> bool {
        self.driver.has_batch_fitness()
    }

    /// Forwards a batch to the underlying problem's own batch evaluator.
    ///
    /// No shape validation happens here; the `Bfe` container is the place
    /// where batches are checked. Errors from the problem surface
    /// unchanged. On success the evaluation counter advances by the number
    /// of decision vectors in the batch.
    pub fn batch_fitness(&self, dvs: &[f64]) -> Result<Vec<f64>> {
        let fvs = self.driver.batch_fitness(dvs)?;
        self.fevals
            .fetch_add((dvs.len() / self.nx) as u64, Ordering::Relaxed);
        Ok(fvs)
    }

    /// Box bounds of the decision space.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.driver.bounds()
    }

    /// Decision-vector length.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Fitness-vector length.
    pub fn nf(&self) -> usize {
        self.nf
    }

    /// Number of trailing integer components of the decision vector.
    pub fn nix(&self) -> usize {
        self.nix
    }

    /// Declared thread-safety tier, cached at construction.
    pub fn thread_safety(&self) -> ThreadSafety {
        self.thread_safety
    }

    /// Display name, cached at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extra info from the underlying problem.
    pub fn extra_info(&self) -> String {
        self.driver.extra_info()
    }

    /// Number of fitness evaluations recorded so far.
    pub fn fevals(&self) -> u64 {
        self.fevals.load(Ordering::Relaxed)
    }

    /// Adds `n` to the evaluation counter.
    ///
    /// Used by evaluators that run fitness calls on copies of this
    /// problem, whose counters are lost when the copies are dropped.
    pub fn increment_fevals(&self, n: u64) {
        self.fevals.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns a reference to the inner user problem, if it is of type `T`.
    pub fn extract<T: 'static>(&self) -> Option<&T> {
        self.driver.as_any().downcast_ref::<T>()
    }

    /// Whether the inner user problem is of type `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.extract::<T>().is_some()
    }

    pub(crate) fn type_tag(&self) -> String {
        self.driver.type_tag()
    }

    pub(crate) fn to_body(&self) -> Result<serde_json::Value> {
        self.driver.to_body()
    }
}

impl Clone for Problem {
    fn clone(&self) -> Self {
        Problem {
            driver: self.driver.clone_driver(),
            name: self.name.clone(),
            thread_safety: self.thread_safety,
            nx: self.nx,
            nf: self.nf,
            nix: self.nix,
            fevals: AtomicU64::new(self.fevals()),
        }
    }
}

impl Default for Problem {
    fn default() -> Self {
        Problem::new(NullProblem).expect("the null problem declares valid bounds")
    }
}

impl fmt::Debug for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Problem")
            .field("name", &self.name)
            .field("nx", &self.nx)
            .field("nf", &self.nf)
            .field("thread_safety", &self.thread_safety)
            .field("fevals", &self.fevals())
            .finish()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Problem name: {}", self.name)?;
        writeln!(f, "\n\tThread safety: {}", self.thread_safety)?;
        writeln!(f, "\tDimensions: {} -> {}", self.nx, self.nf)?;
        writeln!(f, "\tFitness evaluations: {}", self.fevals())?;
        let extra = self.extra_info();
        if !extra.is_empty() {
            writeln!(f, "\nExtra info:\n{extra}")?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct ProblemArchive {
    plugin: TaggedArchive,
    fevals: u64,
}

impl Serialize for Problem {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let archive = ProblemArchive {
            plugin: TaggedArchive {
                tag: self.type_tag(),
                body: self.to_body().map_err(S::Error::custom)?,
            },
            fevals: self.fevals(),
        };
        archive.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Problem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let archive = ProblemArchive::deserialize(deserializer)?;
        let driver = serial::PROBLEMS
            .deserialize(&archive.plugin.tag, archive.plugin.body)
            .map_err(D::Error::custom)?;
        Problem::from_driver(driver, archive.fevals).map_err(D::Error::custom)
    }
}

/// Trivial built-in problem: one decision variable in `[0, 1]`, constant
/// zero fitness. Serves as the problem of default-constructed populations
/// and islands.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct NullProblem;

impl UserProblem for NullProblem {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0], vec![1.0])
    }

    fn fitness(&self, _dv: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![0.0])
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Constant
    }

    fn name(&self) -> String {
        "Null problem".to_string()
    }
}
