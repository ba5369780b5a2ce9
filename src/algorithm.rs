//! # Algorithm Facade
//!
//! Mirror image of the [`problem`](crate::problem) facade for the other
//! half of an island: users implement [`UserAlgorithm`] and hand it to the
//! type-erased [`Algorithm`] container. The container caches the display
//! name and the thread-safety tier at construction so that island-side
//! checks never pay for dynamic dispatch.

use std::any::Any;
use std::fmt;

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::population::Population;
use crate::serial::{self, TaggedArchive};
use crate::thread_safety::ThreadSafety;

/// Contract for user-defined algorithms.
///
/// An algorithm takes a population and returns the evolved population.
/// The optional methods default to `Basic` thread safety, the type's
/// canonical name and no extra info.
pub trait UserAlgorithm: Send + Sync {
    /// Evolves a population.
    fn evolve(&self, pop: Population) -> Result<Population>;

    /// Declared thread-safety tier. Must be stable for a given instance.
    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Basic
    }

    /// Display name of the algorithm.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Optional free-form description.
    fn extra_info(&self) -> String {
        String::new()
    }
}

/// Object-safe shim between the container and a concrete [`UserAlgorithm`].
pub(crate) trait AlgorithmDriver: Send + Sync {
    fn clone_driver(&self) -> Box<dyn AlgorithmDriver>;
    fn as_any(&self) -> &dyn Any;
    fn evolve(&self, pop: Population) -> Result<Population>;
    fn thread_safety(&self) -> ThreadSafety;
    fn name(&self) -> String;
    fn extra_info(&self) -> String;
    fn type_tag(&self) -> String;
    fn to_body(&self) -> Result<serde_json::Value>;
}

pub(crate) struct AlgorithmInner<T> {
    value: T,
}

impl<T> AlgorithmInner<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> AlgorithmDriver for AlgorithmInner<T>
where
    T: UserAlgorithm + Clone + Serialize + 'static,
{
    fn clone_driver(&self) -> Box<dyn AlgorithmDriver> {
        Box::new(AlgorithmInner::new(self.value.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }

    fn evolve(&self, pop: Population) -> Result<Population> {
        self.value.evolve(pop)
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
        serial::algorithm_tag::<T>()
    }

    fn to_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.value)?)
    }
}

/// Type-erased algorithm container.
pub struct Algorithm {
    driver: Box<dyn AlgorithmDriver>,
    name: String,
    thread_safety: ThreadSafety,
}

impl Algorithm {
    /// Wraps a user algorithm, caching its name and thread-safety tier.
    pub fn new<T>(uda: T) -> Algorithm
    where
        T: UserAlgorithm + Clone + Serialize + 'static,
    {
        Algorithm::from_driver(Box::new(AlgorithmInner::new(uda)))
    }

    pub(crate) fn from_driver(driver: Box<dyn AlgorithmDriver>) -> Algorithm {
        let name = driver.name();
        let thread_safety = driver.thread_safety();
        Algorithm {
            driver,
            name,
            thread_safety,
        }
    }

    /// Evolves a population with the underlying algorithm.
    pub fn evolve(&self, pop: Population) -> Result<Population> {
        self.driver.evolve(pop)
    }

    /// Declared thread-safety tier, cached at construction.
    pub fn thread_safety(&self) -> ThreadSafety {
        self.thread_safety
    }

    /// Display name, cached at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extra info from the underlying algorithm.
    pub fn extra_info(&self) -> String {
        self.driver.extra_info()
    }

    /// Returns a reference to the inner user algorithm, if it is of type
    /// `T`.
    pub fn extract<T: 'static>(&self) -> Option<&T> {
        self.driver.as_any().downcast_ref::<T>()
    }

    /// Whether the inner user algorithm is of type `T`.
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

impl Clone for Algorithm {
    fn clone(&self) -> Self {
        Algorithm {
            driver: self.driver.clone_driver(),
            name: self.name.clone(),
            thread_safety: self.thread_safety,
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::new(NullAlgorithm)
    }
}

impl fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Algorithm")
            .field("name", &self.name)
            .field("thread_safety", &self.thread_safety)
            .finish()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Algorithm name: {}", self.name)?;
        writeln!(f, "\n\tThread safety: {}", self.thread_safety)?;
        let extra = self.extra_info();
        if !extra.is_empty() {
            writeln!(f, "\nExtra info:\n{extra}")?;
        }
        Ok(())
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let archive = TaggedArchive {
            tag: self.type_tag(),
            body: self.to_body().map_err(S::Error::custom)?,
        };
        archive.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let archive = TaggedArchive::deserialize(deserializer)?;
        let driver = serial::ALGORITHMS
            .deserialize(&archive.tag, archive.body)
            .map_err(D::Error::custom)?;
        Ok(Algorithm::from_driver(driver))
    }
}

/// Trivial built-in algorithm: returns the input population unchanged.
/// Serves as the algorithm of default-constructed islands.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct NullAlgorithm;

impl UserAlgorithm for NullAlgorithm {
    fn evolve(&self, pop: Population) -> Result<Population> {
        Ok(pop)
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Constant
    }

    fn name(&self) -> String {
        "Null algorithm".to_string()
    }
}
