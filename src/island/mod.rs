//! # Islands
//!
//! An island bundles three entities: a user-defined island driver (UDI),
//! an [`Algorithm`] and a [`Population`]. Through the driver, the island
//! runs evolutions asynchronously: [`Island::evolve`] pushes a task onto
//! the island's own worker thread and returns immediately, while the
//! owning thread remains free to read, copy or serialize the island.
//! Pending evolutions are joined with [`Island::wait`] and polled with
//! [`Island::busy`].
//!
//! A user driver implements [`UserIsland`]. Its `run_evolve` receives the
//! algorithm and population guards already locked, in that order; the
//! expected shape is copy-release-work-relock, so concurrent readers stay
//! responsive for the duration of the heavy work. [`ThreadIsland`] is the
//! built-in driver and the default choice of the island factory.
//!
//! ## Example
//!
//! ```rust
//! use pelago::{Algorithm, Island, Population, Problem};
//!
//! let pop = Population::new(Problem::default(), 8, Some(42)).unwrap();
//! let island = Island::new(Algorithm::default(), pop);
//! island.evolve().unwrap();
//! island.evolve().unwrap();
//! island.wait().unwrap();
//! assert!(!island.busy().unwrap());
//! assert_eq!(island.get_population().unwrap().len(), 8);
//! ```

pub mod factory;
pub mod thread;

pub use factory::{set_island_factory, IslandFactory};
pub use thread::ThreadIsland;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, trace};

use crate::algorithm::Algorithm;
use crate::error::Result;
use crate::population::Population;
use crate::problem::Problem;
use crate::serial::{self, TaggedArchive};
use crate::task_queue::{TaskHandle, TaskQueue};

/// Contract for user-defined island drivers.
///
/// `run_evolve` runs on the island's worker thread with both guards
/// already held, algorithm first. The driver should copy what it needs,
/// drop the guards, perform the evolution, and publish the new population
/// by re-locking `pop_mutex` before returning.
pub trait UserIsland: Send + Sync {
    /// Performs one evolution of the island's population.
    fn run_evolve<'a>(
        &self,
        algo: MutexGuard<'a, Algorithm>,
        pop_mutex: &'a Mutex<Population>,
        pop: MutexGuard<'a, Population>,
    ) -> Result<()>;

    /// Display name of the driver.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Optional free-form description.
    fn extra_info(&self) -> String {
        String::new()
    }
}

/// Object-safe shim between the island and a concrete [`UserIsland`].
pub(crate) trait UdiDriver: Send + Sync {
    fn clone_driver(&self) -> Box<dyn UdiDriver>;
    fn run_evolve<'a>(
        &self,
        algo: MutexGuard<'a, Algorithm>,
        pop_mutex: &'a Mutex<Population>,
        pop: MutexGuard<'a, Population>,
    ) -> Result<()>;
    fn name(&self) -> String;
    fn extra_info(&self) -> String;
    fn type_tag(&self) -> String;
    fn to_body(&self) -> Result<serde_json::Value>;
}

pub(crate) struct UdiInner<T> {
    value: T,
}

impl<T> UdiInner<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> UdiDriver for UdiInner<T>
where
    T: UserIsland + Clone + Serialize + 'static,
{
    fn clone_driver(&self) -> Box<dyn UdiDriver> {
        Box::new(UdiInner::new(self.value.clone()))
    }

    fn run_evolve<'a>(
        &self,
        algo: MutexGuard<'a, Algorithm>,
        pop_mutex: &'a Mutex<Population>,
        pop: MutexGuard<'a, Population>,
    ) -> Result<()> {
        self.value.run_evolve(algo, pop_mutex, pop)
    }

    fn name(&self) -> String {
        self.value.name()
    }

    fn extra_info(&self) -> String {
        self.value.extra_info()
    }

    fn type_tag(&self) -> String {
        serial::udi_tag::<T>()
    }

    fn to_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.value)?)
    }
}

/// An owned, type-erased island driver.
///
/// Produced by [`Udi::new`] from any conforming [`UserIsland`]; consumed
/// by the island factory and the explicit-driver constructors.
pub struct Udi {
    pub(crate) driver: Box<dyn UdiDriver>,
}

impl Udi {
    /// Type-erases a user island driver.
    pub fn new<T>(udi: T) -> Udi
    where
        T: UserIsland + Clone + Serialize + 'static,
    {
        Udi {
            driver: Box::new(UdiInner::new(udi)),
        }
    }
}

/// Guard type returned by the pre-wait hook.
pub type WaitGuard = Box<dyn Any>;

/// Signature of the process-wide pre-wait hook.
pub type WaitHook = fn() -> WaitGuard;

static WAIT_HOOK: RwLock<WaitHook> = RwLock::new(default_wait_hook);

fn default_wait_hook() -> WaitGuard {
    Box::new(())
}

/// Replaces the process-wide hook invoked at the start of every
/// [`Island::wait`].
///
/// The returned guard lives for the whole wait; embedded interpreters can
/// use it to suspend cooperatively (e.g. release an interpreter lock)
/// while the host thread blocks. Installation is last-writer-wins,
/// intended for process start.
pub fn set_wait_hook(f: WaitHook) {
    *WAIT_HOOK.write().unwrap_or_else(PoisonError::into_inner) = f;
}

fn take_wait_guard() -> WaitGuard {
    let hook = *WAIT_HOOK.read().unwrap_or_else(PoisonError::into_inner);
    hook()
}

// All island state lives in this block, behind an Arc: evolve tasks
// capture an Arc clone, so the block has a stable address, provably
// outlives every in-flight task, and moving the owning Island is a plain
// pointer move.
struct IslandData {
    udi: Box<dyn UdiDriver>,
    algo: Mutex<Algorithm>,
    pop: Mutex<Population>,
    futures: Mutex<Vec<TaskHandle>>,
    queue: TaskQueue,
}

/// Handle around an (algorithm, population, island driver) triple with
/// FIFO asynchronous evolution.
///
/// All accessors are safe to call while the island is evolving. Dropping
/// an island joins its pending evolutions first; evolve-task failures die
/// with the island, but a threading-primitive failure during teardown
/// panics, since it would leave a loose worker thread behind.
pub struct Island {
    data: Arc<IslandData>,
}

impl Island {
    fn from_parts(driver: Box<dyn UdiDriver>, algo: Algorithm, pop: Population) -> Island {
        Island {
            data: Arc::new(IslandData {
                udi: driver,
                algo: Mutex::new(algo),
                pop: Mutex::new(pop),
                futures: Mutex::new(Vec::new()),
                queue: TaskQueue::new(),
            }),
        }
    }

    /// Creates an island from an algorithm and a population; the driver is
    /// chosen by the process-wide [island factory](set_island_factory).
    pub fn new(algo: Algorithm, pop: Population) -> Island {
        let udi = factory::make_udi(&algo, &pop);
        Island::from_parts(udi.driver, algo, pop)
    }

    /// Creates an island with an explicit driver.
    pub fn with_udi(udi: Udi, algo: Algorithm, pop: Population) -> Island {
        Island::from_parts(udi.driver, algo, pop)
    }

    /// Creates an island, building the population from `problem` first.
    ///
    /// A `None` seed draws a fresh one from the framework seed source.
    pub fn from_problem(
        algo: Algorithm,
        problem: Problem,
        size: usize,
        seed: Option<u64>,
    ) -> Result<Island> {
        Ok(Island::new(algo, Population::new(problem, size, seed)?))
    }

    /// Creates an island with an explicit driver, building the population
    /// from `problem` first.
    pub fn with_udi_from_problem(
        udi: Udi,
        algo: Algorithm,
        problem: Problem,
        size: usize,
        seed: Option<u64>,
    ) -> Result<Island> {
        Ok(Island::with_udi(
            udi,
            algo,
            Population::new(problem, size, seed)?,
        ))
    }

    /// Deep copy: clones the driver and snapshots algorithm and
    /// population under their respective locks.
    ///
    /// Safe to call while `self` is evolving; the copy observes a
    /// consistent algorithm and a consistent population, though not
    /// necessarily from the same instant, as the two locks are acquired
    /// separately. The copy starts with no pending evolutions.
    pub fn try_clone(&self) -> Result<Island> {
        let driver = self.data.udi.clone_driver();
        let algo = self.get_algorithm()?;
        let pop = self.get_population()?;
        Ok(Island::from_parts(driver, algo, pop))
    }

    /// Launches one asynchronous evolution.
    ///
    /// Appends the task's completion handle to the pending list and
    /// returns immediately; tasks of one island run strictly in
    /// submission order. If the submission itself fails, the error
    /// propagates and the island's state is unchanged. Errors raised by
    /// the task are captured in its handle and surfaced by the next
    /// [`wait`](Island::wait).
    pub fn evolve(&self) -> Result<()> {
        let mut futures = self.data.futures.lock()?;
        let data = Arc::clone(&self.data);
        debug!(island = %self.get_name(), "enqueueing evolution task");
        let handle = self.data.queue.enqueue(move || {
            let algo_lock = data.algo.lock()?;
            let pop_lock = data.pop.lock()?;
            data.udi.run_evolve(algo_lock, &data.pop, pop_lock)
        })?;
        futures.push(handle);
        Ok(())
    }

    /// Blocks until every pending evolution has completed.
    ///
    /// Drains the pending handles in submission order. If any task
    /// failed, the remaining handles are still drained (their errors are
    /// discarded), the list is cleared, and the first error observed is
    /// returned. A `wait` with no pending evolutions is a no-op.
    pub fn wait(&self) -> Result<()> {
        let _guard = take_wait_guard();
        let mut futures = self.data.futures.lock()?;
        trace!(pending = futures.len(), "waiting for evolution tasks");
        let mut first_err = None;
        for handle in futures.iter() {
            if let Err(err) = handle.get() {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        futures.clear();
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether any pending evolution has not finished yet.
    ///
    /// Does not advance or consume handles; a completed-but-unwaited task
    /// keeps its outcome until the next [`wait`](Island::wait).
    pub fn busy(&self) -> Result<bool> {
        let futures = self.data.futures.lock()?;
        for handle in futures.iter() {
            if !handle.is_ready()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// A copy of the island's algorithm. Safe during evolution.
    pub fn get_algorithm(&self) -> Result<Algorithm> {
        Ok(self.data.algo.lock()?.clone())
    }

    /// A copy of the island's population. Safe during evolution.
    pub fn get_population(&self) -> Result<Population> {
        Ok(self.data.pop.lock()?.clone())
    }

    /// The driver's display name.
    pub fn get_name(&self) -> String {
        self.data.udi.name()
    }

    /// The driver's extra info.
    pub fn get_extra_info(&self) -> String {
        self.data.udi.extra_info()
    }
}

impl Default for Island {
    fn default() -> Self {
        Island::with_udi(
            Udi::new(ThreadIsland),
            Algorithm::default(),
            Population::default(),
        )
    }
}

impl Drop for Island {
    fn drop(&mut self) {
        if let Err(err) = self.wait() {
            if err.is_system() {
                // A failed threading primitive means loose worker threads;
                // nothing sane can continue from here.
                panic!("fatal error while tearing down an island: {err}");
            }
            debug!(%err, "discarding evolution error during island teardown");
        }
    }
}

impl fmt::Debug for Island {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Island")
            .field("name", &self.get_name())
            .finish()
    }
}

impl fmt::Display for Island {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Island name: {}", self.get_name())?;
        writeln!(f)?;
        let algo = self.get_algorithm().map_err(|_| fmt::Error)?;
        writeln!(f, "{algo}")?;
        let pop = self.get_population().map_err(|_| fmt::Error)?;
        writeln!(f, "{pop}")?;
        let extra = self.get_extra_info();
        if !extra.is_empty() {
            writeln!(f, "\nExtra info:\n{extra}")?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct IslandArchive {
    udi: TaggedArchive,
    algo: Algorithm,
    pop: Population,
}

impl Serialize for Island {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Snapshots under the same locks the accessors use; serializing
        // mid-evolution is safe.
        let archive = IslandArchive {
            udi: TaggedArchive {
                tag: self.data.udi.type_tag(),
                body: self.data.udi.to_body().map_err(S::Error::custom)?,
            },
            algo: self.get_algorithm().map_err(S::Error::custom)?,
            pop: self.get_population().map_err(S::Error::custom)?,
        };
        archive.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Island {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let archive = IslandArchive::deserialize(deserializer)?;
        let driver = serial::UDIS
            .deserialize(&archive.udi.tag, archive.udi.body)
            .map_err(D::Error::custom)?;
        Ok(Island::from_parts(driver, archive.algo, archive.pop))
    }
}
