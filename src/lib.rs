//! # Pelago
//!
//! The asynchronous evolution core of a parallel optimization framework:
//! batch fitness evaluation and islands, on top of user-provided problems
//! whose thread-safety guarantees vary.
//!
//! ## Overview
//!
//! Pelago reconciles three pressures at once:
//!
//! - **A type-erased plugin model**: problems, algorithms, batch
//!   evaluators and island drivers are arbitrary user types, wrapped into
//!   uniform containers ([`Problem`], [`Algorithm`], [`Bfe`], [`Island`])
//!   that cache hot attributes outside the dynamic-dispatch path.
//! - **A variable thread-safety contract**: every plugin self-declares a
//!   [`ThreadSafety`] tier, and the runtime adapts its concurrency
//!   strategy per call, sharing reentrant problems across workers,
//!   cloning merely thread-compatible ones and rejecting the rest.
//! - **Live concurrent access**: evolutions run on a dedicated worker
//!   thread per island while the owning thread reads, copies, serializes
//!   or destroys the island.
//!
//! ## Batch fitness evaluation
//!
//! A [`Bfe`] evaluates many decision vectors against one problem in a
//! single call, validating batch shapes on the way in and out:
//!
//! ```rust
//! use pelago::{Bfe, Problem, ThreadSafety, UserProblem};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Sphere;
//!
//! impl UserProblem for Sphere {
//!     fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
//!         (vec![-5.0, -5.0], vec![5.0, 5.0])
//!     }
//!
//!     fn fitness(&self, dv: &[f64]) -> pelago::error::Result<Vec<f64>> {
//!         Ok(vec![dv.iter().map(|x| x * x).sum()])
//!     }
//!
//!     fn thread_safety(&self) -> ThreadSafety {
//!         ThreadSafety::Constant
//!     }
//! }
//!
//! let p = Problem::new(Sphere).unwrap();
//! let fvs = Bfe::default().call(&p, &[0.0, 0.0, 3.0, 4.0]).unwrap();
//! assert_eq!(fvs, vec![0.0, 25.0]);
//! ```
//!
//! ## Islands
//!
//! An [`Island`] owns an algorithm and a population and evolves the
//! latter asynchronously, in FIFO order, on its own worker thread:
//!
//! ```rust
//! use pelago::{Algorithm, Island, Population, Problem};
//!
//! let pop = Population::new(Problem::default(), 16, None).unwrap();
//! let island = Island::new(Algorithm::default(), pop);
//! for _ in 0..4 {
//!     island.evolve().unwrap();
//! }
//! island.wait().unwrap();
//! ```
//!
//! Errors raised inside evolve tasks never reach the caller of
//! [`Island::evolve`]; they are captured in completion handles and
//! surfaced by the next [`Island::wait`].
//!
//! ## Serialization
//!
//! Plugin values travel through archives as a registered tag plus a serde
//! body. Built-in drivers are pre-registered; user types opt in through
//! the [`serial`] registration functions at process start.
//!
//! ## Modules
//!
//! - [`algorithm`]: algorithm contract and container
//! - [`bfe`]: batch fitness evaluation
//! - [`error`]: error types and the crate-wide `Result`
//! - [`island`]: islands, drivers, factory and wait hook
//! - [`population`]: populations of evaluated individuals
//! - [`problem`]: problem contract and container
//! - [`rng`]: seed source
//! - [`serial`]: plugin serialization registry
//! - [`task_queue`]: per-island FIFO executor
//! - [`thread_safety`]: the safety-tier enum

pub mod algorithm;
pub mod bfe;
pub mod error;
pub mod island;
pub mod population;
pub mod problem;
pub mod rng;
pub mod serial;
pub mod task_queue;
pub mod thread_safety;

// Re-export commonly used types for convenience
pub use algorithm::{Algorithm, NullAlgorithm, UserAlgorithm};
pub use bfe::{
    set_default_bfe_impl, BatchFitnessEvaluator, Bfe, BfeFn, BfeSelector, DefaultBfe, MemberBfe,
    ThreadBfe,
};
pub use error::{PelagoError, Result};
pub use island::{
    set_island_factory, set_wait_hook, Island, IslandFactory, ThreadIsland, Udi, UserIsland,
    WaitGuard, WaitHook,
};
pub use population::{Individual, Population};
pub use problem::{NullProblem, Problem, UserProblem};
pub use task_queue::{TaskHandle, TaskQueue};
pub use thread_safety::ThreadSafety;
