//! In-thread evolution driver.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use super::UserIsland;
use crate::algorithm::Algorithm;
use crate::error::{PelagoError, Result};
use crate::population::Population;
use crate::thread_safety::ThreadSafety;

/// Island driver running evolutions directly on the island's worker
/// thread.
///
/// Both the algorithm and the population's problem must provide at least
/// the `Basic` thread-safety guarantee. The driver copies both, releases
/// the locks so concurrent reads stay responsive during the evolution,
/// then re-locks the population to publish the result. No state survives
/// between calls.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ThreadIsland;

fn check_thread_safety(name: &str, tier: ThreadSafety) -> Result<()> {
    if tier < ThreadSafety::Basic {
        return Err(PelagoError::InvalidArgument(format!(
            "thread islands require objects which provide at least the basic thread safety \
             level, but the object '{name}' provides only the '{tier}' thread safety guarantee"
        )));
    }
    Ok(())
}

impl UserIsland for ThreadIsland {
    fn run_evolve<'a>(
        &self,
        algo: MutexGuard<'a, Algorithm>,
        pop_mutex: &'a Mutex<Population>,
        pop: MutexGuard<'a, Population>,
    ) -> Result<()> {
        check_thread_safety(algo.name(), algo.thread_safety())?;
        check_thread_safety(pop.problem().name(), pop.problem().thread_safety())?;

        // Copy and release as soon as possible: the island stays readable
        // while the evolution runs.
        let algo_copy = algo.clone();
        drop(algo);
        let pop_copy = pop.clone();
        drop(pop);

        let new_pop = algo_copy.evolve(pop_copy)?;

        *pop_mutex.lock()? = new_pop;
        Ok(())
    }

    fn name(&self) -> String {
        "Thread island".to_string()
    }
}
