//! Selection of the island driver at construction time.

use std::sync::{PoisonError, RwLock};

use super::{ThreadIsland, Udi};
use crate::algorithm::Algorithm;
use crate::population::Population;

/// Signature of the process-wide island-driver factory.
///
/// The factory is consulted only by island constructors that receive no
/// explicit driver; it may inspect the algorithm and the population (for
/// instance their thread-safety tiers) to pick a suitable driver. The
/// driver of an island is fixed once construction completes.
pub type IslandFactory = fn(&Algorithm, &Population) -> Udi;

static FACTORY: RwLock<IslandFactory> = RwLock::new(default_island_factory);

/// The stock factory: always a [`ThreadIsland`].
fn default_island_factory(_algo: &Algorithm, _pop: &Population) -> Udi {
    Udi::new(ThreadIsland)
}

/// Replaces the process-wide island-driver factory.
///
/// Intended to be installed once at process start; installation is
/// last-writer-wins and races with concurrent island construction are not
/// guarded against.
pub fn set_island_factory(f: IslandFactory) {
    *FACTORY.write().unwrap_or_else(PoisonError::into_inner) = f;
}

pub(crate) fn make_udi(algo: &Algorithm, pop: &Population) -> Udi {
    let factory = *FACTORY.read().unwrap_or_else(PoisonError::into_inner);
    factory(algo, pop)
}
