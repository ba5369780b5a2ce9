//! Seed source for the framework.
//!
//! Construction sites that accept an optional seed (island constructors,
//! population sampling) draw a fresh one from here when the caller does not
//! provide its own.

use rand::Rng;

/// Returns a fresh seed from the thread-local entropy source.
pub fn random_seed() -> u64 {
    rand::thread_rng().gen()
}
