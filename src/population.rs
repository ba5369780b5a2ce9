//! # Population
//!
//! A population bundles a [`Problem`] with the individuals evaluated
//! against it. Construction samples decision vectors uniformly within the
//! problem's bounds (integer components on integers) from a seeded
//! generator, so populations are reproducible given the same seed.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::problem::Problem;
use crate::rng;

/// A single candidate solution and its fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Decision vector, length `nx`.
    pub x: Vec<f64>,
    /// Fitness vector, length `nf`.
    pub f: Vec<f64>,
}

/// A problem together with a set of evaluated individuals.
#[derive(Clone, Serialize, Deserialize)]
pub struct Population {
    problem: Problem,
    individuals: Vec<Individual>,
    seed: u64,
}

impl Population {
    /// Creates a population of `size` random individuals.
    ///
    /// Decision vectors are sampled uniformly within the problem's bounds;
    /// each one is evaluated through [`Problem::fitness`], so the
    /// problem's evaluation counter advances by `size`. A `None` seed
    /// draws a fresh one from [`rng::random_seed`].
    pub fn new(problem: Problem, size: usize, seed: Option<u64>) -> Result<Population> {
        let seed = seed.unwrap_or_else(rng::random_seed);
        let mut pop = Population {
            problem,
            individuals: Vec::with_capacity(size),
            seed,
        };
        let mut generator = StdRng::seed_from_u64(seed);
        let (lb, ub) = pop.problem.bounds();
        let ncx = pop.problem.nx() - pop.problem.nix();
        for _ in 0..size {
            let x: Vec<f64> = lb
                .iter()
                .zip(ub.iter())
                .enumerate()
                .map(|(i, (&l, &u))| {
                    if i < ncx {
                        generator.gen_range(l..=u)
                    } else {
                        generator.gen_range(l as i64..=u as i64) as f64
                    }
                })
                .collect();
            pop.push(x)?;
        }
        Ok(pop)
    }

    /// Evaluates a decision vector and appends the resulting individual.
    pub fn push(&mut self, x: Vec<f64>) -> Result<()> {
        let f = self.problem.fitness(&x)?;
        self.individuals.push(Individual { x, f });
        Ok(())
    }

    /// Number of individuals.
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Whether the population holds no individuals.
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// The individuals, in insertion order.
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// The problem the individuals were evaluated against.
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// The seed the population was sampled from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Index of the individual with the lowest first fitness component.
    ///
    /// NaN fitnesses rank last; returns `None` on an empty population.
    pub fn best_idx(&self) -> Option<usize> {
        self.individuals
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let fa = a.f.first().copied().unwrap_or(f64::NAN);
                let fb = b.f.first().copied().unwrap_or(f64::NAN);
                fa.partial_cmp(&fb).unwrap_or_else(|| {
                    if fa.is_nan() {
                        std::cmp::Ordering::Greater
                    } else {
                        std::cmp::Ordering::Less
                    }
                })
            })
            .map(|(i, _)| i)
    }
}

impl Default for Population {
    fn default() -> Self {
        Population {
            problem: Problem::default(),
            individuals: Vec::new(),
            seed: 0,
        }
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("problem", &self.problem.name())
            .field("size", &self.len())
            .field("seed", &self.seed)
            .finish()
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Problem name: {}", self.problem.name())?;
        writeln!(f, "Population size: {}", self.len())?;
        writeln!(f, "Population seed: {}", self.seed)?;
        if let Some(idx) = self.best_idx() {
            writeln!(f, "Best fitness: {:?}", self.individuals[idx].f)?;
        }
        Ok(())
    }
}
