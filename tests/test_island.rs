use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pelago::{
    error::PelagoError, Algorithm, Island, Population, Problem, ThreadIsland, ThreadSafety, Udi,
    UserAlgorithm, UserProblem,
};

#[derive(Clone, Serialize, Deserialize)]
struct Line;

impl UserProblem for Line {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0], vec![1000.0])
    }

    fn fitness(&self, dv: &[f64]) -> pelago::Result<Vec<f64>> {
        Ok(vec![dv[0]])
    }
}

/// Deterministic algorithm: every individual's decision vector is halved.
#[derive(Clone, Serialize, Deserialize)]
struct Halver;

impl UserAlgorithm for Halver {
    fn evolve(&self, pop: Population) -> pelago::Result<Population> {
        let mut out = Population::new(pop.problem().clone(), 0, Some(pop.seed()))?;
        for ind in pop.individuals() {
            out.push(ind.x.iter().map(|x| x / 2.0).collect())?;
        }
        Ok(out)
    }
}

#[test]
fn test_fifo_evolution_matches_sequential() {
    let make_island = || {
        let pop =
            Population::new(Problem::new(Line).unwrap(), 5, Some(123)).unwrap();
        Island::new(Algorithm::new(Halver), pop)
    };

    let batched = make_island();
    for _ in 0..4 {
        batched.evolve().unwrap();
    }
    batched.wait().unwrap();

    let sequential = make_island();
    for _ in 0..4 {
        sequential.evolve().unwrap();
        sequential.wait().unwrap();
    }

    assert_eq!(
        batched.get_population().unwrap().individuals(),
        sequential.get_population().unwrap().individuals()
    );
}

static FLAKY_CALLS: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Serialize, Deserialize)]
struct FlakySecond;

impl UserAlgorithm for FlakySecond {
    fn evolve(&self, pop: Population) -> pelago::Result<Population> {
        if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(PelagoError::Other("second evolution exploded".to_string()));
        }
        Ok(pop)
    }
}

#[test]
fn test_wait_surfaces_the_first_error_and_resets() {
    let pop = Population::new(Problem::new(Line).unwrap(), 2, Some(3)).unwrap();
    let island = Island::new(Algorithm::new(FlakySecond), pop);
    island.evolve().unwrap();
    island.evolve().unwrap();
    island.evolve().unwrap();

    let err = island.wait().unwrap_err();
    match err {
        PelagoError::Task(inner) => assert!(inner.to_string().contains("second evolution")),
        other => panic!("expected Task, got {other:?}"),
    }

    // The failure drained everything.
    assert!(!island.busy().unwrap());
    island.wait().unwrap();
    assert_eq!(FLAKY_CALLS.load(Ordering::SeqCst), 3);
}

static GATE_ENTERED: AtomicBool = AtomicBool::new(false);
static GATE_RELEASE: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Serialize, Deserialize)]
struct Gated;

impl UserAlgorithm for Gated {
    fn evolve(&self, pop: Population) -> pelago::Result<Population> {
        GATE_ENTERED.store(true, Ordering::SeqCst);
        while !GATE_RELEASE.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        Ok(pop)
    }
}

#[test]
fn test_copy_of_a_live_island_does_not_block() {
    let pop = Population::new(Problem::new(Line).unwrap(), 3, Some(9)).unwrap();
    let island = Island::new(Algorithm::new(Gated), pop);
    island.evolve().unwrap();
    while !GATE_ENTERED.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }
    assert!(island.busy().unwrap());

    // The evolving island released its locks after copying, so a deep
    // copy completes while the task is still running.
    let copy = island.try_clone().unwrap();
    assert!(!copy.busy().unwrap());
    assert_eq!(copy.get_population().unwrap().len(), 3);

    GATE_RELEASE.store(true, Ordering::SeqCst);
    island.wait().unwrap();
    assert!(!island.busy().unwrap());
}

#[test]
fn test_snapshots_are_never_torn() {
    let pop = Population::new(Problem::new(Line).unwrap(), 8, Some(5)).unwrap();
    let island = Island::new(Algorithm::new(Halver), pop);
    for _ in 0..50 {
        island.evolve().unwrap();
    }
    for _ in 0..200 {
        let snap = island.get_population().unwrap();
        assert_eq!(snap.len(), 8);
        for ind in snap.individuals() {
            // Fitness and decision vector always belong to the same
            // generation.
            assert_eq!(ind.f, snap.problem().fitness(&ind.x).unwrap());
        }
    }
    island.wait().unwrap();
}

static SLOW_DONE: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Serialize, Deserialize)]
struct SlowCounter;

impl UserAlgorithm for SlowCounter {
    fn evolve(&self, pop: Population) -> pelago::Result<Population> {
        std::thread::sleep(Duration::from_millis(20));
        SLOW_DONE.fetch_add(1, Ordering::SeqCst);
        Ok(pop)
    }
}

#[test]
fn test_drop_joins_pending_evolutions() {
    {
        let pop = Population::new(Problem::new(Line).unwrap(), 2, Some(1)).unwrap();
        let island = Island::new(Algorithm::new(SlowCounter), pop);
        for _ in 0..5 {
            island.evolve().unwrap();
        }
    }
    // The destructor returns only once every referenced task has run.
    assert_eq!(SLOW_DONE.load(Ordering::SeqCst), 5);
}

#[derive(Clone, Serialize, Deserialize)]
struct NoSafety;

impl UserProblem for NoSafety {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0], vec![1.0])
    }

    fn fitness(&self, _dv: &[f64]) -> pelago::Result<Vec<f64>> {
        Ok(vec![0.0])
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::None
    }

    fn name(&self) -> String {
        "untouchable".to_string()
    }
}

#[test]
fn test_thread_island_rejects_weak_problems() {
    let pop = Population::new(Problem::new(NoSafety).unwrap(), 2, Some(4)).unwrap();
    let island = Island::new(Algorithm::default(), pop);
    island.evolve().unwrap();
    let err = island.wait().unwrap_err();
    match err {
        PelagoError::Task(inner) => {
            let text = inner.to_string();
            assert!(text.contains("untouchable"));
            assert!(text.contains("thread safety"));
        }
        other => panic!("expected Task, got {other:?}"),
    }
}

#[test]
fn test_construction_variants() {
    let island =
        Island::from_problem(Algorithm::default(), Problem::default(), 10, Some(77)).unwrap();
    assert_eq!(island.get_population().unwrap().len(), 10);
    assert_eq!(island.get_name(), "Thread island");

    let explicit = Island::with_udi(
        Udi::new(ThreadIsland),
        Algorithm::default(),
        Population::default(),
    );
    assert_eq!(explicit.get_name(), "Thread island");
    assert!(explicit.get_extra_info().is_empty());

    let seeded_a =
        Island::from_problem(Algorithm::default(), Problem::default(), 4, Some(8)).unwrap();
    let seeded_b =
        Island::from_problem(Algorithm::default(), Problem::default(), 4, Some(8)).unwrap();
    assert_eq!(
        seeded_a.get_population().unwrap().individuals(),
        seeded_b.get_population().unwrap().individuals()
    );
}

#[test]
fn test_display_form() {
    let island = Island::default();
    let text = island.to_string();
    assert!(text.starts_with("Island name: Thread island\n"));
    assert!(text.contains("Algorithm name: Null algorithm"));
    assert!(text.contains("Problem name: Null problem"));
}
