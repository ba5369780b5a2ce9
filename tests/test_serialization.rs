use serde::{Deserialize, Serialize};

use pelago::{
    serial, Algorithm, BatchFitnessEvaluator, Bfe, DefaultBfe, Island, Population, Problem,
    ThreadBfe, ThreadSafety, UserAlgorithm, UserProblem,
};

#[derive(Clone, Serialize, Deserialize)]
struct Paraboloid {
    scale: f64,
}

impl UserProblem for Paraboloid {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![-5.0, -5.0], vec![5.0, 5.0])
    }

    fn fitness(&self, dv: &[f64]) -> pelago::Result<Vec<f64>> {
        Ok(vec![self.scale * dv.iter().map(|x| x * x).sum::<f64>()])
    }

    fn thread_safety(&self) -> ThreadSafety {
        ThreadSafety::Constant
    }

    fn name(&self) -> String {
        "paraboloid".to_string()
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct Shrink {
    factor: f64,
}

impl UserAlgorithm for Shrink {
    fn evolve(&self, pop: Population) -> pelago::Result<Population> {
        let mut out = Population::new(pop.problem().clone(), 0, Some(pop.seed()))?;
        for ind in pop.individuals() {
            out.push(ind.x.iter().map(|x| x * self.factor).collect())?;
        }
        Ok(out)
    }

    fn name(&self) -> String {
        "shrink".to_string()
    }
}

// An intentionally unregistered problem type.
#[derive(Clone, Serialize, Deserialize)]
struct Stranger;

impl UserProblem for Stranger {
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0], vec![1.0])
    }

    fn fitness(&self, _dv: &[f64]) -> pelago::Result<Vec<f64>> {
        Ok(vec![0.0])
    }
}

#[test]
fn test_bfe_round_trip() {
    let bfe = Bfe::new(ThreadBfe);
    let json = serde_json::to_string(&bfe).unwrap();
    let loaded: Bfe = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.get_name(), bfe.get_name());
    assert_eq!(loaded.get_thread_safety(), bfe.get_thread_safety());
    assert!(loaded.is::<ThreadBfe>());

    let dflt: Bfe = serde_json::from_str(&serde_json::to_string(&Bfe::default()).unwrap()).unwrap();
    assert!(dflt.is::<DefaultBfe>());
    assert_eq!(dflt.get_name(), "Default batch fitness evaluator");
}

#[test]
fn test_problem_round_trip_preserves_the_counter() {
    serial::register_problem::<Paraboloid>().unwrap();

    let p = Problem::new(Paraboloid { scale: 2.0 }).unwrap();
    p.fitness(&[1.0, 1.0]).unwrap();
    p.fitness(&[2.0, 0.0]).unwrap();

    let json = serde_json::to_string(&p).unwrap();
    let loaded: Problem = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.name(), "paraboloid");
    assert_eq!(loaded.thread_safety(), ThreadSafety::Constant);
    assert_eq!(loaded.nx(), 2);
    assert_eq!(loaded.fevals(), 2);
    assert_eq!(loaded.extract::<Paraboloid>().unwrap().scale, 2.0);
}

#[test]
fn test_island_round_trip() {
    serial::register_problem::<Paraboloid>().unwrap();
    serial::register_algorithm::<Shrink>().unwrap();

    let pop = Population::new(
        Problem::new(Paraboloid { scale: 1.0 }).unwrap(),
        6,
        Some(21),
    )
    .unwrap();
    let island = Island::new(Algorithm::new(Shrink { factor: 0.5 }), pop);
    island.evolve().unwrap();
    island.wait().unwrap();

    let json = serde_json::to_string(&island).unwrap();
    let loaded: Island = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded.get_name(), island.get_name());
    let (algo, pop) = (
        loaded.get_algorithm().unwrap(),
        loaded.get_population().unwrap(),
    );
    assert_eq!(algo.name(), "shrink");
    assert_eq!(algo.extract::<Shrink>().unwrap().factor, 0.5);
    assert_eq!(
        pop.individuals(),
        island.get_population().unwrap().individuals()
    );
    assert!(!loaded.busy().unwrap());

    // The loaded island is fully operational.
    loaded.evolve().unwrap();
    loaded.wait().unwrap();
}

#[test]
fn test_island_serializes_mid_evolution() {
    serial::register_problem::<Paraboloid>().unwrap();
    serial::register_algorithm::<Shrink>().unwrap();

    let pop = Population::new(
        Problem::new(Paraboloid { scale: 1.0 }).unwrap(),
        4,
        Some(2),
    )
    .unwrap();
    let island = Island::new(Algorithm::new(Shrink { factor: 0.9 }), pop);
    for _ in 0..10 {
        island.evolve().unwrap();
    }
    // A snapshot taken while tasks are in flight is still a consistent
    // archive.
    let json = serde_json::to_string(&island).unwrap();
    island.wait().unwrap();
    let loaded: Island = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.get_population().unwrap().len(), 4);
}

#[test]
fn test_unregistered_type_fails_to_load() {
    let p = Problem::new(Stranger).unwrap();
    let json = serde_json::to_string(&p).unwrap();
    let err = serde_json::from_str::<Problem>(&json).unwrap_err();
    assert!(err.to_string().contains("Stranger"));
}

#[test]
fn test_function_pointer_bfe_does_not_serialize() {
    let bfe = Bfe::from_fn(|p, dvs| ThreadBfe.call(p, dvs));
    assert!(serde_json::to_string(&bfe).is_err());
}
