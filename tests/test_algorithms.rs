use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use bbopt::{
    algorithm::{AlgorithmOptions, AlgorithmState, LogLevel, OptimisationAlgorithm},
    error::OptimisationError,
    problem::{Bounds, Fallible, FunctionResult, OptimisationProblem},
    strategy::{
        Cmaes, CuckooSearch, DifferentialEvolution, HillClimbing, HookeJeeves,
        MultiResolutionGridSearch, ParticleSwarm, RandomSearch, SimulatedAnnealing, Strategy,
    },
};

fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

fn sphere_problem() -> OptimisationProblem {
    OptimisationProblem::with_bounds(Bounds::uniform(2, -5.0, 5.0).unwrap(), sphere)
}

fn options(iterations: usize, seed: u64) -> AlgorithmOptions {
    AlgorithmOptions::builder()
        .maximal_number_of_iterations(iterations)
        .maximal_duration(Duration::from_secs(120))
        .seed(seed)
        .build()
}

fn every_strategy() -> Vec<Strategy> {
    vec![
        HillClimbing::new().into(),
        SimulatedAnnealing::new().into(),
        HookeJeeves::new().into(),
        ParticleSwarm::new().into(),
        DifferentialEvolution::new().into(),
        Cmaes::new().into(),
        CuckooSearch::new().into(),
        MultiResolutionGridSearch::new().into(),
        RandomSearch::new().into(),
    ]
}

#[test]
fn test_single_random_sample_scenario() {
    let bounds = Bounds::new(vec![3.0, -4.0], vec![3.0, -4.0]).unwrap();
    let mut problem = OptimisationProblem::with_bounds(bounds, sphere);
    let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(1, 0));

    let result = algorithm.optimise(&mut problem).unwrap();
    assert_eq!(result.best_parameter, vec![3.0, -4.0]);
    assert_eq!(result.best_objective_value, 25.0);
    assert_eq!(result.best_soft_constraints_value, 0.0);
    assert_eq!(result.number_of_evaluations, 1);
    assert_eq!(result.number_of_iterations, 1);
    assert_eq!(result.state, AlgorithmState::Terminated);
}

#[test]
fn test_single_seeded_random_sample_on_the_square() {
    let run = || {
        let mut problem = sphere_problem();
        let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(1, 42));
        algorithm.optimise(&mut problem).unwrap()
    };

    let first = run();
    assert_eq!(first.state, AlgorithmState::Terminated);
    assert_eq!(first.number_of_iterations, 1);
    assert_eq!(first.number_of_evaluations, 1);
    assert!(Bounds::uniform(2, -5.0, 5.0).unwrap().contains(&first.best_parameter));
    assert_eq!(first.best_objective_value, sphere(&first.best_parameter));
    assert!(first.best_objective_value <= 50.0);
    assert_eq!(first.best_soft_constraints_value, 0.0);

    let second = run();
    assert_eq!(second.best_parameter, first.best_parameter);
    assert_eq!(second.best_objective_value, first.best_objective_value);
}

#[test]
fn test_single_random_sample_scenario_with_acceptable_value() {
    let bounds = Bounds::new(vec![3.0, -4.0], vec![3.0, -4.0]).unwrap();
    let mut problem = OptimisationProblem::with_bounds(bounds, sphere);
    let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(1, 0));
    algorithm.set_acceptable_objective_value(25.0);

    let result = algorithm.optimise(&mut problem).unwrap();
    assert_eq!(result.best_objective_value, 25.0);
    assert_eq!(result.state, AlgorithmState::Finished);
}

#[test]
fn test_every_strategy_improves_on_the_sphere() {
    for strategy in every_strategy() {
        let name = strategy.name();
        let mut problem = sphere_problem();
        let mut algorithm = OptimisationAlgorithm::new(strategy, options(200, 17));

        let result = algorithm.optimise(&mut problem).unwrap();
        assert_eq!(result.best_parameter.len(), 2, "{}", name);
        assert!(
            result.best_objective_value < 2.0,
            "{} ended at {}",
            name,
            result.best_objective_value
        );
        assert_eq!(result.best_objective_value, sphere(&result.best_parameter), "{}", name);
        assert!(Bounds::uniform(2, -5.0, 5.0).unwrap().contains(&result.best_parameter));
        assert!(result.number_of_iterations <= 200, "{}", name);
    }
}

#[test]
fn test_longer_runs_never_end_worse() {
    let mut previous = f64::INFINITY;
    for iterations in 1..=30 {
        let mut problem = sphere_problem();
        let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(iterations, 8));
        let result = algorithm.optimise(&mut problem).unwrap();
        assert!(result.best_objective_value <= previous);
        previous = result.best_objective_value;
    }
}

#[test]
fn test_iteration_budget_is_respected() {
    for strategy in every_strategy() {
        let mut problem = sphere_problem();
        let mut algorithm = OptimisationAlgorithm::new(strategy, options(7, 1));
        let result = algorithm.optimise(&mut problem).unwrap();
        assert!(result.number_of_iterations <= 7);
        assert!(algorithm.is_terminated());
    }
}

#[test]
fn test_random_search_evaluates_once_per_iteration() {
    let mut problem = sphere_problem();
    let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(50, 4));
    let result = algorithm.optimise(&mut problem).unwrap();
    assert_eq!(result.number_of_iterations, 50);
    assert_eq!(result.number_of_evaluations, 50);
    assert_eq!(result.number_of_distinct_evaluations, 50);
}

#[test]
fn test_same_seed_same_result() {
    for strategy in every_strategy() {
        let mut first_problem = sphere_problem();
        let mut second_problem = sphere_problem();
        let first = OptimisationAlgorithm::new(strategy.clone(), options(25, 5))
            .optimise(&mut first_problem)
            .unwrap();
        let second = OptimisationAlgorithm::new(strategy, options(25, 5))
            .optimise(&mut second_problem)
            .unwrap();
        assert_eq!(first.best_parameter, second.best_parameter);
        assert_eq!(first.number_of_evaluations, second.number_of_evaluations);
    }
}

#[test]
fn test_feasibility_comes_before_the_objective() {
    let mut problem = sphere_problem();
    // Only the half-plane x >= 2 is feasible.
    problem
        .set_soft_constraints_function(|x: &[f64]| (2.0 - x[0]).max(0.0))
        .unwrap();
    let mut algorithm = OptimisationAlgorithm::new(DifferentialEvolution::new(), options(150, 3));

    let result = algorithm.optimise(&mut problem).unwrap();
    assert_eq!(result.best_soft_constraints_value, 0.0);
    assert!(result.best_parameter[0] >= 2.0);
    assert!(result.best_objective_value >= 4.0);
}

#[test]
fn test_user_function_failure_stops_the_run() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut problem = OptimisationProblem::with_bounds(
        Bounds::uniform(1, 0.0, 1.0).unwrap(),
        Fallible(move |x: &[f64]| -> FunctionResult {
            counter.set(counter.get() + 1);
            if counter.get() > 3 {
                return Err("simulator crashed".into());
            }
            Ok(x[0])
        }),
    );
    let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(100, 6));

    let error = algorithm.optimise(&mut problem).unwrap_err();
    match error {
        OptimisationError::UserFunction(source) => assert_eq!(source.to_string(), "simulator crashed"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(calls.get(), 4);
    assert_eq!(algorithm.state(), AlgorithmState::Running);
    assert!(matches!(
        algorithm.optimise(&mut problem),
        Err(OptimisationError::Configuration(_))
    ));
}

#[test]
fn test_invalid_knobs_fail_at_start() {
    let mut problem = sphere_problem();
    let mut hill_climbing = HillClimbing::new();
    hill_climbing.set_maximal_step_size(vec![0.1, 0.1, 0.1]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(hill_climbing, options(10, 0));
    assert!(matches!(
        algorithm.optimise(&mut problem),
        Err(OptimisationError::DimensionMismatch { expected: 2, actual: 3 })
    ));

    let mut evolution = DifferentialEvolution::new();
    evolution.set_population_size(3).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(evolution, options(10, 0));
    assert!(matches!(
        algorithm.optimise(&mut problem),
        Err(OptimisationError::Configuration(_))
    ));
}

#[test]
fn test_initial_parameter_is_evaluated_first() {
    let mut problem = sphere_problem();
    let mut hooke_jeeves = HookeJeeves::new();
    hooke_jeeves.set_initial_parameter(vec![1.0, 1.0]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(hooke_jeeves, options(1, 0));

    let result = algorithm.optimise(&mut problem).unwrap();
    assert_eq!(result.best_parameter, vec![1.0, 1.0]);
    assert_eq!(result.best_objective_value, 2.0);
}

#[test]
fn test_verbose_run_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut problem = sphere_problem();
    let mut algorithm = OptimisationAlgorithm::new(
        ParticleSwarm::new(),
        AlgorithmOptions::builder()
            .maximal_number_of_iterations(5)
            .log_level(LogLevel::Verbose)
            .seed(2)
            .build(),
    );
    let result = algorithm.optimise(&mut problem).unwrap();
    assert_eq!(result.number_of_iterations, 5);
}
