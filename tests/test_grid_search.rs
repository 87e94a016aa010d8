use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use bbopt::{
    algorithm::{AlgorithmOptions, AlgorithmState, OptimisationAlgorithm},
    error::OptimisationError,
    problem::{Bounds, OptimisationProblem},
    strategy::{GridSearch, MultiResolutionGridSearch},
};

fn recording_problem(bounds: Bounds, seen: &Rc<RefCell<Vec<Vec<f64>>>>) -> OptimisationProblem {
    let seen = Rc::clone(seen);
    OptimisationProblem::with_bounds(bounds, move |x: &[f64]| {
        seen.borrow_mut().push(x.to_vec());
        (x[0] - 0.3).powi(2) + (x[1] - 0.7).powi(2)
    })
}

fn options(iterations: usize) -> AlgorithmOptions {
    AlgorithmOptions::builder()
        .maximal_number_of_iterations(iterations)
        .seed(0)
        .build()
}

#[test]
fn test_ten_by_ten_grid_covers_the_unit_square() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut problem = recording_problem(Bounds::uniform(2, 0.0, 1.0).unwrap(), &seen);
    let mut grid = GridSearch::new();
    grid.set_number_of_samples_per_dimension(vec![10, 10]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(grid, options(100));

    let result = algorithm.optimise(&mut problem).unwrap();
    assert_eq!(result.number_of_iterations, 100);
    assert_eq!(result.number_of_distinct_evaluations, 100);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 100);
    let distinct: HashSet<Vec<u64>> = seen
        .iter()
        .map(|p| p.iter().map(|x| x.to_bits()).collect())
        .collect();
    assert_eq!(distinct.len(), 100);

    // Odometer order: the first dimension changes fastest.
    assert_eq!(seen[0], vec![0.0, 0.0]);
    assert_eq!(seen[9], vec![1.0, 0.0]);
    assert_eq!(seen[10], vec![0.0, 1.0 / 9.0]);
    assert_eq!(seen[99], vec![1.0, 1.0]);
    for (index, point) in seen.iter().enumerate() {
        assert!((point[0] - (index % 10) as f64 / 9.0).abs() < 1e-12);
        assert!((point[1] - (index / 10) as f64 / 9.0).abs() < 1e-12);
    }

    assert!((result.best_parameter[0] - 3.0 / 9.0).abs() < 1e-12);
    assert!((result.best_parameter[1] - 6.0 / 9.0).abs() < 1e-12);
}

#[test]
fn test_grid_larger_than_the_budget_is_rejected() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut problem = recording_problem(Bounds::uniform(2, 0.0, 1.0).unwrap(), &seen);
    let mut grid = GridSearch::new();
    grid.set_number_of_samples_per_dimension(vec![10, 10]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(grid, options(99));

    assert!(matches!(
        algorithm.optimise(&mut problem),
        Err(OptimisationError::Configuration(_))
    ));
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_levels_must_match_the_dimensions() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut problem = recording_problem(Bounds::uniform(2, 0.0, 1.0).unwrap(), &seen);
    let mut grid = GridSearch::new();
    grid.set_number_of_samples_per_dimension(vec![4]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(grid, options(100));

    assert!(matches!(
        algorithm.optimise(&mut problem),
        Err(OptimisationError::DimensionMismatch { expected: 2, actual: 1 })
    ));
}

#[test]
fn test_default_grid_fills_the_budget() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut problem = recording_problem(Bounds::uniform(2, 0.0, 1.0).unwrap(), &seen);
    let mut algorithm = OptimisationAlgorithm::new(GridSearch::new(), options(30));

    let result = algorithm.optimise(&mut problem).unwrap();
    // ⌊√30⌋ = 5 levels per dimension.
    assert_eq!(result.number_of_iterations, 25);
    assert_eq!(result.state, AlgorithmState::Terminated);
    assert_eq!(seen.borrow()[1], vec![0.25, 0.0]);
}

#[test]
fn test_single_level_samples_the_lower_bound() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let bounds = Bounds::new(vec![-1.0, 2.0], vec![1.0, 3.0]).unwrap();
    let mut problem = recording_problem(bounds, &seen);
    let mut grid = GridSearch::new();
    grid.set_number_of_samples_per_dimension(vec![3, 1]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(grid, options(3));

    algorithm.optimise(&mut problem).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![vec![-1.0, 2.0], vec![0.0, 2.0], vec![1.0, 2.0]]
    );
}

#[test]
fn test_sampling_factors_shape_the_default_grid() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut problem = recording_problem(Bounds::uniform(2, 0.0, 1.0).unwrap(), &seen);
    let mut grid = GridSearch::new();
    grid.set_sampling_factors(vec![2.0 / 3.0, 1.0 / 3.0]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(grid, options(200));

    let result = algorithm.optimise(&mut problem).unwrap();
    // 10 levels along the first dimension, 20 along the second.
    assert_eq!(result.number_of_iterations, 200);
    assert_eq!(result.state, AlgorithmState::Terminated);
    let seen = seen.borrow();
    assert!((seen[1][0] - 1.0 / 9.0).abs() < 1e-12);
    assert_eq!(seen[10][0], 0.0);
    assert!((seen[10][1] - 1.0 / 19.0).abs() < 1e-12);
    assert_eq!(seen[199], vec![1.0, 1.0]);
}

#[test]
fn test_sampling_factors_must_match_the_dimensions() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut problem = recording_problem(Bounds::uniform(2, 0.0, 1.0).unwrap(), &seen);
    let mut grid = GridSearch::new();
    grid.set_sampling_factors(vec![0.5, 0.25, 0.25]).unwrap();
    let mut algorithm = OptimisationAlgorithm::new(grid, options(100));

    assert!(matches!(
        algorithm.optimise(&mut problem),
        Err(OptimisationError::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[test]
fn test_multi_resolution_grid_zooms_in_on_the_optimum() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = Rc::clone(&seen);
    let mut problem = OptimisationProblem::with_bounds(
        Bounds::uniform(2, 0.0, 1.0).unwrap(),
        move |x: &[f64]| {
            recorder.borrow_mut().push(x.to_vec());
            (x[0] - 0.331).powi(2) + (x[1] - 0.707).powi(2)
        },
    );
    let mut algorithm =
        OptimisationAlgorithm::new(MultiResolutionGridSearch::new(), options(10_000));

    let result = algorithm.optimise(&mut problem).unwrap();
    // Steps of 0.1, 0.02 and 0.004 are refined; the fourth grid, with a step
    // of 0.0008, is the last one.
    assert_eq!(result.number_of_iterations, 4 * 121);
    assert_eq!(result.state, AlgorithmState::Terminated);
    assert!((result.best_parameter[0] - 0.331).abs() < 1e-3);
    assert!((result.best_parameter[1] - 0.707).abs() < 1e-3);

    // Later resolutions stay within the incumbent (0.3, 0.7) of the first
    // one plus or minus 0.1.
    let seen = seen.borrow();
    assert!(seen.len() > 121);
    for point in &seen[121..] {
        assert!(point[0] > 0.2 - 1e-12 && point[0] < 0.4 + 1e-12, "{:?}", point);
        assert!(point[1] > 0.6 - 1e-12 && point[1] < 0.8 + 1e-12, "{:?}", point);
    }
}
