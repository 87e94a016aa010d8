//! # Optimisation Algorithm
//!
//! The [`OptimisationAlgorithm`] drives a [`Strategy`] over an
//! [`OptimisationProblem`] until the incumbent is good enough or a budget is
//! spent. It implements the contract every strategy shares:
//!
//! 1. If the incumbent is feasible and its objective value is at or below the
//!    acceptable value, the run is `Finished`.
//! 2. Otherwise, if the iteration budget or the wall-clock budget is spent, the
//!    run is `Terminated`.
//! 3. Otherwise the strategy performs one unit of work and the iteration count
//!    grows by one.
//!
//! A strategy that runs out of candidates (a fully enumerated grid) also ends
//! the run as `Terminated`.
//!
//! ## Example
//!
//! ```rust
//! use bbopt::algorithm::{AlgorithmOptions, AlgorithmState, OptimisationAlgorithm};
//! use bbopt::problem::{Bounds, OptimisationProblem};
//! use bbopt::strategy::RandomSearch;
//!
//! let mut problem = OptimisationProblem::with_bounds(
//!     Bounds::uniform(2, -5.0, 5.0).unwrap(),
//!     |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(),
//! );
//! let options = AlgorithmOptions::builder()
//!     .maximal_number_of_iterations(100)
//!     .seed(1)
//!     .build();
//!
//! let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options);
//! let result = algorithm.optimise(&mut problem).unwrap();
//!
//! assert_eq!(result.state, AlgorithmState::Terminated);
//! assert_eq!(result.number_of_iterations, 100);
//! assert!(result.best_objective_value < 50.0);
//! ```

pub mod incumbent;
pub mod options;

pub use incumbent::Incumbent;
pub use options::{AlgorithmOptions, AlgorithmOptionsBuilder, LogLevel};

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{
    error::{OptimisationError, Result},
    problem::OptimisationProblem,
    rng::RandomNumberGenerator,
    strategy::{Partition, StepContext, StepOutcome, Strategy},
};

/// The lifecycle of an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmState {
    NotStarted,
    Running,
    /// The incumbent reached the acceptable objective value.
    Finished,
    /// A budget was spent or the strategy ran out of candidates.
    Terminated,
}

/// The outcome of [`OptimisationAlgorithm::optimise`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationResult {
    pub best_parameter: Vec<f64>,
    pub best_objective_value: f64,
    pub best_soft_constraints_value: f64,
    pub number_of_iterations: usize,
    /// Evaluation requests made by this node, cached or not.
    pub number_of_evaluations: usize,
    /// Evaluations on this node that actually invoked the objective function.
    pub number_of_distinct_evaluations: usize,
    pub duration: Duration,
    pub state: AlgorithmState,
}

/// Hooks that let a distributed run take part in the engine loop.
pub(crate) trait Synchroniser {
    /// The share of the work this node is responsible for.
    fn partition(&self) -> Partition;

    /// Returns `true` if this node may stop on its own wall clock. Otherwise an
    /// expired clock is only reported through [`after_unit_of_work`](Self::after_unit_of_work).
    fn is_clock_local(&self) -> bool;

    /// Called after every unit of work. Returns `true` if the run must stop.
    fn after_unit_of_work(&mut self, incumbent: &mut Incumbent, wants_to_stop: bool) -> Result<bool>;

    /// Called once the loop has ended.
    fn after_run(&mut self, incumbent: &mut Incumbent) -> Result<()>;
}

/// The synchroniser of a run without peers.
pub(crate) struct Standalone;

impl Synchroniser for Standalone {
    fn partition(&self) -> Partition {
        Partition::single()
    }

    fn is_clock_local(&self) -> bool {
        true
    }

    fn after_unit_of_work(&mut self, _incumbent: &mut Incumbent, wants_to_stop: bool) -> Result<bool> {
        Ok(wants_to_stop)
    }

    fn after_run(&mut self, _incumbent: &mut Incumbent) -> Result<()> {
        Ok(())
    }
}

/// Runs a search strategy under iteration, time and accuracy budgets.
#[derive(Debug, Clone)]
pub struct OptimisationAlgorithm {
    strategy: Strategy,
    options: AlgorithmOptions,
    state: AlgorithmState,
    incumbent: Incumbent,
    number_of_iterations: usize,
    duration: Duration,
}

impl OptimisationAlgorithm {
    pub fn new(strategy: impl Into<Strategy>, options: AlgorithmOptions) -> Self {
        Self {
            strategy: strategy.into(),
            options,
            state: AlgorithmState::NotStarted,
            incumbent: Incumbent::new(),
            number_of_iterations: 0,
            duration: Duration::ZERO,
        }
    }

    /// Optimises `problem` until the run finishes or terminates.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if the problem's bounds are not set.
    /// - `Configuration` if the bounds or the strategy's knobs are invalid, or
    ///   if the algorithm already ran and was not [`reset`](Self::reset).
    /// - `UserFunction` if the objective or soft-constraint function fails. The
    ///   run stops immediately and stays `Running` until it is reset.
    pub fn optimise(&mut self, problem: &mut OptimisationProblem) -> Result<OptimisationResult> {
        self.run(problem, &mut Standalone)
    }

    pub(crate) fn run<S: Synchroniser>(
        &mut self,
        problem: &mut OptimisationProblem,
        synchroniser: &mut S,
    ) -> Result<OptimisationResult> {
        if self.state != AlgorithmState::NotStarted {
            return Err(OptimisationError::Configuration(format!(
                "The algorithm is {:?}; call reset() before optimising again",
                self.state
            )));
        }
        if self.options.get_acceptable_objective_value().is_nan() {
            return Err(OptimisationError::Configuration(
                "The acceptable objective value must not be NaN".to_string(),
            ));
        }
        let bounds = problem.bounds()?;

        let partition = synchroniser.partition();
        let seed = self
            .options
            .get_seed()
            .unwrap_or_else(RandomNumberGenerator::entropy_seed);
        let mut rng = if self.strategy.shares_random_stream() {
            RandomNumberGenerator::from_seed(seed)
        } else {
            RandomNumberGenerator::for_stream(seed, partition.rank() as u64)
        };

        let maximal_number_of_iterations = self.options.get_maximal_number_of_iterations();
        let maximal_duration = self.options.get_maximal_duration();
        let log_level = self.options.get_log_level();

        self.incumbent = Incumbent::new();
        self.number_of_iterations = 0;
        self.duration = Duration::ZERO;
        self.strategy.as_search_mut().initialise(&mut StepContext {
            problem: &mut *problem,
            bounds: &bounds,
            incumbent: &mut self.incumbent,
            rng: &mut rng,
            iteration: 0,
            maximal_number_of_iterations,
            elapsed: Duration::ZERO,
            maximal_duration,
            partition,
            log_level,
        })?;

        if log_level != LogLevel::None {
            info!(
                strategy = self.strategy.name(),
                rank = partition.rank(),
                number_of_nodes = partition.number_of_nodes(),
                seed,
                "Starting optimisation"
            );
        }

        self.state = AlgorithmState::Running;
        let start = Instant::now();
        let mut must_stop = false;
        loop {
            self.duration = start.elapsed();
            if self.is_finished() {
                self.state = AlgorithmState::Finished;
                break;
            }
            if must_stop
                || self.number_of_iterations >= maximal_number_of_iterations
                || (synchroniser.is_clock_local() && self.duration >= maximal_duration)
            {
                self.state = AlgorithmState::Terminated;
                break;
            }

            let before = self.incumbent.evaluation();
            let outcome = self.strategy.as_search_mut().next_unit_of_work(&mut StepContext {
                problem: &mut *problem,
                bounds: &bounds,
                incumbent: &mut self.incumbent,
                rng: &mut rng,
                iteration: self.number_of_iterations,
                maximal_number_of_iterations,
                elapsed: start.elapsed(),
                maximal_duration,
                partition,
                log_level,
            })?;
            self.number_of_iterations += 1;

            if log_level == LogLevel::Verbose && self.incumbent.evaluation() != before {
                info!(
                    iteration = self.number_of_iterations,
                    objective_value = self.incumbent.objective_value(),
                    soft_constraints_value = self.incumbent.soft_constraints_value(),
                    "Found a better parameter"
                );
            }

            let wants_to_stop = outcome == StepOutcome::Exhausted
                || (!synchroniser.is_clock_local() && start.elapsed() >= maximal_duration);
            must_stop = synchroniser.after_unit_of_work(&mut self.incumbent, wants_to_stop)?;
        }

        synchroniser.after_run(&mut self.incumbent)?;
        if self.state == AlgorithmState::Terminated && self.is_finished() {
            // The reduction at the end of the run may bring in a good enough value.
            self.state = AlgorithmState::Finished;
        }
        self.duration = start.elapsed();

        let result = self.result(problem);
        if log_level != LogLevel::None {
            info!(
                state = ?result.state,
                iterations = result.number_of_iterations,
                evaluations = result.number_of_evaluations,
                distinct_evaluations = result.number_of_distinct_evaluations,
                best_objective_value = result.best_objective_value,
                best_soft_constraints_value = result.best_soft_constraints_value,
                duration = ?result.duration,
                "Optimisation ended"
            );
        } else {
            debug!(state = ?result.state, "Optimisation ended");
        }
        Ok(result)
    }

    fn result(&self, problem: &OptimisationProblem) -> OptimisationResult {
        OptimisationResult {
            best_parameter: self.incumbent.parameter().to_vec(),
            best_objective_value: self.incumbent.objective_value(),
            best_soft_constraints_value: self.incumbent.soft_constraints_value(),
            number_of_iterations: self.number_of_iterations,
            number_of_evaluations: problem.number_of_evaluations(),
            number_of_distinct_evaluations: problem.number_of_distinct_evaluations(),
            duration: self.duration,
            state: self.state,
        }
    }

    /// Returns the algorithm to `NotStarted`, forgetting the incumbent.
    ///
    /// The problem's caches are not touched; a new run on the same problem
    /// reuses them.
    pub fn reset(&mut self) {
        self.state = AlgorithmState::NotStarted;
        self.incumbent = Incumbent::new();
        self.number_of_iterations = 0;
        self.duration = Duration::ZERO;
    }

    /// Returns `true` if the incumbent is feasible and good enough.
    pub fn is_finished(&self) -> bool {
        self.incumbent.soft_constraints_value() == 0.0
            && self.incumbent.objective_value() <= self.options.get_acceptable_objective_value()
    }

    /// Returns `true` if a budget is spent or the last run was terminated.
    pub fn is_terminated(&self) -> bool {
        self.state == AlgorithmState::Terminated
            || self.number_of_iterations >= self.options.get_maximal_number_of_iterations()
            || self.duration >= self.options.get_maximal_duration()
    }

    pub fn set_maximal_number_of_iterations(&mut self, maximal_number_of_iterations: usize) {
        self.options
            .set_maximal_number_of_iterations(maximal_number_of_iterations);
    }

    pub fn set_maximal_duration(&mut self, maximal_duration: Duration) {
        self.options.set_maximal_duration(maximal_duration);
    }

    pub fn set_acceptable_objective_value(&mut self, acceptable_objective_value: f64) {
        self.options
            .set_acceptable_objective_value(acceptable_objective_value);
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.options.set_seed(seed);
    }

    pub fn set_log_level(&mut self, log_level: LogLevel) {
        self.options.set_log_level(log_level);
    }

    pub fn options(&self) -> &AlgorithmOptions {
        &self.options
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn state(&self) -> AlgorithmState {
        self.state
    }

    pub fn incumbent(&self) -> &Incumbent {
        &self.incumbent
    }

    pub fn best_parameter(&self) -> &[f64] {
        self.incumbent.parameter()
    }

    pub fn best_objective_value(&self) -> f64 {
        self.incumbent.objective_value()
    }

    pub fn best_soft_constraints_value(&self) -> f64 {
        self.incumbent.soft_constraints_value()
    }

    pub fn number_of_iterations(&self) -> usize {
        self.number_of_iterations
    }

    /// Returns the wall-clock time of the last run.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Bounds;
    use crate::strategy::{GridSearch, HillClimbing, RandomSearch, SimulatedAnnealing};

    fn sphere_problem(dimensions: usize) -> OptimisationProblem {
        OptimisationProblem::with_bounds(
            Bounds::uniform(dimensions, -5.0, 5.0).unwrap(),
            |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(),
        )
    }

    fn options(iterations: usize) -> AlgorithmOptions {
        AlgorithmOptions::builder()
            .maximal_number_of_iterations(iterations)
            .maximal_duration(Duration::from_secs(60))
            .seed(3)
            .build()
    }

    #[test]
    fn test_missing_bounds_are_reported() {
        let mut problem = OptimisationProblem::new(2, |_: &[f64]| 0.0);
        let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(10));
        assert!(matches!(
            algorithm.optimise(&mut problem),
            Err(OptimisationError::NotConfigured(_))
        ));
        assert_eq!(algorithm.state(), AlgorithmState::NotStarted);
    }

    #[test]
    fn test_zero_budget_terminates_without_work() {
        let mut problem = sphere_problem(2);
        let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(0));
        let result = algorithm.optimise(&mut problem).unwrap();
        assert_eq!(result.state, AlgorithmState::Terminated);
        assert_eq!(result.number_of_iterations, 0);
        assert!(result.best_parameter.is_empty());
        assert_eq!(result.best_objective_value, f64::INFINITY);
    }

    #[test]
    fn test_finishes_once_acceptable() {
        let mut problem = sphere_problem(1);
        let mut algorithm = OptimisationAlgorithm::new(
            RandomSearch::new(),
            AlgorithmOptions::builder()
                .maximal_number_of_iterations(10_000)
                .maximal_duration(Duration::from_secs(60))
                .acceptable_objective_value(25.0)
                .seed(5)
                .build(),
        );
        let result = algorithm.optimise(&mut problem).unwrap();
        assert_eq!(result.state, AlgorithmState::Finished);
        assert_eq!(result.number_of_iterations, 1);
        assert!(algorithm.is_finished());
    }

    #[test]
    fn test_second_run_requires_reset() {
        let mut problem = sphere_problem(2);
        let mut algorithm = OptimisationAlgorithm::new(HillClimbing::new(), options(5));
        algorithm.optimise(&mut problem).unwrap();
        assert!(matches!(
            algorithm.optimise(&mut problem),
            Err(OptimisationError::Configuration(_))
        ));

        algorithm.reset();
        assert_eq!(algorithm.state(), AlgorithmState::NotStarted);
        assert!(algorithm.incumbent().is_empty());
        let result = algorithm.optimise(&mut problem).unwrap();
        assert_eq!(result.number_of_iterations, 5);
    }

    #[test]
    fn test_exhausted_grid_terminates_early() {
        let mut problem = sphere_problem(2);
        let mut grid = GridSearch::new();
        grid.set_number_of_samples_per_dimension(vec![3, 3]).unwrap();
        let mut algorithm = OptimisationAlgorithm::new(grid, options(100));
        let result = algorithm.optimise(&mut problem).unwrap();
        assert_eq!(result.state, AlgorithmState::Terminated);
        assert_eq!(result.number_of_iterations, 9);
        assert_eq!(result.best_objective_value, 0.0);
        assert!(algorithm.is_terminated());
    }

    #[test]
    fn test_nan_acceptable_value_is_rejected() {
        let mut problem = sphere_problem(1);
        let mut algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options(1));
        algorithm.set_acceptable_objective_value(f64::NAN);
        assert!(matches!(
            algorithm.optimise(&mut problem),
            Err(OptimisationError::Configuration(_))
        ));
    }

    #[test]
    fn test_duration_budget_stops_an_unbounded_run() {
        let mut problem = sphere_problem(2);
        let mut algorithm = OptimisationAlgorithm::new(
            RandomSearch::new(),
            AlgorithmOptions::builder()
                .maximal_duration(Duration::from_millis(20))
                .seed(1)
                .build(),
        );
        let result = algorithm.optimise(&mut problem).unwrap();
        assert_eq!(result.state, AlgorithmState::Terminated);
        assert!(result.duration >= Duration::from_millis(20));
        assert!(result.number_of_iterations > 0);
    }

    #[test]
    fn test_annealing_runs_on_a_duration_budget_alone() {
        let mut problem = sphere_problem(2);
        let mut algorithm = OptimisationAlgorithm::new(
            SimulatedAnnealing::new(),
            AlgorithmOptions::builder()
                .maximal_duration(Duration::from_millis(30))
                .seed(4)
                .build(),
        );
        let result = algorithm.optimise(&mut problem).unwrap();
        assert_eq!(result.state, AlgorithmState::Terminated);
        assert!(result.number_of_iterations > 1);
        assert!(result.best_objective_value.is_finite());
    }
}
