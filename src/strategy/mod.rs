//! # Strategy
//!
//! A [`Strategy`] decides which candidates to evaluate in one unit of work.
//! The set of strategies is closed and split into three families that differ
//! in how much they remember between units of work:
//!
//! - [`TrajectoryStrategy`]: one evolving current state
//!   ([`HillClimbing`], [`SimulatedAnnealing`], [`HookeJeeves`]).
//! - [`PopulationStrategy`]: a fixed-size population with per-individual state
//!   ([`ParticleSwarm`], [`DifferentialEvolution`], [`Cmaes`], [`CuckooSearch`]).
//! - [`SamplingStrategy`]: little more than a cursor ([`GridSearch`],
//!   [`MultiResolutionGridSearch`], [`RandomSearch`]).
//!
//! Every concrete strategy converts into a `Strategy`, so it can be handed to
//! [`OptimisationAlgorithm::new`](crate::algorithm::OptimisationAlgorithm::new)
//! directly:
//!
//! ```rust
//! use bbopt::strategy::{HillClimbing, Strategy};
//!
//! let strategy: Strategy = HillClimbing::new().into();
//! assert_eq!(strategy.name(), "hill_climbing");
//! ```

pub mod population;
pub mod sampling;
pub mod trajectory;

pub use population::{Cmaes, CuckooSearch, DifferentialEvolution, ParticleSwarm, PopulationStrategy};
pub use sampling::{GridSearch, MultiResolutionGridSearch, RandomSearch, SamplingStrategy};
pub use trajectory::{HillClimbing, HookeJeeves, SimulatedAnnealing, TrajectoryStrategy};

use std::time::Duration;

use crate::{
    algorithm::{Incumbent, LogLevel},
    error::Result,
    problem::{Bounds, Evaluation, OptimisationProblem},
    rng::RandomNumberGenerator,
};

/// The share of the work a node is responsible for.
///
/// Index `i` (a grid point, a random sample or an individual) belongs to the
/// node with `rank == i % number_of_nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    rank: usize,
    number_of_nodes: usize,
}

impl Partition {
    /// Creates the partition of node `rank` out of `number_of_nodes`.
    ///
    /// `number_of_nodes` must be at least 1 and `rank` less than it.
    pub fn new(rank: usize, number_of_nodes: usize) -> Self {
        Self {
            rank,
            number_of_nodes: number_of_nodes.max(1),
        }
    }

    /// The partition of a run without peers.
    pub fn single() -> Self {
        Self::new(0, 1)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn number_of_nodes(&self) -> usize {
        self.number_of_nodes
    }

    pub fn owns(&self, index: usize) -> bool {
        index % self.number_of_nodes == self.rank
    }

    /// Returns the indices out of `0..count` this node owns, in increasing order.
    pub fn owned(&self, count: usize) -> impl Iterator<Item = usize> {
        (self.rank..count).step_by(self.number_of_nodes)
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::single()
    }
}

/// What a strategy reports after a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Continue,
    /// There is nothing left to evaluate, e.g. every grid point was visited.
    Exhausted,
}

/// Everything a strategy may touch during one unit of work.
pub(crate) struct StepContext<'a> {
    pub(crate) problem: &'a mut OptimisationProblem,
    pub(crate) bounds: &'a Bounds,
    pub(crate) incumbent: &'a mut Incumbent,
    pub(crate) rng: &'a mut RandomNumberGenerator,
    pub(crate) iteration: usize,
    pub(crate) maximal_number_of_iterations: usize,
    /// Wall-clock time since the first unit of work started.
    pub(crate) elapsed: Duration,
    pub(crate) maximal_duration: Duration,
    pub(crate) partition: Partition,
    pub(crate) log_level: LogLevel,
}

impl StepContext<'_> {
    /// Evaluates `parameter` and offers it to the incumbent.
    pub(crate) fn evaluate(&mut self, parameter: &[f64]) -> Result<Evaluation> {
        let evaluation = self.problem.evaluate(parameter)?;
        self.incumbent.offer(parameter, evaluation);
        Ok(evaluation)
    }

    pub(crate) fn dimensions(&self) -> usize {
        self.bounds.dimensions()
    }

    pub(crate) fn is_verbose(&self) -> bool {
        self.log_level == LogLevel::Verbose
    }

    /// Returns how much of the budget is used up, in `[0, 1]`.
    ///
    /// Whichever of the iteration and wall-clock budgets is closer to running
    /// out decides.
    pub(crate) fn progress(&self) -> f64 {
        budget_progress(
            self.iteration,
            self.maximal_number_of_iterations,
            self.elapsed,
            self.maximal_duration,
        )
    }
}

fn budget_progress(
    iteration: usize,
    maximal_number_of_iterations: usize,
    elapsed: Duration,
    maximal_duration: Duration,
) -> f64 {
    let by_iterations = iteration as f64 / maximal_number_of_iterations.max(1) as f64;
    let by_duration = if maximal_duration.is_zero() {
        1.0
    } else {
        elapsed.as_secs_f64() / maximal_duration.as_secs_f64()
    };
    by_iterations.max(by_duration).clamp(0.0, 1.0)
}

/// The per-strategy half of the engine loop.
pub(crate) trait SearchStrategy {
    /// Validates the knobs against the problem and resets the run state.
    ///
    /// Called once per run, before the first unit of work. Must not evaluate.
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()>;

    /// Performs one unit of work.
    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome>;
}

/// The closed set of search strategies.
#[derive(Debug, Clone)]
pub enum Strategy {
    Trajectory(TrajectoryStrategy),
    Population(PopulationStrategy),
    Sampling(SamplingStrategy),
}

impl Strategy {
    /// Returns the snake_case name of the concrete strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Trajectory(strategy) => strategy.name(),
            Strategy::Population(strategy) => strategy.name(),
            Strategy::Sampling(strategy) => strategy.name(),
        }
    }

    pub(crate) fn as_search_mut(&mut self) -> &mut dyn SearchStrategy {
        match self {
            Strategy::Trajectory(strategy) => strategy,
            Strategy::Population(strategy) => strategy,
            Strategy::Sampling(strategy) => strategy,
        }
    }

    /// Returns `true` if every node must draw the same random numbers, so that
    /// the nodes agree on the sequence of candidates and only split who
    /// evaluates them.
    pub(crate) fn shares_random_stream(&self) -> bool {
        matches!(self, Strategy::Sampling(_))
    }
}

impl From<TrajectoryStrategy> for Strategy {
    fn from(strategy: TrajectoryStrategy) -> Self {
        Strategy::Trajectory(strategy)
    }
}

impl From<PopulationStrategy> for Strategy {
    fn from(strategy: PopulationStrategy) -> Self {
        Strategy::Population(strategy)
    }
}

impl From<SamplingStrategy> for Strategy {
    fn from(strategy: SamplingStrategy) -> Self {
        Strategy::Sampling(strategy)
    }
}

macro_rules! impl_into_strategy {
    ($family:ident: $($concrete:ident),+) => {
        $(
            impl From<$concrete> for Strategy {
                fn from(strategy: $concrete) -> Self {
                    Strategy::from($family::$concrete(strategy))
                }
            }
        )+
    };
}

impl_into_strategy!(TrajectoryStrategy: HillClimbing, SimulatedAnnealing, HookeJeeves);
impl_into_strategy!(PopulationStrategy: ParticleSwarm, DifferentialEvolution, Cmaes, CuckooSearch);
impl_into_strategy!(SamplingStrategy: GridSearch, MultiResolutionGridSearch, RandomSearch);
