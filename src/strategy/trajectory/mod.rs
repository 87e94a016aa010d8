//! # Trajectory strategies
//!
//! Strategies that move a single point through the search space. In a
//! distributed run every node follows its own trajectory on its own random
//! stream.

pub mod hill_climbing;
pub mod hooke_jeeves;
pub mod simulated_annealing;

pub use hill_climbing::HillClimbing;
pub use hooke_jeeves::HookeJeeves;
pub use simulated_annealing::SimulatedAnnealing;

use super::{SearchStrategy, StepContext, StepOutcome};
use crate::{
    error::{ensure_dimensions, OptimisationError, Result},
    problem::Bounds,
    rng::RandomNumberGenerator,
};

#[derive(Debug, Clone)]
pub enum TrajectoryStrategy {
    HillClimbing(HillClimbing),
    SimulatedAnnealing(SimulatedAnnealing),
    HookeJeeves(HookeJeeves),
}

impl TrajectoryStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            TrajectoryStrategy::HillClimbing(_) => "hill_climbing",
            TrajectoryStrategy::SimulatedAnnealing(_) => "simulated_annealing",
            TrajectoryStrategy::HookeJeeves(_) => "hooke_jeeves",
        }
    }
}

impl SearchStrategy for TrajectoryStrategy {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        match self {
            TrajectoryStrategy::HillClimbing(strategy) => strategy.initialise(context),
            TrajectoryStrategy::SimulatedAnnealing(strategy) => strategy.initialise(context),
            TrajectoryStrategy::HookeJeeves(strategy) => strategy.initialise(context),
        }
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        match self {
            TrajectoryStrategy::HillClimbing(strategy) => strategy.next_unit_of_work(context),
            TrajectoryStrategy::SimulatedAnnealing(strategy) => strategy.next_unit_of_work(context),
            TrajectoryStrategy::HookeJeeves(strategy) => strategy.next_unit_of_work(context),
        }
    }
}

/// Checks a user-supplied step size vector.
pub(crate) fn validate_step_size(what: &str, step_size: &[f64]) -> Result<()> {
    if let Some(step) = step_size.iter().find(|s| !s.is_finite() || **s < 0.0) {
        return Err(OptimisationError::Configuration(format!(
            "The {} must be finite and non-negative, found {}",
            what, step
        )));
    }
    Ok(())
}

/// Resolves the step size of a run: the configured one, or the bounds' widths divided by `divisor`.
pub(crate) fn resolve_step_size(
    configured: Option<&[f64]>,
    bounds: &Bounds,
    divisor: f64,
) -> Result<Vec<f64>> {
    match configured {
        Some(step_size) => {
            ensure_dimensions(bounds.dimensions(), step_size.len())?;
            Ok(step_size.to_vec())
        }
        None => Ok(bounds.widths().into_iter().map(|w| w / divisor).collect()),
    }
}

/// Resolves the starting point of a run: the configured one, or a uniform draw.
pub(crate) fn initial_parameter(
    configured: Option<&[f64]>,
    bounds: &Bounds,
    rng: &mut RandomNumberGenerator,
) -> Vec<f64> {
    match configured {
        Some(parameter) => parameter.to_vec(),
        None => rng.uniform_point(bounds.lower(), bounds.upper()),
    }
}

/// Checks that a configured starting point fits the bounds.
pub(crate) fn validate_initial_parameter(configured: Option<&[f64]>, bounds: &Bounds) -> Result<()> {
    match configured {
        Some(parameter) => bounds.ensure_contains("initial parameter", parameter),
        None => Ok(()),
    }
}

/// Draws a point at a random distance in `[0, maximal_step_size]` from `centre`,
/// scaled per dimension, along a uniformly random direction. The result is
/// clipped to the bounds.
pub(crate) fn random_neighbour(
    rng: &mut RandomNumberGenerator,
    bounds: &Bounds,
    centre: &[f64],
    maximal_step_size: &[f64],
) -> Vec<f64> {
    let direction = rng.random_direction(centre.len());
    let distance = rng.probability();

    let mut neighbour: Vec<f64> = centre
        .iter()
        .zip(direction.iter().zip(maximal_step_size))
        .map(|(x, (d, step))| x + d * distance * step)
        .collect();
    bounds.clip(&mut neighbour);
    neighbour
}
