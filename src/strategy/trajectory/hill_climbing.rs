use tracing::debug;

use super::{
    initial_parameter, random_neighbour, resolve_step_size, validate_initial_parameter,
    validate_step_size,
};
use crate::error::Result;
use crate::problem::bounds::ensure_finite;
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// A simple hill climbing algorithm.
///
/// The first unit of work evaluates the initial parameter. Every following
/// unit of work evaluates one random neighbour of the incumbent, at most
/// `maximal_step_size` away per dimension, and keeps it if it is better.
///
/// ```rust
/// use bbopt::strategy::HillClimbing;
///
/// let mut hill_climbing = HillClimbing::new();
/// hill_climbing.set_maximal_step_size(vec![0.5, 0.5]).unwrap();
/// hill_climbing.set_initial_parameter(vec![1.0, 1.0]).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct HillClimbing {
    maximal_step_size: Option<Vec<f64>>,
    initial_parameter: Option<Vec<f64>>,
    active_step_size: Vec<f64>,
}

impl HillClimbing {
    /// Creates a hill climber whose step size defaults to a tenth of the bounds' widths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximal distance of a neighbour, per dimension.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an element is negative or not finite.
    pub fn set_maximal_step_size(&mut self, maximal_step_size: Vec<f64>) -> Result<()> {
        validate_step_size("maximal step size", &maximal_step_size)?;
        self.maximal_step_size = Some(maximal_step_size);
        Ok(())
    }

    /// Sets the point the first unit of work evaluates.
    pub fn set_initial_parameter(&mut self, initial_parameter: Vec<f64>) -> Result<()> {
        ensure_finite("initial parameter", &initial_parameter)?;
        self.initial_parameter = Some(initial_parameter);
        Ok(())
    }

    pub fn maximal_step_size(&self) -> Option<&[f64]> {
        self.maximal_step_size.as_deref()
    }

    pub fn initial_parameter(&self) -> Option<&[f64]> {
        self.initial_parameter.as_deref()
    }
}

impl SearchStrategy for HillClimbing {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        validate_initial_parameter(self.initial_parameter.as_deref(), context.bounds)?;
        self.active_step_size =
            resolve_step_size(self.maximal_step_size.as_deref(), context.bounds, 10.0)?;
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        let candidate = if context.incumbent.is_empty() {
            let configured = match context.iteration {
                0 => self.initial_parameter.as_deref(),
                _ => None,
            };
            initial_parameter(configured, context.bounds, context.rng)
        } else {
            random_neighbour(
                context.rng,
                context.bounds,
                context.incumbent.parameter(),
                &self.active_step_size,
            )
        };

        let evaluation = context.evaluate(&candidate)?;
        if context.is_verbose() {
            debug!(
                iteration = context.iteration,
                objective_value = evaluation.objective_value,
                "Hill climbing evaluated a neighbour"
            );
        }
        Ok(StepOutcome::Continue)
    }
}
