use tracing::trace;

use super::{
    initial_parameter, random_neighbour, resolve_step_size, validate_initial_parameter,
    validate_step_size,
};
use crate::error::{OptimisationError, Result};
use crate::problem::bounds::ensure_finite;
use crate::problem::Evaluation;
use crate::rng::RandomNumberGenerator;
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Simulated annealing on a single current state.
///
/// Each unit of work draws a neighbour of the current state (which need not be
/// the incumbent). A neighbour that improves on the incumbent always becomes
/// the current state; any other neighbour does so with probability
/// `exp((best_objective - candidate_objective) / T)`. The temperature falls
/// linearly from `initial_temperature` to 0 as the budget runs out, where the
/// iteration budget or the wall-clock budget is used, whichever is further
/// along.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    maximal_step_size: Option<Vec<f64>>,
    initial_parameter: Option<Vec<f64>>,
    initial_temperature: f64,
    active_step_size: Vec<f64>,
    state: Option<Vec<f64>>,
}

impl SimulatedAnnealing {
    pub fn new() -> Self {
        Self {
            maximal_step_size: None,
            initial_parameter: None,
            initial_temperature: 1.0,
            active_step_size: Vec::new(),
            state: None,
        }
    }

    /// Sets the maximal distance of a neighbour, per dimension.
    pub fn set_maximal_step_size(&mut self, maximal_step_size: Vec<f64>) -> Result<()> {
        validate_step_size("maximal step size", &maximal_step_size)?;
        self.maximal_step_size = Some(maximal_step_size);
        Ok(())
    }

    pub fn set_initial_parameter(&mut self, initial_parameter: Vec<f64>) -> Result<()> {
        ensure_finite("initial parameter", &initial_parameter)?;
        self.initial_parameter = Some(initial_parameter);
        Ok(())
    }

    /// Sets the temperature of the first iteration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless the temperature is finite and greater than 0.
    pub fn set_initial_temperature(&mut self, initial_temperature: f64) -> Result<()> {
        if !(initial_temperature.is_finite() && initial_temperature > 0.0) {
            return Err(OptimisationError::Configuration(format!(
                "The initial temperature must be finite and greater than 0, found {}",
                initial_temperature
            )));
        }
        self.initial_temperature = initial_temperature;
        Ok(())
    }

    pub fn initial_temperature(&self) -> f64 {
        self.initial_temperature
    }

    pub fn maximal_step_size(&self) -> Option<&[f64]> {
        self.maximal_step_size.as_deref()
    }

    fn temperature(&self, progress: f64) -> f64 {
        self.initial_temperature * (1.0 - progress.clamp(0.0, 1.0))
    }

    fn is_acceptable_state(
        &self,
        best: &Evaluation,
        candidate: &Evaluation,
        temperature: f64,
        rng: &mut RandomNumberGenerator,
    ) -> bool {
        if temperature <= 0.0 {
            return false;
        }
        let probability =
            ((best.objective_value - candidate.objective_value) / temperature).exp();
        rng.probability() < probability
    }
}

impl Default for SimulatedAnnealing {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for SimulatedAnnealing {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        validate_initial_parameter(self.initial_parameter.as_deref(), context.bounds)?;
        self.active_step_size =
            resolve_step_size(self.maximal_step_size.as_deref(), context.bounds, 10.0)?;
        self.state = None;
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        let Some(state) = self.state.as_deref() else {
            let parameter =
                initial_parameter(self.initial_parameter.as_deref(), context.bounds, context.rng);
            context.evaluate(&parameter)?;
            self.state = Some(parameter);
            return Ok(StepOutcome::Continue);
        };

        let candidate =
            random_neighbour(context.rng, context.bounds, state, &self.active_step_size);
        let best = context.incumbent.evaluation();
        let evaluation = context.evaluate(&candidate)?;

        let temperature = self.temperature(context.progress());
        let accepted = evaluation.is_better_than(&best)
            || self.is_acceptable_state(&best, &evaluation, temperature, context.rng);
        if context.is_verbose() {
            trace!(temperature, accepted, "Simulated annealing step");
        }
        if accepted {
            self.state = Some(candidate);
        }
        Ok(StepOutcome::Continue)
    }
}
