use tracing::debug;

use super::{initial_parameter, resolve_step_size, validate_initial_parameter, validate_step_size};
use crate::error::{OptimisationError, Result};
use crate::problem::bounds::ensure_finite;
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// The Hooke-Jeeves pattern search.
///
/// A unit of work tries `incumbent ± step` along every active dimension,
/// i.e. every dimension with a positive step whose bounds are not fixed. If
/// none of these `2 × active` moves improves the incumbent, every step is
/// multiplied by `step_size_decrease` (one half by default) before the next
/// unit of work. Once no dimension is active the search is exhausted.
#[derive(Debug, Clone)]
pub struct HookeJeeves {
    initial_step_size: Option<Vec<f64>>,
    initial_parameter: Option<Vec<f64>>,
    step_size_decrease: f64,
    step_size: Vec<f64>,
}

impl HookeJeeves {
    /// Creates a pattern search whose initial step defaults to half the bounds' widths.
    pub fn new() -> Self {
        Self {
            initial_step_size: None,
            initial_parameter: None,
            step_size_decrease: 0.5,
            step_size: Vec::new(),
        }
    }

    pub fn set_initial_step_size(&mut self, initial_step_size: Vec<f64>) -> Result<()> {
        validate_step_size("initial step size", &initial_step_size)?;
        self.initial_step_size = Some(initial_step_size);
        Ok(())
    }

    pub fn set_initial_parameter(&mut self, initial_parameter: Vec<f64>) -> Result<()> {
        ensure_finite("initial parameter", &initial_parameter)?;
        self.initial_parameter = Some(initial_parameter);
        Ok(())
    }

    /// Sets the factor the step shrinks by after a unit of work without improvement.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `0 < step_size_decrease < 1`.
    pub fn set_step_size_decrease(&mut self, step_size_decrease: f64) -> Result<()> {
        if !(step_size_decrease > 0.0 && step_size_decrease < 1.0) {
            return Err(OptimisationError::Configuration(format!(
                "The step size decrease must be within (0, 1), found {}",
                step_size_decrease
            )));
        }
        self.step_size_decrease = step_size_decrease;
        Ok(())
    }

    /// Returns the step size the next unit of work moves by.
    pub fn step_size(&self) -> &[f64] {
        &self.step_size
    }
}

impl Default for HookeJeeves {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for HookeJeeves {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        validate_initial_parameter(self.initial_parameter.as_deref(), context.bounds)?;
        self.step_size = resolve_step_size(self.initial_step_size.as_deref(), context.bounds, 2.0)?;
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        if context.incumbent.is_empty() {
            let configured = match context.iteration {
                0 => self.initial_parameter.as_deref(),
                _ => None,
            };
            let parameter = initial_parameter(configured, context.bounds, context.rng);
            context.evaluate(&parameter)?;
            return Ok(StepOutcome::Continue);
        }

        let active: Vec<usize> = (0..context.dimensions())
            .filter(|&n| {
                self.step_size[n] > 0.0 && context.bounds.lower()[n] < context.bounds.upper()[n]
            })
            .collect();
        if active.is_empty() {
            if context.is_verbose() {
                debug!("Hooke-Jeeves has no active dimension left");
            }
            return Ok(StepOutcome::Exhausted);
        }

        let before = context.incumbent.evaluation();
        for &n in &active {
            for direction in [1.0, -1.0] {
                let mut candidate = context.incumbent.parameter().to_vec();
                candidate[n] += direction * self.step_size[n];
                context.bounds.clip(&mut candidate);
                context.evaluate(&candidate)?;
            }
        }

        if !context.incumbent.evaluation().is_better_than(&before) {
            for step in &mut self.step_size {
                *step *= self.step_size_decrease;
            }
            if context.is_verbose() {
                debug!(step_size = ?self.step_size, "Hooke-Jeeves reduced its step size");
            }
        }
        Ok(StepOutcome::Continue)
    }
}
