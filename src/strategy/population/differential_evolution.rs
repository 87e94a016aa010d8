use std::cmp::Ordering;

use super::{Island, PopulationSettings};
use crate::error::{OptimisationError, Result};
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Differential evolution, DE/rand/1/bin.
///
/// For every individual `x` a mutant `a + F·(b − c)` is built from three other
/// distinct individuals, clipped to the bounds and crossed over with `x`
/// dimension by dimension with probability `CR` (one random dimension always
/// comes from the mutant). The trial replaces `x` if it is at least as good.
/// `F` defaults to 0.5 and `CR` to 0.9.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    settings: PopulationSettings,
    scaling_factor: f64,
    crossover_rate: f64,
    population: Island,
}

impl DifferentialEvolution {
    /// Creates a population of 20 individuals.
    pub fn new() -> Self {
        Self {
            settings: PopulationSettings::new(20),
            scaling_factor: 0.5,
            crossover_rate: 0.9,
            population: Island::default(),
        }
    }

    pub fn set_population_size(&mut self, population_size: usize) -> Result<()> {
        self.settings.set_population_size(population_size)
    }

    pub fn set_initial_population(&mut self, initial_population: Vec<Vec<f64>>) -> Result<()> {
        self.settings.set_initial_population(initial_population)
    }

    /// Sets `F`, which must be finite and greater than 0.
    pub fn set_scaling_factor(&mut self, scaling_factor: f64) -> Result<()> {
        if !(scaling_factor.is_finite() && scaling_factor > 0.0) {
            return Err(OptimisationError::Configuration(format!(
                "The scaling factor must be finite and greater than 0, found {}",
                scaling_factor
            )));
        }
        self.scaling_factor = scaling_factor;
        Ok(())
    }

    /// Sets `CR`, which must lie in `[0, 1]`.
    pub fn set_crossover_rate(&mut self, crossover_rate: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&crossover_rate) {
            return Err(OptimisationError::Configuration(format!(
                "The crossover rate must be within [0, 1], found {}",
                crossover_rate
            )));
        }
        self.crossover_rate = crossover_rate;
        Ok(())
    }

    pub fn population_size(&self) -> usize {
        self.settings.population_size
    }

    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    pub fn crossover_rate(&self) -> f64 {
        self.crossover_rate
    }

    fn trial(&self, i: usize, context: &mut StepContext<'_>) -> Vec<f64> {
        let members = &self.population.members;
        let picked = context.rng.distinct_indices(members.len(), 3, i);
        let (a, b, c) = (&members[picked[0]], &members[picked[1]], &members[picked[2]]);

        let mut mutant: Vec<f64> = (0..a.len())
            .map(|n| a[n] + self.scaling_factor * (b[n] - c[n]))
            .collect();
        context.bounds.clip(&mut mutant);

        let dimensions = mutant.len();
        if dimensions == 0 {
            return mutant;
        }
        let forced = context.rng.index(dimensions);
        (0..dimensions)
            .map(|n| {
                if n == forced || context.rng.probability() < self.crossover_rate {
                    mutant[n]
                } else {
                    members[i][n]
                }
            })
            .collect()
    }
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for DifferentialEvolution {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        self.settings.validate(context, "Differential evolution", 4)?;
        self.population = Island::default();
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        if self.population.is_empty() {
            let members = self.settings.owned_members(context);
            self.population = Island::evaluate(members, context)?;
            return Ok(StepOutcome::Continue);
        }

        let trials: Vec<Vec<f64>> = (0..self.population.len())
            .map(|i| self.trial(i, context))
            .collect();

        for (i, trial) in trials.into_iter().enumerate() {
            let evaluation = context.evaluate(&trial)?;
            if evaluation.compare(&self.population.evaluations[i]) != Ordering::Greater {
                self.population.members[i] = trial;
                self.population.evaluations[i] = evaluation;
            }
        }
        Ok(StepOutcome::Continue)
    }
}
