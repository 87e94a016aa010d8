use std::f64::consts::PI;

use super::{Island, PopulationSettings};
use crate::error::{OptimisationError, Result};
use crate::rng::RandomNumberGenerator;
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Lévy exponent of the flights.
const BETA: f64 = 1.5;
/// Γ(1 + β)
const GAMMA_OF_ONE_PLUS_BETA: f64 = 1.329_340_388;
/// Γ((1 + β) / 2)
const GAMMA_OF_HALF_ONE_PLUS_BETA: f64 = 0.906_402_477;

/// Cuckoo search with Lévy flights.
///
/// Every nest takes a Lévy flight (Mantegna's algorithm, β = 1.5) scaled by
/// its distance to the incumbent and keeps the new position if it is better.
/// Afterwards the worst `⌊p_a · n⌋` nests are abandoned and rebuilt at
/// uniformly random positions.
#[derive(Debug, Clone)]
pub struct CuckooSearch {
    settings: PopulationSettings,
    discovery_probability: f64,
    levy_step_size: f64,
    nests: Island,
}

impl CuckooSearch {
    /// Creates 25 nests with a discovery probability of 0.25.
    pub fn new() -> Self {
        Self {
            settings: PopulationSettings::new(25),
            discovery_probability: 0.25,
            levy_step_size: 0.01,
            nests: Island::default(),
        }
    }

    pub fn set_population_size(&mut self, population_size: usize) -> Result<()> {
        self.settings.set_population_size(population_size)
    }

    pub fn set_initial_population(&mut self, initial_population: Vec<Vec<f64>>) -> Result<()> {
        self.settings.set_initial_population(initial_population)
    }

    /// Sets `p_a`, the share of nests abandoned per unit of work.
    pub fn set_discovery_probability(&mut self, discovery_probability: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&discovery_probability) {
            return Err(OptimisationError::Configuration(format!(
                "The discovery probability must be within [0, 1], found {}",
                discovery_probability
            )));
        }
        self.discovery_probability = discovery_probability;
        Ok(())
    }

    /// Sets the factor every Lévy flight is scaled with.
    pub fn set_levy_step_size(&mut self, levy_step_size: f64) -> Result<()> {
        if !(levy_step_size.is_finite() && levy_step_size > 0.0) {
            return Err(OptimisationError::Configuration(format!(
                "The Lévy step size must be finite and greater than 0, found {}",
                levy_step_size
            )));
        }
        self.levy_step_size = levy_step_size;
        Ok(())
    }

    pub fn population_size(&self) -> usize {
        self.settings.population_size
    }

    pub fn discovery_probability(&self) -> f64 {
        self.discovery_probability
    }

    fn number_of_abandoned_nests(&self) -> usize {
        (self.discovery_probability * self.nests.len() as f64).floor() as usize
    }

    fn flight(&self, nest: &[f64], best: &[f64], rng: &mut RandomNumberGenerator) -> Vec<f64> {
        let sigma_u = mantegna_sigma();
        nest.iter()
            .zip(best)
            .map(|(x, b)| {
                let u = rng.standard_normal() * sigma_u;
                let v = rng.standard_normal().abs().max(f64::MIN_POSITIVE);
                let step = u / v.powf(1.0 / BETA);
                x + self.levy_step_size * step * (x - b) * rng.standard_normal()
            })
            .collect()
    }
}

impl Default for CuckooSearch {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard deviation of the numerator of Mantegna's algorithm.
fn mantegna_sigma() -> f64 {
    let numerator = GAMMA_OF_ONE_PLUS_BETA * (PI * BETA / 2.0).sin();
    let denominator = GAMMA_OF_HALF_ONE_PLUS_BETA * BETA * 2f64.powf((BETA - 1.0) / 2.0);
    (numerator / denominator).powf(1.0 / BETA)
}

impl SearchStrategy for CuckooSearch {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        self.settings.validate(context, "Cuckoo search", 1)?;
        self.nests = Island::default();
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        if self.nests.is_empty() {
            let members = self.settings.owned_members(context);
            self.nests = Island::evaluate(members, context)?;
            return Ok(StepOutcome::Continue);
        }

        for i in 0..self.nests.len() {
            let best = if context.incumbent.is_empty() {
                self.nests.members[self.nests.ranking()[0]].clone()
            } else {
                context.incumbent.parameter().to_vec()
            };
            let mut candidate = self.flight(&self.nests.members[i], &best, context.rng);
            context.bounds.clip(&mut candidate);

            let evaluation = context.evaluate(&candidate)?;
            if evaluation.is_better_than(&self.nests.evaluations[i]) {
                self.nests.members[i] = candidate;
                self.nests.evaluations[i] = evaluation;
            }
        }

        let abandoned = self.number_of_abandoned_nests();
        let ranking = self.nests.ranking();
        for &i in ranking.iter().rev().take(abandoned) {
            let nest = context
                .rng
                .uniform_point(context.bounds.lower(), context.bounds.upper());
            self.nests.evaluations[i] = context.evaluate(&nest)?;
            self.nests.members[i] = nest;
        }
        Ok(StepOutcome::Continue)
    }
}
