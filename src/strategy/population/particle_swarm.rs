use std::f64::consts::LN_2;

use super::{Island, PopulationSettings};
use crate::error::{OptimisationError, Result};
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Particle swarm optimisation.
///
/// Every particle is pulled towards its own best position and towards the
/// incumbent:
///
/// `v = w·v + c₁·r₁⊙(personal_best − x) + c₂·r₂⊙(incumbent − x)`,
/// `x = x + v`,
///
/// with `r₁, r₂` uniform in `[0, 1)` per dimension. A particle that leaves
/// the bounds is put back onto the violated bound and the velocity of that
/// dimension is reversed and halved. The coefficients default to
/// `w = 1 / (2 ln 2)` and `c₁ = c₂ = 0.5 + ln 2`.
#[derive(Debug, Clone)]
pub struct ParticleSwarm {
    settings: PopulationSettings,
    inertia: f64,
    cognitive_acceleration: f64,
    social_acceleration: f64,
    swarm: Island,
    velocities: Vec<Vec<f64>>,
    personal_bests: Island,
}

impl ParticleSwarm {
    /// Creates a swarm of 40 particles.
    pub fn new() -> Self {
        Self {
            settings: PopulationSettings::new(40),
            inertia: 1.0 / (2.0 * LN_2),
            cognitive_acceleration: 0.5 + LN_2,
            social_acceleration: 0.5 + LN_2,
            swarm: Island::default(),
            velocities: Vec::new(),
            personal_bests: Island::default(),
        }
    }

    pub fn set_population_size(&mut self, population_size: usize) -> Result<()> {
        self.settings.set_population_size(population_size)
    }

    pub fn set_initial_population(&mut self, initial_population: Vec<Vec<f64>>) -> Result<()> {
        self.settings.set_initial_population(initial_population)
    }

    /// Sets `w`, `c₁` and `c₂`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a coefficient is negative or not finite.
    pub fn set_coefficients(
        &mut self,
        inertia: f64,
        cognitive_acceleration: f64,
        social_acceleration: f64,
    ) -> Result<()> {
        for (name, value) in [
            ("inertia", inertia),
            ("cognitive acceleration", cognitive_acceleration),
            ("social acceleration", social_acceleration),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(OptimisationError::Configuration(format!(
                    "The {} must be finite and non-negative, found {}",
                    name, value
                )));
            }
        }
        self.inertia = inertia;
        self.cognitive_acceleration = cognitive_acceleration;
        self.social_acceleration = social_acceleration;
        Ok(())
    }

    pub fn population_size(&self) -> usize {
        self.settings.population_size
    }

    fn initialise_swarm(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let positions = self.settings.owned_members(context);
        self.velocities = positions
            .iter()
            .map(|position| {
                position
                    .iter()
                    .zip(context.bounds.lower().iter().zip(context.bounds.upper()))
                    .map(|(x, (l, u))| context.rng.uniform(l - x, u - x))
                    .collect()
            })
            .collect();
        self.swarm = Island::evaluate(positions, context)?;
        self.personal_bests = self.swarm.clone();
        Ok(())
    }

    fn move_particle(&mut self, i: usize, attractor: &[f64], context: &mut StepContext<'_>) {
        let lower = context.bounds.lower();
        let upper = context.bounds.upper();
        let position = &mut self.swarm.members[i];
        let velocity = &mut self.velocities[i];
        let personal_best = &self.personal_bests.members[i];

        for n in 0..position.len() {
            let cognitive = context.rng.probability() * (personal_best[n] - position[n]);
            let social = context.rng.probability() * (attractor[n] - position[n]);
            velocity[n] = self.inertia * velocity[n]
                + self.cognitive_acceleration * cognitive
                + self.social_acceleration * social;
            position[n] += velocity[n];

            if position[n] < lower[n] {
                position[n] = lower[n];
                velocity[n] *= -0.5;
            } else if position[n] > upper[n] {
                position[n] = upper[n];
                velocity[n] *= -0.5;
            }
        }
    }
}

impl Default for ParticleSwarm {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for ParticleSwarm {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        self.settings.validate(context, "Particle swarm optimisation", 1)?;
        self.swarm = Island::default();
        self.velocities.clear();
        self.personal_bests = Island::default();
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        if self.swarm.is_empty() {
            self.initialise_swarm(context)?;
            return Ok(StepOutcome::Continue);
        }

        let incumbent = context.incumbent.parameter().to_vec();
        for i in 0..self.swarm.len() {
            // Without an incumbent yet (every value so far was NaN), a particle
            // only follows its own best.
            let attractor = if incumbent.is_empty() {
                self.personal_bests.members[i].clone()
            } else {
                incumbent.clone()
            };
            self.move_particle(i, &attractor, context);

            let evaluation = context.evaluate(&self.swarm.members[i])?;
            self.swarm.evaluations[i] = evaluation;
            if evaluation.is_better_than(&self.personal_bests.evaluations[i]) {
                self.personal_bests.members[i].clone_from(&self.swarm.members[i]);
                self.personal_bests.evaluations[i] = evaluation;
            }
        }
        Ok(StepOutcome::Continue)
    }
}
