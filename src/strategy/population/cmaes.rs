//! Separable CMA-ES: Covariance Matrix Adaptation Evolution Strategy
//!
//! Keeps only the diagonal of the covariance matrix, which makes every update
//! linear in the number of dimensions.
//!
//! Reference: Ros & Hansen (2008) "A Simple Modification in CMA-ES Achieving
//! Linear Time and Space Complexity"

use super::{Island, PopulationSettings};
use crate::error::{OptimisationError, Result};
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Separable CMA-ES optimiser.
///
/// The population size defaults to `4 + ⌊3 ln d⌋`; the initial step size to
/// a third of the bounds' mean width. The first unit of work evaluates the
/// initial population and recombines its best half into the initial mean.
#[derive(Debug, Clone)]
pub struct Cmaes {
    settings: PopulationSettings,
    has_population_size: bool,
    initial_step_size: Option<f64>,
    population: Island,
    state: Option<EvolutionState>,
}

/// The adapted distribution of one run.
#[derive(Debug, Clone)]
struct EvolutionState {
    /// Number of parents (mu)
    mu: usize,
    /// Recombination weights
    weights: Vec<f64>,
    /// Variance effective selection mass
    mu_eff: f64,
    /// Learning rates
    c_sigma: f64,
    c_c: f64,
    c_1: f64,
    c_mu: f64,
    /// Damping for sigma
    d_sigma: f64,
    /// Expected length of a standard normal vector
    chi_n: f64,
    /// Step-size
    sigma: f64,
    mean: Vec<f64>,
    /// Evolution path for sigma
    p_sigma: Vec<f64>,
    /// Evolution path for C
    p_c: Vec<f64>,
    /// Diagonal of the covariance matrix
    c_diag: Vec<f64>,
    generation: usize,
}

impl EvolutionState {
    fn new(dimensions: usize, lambda: usize, sigma: f64) -> Self {
        let dim = dimensions.max(1) as f64;
        let mu = (lambda / 2).max(1);

        // Recombination weights (log-linear)
        let weights: Vec<f64> = (0..mu)
            .map(|i| ((mu as f64 + 0.5).ln() - ((i + 1) as f64).ln()).max(0.0))
            .collect();
        let sum_w: f64 = weights.iter().sum();
        let weights: Vec<f64> = weights.iter().map(|w| w / sum_w).collect();
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (dim + mu_eff + 5.0);
        let c_c = (4.0 + mu_eff / dim) / (dim + 4.0 + 2.0 * mu_eff / dim);
        let c_1 = 2.0 / ((dim + 1.3).powi(2) + mu_eff);
        let c_mu = (1.0 - c_1)
            .min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((dim + 2.0).powi(2) + mu_eff));
        let d_sigma = 1.0 + 2.0 * ((mu_eff - 1.0) / (dim + 1.0)).max(0.0).sqrt() + c_sigma;
        let chi_n = dim.sqrt() * (1.0 - 1.0 / (4.0 * dim) + 1.0 / (21.0 * dim.powi(2)));

        Self {
            mu,
            weights,
            mu_eff,
            c_sigma,
            c_c,
            c_1,
            c_mu,
            d_sigma,
            chi_n,
            sigma,
            mean: vec![0.0; dimensions],
            p_sigma: vec![0.0; dimensions],
            p_c: vec![0.0; dimensions],
            c_diag: vec![1.0; dimensions],
            generation: 0,
        }
    }

    /// Weighted mean of the best `mu` members.
    fn recombine(&self, population: &Island, ranking: &[usize]) -> Vec<f64> {
        let mut mean = vec![0.0; self.mean.len()];
        for (weight, &index) in self.weights.iter().zip(ranking) {
            for (m, x) in mean.iter_mut().zip(&population.members[index]) {
                *m += weight * x;
            }
        }
        mean
    }

    /// Adapts mean, paths, covariance and step size to the ranked population.
    #[allow(clippy::needless_range_loop)]
    fn update(&mut self, population: &Island, ranking: &[usize]) {
        let dim = self.mean.len();
        let recombined = self.recombine(population, ranking);
        let old_mean = std::mem::replace(&mut self.mean, recombined);
        let mean_diff: Vec<f64> = (0..dim)
            .map(|i| (self.mean[i] - old_mean[i]) / self.sigma)
            .collect();

        for i in 0..dim {
            self.p_sigma[i] = (1.0 - self.c_sigma) * self.p_sigma[i]
                + (self.c_sigma * (2.0 - self.c_sigma) * self.mu_eff).sqrt() * mean_diff[i]
                    / self.c_diag[i].sqrt();
        }

        let p_sigma_norm: f64 = self.p_sigma.iter().map(|p| p * p).sum::<f64>().sqrt();
        let exponent = (2 * (self.generation + 1)).min(i32::MAX as usize) as i32;
        let h_sigma = if p_sigma_norm / (1.0 - (1.0 - self.c_sigma).powi(exponent)).sqrt()
            < (1.4 + 2.0 / (dim as f64 + 1.0)) * self.chi_n
        {
            1.0
        } else {
            0.0
        };

        for i in 0..dim {
            self.p_c[i] = (1.0 - self.c_c) * self.p_c[i]
                + h_sigma * (self.c_c * (2.0 - self.c_c) * self.mu_eff).sqrt() * mean_diff[i];
        }

        for i in 0..dim {
            let rank_one = self.p_c[i] * self.p_c[i];
            let rank_mu: f64 = self
                .weights
                .iter()
                .zip(ranking)
                .map(|(weight, &index)| {
                    let y = (population.members[index][i] - old_mean[i]) / self.sigma;
                    weight * y * y
                })
                .sum();

            self.c_diag[i] = ((1.0 - self.c_1 - self.c_mu) * self.c_diag[i]
                + self.c_1 * rank_one
                + self.c_mu * rank_mu)
                .max(1e-20);
        }

        self.sigma *= ((self.c_sigma / self.d_sigma) * (p_sigma_norm / self.chi_n - 1.0)).exp();
        self.sigma = self.sigma.clamp(1e-20, 1e10);
        self.generation += 1;
    }
}

impl Cmaes {
    pub fn new() -> Self {
        Self {
            settings: PopulationSettings::new(4),
            has_population_size: false,
            initial_step_size: None,
            population: Island::default(),
            state: None,
        }
    }

    /// Sets lambda, the number of samples per generation.
    pub fn set_population_size(&mut self, population_size: usize) -> Result<()> {
        self.settings.set_population_size(population_size)?;
        self.has_population_size = true;
        Ok(())
    }

    pub fn set_initial_population(&mut self, initial_population: Vec<Vec<f64>>) -> Result<()> {
        self.settings.set_initial_population(initial_population)?;
        self.has_population_size = true;
        Ok(())
    }

    /// Sets sigma, the initial step size.
    pub fn set_initial_step_size(&mut self, initial_step_size: f64) -> Result<()> {
        if !(initial_step_size.is_finite() && initial_step_size > 0.0) {
            return Err(OptimisationError::Configuration(format!(
                "The initial step size must be finite and greater than 0, found {}",
                initial_step_size
            )));
        }
        self.initial_step_size = Some(initial_step_size);
        Ok(())
    }

    /// Returns the current step size, once a run has started.
    pub fn step_size(&self) -> Option<f64> {
        self.state.as_ref().map(|state| state.sigma)
    }

    pub fn population_size(&self) -> usize {
        self.settings.population_size
    }

    fn sample(state: &EvolutionState, context: &mut StepContext<'_>) -> Vec<f64> {
        let mut x: Vec<f64> = (0..state.mean.len())
            .map(|i| {
                let z = context.rng.standard_normal();
                state.mean[i] + state.sigma * state.c_diag[i].sqrt() * z
            })
            .collect();
        context.bounds.clip(&mut x);
        x
    }
}

impl Default for Cmaes {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for Cmaes {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        if !self.has_population_size {
            let dimensions = context.dimensions().max(1) as f64;
            self.settings.population_size = 4 + (3.0 * dimensions.ln()).floor() as usize;
        }
        self.settings.validate(context, "CMA-ES", 2)?;
        self.population = Island::default();
        self.state = None;
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        let Some(state) = self.state.as_mut() else {
            let members = self.settings.owned_members(context);
            let lambda = members.len();
            self.population = Island::evaluate(members, context)?;

            let widths = context.bounds.widths();
            let sigma = self.initial_step_size.unwrap_or_else(|| {
                widths.iter().sum::<f64>() / widths.len().max(1) as f64 / 3.0
            });
            let mut state = EvolutionState::new(context.dimensions(), lambda, sigma.max(1e-20));
            state.mean = state.recombine(&self.population, &self.population.ranking());
            self.state = Some(state);
            return Ok(StepOutcome::Continue);
        };

        let lambda = self.population.len();
        let members: Vec<Vec<f64>> = (0..lambda).map(|_| Self::sample(state, context)).collect();
        self.population = Island::evaluate(members, context)?;

        let ranking = self.population.ranking();
        state.update(&self.population, &ranking[..state.mu.min(ranking.len())]);
        Ok(StepOutcome::Continue)
    }
}
