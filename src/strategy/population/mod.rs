//! # Population strategies
//!
//! Strategies that evolve a fixed-size population. The first unit of work
//! evaluates the initial population, drawn uniformly inside the bounds unless
//! one was supplied; every following unit of work updates and re-evaluates the
//! whole population.
//!
//! In a distributed run individual `i` lives on the node with
//! `rank == i % number_of_nodes`, and every node evolves its share as an
//! island. The incumbent, which the reduction keeps in sync, is the only
//! information the islands exchange.

pub mod cmaes;
pub mod cuckoo_search;
pub mod differential_evolution;
pub mod particle_swarm;

pub use cmaes::Cmaes;
pub use cuckoo_search::CuckooSearch;
pub use differential_evolution::DifferentialEvolution;
pub use particle_swarm::ParticleSwarm;

use super::{SearchStrategy, StepContext, StepOutcome};
use crate::{
    error::{ensure_dimensions, OptimisationError, Result},
    problem::{bounds::ensure_finite, Evaluation},
};

#[derive(Debug, Clone)]
pub enum PopulationStrategy {
    ParticleSwarm(ParticleSwarm),
    DifferentialEvolution(DifferentialEvolution),
    Cmaes(Cmaes),
    CuckooSearch(CuckooSearch),
}

impl PopulationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PopulationStrategy::ParticleSwarm(_) => "particle_swarm",
            PopulationStrategy::DifferentialEvolution(_) => "differential_evolution",
            PopulationStrategy::Cmaes(_) => "cmaes",
            PopulationStrategy::CuckooSearch(_) => "cuckoo_search",
        }
    }
}

impl SearchStrategy for PopulationStrategy {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        match self {
            PopulationStrategy::ParticleSwarm(strategy) => strategy.initialise(context),
            PopulationStrategy::DifferentialEvolution(strategy) => strategy.initialise(context),
            PopulationStrategy::Cmaes(strategy) => strategy.initialise(context),
            PopulationStrategy::CuckooSearch(strategy) => strategy.initialise(context),
        }
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        match self {
            PopulationStrategy::ParticleSwarm(strategy) => strategy.next_unit_of_work(context),
            PopulationStrategy::DifferentialEvolution(strategy) => {
                strategy.next_unit_of_work(context)
            }
            PopulationStrategy::Cmaes(strategy) => strategy.next_unit_of_work(context),
            PopulationStrategy::CuckooSearch(strategy) => strategy.next_unit_of_work(context),
        }
    }
}

/// The knobs every population strategy shares.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PopulationSettings {
    pub(crate) population_size: usize,
    pub(crate) initial_population: Option<Vec<Vec<f64>>>,
}

impl PopulationSettings {
    pub(crate) fn new(population_size: usize) -> Self {
        Self {
            population_size,
            initial_population: None,
        }
    }

    pub(crate) fn set_population_size(&mut self, population_size: usize) -> Result<()> {
        if population_size == 0 {
            return Err(OptimisationError::Configuration(
                "Population size cannot be zero".to_string(),
            ));
        }
        self.population_size = population_size;
        Ok(())
    }

    /// Fixes the initial population; its size becomes the population size.
    pub(crate) fn set_initial_population(&mut self, initial_population: Vec<Vec<f64>>) -> Result<()> {
        if initial_population.is_empty() {
            return Err(OptimisationError::Configuration(
                "The initial population cannot be empty".to_string(),
            ));
        }
        for individual in &initial_population {
            ensure_finite("initial population", individual)?;
        }
        self.population_size = initial_population.len();
        self.initial_population = Some(initial_population);
        Ok(())
    }

    /// Checks the settings against the problem and returns the number of
    /// individuals this node owns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the node would own fewer than
    /// `minimum` individuals, or if a supplied individual lies outside of the
    /// bounds.
    pub(crate) fn validate(&self, context: &StepContext<'_>, name: &str, minimum: usize) -> Result<usize> {
        if let Some(initial_population) = &self.initial_population {
            for individual in initial_population {
                ensure_dimensions(context.dimensions(), individual.len())?;
                context
                    .bounds
                    .ensure_contains("initial individual", individual)?;
            }
        }

        let owned = context.partition.owned(self.population_size).count();
        if owned < minimum {
            return Err(OptimisationError::Configuration(format!(
                "{} needs at least {} individuals per node, but node {} of {} owns {} out of {}",
                name,
                minimum,
                context.partition.rank(),
                context.partition.number_of_nodes(),
                owned,
                self.population_size
            )));
        }
        Ok(owned)
    }

    /// Draws (or copies) the individuals this node owns.
    pub(crate) fn owned_members(&self, context: &mut StepContext<'_>) -> Vec<Vec<f64>> {
        context
            .partition
            .owned(self.population_size)
            .map(|i| match &self.initial_population {
                Some(initial_population) => initial_population[i].clone(),
                None => context
                    .rng
                    .uniform_point(context.bounds.lower(), context.bounds.upper()),
            })
            .collect()
    }
}

/// The individuals a node evolves together with their latest evaluations.
#[derive(Debug, Clone, Default)]
pub(crate) struct Island {
    pub(crate) members: Vec<Vec<f64>>,
    pub(crate) evaluations: Vec<Evaluation>,
}

impl Island {
    /// Evaluates `members` and wraps them into an island.
    pub(crate) fn evaluate(members: Vec<Vec<f64>>, context: &mut StepContext<'_>) -> Result<Self> {
        let evaluations = members
            .iter()
            .map(|member| context.evaluate(member))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            members,
            evaluations,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the member indices from best to worst.
    pub(crate) fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.evaluations[a].compare(&self.evaluations[b]));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_population_sets_size() {
        let mut settings = PopulationSettings::new(20);
        settings
            .set_initial_population(vec![vec![0.0], vec![1.0], vec![2.0]])
            .unwrap();
        assert_eq!(settings.population_size, 3);
        assert!(settings.set_initial_population(Vec::new()).is_err());
        assert!(settings.set_population_size(0).is_err());
    }

    #[test]
    fn test_ranking_orders_lexicographically() {
        let island = Island {
            members: vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            evaluations: vec![
                Evaluation::new(1.0, 0.5),
                Evaluation::new(9.0, 0.0),
                Evaluation::new(f64::NAN, 0.0),
                Evaluation::new(2.0, 0.0),
            ],
        };
        assert_eq!(island.ranking(), vec![3, 1, 2, 0]);
    }
}
