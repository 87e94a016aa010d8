//! # Sampling strategies
//!
//! Strategies without memory beyond a cursor: the candidate of unit of work
//! `i` depends only on `i`, the random stream and, for the multi-resolution
//! grid, the incumbent. Every node of a distributed run walks through the
//! same candidates and evaluates those with `i % number_of_nodes == rank`.

pub mod grid_search;
pub mod multi_resolution_grid_search;
pub mod random_search;

pub use grid_search::GridSearch;
pub use multi_resolution_grid_search::MultiResolutionGridSearch;
pub use random_search::RandomSearch;

use super::{SearchStrategy, StepContext, StepOutcome};
use crate::error::Result;

#[derive(Debug, Clone)]
pub enum SamplingStrategy {
    GridSearch(GridSearch),
    MultiResolutionGridSearch(MultiResolutionGridSearch),
    RandomSearch(RandomSearch),
}

impl SamplingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            SamplingStrategy::GridSearch(_) => "grid_search",
            SamplingStrategy::MultiResolutionGridSearch(_) => "multi_resolution_grid_search",
            SamplingStrategy::RandomSearch(_) => "random_search",
        }
    }
}

impl SearchStrategy for SamplingStrategy {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        match self {
            SamplingStrategy::GridSearch(strategy) => strategy.initialise(context),
            SamplingStrategy::MultiResolutionGridSearch(strategy) => strategy.initialise(context),
            SamplingStrategy::RandomSearch(strategy) => strategy.initialise(context),
        }
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        match self {
            SamplingStrategy::GridSearch(strategy) => strategy.next_unit_of_work(context),
            SamplingStrategy::MultiResolutionGridSearch(strategy) => {
                strategy.next_unit_of_work(context)
            }
            SamplingStrategy::RandomSearch(strategy) => strategy.next_unit_of_work(context),
        }
    }
}
