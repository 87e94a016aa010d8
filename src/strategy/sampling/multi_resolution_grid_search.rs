use tracing::debug;

use super::grid_search::{
    grid_point, number_of_grid_points, validate_sampling_factors, weighted_levels,
};
use crate::error::{ensure_dimensions, OptimisationError, Result};
use crate::problem::Bounds;
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Grid search that zooms in on the incumbent.
///
/// Each resolution is a regular grid of about `samples_per_dimension^d`
/// points over the current search box, enumerated in odometer order with one
/// point per unit of work. Once a resolution is exhausted, the box shrinks to
/// the incumbent plus or minus one grid step, clipped to the previous box,
/// and the next resolution starts. The run ends after the first resolution
/// whose steps are all below the minimal sampling distance.
///
/// Sampling factors shape the level counts the same way as for
/// [`GridSearch::set_sampling_factors`](super::GridSearch::set_sampling_factors).
#[derive(Debug, Clone)]
pub struct MultiResolutionGridSearch {
    samples_per_dimension: usize,
    sampling_factors: Option<Vec<f64>>,
    minimal_sampling_distance: f64,
    levels: Vec<usize>,
    search_box: Option<Bounds>,
    number_of_points: usize,
    cursor: usize,
    resolution: usize,
}

impl MultiResolutionGridSearch {
    pub fn new() -> Self {
        Self {
            samples_per_dimension: 11,
            sampling_factors: None,
            minimal_sampling_distance: 1e-3,
            levels: Vec::new(),
            search_box: None,
            number_of_points: 0,
            cursor: 0,
            resolution: 0,
        }
    }

    /// Sets the average number of levels per dimension of every resolution.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for fewer than 3 samples, which could not
    /// shrink the search box.
    pub fn set_samples_per_dimension(&mut self, samples_per_dimension: usize) -> Result<()> {
        if samples_per_dimension < 3 {
            return Err(OptimisationError::Configuration(format!(
                "A resolution needs at least 3 samples per dimension, found {}",
                samples_per_dimension
            )));
        }
        self.samples_per_dimension = samples_per_dimension;
        Ok(())
    }

    pub fn samples_per_dimension(&self) -> usize {
        self.samples_per_dimension
    }

    pub fn set_sampling_factors(&mut self, sampling_factors: Vec<f64>) -> Result<()> {
        validate_sampling_factors(&sampling_factors)?;
        self.sampling_factors = Some(sampling_factors);
        Ok(())
    }

    pub fn sampling_factors(&self) -> Option<&[f64]> {
        self.sampling_factors.as_deref()
    }

    /// Sets the grid step below which a dimension is not refined any further.
    pub fn set_minimal_sampling_distance(&mut self, minimal_sampling_distance: f64) -> Result<()> {
        if !(minimal_sampling_distance.is_finite() && minimal_sampling_distance > 0.0) {
            return Err(OptimisationError::Configuration(format!(
                "The minimal sampling distance must be finite and greater than 0, found {}",
                minimal_sampling_distance
            )));
        }
        self.minimal_sampling_distance = minimal_sampling_distance;
        Ok(())
    }

    pub fn minimal_sampling_distance(&self) -> f64 {
        self.minimal_sampling_distance
    }

    /// Returns the index of the current resolution; 0 covers the whole bounds.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Returns the grid step per dimension of the current resolution.
    fn steps(&self, search_box: &Bounds) -> Vec<f64> {
        search_box
            .widths()
            .iter()
            .zip(&self.levels)
            .map(|(&width, &levels)| {
                if levels > 1 {
                    width / (levels - 1) as f64
                } else {
                    width
                }
            })
            .collect()
    }

    fn is_finest(&self, search_box: &Bounds) -> bool {
        self.steps(search_box)
            .iter()
            .all(|&step| step < self.minimal_sampling_distance)
    }

    /// Shrinks `search_box` to `centre` plus or minus one grid step.
    fn refine(&self, search_box: &Bounds, centre: &[f64]) -> Result<Bounds> {
        let steps = self.steps(search_box);
        let lower = centre
            .iter()
            .zip(&steps)
            .zip(search_box.lower())
            .map(|((&c, &step), &lower)| (c - step).max(lower))
            .collect();
        let upper = centre
            .iter()
            .zip(&steps)
            .zip(search_box.upper())
            .map(|((&c, &step), &upper)| (c + step).min(upper))
            .collect();
        Bounds::new(lower, upper)
    }
}

impl Default for MultiResolutionGridSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for MultiResolutionGridSearch {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let dimensions = context.dimensions();
        let sampling_factors = match &self.sampling_factors {
            Some(sampling_factors) => {
                ensure_dimensions(dimensions, sampling_factors.len())?;
                sampling_factors.clone()
            }
            None => vec![1.0 / dimensions.max(1) as f64; dimensions],
        };
        let points_per_resolution = u32::try_from(dimensions)
            .ok()
            .and_then(|d| self.samples_per_dimension.checked_pow(d))
            .ok_or_else(|| {
                OptimisationError::Configuration(format!(
                    "{} samples in each of {} dimensions are too many for one resolution",
                    self.samples_per_dimension, dimensions
                ))
            })?;

        self.levels = weighted_levels(points_per_resolution, &sampling_factors);
        self.number_of_points = number_of_grid_points(&self.levels).unwrap_or(0);
        self.search_box = Some(context.bounds.clone());
        self.cursor = 0;
        self.resolution = 0;
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        let Some(search_box) = self.search_box.take() else {
            return Ok(StepOutcome::Exhausted);
        };

        let search_box = if self.cursor < self.number_of_points {
            search_box
        } else {
            // Every node holds the same incumbent here when reducing after
            // each unit of work, so all of them zoom into the same box.
            let centre = if context.incumbent.is_empty() {
                search_box
                    .lower()
                    .iter()
                    .zip(search_box.upper())
                    .map(|(lower, upper)| lower + (upper - lower) / 2.0)
                    .collect()
            } else {
                context.incumbent.parameter().to_vec()
            };
            let refined = self.refine(&search_box, &centre)?;
            self.cursor = 0;
            self.resolution += 1;
            if context.is_verbose() {
                debug!(
                    resolution = self.resolution,
                    lower = ?refined.lower(),
                    upper = ?refined.upper(),
                    "Refined the grid"
                );
            }
            refined
        };

        if context.partition.owns(context.iteration) {
            let candidate = grid_point(&self.levels, &search_box, self.cursor);
            context.evaluate(&candidate)?;
        }
        self.cursor += 1;

        if self.cursor == self.number_of_points && self.is_finest(&search_box) {
            if context.is_verbose() {
                debug!(
                    resolution = self.resolution,
                    "Multi-resolution grid search reached the minimal sampling distance"
                );
            }
            return Ok(StepOutcome::Exhausted);
        }
        self.search_box = Some(search_box);
        Ok(StepOutcome::Continue)
    }
}
