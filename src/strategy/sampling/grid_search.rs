use tracing::debug;

use crate::error::{ensure_dimensions, OptimisationError, Result};
use crate::problem::Bounds;
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Exhaustive search over a regular grid.
///
/// Dimension `n` is sampled at `levels[n]` evenly spaced values from its lower
/// to its upper bound (a single level samples the lower bound). The grid is
/// enumerated like an odometer, with dimension 0 changing fastest, one point
/// per unit of work. The run ends once every point has been visited.
///
/// Without explicit levels every dimension gets `⌊budget^(1/d)⌋` of them,
/// unless sampling factors redistribute the budget between the dimensions (see
/// [`set_sampling_factors`](Self::set_sampling_factors)). The grid must fit
/// into the iteration budget; a larger one is rejected when the run starts.
///
/// ```rust
/// use bbopt::strategy::GridSearch;
///
/// let mut grid_search = GridSearch::new();
/// grid_search.set_number_of_samples_per_dimension(vec![10, 10]).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct GridSearch {
    number_of_samples_per_dimension: Option<Vec<usize>>,
    sampling_factors: Option<Vec<f64>>,
    levels: Vec<usize>,
    number_of_points: usize,
}

impl GridSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the number of levels per dimension. Clears any sampling factors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a dimension has no level at all.
    pub fn set_number_of_samples_per_dimension(&mut self, levels: Vec<usize>) -> Result<()> {
        if let Some(n) = levels.iter().position(|&l| l == 0) {
            return Err(OptimisationError::Configuration(format!(
                "Dimension {} needs at least one sample",
                n
            )));
        }
        self.number_of_samples_per_dimension = Some(levels);
        self.sampling_factors = None;
        Ok(())
    }

    pub fn number_of_samples_per_dimension(&self) -> Option<&[usize]> {
        self.number_of_samples_per_dimension.as_deref()
    }

    /// Distributes the iteration budget unevenly between the dimensions.
    ///
    /// The factors must be positive and sum to 1. Dimension `n` gets
    /// `f[0] / f[n]` times as many levels as dimension 0, so a smaller factor
    /// means a finer grid. Clears any explicit level counts.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-positive factor or a sum other than 1.
    pub fn set_sampling_factors(&mut self, sampling_factors: Vec<f64>) -> Result<()> {
        validate_sampling_factors(&sampling_factors)?;
        self.sampling_factors = Some(sampling_factors);
        self.number_of_samples_per_dimension = None;
        Ok(())
    }

    pub fn sampling_factors(&self) -> Option<&[f64]> {
        self.sampling_factors.as_deref()
    }

    /// Returns the number of grid points of the current run.
    pub fn number_of_points(&self) -> usize {
        self.number_of_points
    }

    fn point(&self, bounds: &Bounds, index: usize) -> Vec<f64> {
        grid_point(&self.levels, bounds, index)
    }
}

/// Returns point `index` of the grid with `levels` per dimension over
/// `bounds`, in odometer order.
pub(crate) fn grid_point(levels: &[usize], bounds: &Bounds, mut index: usize) -> Vec<f64> {
    levels
        .iter()
        .zip(bounds.lower().iter().zip(bounds.upper()))
        .map(|(&levels, (&lower, &upper))| {
            let level = index % levels;
            index /= levels;
            sample(lower, upper, levels, level)
        })
        .collect()
}

/// Returns the number of points of a grid, `None` on overflow.
pub(crate) fn number_of_grid_points(levels: &[usize]) -> Option<usize> {
    levels
        .iter()
        .try_fold(1usize, |product, &l| product.checked_mul(l))
}

pub(crate) fn validate_sampling_factors(sampling_factors: &[f64]) -> Result<()> {
    if let Some(n) = sampling_factors
        .iter()
        .position(|f| !(f.is_finite() && *f > 0.0))
    {
        return Err(OptimisationError::Configuration(format!(
            "Sampling factor {} must be finite and greater than 0, found {}",
            n, sampling_factors[n]
        )));
    }
    let sum: f64 = sampling_factors.iter().sum();
    if (sum - 1.0).abs() > 1e-9 {
        return Err(OptimisationError::Configuration(format!(
            "The sampling factors must sum to 1, found {}",
            sum
        )));
    }
    Ok(())
}

/// Value `level` of `levels` evenly spaced values in `[lower, upper]`.
fn sample(lower: f64, upper: f64, levels: usize, level: usize) -> f64 {
    if levels == 1 {
        return lower;
    }
    if level == levels - 1 {
        return upper;
    }
    lower + (upper - lower) * level as f64 / (levels - 1) as f64
}

/// The largest uniform level count whose grid fits into `budget` points.
fn default_levels(budget: usize, dimensions: usize) -> Vec<usize> {
    if dimensions == 0 {
        return Vec::new();
    }
    let exponent = u32::try_from(dimensions).unwrap_or(u32::MAX);
    let fits = |levels: usize| {
        levels
            .checked_pow(exponent)
            .is_some_and(|points| points <= budget)
    };

    let mut levels = (budget as f64).powf(1.0 / dimensions as f64).floor() as usize;
    while levels > 1 && !fits(levels) {
        levels -= 1;
    }
    while levels.checked_add(1).is_some_and(fits) {
        levels += 1;
    }
    vec![levels.max(1); dimensions]
}

/// Level counts for `budget` points shaped by `sampling_factors`.
///
/// Starts from `⌊(f[0] / f[n]) · (budget / ∏ f[0] / f[k])^(1/d)⌋` and removes
/// levels from the largest dimension until the grid fits.
pub(crate) fn weighted_levels(budget: usize, sampling_factors: &[f64]) -> Vec<usize> {
    let Some(&first) = sampling_factors.first() else {
        return Vec::new();
    };
    let dimensions = sampling_factors.len() as f64;
    let scaled: Vec<f64> = sampling_factors.iter().map(|f| first / f).collect();
    let scale = (budget as f64 / scaled.iter().product::<f64>()).powf(1.0 / dimensions);

    let mut levels: Vec<usize> = scaled
        .iter()
        .map(|s| ((s * scale + 1e-9).floor() as usize).max(1))
        .collect();
    while !number_of_grid_points(&levels).is_some_and(|points| points <= budget) {
        let Some(largest) = (0..levels.len())
            .filter(|&n| levels[n] > 1)
            .max_by_key(|&n| levels[n])
        else {
            break;
        };
        levels[largest] -= 1;
    }
    levels
}

impl SearchStrategy for GridSearch {
    fn initialise(&mut self, context: &mut StepContext<'_>) -> Result<()> {
        let budget = context.maximal_number_of_iterations;
        let levels = match &self.number_of_samples_per_dimension {
            Some(levels) => {
                ensure_dimensions(context.dimensions(), levels.len())?;
                levels.clone()
            }
            None => match &self.sampling_factors {
                Some(sampling_factors) => {
                    ensure_dimensions(context.dimensions(), sampling_factors.len())?;
                    weighted_levels(budget, sampling_factors)
                }
                None => default_levels(budget, context.dimensions()),
            },
        };

        let number_of_points = number_of_grid_points(&levels)
            .filter(|&points| points <= budget)
            .ok_or_else(|| {
                OptimisationError::Configuration(format!(
                    "The grid of {:?} samples per dimension exceeds the iteration budget of {}",
                    levels, budget
                ))
            })?;

        self.levels = levels;
        self.number_of_points = number_of_points;
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        let index = context.iteration;
        if index >= self.number_of_points {
            return Ok(StepOutcome::Exhausted);
        }

        if context.partition.owns(index) {
            let candidate = self.point(context.bounds, index);
            context.evaluate(&candidate)?;
        }

        if index + 1 == self.number_of_points {
            if context.is_verbose() {
                debug!(points = self.number_of_points, "Grid search visited every point");
            }
            return Ok(StepOutcome::Exhausted);
        }
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_span_the_bounds() {
        assert_eq!(sample(0.0, 1.0, 1, 0), 0.0);
        assert_eq!(sample(-1.0, 1.0, 3, 0), -1.0);
        assert_eq!(sample(-1.0, 1.0, 3, 1), 0.0);
        assert_eq!(sample(-1.0, 1.0, 3, 2), 1.0);
    }

    #[test]
    fn test_odometer_order() {
        let bounds = Bounds::uniform(2, 0.0, 2.0).unwrap();
        let grid = GridSearch {
            number_of_samples_per_dimension: None,
            sampling_factors: None,
            levels: vec![3, 2],
            number_of_points: 6,
        };
        let points: Vec<Vec<f64>> = (0..6).map(|i| grid.point(&bounds, i)).collect();
        assert_eq!(
            points,
            vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![2.0, 0.0],
                vec![0.0, 2.0],
                vec![1.0, 2.0],
                vec![2.0, 2.0],
            ]
        );
    }

    #[test]
    fn test_default_levels_fit_the_budget() {
        assert_eq!(default_levels(100, 2), vec![10, 10]);
        assert_eq!(default_levels(99, 2), vec![9, 9]);
        assert_eq!(default_levels(1000, 3), vec![10, 10, 10]);
        assert_eq!(default_levels(7, 1), vec![7]);
        assert_eq!(default_levels(usize::MAX, 1), vec![usize::MAX]);
        assert_eq!(default_levels(1, 4), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_weighted_levels_follow_the_factors() {
        // Dimension 1 gets half the factor and so twice the levels.
        assert_eq!(weighted_levels(200, &[2.0 / 3.0, 1.0 / 3.0]), vec![10, 20]);
        assert_eq!(weighted_levels(100, &[0.5, 0.5]), vec![10, 10]);
        assert_eq!(weighted_levels(1000, &[1.0 / 3.0; 3]), vec![10, 10, 10]);
        assert_eq!(weighted_levels(1, &[0.9, 0.1]), vec![1, 1]);
        let levels = weighted_levels(50, &[0.8, 0.1, 0.1]);
        assert!(number_of_grid_points(&levels).unwrap() <= 50);
        assert!(levels[1] > levels[0] && levels[1] == levels[2]);
    }

    #[test]
    fn test_invalid_sampling_factors_are_rejected() {
        let mut grid = GridSearch::new();
        assert!(grid.set_sampling_factors(vec![0.5, 0.6]).is_err());
        assert!(grid.set_sampling_factors(vec![1.5, -0.5]).is_err());
        assert!(grid.set_sampling_factors(vec![f64::NAN, 1.0]).is_err());
        assert_eq!(grid.sampling_factors(), None);

        grid.set_number_of_samples_per_dimension(vec![2, 2]).unwrap();
        grid.set_sampling_factors(vec![0.25, 0.75]).unwrap();
        assert_eq!(grid.number_of_samples_per_dimension(), None);
        assert_eq!(grid.sampling_factors(), Some(&[0.25, 0.75][..]));
    }

    #[test]
    fn test_zero_levels_are_rejected() {
        let mut grid = GridSearch::new();
        assert!(grid.set_number_of_samples_per_dimension(vec![3, 0]).is_err());
        assert_eq!(grid.number_of_samples_per_dimension(), None);
    }
}
