use serde::{Deserialize, Serialize};

use crate::error::{ensure_dimensions, OptimisationError, Result};

/// The box `[lower, upper]` a problem's parameters live in.
///
/// Both vectors have the same length, every element is finite and
/// `lower[i] <= upper[i]` holds for every dimension. A dimension with
/// `lower[i] == upper[i]` is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Creates validated bounds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the vectors differ in length, contain a
    /// non-finite value, or `lower[i] > upper[i]` on some dimension.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(OptimisationError::Configuration(format!(
                "The lower bounds have {} elements but the upper bounds have {}",
                lower.len(),
                upper.len()
            )));
        }
        ensure_finite("lower bounds", &lower)?;
        ensure_finite("upper bounds", &upper)?;

        if let Some(n) = (0..lower.len()).find(|&n| lower[n] > upper[n]) {
            return Err(OptimisationError::Configuration(format!(
                "The lower bound ({}) exceeds the upper bound ({}) in dimension {}",
                lower[n], upper[n], n
            )));
        }

        Ok(Self { lower, upper })
    }

    /// Creates bounds with the same interval on every dimension.
    pub fn uniform(dimensions: usize, lower: f64, upper: f64) -> Result<Self> {
        Self::new(vec![lower; dimensions], vec![upper; dimensions])
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn dimensions(&self) -> usize {
        self.lower.len()
    }

    /// Returns `upper - lower` per dimension.
    pub fn widths(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(l, u)| u - l)
            .collect()
    }

    /// Returns `true` if every element of `parameter` lies inside the bounds.
    pub fn contains(&self, parameter: &[f64]) -> bool {
        parameter.len() == self.dimensions()
            && parameter
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(x, (l, u))| l <= x && x <= u)
    }

    /// Moves every out-of-bounds element of `parameter` onto the violated bound.
    pub fn clip(&self, parameter: &mut [f64]) {
        for (x, (l, u)) in parameter.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *x = x.clamp(*l, *u);
        }
    }

    /// Checks that `parameter` has one element per dimension and lies inside the bounds.
    pub(crate) fn ensure_contains(&self, what: &str, parameter: &[f64]) -> Result<()> {
        ensure_dimensions(self.dimensions(), parameter.len())?;
        if !self.contains(parameter) {
            return Err(OptimisationError::Configuration(format!(
                "The {} {:?} lies outside of the bounds",
                what, parameter
            )));
        }
        Ok(())
    }
}

pub(crate) fn ensure_finite(what: &str, values: &[f64]) -> Result<()> {
    if let Some(value) = values.iter().find(|x| !x.is_finite()) {
        return Err(OptimisationError::Configuration(format!(
            "The {} must be finite, found {}",
            what, value
        )));
    }
    Ok(())
}
