//! # RandomNumberGenerator
//!
//! The `RandomNumberGenerator` struct is the explicit randomness handle threaded
//! through every operation that needs random numbers: initial points, neighbours,
//! populations and acceptance draws. An optimisation algorithm owns exactly one
//! of them, so a fixed seed makes a run reproducible.
//!
//! ## Example
//!
//! ```rust
//! use bbopt::rng::RandomNumberGenerator;
//!
//! let mut rng = RandomNumberGenerator::from_seed(42);
//! let point = rng.uniform_point(&[-5.0, -5.0], &[5.0, 5.0]);
//!
//! assert_eq!(point.len(), 2);
//! assert!(point.iter().all(|x| (-5.0..=5.0).contains(x)));
//! ```
//!
//! ## Streams
//!
//! Distributed runs need one independent stream per node that is still derived
//! from a single base seed. [`RandomNumberGenerator::for_stream`] mixes the
//! stream index into the seed:
//!
//! ```rust
//! use bbopt::rng::RandomNumberGenerator;
//!
//! let mut first = RandomNumberGenerator::for_stream(7, 0);
//! let mut second = RandomNumberGenerator::for_stream(7, 1);
//! assert_ne!(first.probability(), second.probability());
//! ```

use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use std::f64::consts::PI;

/// A wrapper around the `rand` crate's `StdRng` that provides the draws the
/// search strategies need.
#[derive(Debug, Clone)]
pub struct RandomNumberGenerator {
    pub rng: StdRng,
}

impl RandomNumberGenerator {
    /// Creates a new `RandomNumberGenerator` instance seeded from the system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a new `RandomNumberGenerator` instance with a specific seed.
    ///
    /// This is useful for reproducible tests and benchmarks.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates the generator for stream `stream` of the base seed `seed`.
    ///
    /// Stream 0 is identical to [`RandomNumberGenerator::from_seed`].
    pub fn for_stream(seed: u64, stream: u64) -> Self {
        if stream == 0 {
            return Self::from_seed(seed);
        }
        Self::from_seed(mix(seed ^ mix(stream)))
    }

    /// Draws a fresh seed, e.g. for a run that was not given one.
    pub fn entropy_seed() -> u64 {
        StdRng::from_entropy().gen()
    }

    /// Returns a number drawn uniformly from `[0, 1)`.
    pub fn probability(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Returns a number drawn uniformly from `[from, to]`.
    ///
    /// A degenerate interval (`from == to`) always yields `from`.
    pub fn uniform(&mut self, from: f64, to: f64) -> f64 {
        from + self.probability() * (to - from)
    }

    /// Returns a point drawn uniformly from the box spanned by `lower` and `upper`.
    pub fn uniform_point(&mut self, lower: &[f64], upper: &[f64]) -> Vec<f64> {
        lower
            .iter()
            .zip(upper)
            .map(|(&l, &u)| self.uniform(l, u))
            .collect()
    }

    /// Samples a standard normal number using the Box-Muller transform.
    pub fn standard_normal(&mut self) -> f64 {
        let u1: f64 = self.probability().max(1e-300);
        let u2: f64 = self.probability();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Returns a vector of `dimensions` independent standard normal numbers.
    pub fn standard_normal_vector(&mut self, dimensions: usize) -> Vec<f64> {
        (0..dimensions).map(|_| self.standard_normal()).collect()
    }

    /// Returns a direction drawn uniformly from the unit sphere.
    pub fn random_direction(&mut self, dimensions: usize) -> Vec<f64> {
        loop {
            let direction = self.standard_normal_vector(dimensions);
            let norm = direction.iter().map(|x| x * x).sum::<f64>().sqrt();
            if dimensions == 0 {
                return direction;
            }
            if norm > 0.0 && norm.is_finite() {
                return direction.into_iter().map(|x| x / norm).collect();
            }
        }
    }

    /// Returns an index drawn uniformly from `0..length`.
    pub fn index(&mut self, length: usize) -> usize {
        self.rng.gen_range(0..length)
    }

    /// Returns `amount` distinct indices from `0..length`, none equal to `excluded`.
    ///
    /// Callers must make sure that `length - 1 >= amount`.
    pub fn distinct_indices(&mut self, length: usize, amount: usize, excluded: usize) -> Vec<usize> {
        index::sample(&mut self.rng, length - 1, amount)
            .into_iter()
            .map(|i| if i >= excluded { i + 1 } else { i })
            .collect()
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// SplitMix64 finaliser.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
