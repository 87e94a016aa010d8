//! # AlgorithmOptions
//!
//! The `AlgorithmOptions` struct holds the budgets and run settings shared by
//! every search strategy: how many units of work may be spent, how long the
//! run may take, which objective value is good enough, the seed of the run's
//! random stream and how much is logged.
//!
//! ## Example
//!
//! ```rust
//! use bbopt::algorithm::{AlgorithmOptions, LogLevel};
//! use std::time::Duration;
//!
//! let options = AlgorithmOptions::builder()
//!     .maximal_number_of_iterations(1_000)
//!     .maximal_duration(Duration::from_millis(250))
//!     .acceptable_objective_value(1e-6)
//!     .seed(42)
//!     .log_level(LogLevel::Minimal)
//!     .build();
//!
//! assert_eq!(options.get_maximal_number_of_iterations(), 1_000);
//!
//! // Unbounded iterations, one second, never "good enough", entropy seed.
//! let default_options = AlgorithmOptions::default();
//! assert_eq!(default_options.get_maximal_number_of_iterations(), usize::MAX);
//! ```

use std::time::Duration;

/// How much an algorithm reports through `tracing` while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Logs the run summary and every improvement of the incumbent.
    Verbose,
    /// Logs the start and the summary of a run.
    Minimal,
    /// Logs nothing.
    #[default]
    None,
}

const DEFAULT_MAXIMAL_NUMBER_OF_ITERATIONS: usize = usize::MAX;
const DEFAULT_MAXIMAL_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_ACCEPTABLE_OBJECTIVE_VALUE: f64 = f64::NEG_INFINITY;

#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmOptions {
    maximal_number_of_iterations: usize,
    maximal_duration: Duration,
    acceptable_objective_value: f64,
    seed: Option<u64>,
    log_level: LogLevel,
}

impl AlgorithmOptions {
    pub fn new(
        maximal_number_of_iterations: usize,
        maximal_duration: Duration,
        acceptable_objective_value: f64,
    ) -> Self {
        Self {
            maximal_number_of_iterations,
            maximal_duration,
            acceptable_objective_value,
            seed: None,
            log_level: LogLevel::None,
        }
    }

    pub fn get_maximal_number_of_iterations(&self) -> usize {
        self.maximal_number_of_iterations
    }

    pub fn get_maximal_duration(&self) -> Duration {
        self.maximal_duration
    }

    pub fn get_acceptable_objective_value(&self) -> f64 {
        self.acceptable_objective_value
    }

    /// Returns the seed of the run, if one was fixed.
    pub fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn get_log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Sets the number of units of work after which a run terminates.
    pub fn set_maximal_number_of_iterations(&mut self, maximal_number_of_iterations: usize) {
        self.maximal_number_of_iterations = maximal_number_of_iterations;
    }

    /// Sets the wall-clock time after which a run terminates.
    pub fn set_maximal_duration(&mut self, maximal_duration: Duration) {
        self.maximal_duration = maximal_duration;
    }

    /// Sets the objective value at or below which a feasible incumbent finishes the run.
    pub fn set_acceptable_objective_value(&mut self, acceptable_objective_value: f64) {
        self.acceptable_objective_value = acceptable_objective_value;
    }

    /// Fixes the seed of the run's random stream.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    /// Sets the log level.
    pub fn set_log_level(&mut self, log_level: LogLevel) {
        self.log_level = log_level;
    }

    /// Returns a builder for creating an `AlgorithmOptions` instance.
    pub fn builder() -> AlgorithmOptionsBuilder {
        AlgorithmOptionsBuilder::default()
    }
}

impl Default for AlgorithmOptions {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAXIMAL_NUMBER_OF_ITERATIONS,
            DEFAULT_MAXIMAL_DURATION,
            DEFAULT_ACCEPTABLE_OBJECTIVE_VALUE,
        )
    }
}

/// Builder for `AlgorithmOptions`.
///
/// Every setting that is not given falls back to the default of
/// [`AlgorithmOptions::default`].
#[derive(Debug, Clone, Default)]
pub struct AlgorithmOptionsBuilder {
    maximal_number_of_iterations: Option<usize>,
    maximal_duration: Option<Duration>,
    acceptable_objective_value: Option<f64>,
    seed: Option<u64>,
    log_level: Option<LogLevel>,
}

impl AlgorithmOptionsBuilder {
    pub fn maximal_number_of_iterations(mut self, value: usize) -> Self {
        self.maximal_number_of_iterations = Some(value);
        self
    }

    pub fn maximal_duration(mut self, value: Duration) -> Self {
        self.maximal_duration = Some(value);
        self
    }

    pub fn acceptable_objective_value(mut self, value: f64) -> Self {
        self.acceptable_objective_value = Some(value);
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.seed = Some(value);
        self
    }

    pub fn log_level(mut self, value: LogLevel) -> Self {
        self.log_level = Some(value);
        self
    }

    /// Builds the `AlgorithmOptions` instance.
    pub fn build(self) -> AlgorithmOptions {
        AlgorithmOptions {
            maximal_number_of_iterations: self
                .maximal_number_of_iterations
                .unwrap_or(DEFAULT_MAXIMAL_NUMBER_OF_ITERATIONS),
            maximal_duration: self.maximal_duration.unwrap_or(DEFAULT_MAXIMAL_DURATION),
            acceptable_objective_value: self
                .acceptable_objective_value
                .unwrap_or(DEFAULT_ACCEPTABLE_OBJECTIVE_VALUE),
            seed: self.seed,
            log_level: self.log_level.unwrap_or_default(),
        }
    }
}
