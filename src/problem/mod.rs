//! # Optimisation Problem
//!
//! An [`OptimisationProblem`] couples the search space (its number of
//! dimensions and [`Bounds`]) with the user's objective function and an
//! optional soft-constraint function. All evaluations go through
//! [`OptimisationProblem::evaluate`], which consults one [`EvaluationCache`]
//! per function so that a parameter is never computed twice.
//!
//! ## Example
//!
//! ```rust
//! use bbopt::problem::OptimisationProblem;
//!
//! let mut problem = OptimisationProblem::new(2, |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>());
//! problem.set_lower_bounds(vec![-5.0, -5.0]).unwrap();
//! problem.set_upper_bounds(vec![5.0, 5.0]).unwrap();
//!
//! let first = problem.evaluate(&[3.0, -4.0]).unwrap();
//! let second = problem.evaluate(&[3.0, -4.0]).unwrap();
//!
//! assert_eq!(first, second);
//! assert_eq!(first.objective_value, 25.0);
//! assert_eq!(problem.number_of_evaluations(), 2);
//! assert_eq!(problem.number_of_distinct_evaluations(), 1);
//! ```
//!
//! ## Lifecycle
//!
//! Bounds, functions and the parameter transformation can be changed freely
//! until the first evaluation. From then on the caches hold values that
//! depend on them, so every mutator fails with a configuration error.

pub mod bounds;
pub mod configuration;
pub mod function;

pub use bounds::Bounds;
pub use configuration::ProblemConfiguration;
pub use function::{Fallible, FunctionResult, ObjectiveFunction, SoftConstraintFunction};

use std::cmp::Ordering;
use std::fmt;

use crate::caching::EvaluationCache;
use crate::error::{ensure_dimensions, OptimisationError, OptionExt, Result};
use bounds::ensure_finite;

/// The objective and soft-constraint values of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub objective_value: f64,
    pub soft_constraints_value: f64,
}

impl Evaluation {
    pub fn new(objective_value: f64, soft_constraints_value: f64) -> Self {
        Self {
            objective_value,
            soft_constraints_value,
        }
    }

    /// Returns `true` if `self` is strictly preferred over `other`.
    ///
    /// Candidates are ordered by `(soft_constraints_value, objective_value)`
    /// lexicographically, so a less violating candidate always wins regardless
    /// of its objective value. An evaluation with a NaN objective value is never
    /// better than anything.
    pub fn is_better_than(&self, other: &Evaluation) -> bool {
        if self.objective_value.is_nan() {
            return false;
        }
        self.soft_constraints_value < other.soft_constraints_value
            || (self.soft_constraints_value == other.soft_constraints_value
                && self.objective_value < other.objective_value)
    }

    /// Total order consistent with [`is_better_than`](Self::is_better_than), for sorting.
    ///
    /// NaN objective values rank behind everything else.
    pub fn compare(&self, other: &Evaluation) -> Ordering {
        fn objective(evaluation: &Evaluation) -> f64 {
            if evaluation.objective_value.is_nan() {
                f64::INFINITY
            } else {
                evaluation.objective_value
            }
        }

        self.soft_constraints_value
            .total_cmp(&other.soft_constraints_value)
            .then_with(|| objective(self).total_cmp(&objective(other)))
    }

    /// Returns `true` if the soft constraints are satisfied.
    pub fn is_feasible(&self) -> bool {
        self.soft_constraints_value == 0.0
    }
}

/// A bounded black-box problem with cached evaluation.
pub struct OptimisationProblem {
    number_of_dimensions: usize,
    lower_bounds: Option<Vec<f64>>,
    upper_bounds: Option<Vec<f64>>,
    objective_function: Box<dyn ObjectiveFunction>,
    soft_constraints_function: Box<dyn ObjectiveFunction>,
    parameter_translation: Vec<f64>,
    parameter_scaling: Vec<f64>,
    objective_value_translation: f64,
    objective_cache: EvaluationCache,
    soft_constraints_cache: EvaluationCache,
    number_of_evaluations: usize,
    number_of_distinct_evaluations: usize,
}

impl OptimisationProblem {
    /// Creates a problem with `number_of_dimensions` parameters and no bounds yet.
    ///
    /// The soft-constraint function defaults to the constant `0`, i.e. every
    /// parameter is feasible.
    pub fn new<O>(number_of_dimensions: usize, objective_function: O) -> Self
    where
        O: ObjectiveFunction + 'static,
    {
        Self {
            number_of_dimensions,
            lower_bounds: None,
            upper_bounds: None,
            objective_function: Box::new(objective_function),
            soft_constraints_function: Box::new(|_: &[f64]| 0.0),
            parameter_translation: vec![0.0; number_of_dimensions],
            parameter_scaling: vec![1.0; number_of_dimensions],
            objective_value_translation: 0.0,
            objective_cache: EvaluationCache::new(),
            soft_constraints_cache: EvaluationCache::new(),
            number_of_evaluations: 0,
            number_of_distinct_evaluations: 0,
        }
    }

    /// Creates a problem and sets its bounds in one go.
    pub fn with_bounds<O>(bounds: Bounds, objective_function: O) -> Self
    where
        O: ObjectiveFunction + 'static,
    {
        let mut problem = Self::new(bounds.dimensions(), objective_function);
        let (lower, upper) = (bounds.lower().to_vec(), bounds.upper().to_vec());
        problem.lower_bounds = Some(lower);
        problem.upper_bounds = Some(upper);
        problem
    }

    /// Evaluates `parameter`.
    ///
    /// Both caches are consulted first. On a miss the user function is called
    /// with the transformed parameter and the result is cached. Every call
    /// counts towards [`number_of_evaluations`](Self::number_of_evaluations);
    /// only calls that had to invoke the objective function count towards
    /// [`number_of_distinct_evaluations`](Self::number_of_distinct_evaluations).
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if `parameter` has the wrong length.
    /// - `UserFunction` if a user function fails, carrying its error unchanged.
    pub fn evaluate(&mut self, parameter: &[f64]) -> Result<Evaluation> {
        ensure_dimensions(self.number_of_dimensions, parameter.len())?;
        self.number_of_evaluations += 1;

        let objective_value = match self.objective_cache.try_get(parameter) {
            Some(value) => value,
            None => {
                let transformed = self.transformed(parameter);
                let value = self
                    .objective_function
                    .value(&transformed)
                    .map_err(OptimisationError::UserFunction)?
                    + self.objective_value_translation;
                self.objective_cache.put(parameter, value)?;
                self.number_of_distinct_evaluations += 1;
                value
            }
        };
        let soft_constraints_value = self.soft_constraints_value(parameter)?;

        Ok(Evaluation::new(objective_value, soft_constraints_value))
    }

    /// Returns `true` if `parameter` satisfies the soft constraints and lies inside the bounds.
    ///
    /// Only the soft-constraint function is consulted; the request does not
    /// count as an evaluation.
    pub fn is_feasible(&mut self, parameter: &[f64]) -> Result<bool> {
        ensure_dimensions(self.number_of_dimensions, parameter.len())?;
        let bounds = self.bounds()?;
        Ok(self.soft_constraints_value(parameter)? == 0.0 && bounds.contains(parameter))
    }

    fn soft_constraints_value(&mut self, parameter: &[f64]) -> Result<f64> {
        if let Some(value) = self.soft_constraints_cache.try_get(parameter) {
            return Ok(value);
        }

        let transformed = self.transformed(parameter);
        let value = self
            .soft_constraints_function
            .value(&transformed)
            .map_err(OptimisationError::UserFunction)?;
        if value < 0.0 || value.is_nan() {
            return Err(OptimisationError::UserFunction(
                format!("The soft-constraint function returned {}, expected a value >= 0", value)
                    .into(),
            ));
        }
        self.soft_constraints_cache.put(parameter, value)?;
        Ok(value)
    }

    fn transformed(&self, parameter: &[f64]) -> Vec<f64> {
        parameter
            .iter()
            .zip(self.parameter_translation.iter().zip(&self.parameter_scaling))
            .map(|(x, (translation, scaling))| (x + translation) * scaling)
            .collect()
    }

    /// Returns `true` once anything has been evaluated.
    pub fn has_evaluations(&self) -> bool {
        self.number_of_evaluations > 0 || !self.soft_constraints_cache.is_empty()
    }

    fn ensure_mutable(&self, what: &str) -> Result<()> {
        if self.has_evaluations() {
            return Err(OptimisationError::Configuration(format!(
                "The {} cannot be changed after evaluations have begun",
                what
            )));
        }
        Ok(())
    }

    fn ensure_vector(&self, what: &str, values: &[f64]) -> Result<()> {
        self.ensure_mutable(what)?;
        ensure_dimensions(self.number_of_dimensions, values.len())?;
        ensure_finite(what, values)
    }

    pub fn set_lower_bounds(&mut self, lower_bounds: Vec<f64>) -> Result<()> {
        self.ensure_vector("lower bounds", &lower_bounds)?;
        self.lower_bounds = Some(lower_bounds);
        Ok(())
    }

    pub fn set_upper_bounds(&mut self, upper_bounds: Vec<f64>) -> Result<()> {
        self.ensure_vector("upper bounds", &upper_bounds)?;
        self.upper_bounds = Some(upper_bounds);
        Ok(())
    }

    pub fn set_bounds(&mut self, bounds: Bounds) -> Result<()> {
        self.ensure_mutable("bounds")?;
        ensure_dimensions(self.number_of_dimensions, bounds.dimensions())?;
        self.lower_bounds = Some(bounds.lower().to_vec());
        self.upper_bounds = Some(bounds.upper().to_vec());
        Ok(())
    }

    pub fn set_objective_function<O>(&mut self, objective_function: O) -> Result<()>
    where
        O: ObjectiveFunction + 'static,
    {
        self.ensure_mutable("objective function")?;
        self.objective_function = Box::new(objective_function);
        Ok(())
    }

    pub fn set_soft_constraints_function<S>(&mut self, soft_constraints_function: S) -> Result<()>
    where
        S: SoftConstraintFunction + 'static,
    {
        self.ensure_mutable("soft-constraint function")?;
        self.soft_constraints_function = Box::new(soft_constraints_function);
        Ok(())
    }

    /// Sets the offset added to every parameter before the user functions see it.
    pub fn set_parameter_translation(&mut self, parameter_translation: Vec<f64>) -> Result<()> {
        self.ensure_vector("parameter translation", &parameter_translation)?;
        self.parameter_translation = parameter_translation;
        Ok(())
    }

    /// Sets the factor the translated parameter is multiplied with, per dimension.
    pub fn set_parameter_scaling(&mut self, parameter_scaling: Vec<f64>) -> Result<()> {
        self.ensure_vector("parameter scaling", &parameter_scaling)?;
        self.parameter_scaling = parameter_scaling;
        Ok(())
    }

    /// Sets the offset added to every objective value.
    pub fn set_objective_value_translation(&mut self, objective_value_translation: f64) -> Result<()> {
        self.ensure_mutable("objective value translation")?;
        ensure_finite("objective value translation", &[objective_value_translation])?;
        self.objective_value_translation = objective_value_translation;
        Ok(())
    }

    /// Returns the validated bounds.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if either bound vector has not been set.
    /// - `Configuration` if `lower[i] > upper[i]` on some dimension.
    pub fn bounds(&self) -> Result<Bounds> {
        let lower = self.lower_bounds.clone().ok_or_else_optimisation(|| {
            OptimisationError::NotConfigured("The lower bounds have not been set".to_string())
        })?;
        let upper = self.upper_bounds.clone().ok_or_else_optimisation(|| {
            OptimisationError::NotConfigured("The upper bounds have not been set".to_string())
        })?;
        Bounds::new(lower, upper)
    }

    /// Checks that the problem is ready to be optimised.
    pub fn validate(&self) -> Result<()> {
        self.bounds().map(|_| ())
    }

    /// Captures the shippable part of the problem.
    pub fn configuration(&self) -> Result<ProblemConfiguration> {
        let bounds = self.bounds()?;
        Ok(ProblemConfiguration {
            number_of_dimensions: self.number_of_dimensions,
            lower_bounds: bounds.lower().to_vec(),
            upper_bounds: bounds.upper().to_vec(),
            parameter_translation: self.parameter_translation.clone(),
            parameter_scaling: self.parameter_scaling.clone(),
            objective_value_translation: self.objective_value_translation,
        })
    }

    /// Overwrites bounds and transformation with `configuration`.
    ///
    /// # Errors
    ///
    /// Fails if evaluations have begun, if the number of dimensions differs, or
    /// if the configuration itself is invalid. On failure nothing is changed.
    pub fn apply_configuration(&mut self, configuration: ProblemConfiguration) -> Result<()> {
        self.ensure_mutable("configuration")?;
        ensure_dimensions(self.number_of_dimensions, configuration.number_of_dimensions)?;
        let bounds = Bounds::new(configuration.lower_bounds, configuration.upper_bounds)?;
        ensure_dimensions(self.number_of_dimensions, bounds.dimensions())?;
        ensure_dimensions(self.number_of_dimensions, configuration.parameter_translation.len())?;
        ensure_dimensions(self.number_of_dimensions, configuration.parameter_scaling.len())?;
        ensure_finite("parameter translation", &configuration.parameter_translation)?;
        ensure_finite("parameter scaling", &configuration.parameter_scaling)?;
        ensure_finite(
            "objective value translation",
            &[configuration.objective_value_translation],
        )?;

        self.lower_bounds = Some(bounds.lower().to_vec());
        self.upper_bounds = Some(bounds.upper().to_vec());
        self.parameter_translation = configuration.parameter_translation;
        self.parameter_scaling = configuration.parameter_scaling;
        self.objective_value_translation = configuration.objective_value_translation;
        Ok(())
    }

    pub fn number_of_dimensions(&self) -> usize {
        self.number_of_dimensions
    }

    pub fn lower_bounds(&self) -> Option<&[f64]> {
        self.lower_bounds.as_deref()
    }

    pub fn upper_bounds(&self) -> Option<&[f64]> {
        self.upper_bounds.as_deref()
    }

    pub fn parameter_translation(&self) -> &[f64] {
        &self.parameter_translation
    }

    pub fn parameter_scaling(&self) -> &[f64] {
        &self.parameter_scaling
    }

    pub fn objective_value_translation(&self) -> f64 {
        self.objective_value_translation
    }

    /// Returns the number of evaluation requests, cached or not.
    pub fn number_of_evaluations(&self) -> usize {
        self.number_of_evaluations
    }

    /// Returns the number of times the objective function was actually invoked.
    pub fn number_of_distinct_evaluations(&self) -> usize {
        self.number_of_distinct_evaluations
    }

    pub fn objective_cache(&self) -> &EvaluationCache {
        &self.objective_cache
    }

    pub fn soft_constraints_cache(&self) -> &EvaluationCache {
        &self.soft_constraints_cache
    }

    /// Returns every `(parameter, objective value)` pair evaluated so far.
    pub fn cached_samples(&self) -> Vec<(Vec<f64>, f64)> {
        self.objective_cache.samples().collect()
    }
}

impl fmt::Debug for OptimisationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisationProblem")
            .field("number_of_dimensions", &self.number_of_dimensions)
            .field("lower_bounds", &self.lower_bounds)
            .field("upper_bounds", &self.upper_bounds)
            .field("parameter_translation", &self.parameter_translation)
            .field("parameter_scaling", &self.parameter_scaling)
            .field("objective_value_translation", &self.objective_value_translation)
            .field("number_of_evaluations", &self.number_of_evaluations)
            .field(
                "number_of_distinct_evaluations",
                &self.number_of_distinct_evaluations,
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    fn counting_sphere(calls: Rc<Cell<usize>>) -> impl Fn(&[f64]) -> f64 {
        move |x: &[f64]| {
            calls.set(calls.get() + 1);
            sphere(x)
        }
    }

    #[test]
    fn test_evaluate_caches_by_exact_parameter() {
        let calls = Rc::new(Cell::new(0));
        let mut problem = OptimisationProblem::new(2, counting_sphere(calls.clone()));

        let first = problem.evaluate(&[1.0, 2.0]).unwrap();
        let second = problem.evaluate(&[1.0, 2.0]).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(problem.number_of_evaluations(), 2);
        assert_eq!(problem.number_of_distinct_evaluations(), 1);
        assert_eq!(problem.objective_cache().hits(), 1);
    }

    #[test]
    fn test_evaluate_rejects_wrong_length() {
        let mut problem = OptimisationProblem::new(2, sphere);
        let error = problem.evaluate(&[1.0]).unwrap_err();
        assert!(matches!(
            error,
            OptimisationError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(problem.number_of_evaluations(), 0);
    }

    #[test]
    fn test_user_function_failure_propagates() {
        let mut problem = OptimisationProblem::new(
            1,
            Fallible(|_: &[f64]| -> FunctionResult { Err("diverged".into()) }),
        );
        let error = problem.evaluate(&[0.0]).unwrap_err();
        match error {
            OptimisationError::UserFunction(source) => assert_eq!(source.to_string(), "diverged"),
            other => panic!("Expected UserFunction error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_soft_constraints_are_zero() {
        let mut problem = OptimisationProblem::new(1, sphere);
        let evaluation = problem.evaluate(&[2.0]).unwrap();
        assert_eq!(evaluation.soft_constraints_value, 0.0);
        assert!(evaluation.is_feasible());
    }

    #[test]
    fn test_negative_soft_constraints_are_rejected() {
        let mut problem = OptimisationProblem::new(1, sphere);
        problem
            .set_soft_constraints_function(|_: &[f64]| -1.0)
            .unwrap();
        assert!(matches!(
            problem.evaluate(&[0.0]),
            Err(OptimisationError::UserFunction(_))
        ));
    }

    #[test]
    fn test_is_feasible_checks_bounds_and_soft_constraints() {
        let mut problem = OptimisationProblem::new(1, sphere);
        assert!(matches!(
            problem.is_feasible(&[0.0]),
            Err(OptimisationError::NotConfigured(_))
        ));

        problem.set_bounds(Bounds::uniform(1, -1.0, 1.0).unwrap()).unwrap();
        problem
            .set_soft_constraints_function(|x: &[f64]| (x[0] - 0.5).max(0.0))
            .unwrap();

        assert!(problem.is_feasible(&[0.0]).unwrap());
        assert!(!problem.is_feasible(&[0.75]).unwrap());
        assert!(!problem.is_feasible(&[-2.0]).unwrap());
        assert_eq!(problem.number_of_evaluations(), 0);
    }

    #[test]
    fn test_mutation_after_evaluation_is_rejected() {
        let mut problem = OptimisationProblem::new(1, sphere);
        problem.set_lower_bounds(vec![-1.0]).unwrap();
        problem.evaluate(&[0.5]).unwrap();

        assert!(matches!(
            problem.set_lower_bounds(vec![0.0]),
            Err(OptimisationError::Configuration(_))
        ));
        assert!(problem.set_upper_bounds(vec![1.0]).is_err());
        assert!(problem.set_objective_function(|_: &[f64]| 1.0).is_err());
        assert!(problem.set_soft_constraints_function(|_: &[f64]| 1.0).is_err());
        assert!(problem.set_parameter_translation(vec![1.0]).is_err());
        assert!(problem.set_objective_value_translation(1.0).is_err());
    }

    #[test]
    fn test_bounds_are_validated_lazily() {
        let mut problem = OptimisationProblem::new(1, sphere);
        assert!(matches!(
            problem.validate(),
            Err(OptimisationError::NotConfigured(_))
        ));

        problem.set_lower_bounds(vec![2.0]).unwrap();
        problem.set_upper_bounds(vec![1.0]).unwrap();
        assert!(matches!(
            problem.validate(),
            Err(OptimisationError::Configuration(_))
        ));

        problem.set_lower_bounds(vec![0.0]).unwrap();
        assert!(problem.validate().is_ok());
    }

    #[test]
    fn test_transformation_is_applied_before_the_function() {
        let mut problem = OptimisationProblem::new(2, sphere);
        problem.set_parameter_translation(vec![1.0, -1.0]).unwrap();
        problem.set_parameter_scaling(vec![2.0, 1.0]).unwrap();
        problem.set_objective_value_translation(10.0).unwrap();

        // ((0 + 1) * 2)^2 + ((1 - 1) * 1)^2 + 10
        let evaluation = problem.evaluate(&[0.0, 1.0]).unwrap();
        assert_eq!(evaluation.objective_value, 14.0);
    }

    #[test]
    fn test_configuration_round_trip_between_problems() {
        let mut source = OptimisationProblem::new(2, sphere);
        source.set_bounds(Bounds::uniform(2, -3.0, 3.0).unwrap()).unwrap();
        source.set_parameter_translation(vec![0.5, 0.5]).unwrap();

        let mut target = OptimisationProblem::new(2, sphere);
        target.set_bounds(Bounds::uniform(2, 0.0, 1.0).unwrap()).unwrap();
        target
            .apply_configuration(source.configuration().unwrap())
            .unwrap();

        assert_eq!(target.lower_bounds(), Some(&[-3.0, -3.0][..]));
        assert_eq!(target.parameter_translation(), &[0.5, 0.5]);
        assert_eq!(
            target.configuration().unwrap(),
            source.configuration().unwrap()
        );
    }

    #[test]
    fn test_apply_configuration_checks_dimensions() {
        let mut source = OptimisationProblem::new(3, sphere);
        source.set_bounds(Bounds::uniform(3, -1.0, 1.0).unwrap()).unwrap();

        let mut target = OptimisationProblem::new(2, sphere);
        assert!(matches!(
            target.apply_configuration(source.configuration().unwrap()),
            Err(OptimisationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_lexicographic_preference() {
        let feasible_but_worse = Evaluation::new(100.0, 0.0);
        let infeasible_but_better = Evaluation::new(-100.0, 0.5);
        assert!(feasible_but_worse.is_better_than(&infeasible_but_better));
        assert!(!infeasible_but_better.is_better_than(&feasible_but_worse));

        let a = Evaluation::new(1.0, 0.0);
        let b = Evaluation::new(2.0, 0.0);
        assert!(a.is_better_than(&b));
        assert!(!a.is_better_than(&a));
    }

    #[test]
    fn test_cached_samples_expose_objective_values() {
        let mut problem = OptimisationProblem::new(1, sphere);
        problem.evaluate(&[2.0]).unwrap();
        problem.evaluate(&[2.0]).unwrap();
        problem.evaluate(&[3.0]).unwrap();

        let mut samples = problem.cached_samples();
        samples.sort_by(|a, b| a.1.total_cmp(&b.1));
        assert_eq!(samples, vec![(vec![2.0], 4.0), (vec![3.0], 9.0)]);
    }
}
