use crate::error::BoxError;

/// The outcome of one call to a user-supplied function.
pub type FunctionResult = std::result::Result<f64, BoxError>;

/// A pure function from a parameter to a real value.
///
/// The engine caches results by exact parameter, so an implementation must
/// return the same value for the same input every time it is called.
///
/// Every `Fn(&[f64]) -> f64` closure is an objective function. Functions that
/// can fail are wrapped in [`Fallible`]; their errors are handed back to the
/// caller of `evaluate`/`optimise` untouched.
///
/// ```rust
/// use bbopt::problem::{Fallible, FunctionResult, ObjectiveFunction};
///
/// let sphere = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
/// assert_eq!(sphere.value(&[3.0, -4.0]).unwrap(), 25.0);
///
/// let checked = Fallible(|x: &[f64]| -> FunctionResult {
///     if x[0] < 0.0 {
///         return Err("negative input".into());
///     }
///     Ok(x[0].sqrt())
/// });
/// assert!(checked.value(&[-1.0]).is_err());
/// ```
pub trait ObjectiveFunction {
    /// Evaluates the function at `parameter`.
    fn value(&self, parameter: &[f64]) -> FunctionResult;
}

/// Soft constraints share the objective's interface; a value of `0` means feasible.
pub use self::ObjectiveFunction as SoftConstraintFunction;

impl<F> ObjectiveFunction for F
where
    F: Fn(&[f64]) -> f64,
{
    fn value(&self, parameter: &[f64]) -> FunctionResult {
        Ok(self(parameter))
    }
}

/// Adapter for user functions that report failures through a `Result`.
#[derive(Debug, Clone, Copy)]
pub struct Fallible<F>(pub F);

impl<F> ObjectiveFunction for Fallible<F>
where
    F: Fn(&[f64]) -> FunctionResult,
{
    fn value(&self, parameter: &[f64]) -> FunctionResult {
        (self.0)(parameter)
    }
}
