use crate::problem::Evaluation;

/// The best parameter found so far and its evaluation.
///
/// Starts out empty with both values at `+inf`. A candidate replaces the
/// incumbent only if it is strictly better in the `(soft constraints,
/// objective)` order, so the incumbent never gets worse.
#[derive(Debug, Clone, PartialEq)]
pub struct Incumbent {
    parameter: Vec<f64>,
    evaluation: Evaluation,
}

impl Incumbent {
    pub fn new() -> Self {
        Self {
            parameter: Vec::new(),
            evaluation: Evaluation::new(f64::INFINITY, f64::INFINITY),
        }
    }

    /// Offers a candidate; returns `true` if it became the new incumbent.
    pub fn offer(&mut self, parameter: &[f64], evaluation: Evaluation) -> bool {
        if !evaluation.is_better_than(&self.evaluation) {
            return false;
        }
        self.parameter.clear();
        self.parameter.extend_from_slice(parameter);
        self.evaluation = evaluation;
        true
    }

    pub fn parameter(&self) -> &[f64] {
        &self.parameter
    }

    pub fn evaluation(&self) -> Evaluation {
        self.evaluation
    }

    pub fn objective_value(&self) -> f64 {
        self.evaluation.objective_value
    }

    pub fn soft_constraints_value(&self) -> f64 {
        self.evaluation.soft_constraints_value
    }

    /// Returns `true` until a first candidate has been accepted.
    pub fn is_empty(&self) -> bool {
        self.parameter.is_empty()
    }

    /// Overwrites the incumbent unconditionally, e.g. with the outcome of a reduction.
    pub(crate) fn replace(&mut self, parameter: Vec<f64>, evaluation: Evaluation) {
        self.parameter = parameter;
        self.evaluation = evaluation;
    }
}

impl Default for Incumbent {
    fn default() -> Self {
        Self::new()
    }
}
