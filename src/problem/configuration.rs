use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Everything about a problem that can be shipped to another node: its size,
/// its bounds and its parameter transformation.
///
/// The user functions are not part of it; every node supplies its own. The
/// byte format is plain JSON without a version tag and is only meant to be
/// read by the same build of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfiguration {
    pub number_of_dimensions: usize,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub parameter_translation: Vec<f64>,
    pub parameter_scaling: Vec<f64>,
    pub objective_value_translation: f64,
}

impl ProblemConfiguration {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
