//! # Caching Module
//!
//! This module provides the evaluation cache that guarantees every distinct
//! parameter is passed to the user function at most once. Parameters are
//! compared by exact elementwise equality; there is no tolerance and no
//! eviction, so the cache grows for as long as the owning problem lives.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::error::{OptimisationError, Result};

/// The exact identity of a parameter vector.
///
/// Each element is stored by its bit pattern, with `-0.0` folded into `0.0`,
/// so two keys are equal exactly when the vectors have the same length and
/// compare equal element by element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterKey {
    bits: Vec<u64>,
}

impl ParameterKey {
    /// Builds the key of `parameter`.
    pub fn new(parameter: &[f64]) -> Self {
        Self {
            bits: parameter.iter().map(|&x| canonical_bits(x)).collect(),
        }
    }

    /// Recovers the parameter the key was built from.
    pub fn to_parameter(&self) -> Vec<f64> {
        self.bits.iter().map(|&b| f64::from_bits(b)).collect()
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` for the key of an empty parameter.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

impl Hash for ParameterKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-sensitive: every element feeds the hasher in sequence.
        state.write_usize(self.bits.len());
        for bits in &self.bits {
            state.write_u64(*bits);
        }
    }
}

fn canonical_bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else {
        x.to_bits()
    }
}

/// An append-only map from exact parameter vectors to previously computed values.
#[derive(Debug, Clone, Default)]
pub struct EvaluationCache {
    /// The cached values
    values: HashMap<ParameterKey, f64>,
    /// Number of requests that were answered from the cache
    hits: usize,
}

impl EvaluationCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value of `parameter`, counting the request as a hit.
    pub fn try_get(&mut self, parameter: &[f64]) -> Option<f64> {
        let value = self.values.get(&ParameterKey::new(parameter)).copied();
        if value.is_some() {
            self.hits += 1;
        }
        value
    }

    /// Stores `value` for `parameter`.
    ///
    /// Storing the identical value again is a no-op. Storing a different value
    /// for a parameter that is already cached fails, as the same input must
    /// always map to the same output within one run.
    pub fn put(&mut self, parameter: &[f64], value: f64) -> Result<()> {
        match self.values.entry(ParameterKey::new(parameter)) {
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
            Entry::Occupied(entry) if entry.get().to_bits() == value.to_bits() => Ok(()),
            Entry::Occupied(entry) => Err(OptimisationError::InconsistentEvaluation(format!(
                "Parameter {:?} is cached as {} but was evaluated to {}",
                parameter,
                entry.get(),
                value
            ))),
        }
    }

    /// Returns `true` if a value is cached for `parameter`. Does not count as a hit.
    pub fn contains(&self, parameter: &[f64]) -> bool {
        self.values.contains_key(&ParameterKey::new(parameter))
    }

    /// Returns the number of cached values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is cached yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of requests answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Iterates over every cached `(parameter, value)` pair, in no particular order.
    pub fn samples(&self) -> impl Iterator<Item = (Vec<f64>, f64)> + '_ {
        self.values
            .iter()
            .map(|(key, &value)| (key.to_parameter(), value))
    }
}
