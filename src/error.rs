//! # Error Types
//!
//! This module defines the error type shared by the whole engine. Every
//! fallible operation returns [`Result`], so callers can tell apart a
//! misconfigured run, a parameter of the wrong length, a failing user
//! function and a broken collective.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use bbopt::error::{OptimisationError, Result};
//!
//! fn check_budget(iterations: usize) -> Result<()> {
//!     if iterations == 0 {
//!         return Err(OptimisationError::Configuration(
//!             "The iteration budget must be greater than 0".to_string(),
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_budget(0).is_err());
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use bbopt::error::{OptimisationError, OptionExt};
//!
//! fn first_level(levels: &[usize]) -> bbopt::error::Result<usize> {
//!     levels.first().copied().ok_or_else_optimisation(|| {
//!         OptimisationError::Configuration("No levels given".to_string())
//!     })
//! }
//!
//! assert_eq!(first_level(&[3]).unwrap(), 3);
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error raised by a user-supplied objective or soft-constraint function.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents errors that can occur while configuring or running an optimisation.
#[derive(Error, Debug)]
pub enum OptimisationError {
    /// An invalid configuration was provided, or the configuration was changed
    /// after evaluations had begun.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required part of the configuration (usually the bounds) is missing.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// A parameter's length disagrees with the problem's number of dimensions.
    #[error("Dimension mismatch: expected {expected} elements, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The objective or soft-constraint function failed. The original error is
    /// kept as the source.
    #[error("User function failed: {0}")]
    UserFunction(#[source] BoxError),

    /// The same parameter was about to be mapped to two different values.
    #[error("Inconsistent evaluation: {0}")]
    InconsistentEvaluation(String),

    /// A collective operation could not be completed.
    #[error("Communication error: {0}")]
    Communication(String),

    /// The broadcast problem configuration could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error that occurs when an I/O operation fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for optimisation operations.
pub type Result<T> = std::result::Result<T, OptimisationError>;

/// Extension trait for Result to add context to errors.
///
/// ## Examples
///
/// ```rust
/// use bbopt::error::ResultExt;
/// use std::net::TcpListener;
///
/// fn bind(address: &str) -> bbopt::error::Result<TcpListener> {
///     TcpListener::bind(address).context("Failed to bind the node listener")
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Converts the error to an [`OptimisationError::Other`] prefixed with `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| OptimisationError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T>` using a closure to build the error.
    fn ok_or_else_optimisation<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> OptimisationError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_optimisation<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> OptimisationError,
    {
        self.ok_or_else(err_fn)
    }
}

/// Verifies that `actual` matches the expected number of dimensions.
pub(crate) fn ensure_dimensions(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(OptimisationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let error = ensure_dimensions(3, 2).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Dimension mismatch: expected 3 elements, got 2"
        );
        assert!(ensure_dimensions(2, 2).is_ok());
    }

    #[test]
    fn test_user_function_keeps_source() {
        let inner: BoxError = "objective exploded".into();
        let error = OptimisationError::UserFunction(inner);
        let source = error.source().expect("source must be preserved");
        assert_eq!(source.to_string(), "objective exploded");
    }

    #[test]
    fn test_context_wraps_error() {
        let io: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        let error = io.context("Connecting to rank 1").unwrap_err();
        assert_eq!(error.to_string(), "Connecting to rank 1: refused");
    }

    #[test]
    fn test_option_ext() {
        let missing: Option<u8> = None;
        let error = missing
            .ok_or_else_optimisation(|| OptimisationError::NotConfigured("bounds".to_string()))
            .unwrap_err();
        assert!(matches!(error, OptimisationError::NotConfigured(_)));
    }
}
