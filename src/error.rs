//! The error type for building trainers and attaching strategies.

use std::{error, fmt};

/// An optional feature a model or algorithm may provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// The model can reinitialize its parameters randomly. See [`Resettable`][crate::Resettable].
    Resettable,
    /// The model provides an analytic gradient. See [`Differentiable`][crate::Differentiable].
    Differentiable,
    /// The algorithm has an adjustable learning rate. See
    /// [`LearningRate`][crate::train::LearningRate].
    LearningRate,
    /// The algorithm has an adjustable momentum. See [`Momentum`][crate::train::Momentum].
    Momentum,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Resettable => write!(f, "resettable"),
            Self::Differentiable => write!(f, "differentiable"),
            Self::LearningRate => write!(f, "learning rate"),
            Self::Momentum => write!(f, "momentum"),
        }
    }
}

/// The reason why a trainer, algorithm or strategy could not be set up, or why a parameter
/// vector was rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A parameter vector does not have the length the model expects.
    LengthMismatch {
        /// The length the model expects.
        expected: usize,
        /// The length that was given.
        actual: usize,
    },
    /// Data does not match the shape of the model. `what` names the mismatched dimension.
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The model has no trainable parameters.
    EmptyModel,
    /// The dataset contains no pairs.
    EmptyDataset,
    /// A model or algorithm lacks a capability required by an algorithm or strategy.
    MissingCapability {
        /// The missing capability.
        capability: Capability,
        /// The name of the component that requires it.
        required_by: &'static str,
    },
    /// A configuration value is out of range.
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "parameter vector has length {}, expected {}",
                actual, expected
            ),
            Self::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{} size is {}, expected {}", what, actual, expected),
            Self::EmptyModel => write!(f, "model has no trainable parameters"),
            Self::EmptyDataset => write!(f, "dataset is empty"),
            Self::MissingCapability {
                capability,
                required_by,
            } => write!(
                f,
                "{} requires a {} capability that is not supported",
                required_by, capability
            ),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid value for `{}`: {}", name, reason)
            }
        }
    }
}

impl error::Error for Error {}

/// Returns an [`Error::InvalidParameter`] unless `value` is finite and strictly positive.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            reason: "must be finite and greater than zero",
        })
    }
}

/// Returns an [`Error::InvalidParameter`] unless `value` is finite and not negative.
pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            reason: "must be finite and not negative",
        })
    }
}

/// Returns an [`Error::InvalidParameter`] unless `value` lies in `[0, 1]`.
pub(crate) fn check_fraction(name: &'static str, value: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            reason: "must be between 0 and 1",
        })
    }
}
