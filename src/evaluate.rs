//! Error evaluation of a model over a set of pairs.

use std::cell::RefCell;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::data::Pair;
use crate::method::Method;

/// The error reported in place of a non-finite one.
///
/// Optimizers compare errors; a `NaN` would make every comparison false and an infinity would
/// poison averages, so both are replaced by this finite value instead.
pub const NON_FINITE_ERROR: f64 = f64::MAX;

/// Replaces a non-finite error with [`NON_FINITE_ERROR`].
pub fn sanitize(error: f64) -> f64 {
    if error.is_finite() {
        error
    } else {
        NON_FINITE_ERROR
    }
}

/// Computes a scalar error of a model over a set of pairs. Lower is better.
///
/// Implementations must be pure: the same model parameters and pairs always give the same
/// error, and neither is modified. Trainers call this once per candidate parameter vector, so it
/// dominates training time.
pub trait ErrorEvaluator {
    fn evaluate(&self, method: &dyn Method, pairs: &[Pair]) -> f64;

    /// Returns `true` if this evaluator computes the mean squared error over the pairs it is
    /// given. Only then does a model's [`Differentiable`][crate::Differentiable] gradient
    /// describe this error.
    fn is_mean_squared(&self) -> bool {
        false
    }
}

impl<F> ErrorEvaluator for F
where
    F: Fn(&dyn Method, &[Pair]) -> f64,
{
    fn evaluate(&self, method: &dyn Method, pairs: &[Pair]) -> f64 {
        self(method, pairs)
    }
}

/// How [`DatasetError`] aggregates the per-output differences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ErrorMode {
    /// Mean squared error.
    Mse,
    /// Root mean squared error.
    Rms,
    /// Sum of squared errors, halved.
    Ess,
}

impl Default for ErrorMode {
    fn default() -> Self {
        ErrorMode::Mse
    }
}

/// Compares the model output against the ideal of every pair.
#[derive(Debug, Default)]
pub struct DatasetError {
    mode: ErrorMode,
    // Reused output buffer
    output: RefCell<Vec<f64>>,
}

impl DatasetError {
    pub fn new(mode: ErrorMode) -> Self {
        Self {
            mode,
            output: RefCell::new(Vec::new()),
        }
    }

    /// Returns the aggregation mode.
    pub fn mode(&self) -> ErrorMode {
        self.mode
    }
}

impl ErrorEvaluator for DatasetError {
    fn is_mean_squared(&self) -> bool {
        self.mode == ErrorMode::Mse
    }

    fn evaluate(&self, method: &dyn Method, pairs: &[Pair]) -> f64 {
        let mut output = self.output.borrow_mut();
        output.resize(method.output_count(), 0.0);

        let mut sum = 0.0;
        let mut count = 0usize;

        for pair in pairs {
            method.compute(pair.input(), &mut output);

            for (actual, ideal) in output.iter().zip(pair.ideal()) {
                let diff = ideal - actual;
                sum += diff * diff;
            }
            count += pair.ideal().len();
        }

        if count == 0 {
            return 0.0;
        }

        let error = match self.mode {
            ErrorMode::Mse => sum / count as f64,
            ErrorMode::Rms => (sum / count as f64).sqrt(),
            ErrorMode::Ess => sum / 2.0,
        };

        sanitize(error)
    }
}
