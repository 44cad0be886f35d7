//! The model contract consumed by trainers, and the optional capabilities a model may offer.

use rand::RngCore;

use crate::codec::Encodable;
use crate::data::Pair;

/// A trainable model: a parameter vector plus a way to compute outputs from inputs.
///
/// Optional capabilities are discovered through [`as_resettable`][Self::as_resettable] and
/// [`as_differentiable`][Self::as_differentiable]. Algorithms and strategies query them once,
/// when they are bound to a trainer, and fail with
/// [`Error::MissingCapability`][crate::Error::MissingCapability] if they are absent.
pub trait Method: Encodable {
    /// Returns the length of the input slices accepted by [`compute`][Self::compute].
    fn input_count(&self) -> usize;

    /// Returns the length of the output slices written by [`compute`][Self::compute].
    fn output_count(&self) -> usize;

    /// Computes the model output for `input`, writing it to `output`.
    fn compute(&self, input: &[f64], output: &mut [f64]);

    /// Returns the model output for `input` as a new vector.
    fn evaluate(&self, input: &[f64]) -> Vec<f64> {
        let mut output = vec![0.0; self.output_count()];
        self.compute(input, &mut output);
        output
    }

    /// Returns the model as a [`Resettable`] if it supports random reinitialization.
    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        None
    }

    /// Returns the model as a [`Differentiable`] if it provides an analytic gradient.
    fn as_differentiable(&self) -> Option<&dyn Differentiable> {
        None
    }
}

/// A model that can reinitialize its parameters randomly.
pub trait Resettable {
    /// Replaces every parameter with a fresh random value.
    fn reset(&mut self, rng: &mut dyn RngCore);
}

/// A model that can compute the gradient of its mean squared error directly.
///
/// Gradient-based algorithms only use it while the trainer measures the mean squared error (see
/// [`ErrorEvaluator::is_mean_squared`][crate::evaluate::ErrorEvaluator::is_mean_squared]).
pub trait Differentiable {
    /// Writes the gradient of the mean squared error over `pairs` with respect to every
    /// parameter into `gradient`, in encoding order. Returns the mean squared error itself.
    fn gradient(&self, pairs: &[Pair], gradient: &mut [f64]) -> f64;
}
