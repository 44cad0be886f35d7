//! Gradients of the training error with respect to the parameter vector.

use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Problem;
use crate::error::{Capability, Error};
use crate::method::Method;

/// Where gradient-based algorithms get their gradients from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GradientMode {
    /// The model's own [`Differentiable`][crate::Differentiable] implementation. Models without
    /// one are rejected when the algorithm is bound. That gradient is of the mean squared error,
    /// so under any other error evaluator the numeric gradient is used instead.
    Analytic,
    /// Central finite differences of the trainer's error evaluator. Works for any model, at the
    /// cost of two error evaluations per parameter.
    Numeric,
    /// Analytic when the model supports it and the error is the mean squared error, numeric
    /// otherwise.
    Auto,
}

impl Default for GradientMode {
    fn default() -> Self {
        GradientMode::Analytic
    }
}

/// The gradient provider of a bound algorithm.
#[derive(Clone, Debug, Default)]
pub(crate) struct GradientSource {
    analytic: bool,
    // Scratch copy of the parameters for finite differences
    params: Vec<f64>,
}

impl GradientSource {
    /// Resolves `mode` against `method`.
    pub fn bind(
        mode: GradientMode,
        method: &dyn Method,
        required_by: &'static str,
    ) -> Result<Self, Error> {
        let has_analytic = method.as_differentiable().is_some();

        let analytic = match mode {
            GradientMode::Analytic if !has_analytic => {
                return Err(Error::MissingCapability {
                    capability: Capability::Differentiable,
                    required_by,
                })
            }
            GradientMode::Analytic => true,
            GradientMode::Numeric => false,
            GradientMode::Auto => has_analytic,
        };

        Ok(Self {
            analytic,
            params: vec![0.0; method.encoded_len()],
        })
    }

    /// Writes the gradient of the error over the training pairs in `range` into `gradient` and
    /// returns the error at the current parameters. The parameters are left unchanged.
    pub fn compute(
        &mut self,
        problem: &mut Problem<'_>,
        range: Range<usize>,
        gradient: &mut [f64],
    ) -> f64 {
        let pairs = &problem.pairs()[range];

        if self.analytic && problem.is_mean_squared() {
            if let Some(differentiable) = problem.method().as_differentiable() {
                return differentiable.gradient(pairs, gradient);
            }
        }

        // Central differences, with the step scaled to the parameter magnitude
        const STEP: f64 = 1.0e-6;

        problem.params(&mut self.params);
        let error = problem.error_on(pairs);

        for i in 0..self.params.len() {
            let original = self.params[i];
            let h = STEP * original.abs().max(1.0);

            self.params[i] = original + h;
            problem.set_params(&self.params);
            let above = problem.error_on(pairs);

            self.params[i] = original - h;
            problem.set_params(&self.params);
            let below = problem.error_on(pairs);

            self.params[i] = original;
            gradient[i] = (above - below) / (2.0 * h);
        }

        problem.set_params(&self.params);
        error
    }
}
