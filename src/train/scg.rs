//! Møller's scaled conjugate gradient.

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::gradient::{GradientMode, GradientSource};
use super::{check_not_empty, dot, Algorithm, Problem};
use crate::error::{check_positive, Error};
use crate::method::Method;

// Squared norms below this count as zero
const TOLERANCE: f64 = 1.0e-30;

/// Configuration of [`ScaledConjugateGradient`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScgConfig {
    /// The step used to approximate the Hessian along the search direction.
    pub sigma: f64,
    /// The initial Hessian scaling.
    pub lambda: f64,
    pub gradient: GradientMode,
}

impl Default for ScgConfig {
    fn default() -> Self {
        Self {
            sigma: 1.0e-4,
            lambda: 1.0e-6,
            gradient: GradientMode::default(),
        }
    }
}

/// Conjugate gradient descent that replaces the line search with a scaled second-order
/// estimate along the search direction.
///
/// Always trains on the full training set. Once the gradient vanishes the algorithm reports
/// that it cannot continue.
#[derive(Clone, Debug)]
pub struct ScaledConjugateGradient {
    config: ScgConfig,
    source: GradientSource,
    weights: Vec<f64>,
    candidate: Vec<f64>,
    gradient: Vec<f64>,
    // Negative gradient at `weights`
    residual: Vec<f64>,
    direction: Vec<f64>,
    error: f64,
    delta: f64,
    lambda: f64,
    lambda_bar: f64,
    success: bool,
    // Successful steps since the last restart of the conjugate directions
    steps: usize,
    initialized: bool,
    converged: bool,
}

impl ScaledConjugateGradient {
    pub fn new(config: ScgConfig) -> Result<Self, Error> {
        check_positive("sigma", config.sigma)?;
        check_positive("lambda", config.lambda)?;

        Ok(Self {
            lambda: config.lambda,
            config,
            source: GradientSource::default(),
            weights: Vec::new(),
            candidate: Vec::new(),
            gradient: Vec::new(),
            residual: Vec::new(),
            direction: Vec::new(),
            error: 0.0,
            delta: 0.0,
            lambda_bar: 0.0,
            success: true,
            steps: 0,
            initialized: false,
            converged: false,
        })
    }

    fn init(&mut self, problem: &mut Problem<'_>) {
        let all = 0..problem.pairs().len();

        problem.params(&mut self.weights);
        self.source.compute(problem, all, &mut self.gradient);
        self.error = problem.error();

        for (r, g) in self.residual.iter_mut().zip(&self.gradient) {
            *r = -g;
        }
        self.direction.copy_from_slice(&self.residual);

        self.lambda = self.config.lambda;
        self.lambda_bar = 0.0;
        self.success = true;
        self.steps = 0;
        self.initialized = true;
    }

    fn restart_directions(&mut self) {
        self.direction.copy_from_slice(&self.residual);
        self.success = true;
        self.steps = 0;
    }
}

impl Algorithm for ScaledConjugateGradient {
    fn name(&self) -> &'static str {
        "scaled conjugate gradient"
    }

    fn bind(&mut self, method: &dyn Method) -> Result<(), Error> {
        let n = check_not_empty(method)?;
        self.source = GradientSource::bind(self.config.gradient, method, self.name())?;

        self.weights = vec![0.0; n];
        self.candidate = vec![0.0; n];
        self.gradient = vec![0.0; n];
        self.residual = vec![0.0; n];
        self.direction = vec![0.0; n];
        self.restart();
        Ok(())
    }

    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64 {
        if self.converged {
            return problem.error();
        }
        if !self.initialized {
            self.init(problem);
        }

        let n = self.weights.len();
        let all = 0..problem.pairs().len();

        let mut mu = dot(&self.direction, &self.residual);
        if mu <= 0.0 {
            // Not a descent direction anymore
            self.restart_directions();
            mu = dot(&self.direction, &self.residual);
        }

        let p2 = dot(&self.direction, &self.direction);
        if p2 <= TOLERANCE {
            self.converged = true;
            problem.set_params(&self.weights);
            return self.error;
        }

        if self.success {
            // Second order information along the direction
            let sigma = self.config.sigma / p2.sqrt();
            for ((c, w), p) in self.candidate.iter_mut().zip(&self.weights).zip(&self.direction) {
                *c = w + sigma * p;
            }
            problem.set_params(&self.candidate);
            self.source.compute(problem, all.clone(), &mut self.gradient);

            self.delta = (0..n)
                .map(|i| self.direction[i] * (self.gradient[i] + self.residual[i]))
                .sum::<f64>()
                / sigma;
        }

        // Scale, then make the Hessian estimate positive definite
        self.delta += (self.lambda - self.lambda_bar) * p2;
        if self.delta <= 0.0 {
            self.lambda_bar = 2.0 * (self.lambda - self.delta / p2);
            self.delta = -self.delta + self.lambda * p2;
            self.lambda = self.lambda_bar;
        }

        let alpha = mu / self.delta;
        for ((c, w), p) in self.candidate.iter_mut().zip(&self.weights).zip(&self.direction) {
            *c = w + alpha * p;
        }
        let new_error = problem.error_at(&self.candidate);

        // Comparison of the actual and the predicted error reduction
        let comparison = 2.0 * self.delta * (self.error - new_error) / (mu * mu);

        if comparison >= 0.0 {
            self.weights.copy_from_slice(&self.candidate);
            self.error = new_error;
            self.source.compute(problem, all, &mut self.gradient);

            self.lambda_bar = 0.0;
            self.success = true;
            self.steps += 1;

            if self.steps % n == 0 {
                for (r, g) in self.residual.iter_mut().zip(&self.gradient) {
                    *r = -g;
                }
                self.direction.copy_from_slice(&self.residual);
            } else {
                let r2 = dot(&self.gradient, &self.gradient);
                let cross = -dot(&self.gradient, &self.residual);
                let beta = (r2 - cross) / mu;

                for i in 0..n {
                    let r = -self.gradient[i];
                    self.direction[i] = r + beta * self.direction[i];
                    self.residual[i] = r;
                }
            }

            if comparison >= 0.75 {
                self.lambda *= 0.25;
            }
        } else {
            self.lambda_bar = self.lambda;
            self.success = false;
        }

        if comparison < 0.25 {
            self.lambda += self.delta * (1.0 - comparison) / p2;
        }

        if dot(&self.residual, &self.residual) <= TOLERANCE {
            debug!("scaled conjugate gradient converged: error={}", self.error);
            self.converged = true;
        }

        problem.set_params(&self.weights);
        self.error
    }

    fn can_continue(&self) -> bool {
        !self.converged
    }

    fn restart(&mut self) {
        self.initialized = false;
        self.converged = false;
    }
}
