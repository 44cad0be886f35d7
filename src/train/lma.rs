//! Levenberg-Marquardt: damped Gauss-Newton steps on the output residuals.

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_not_empty, Algorithm, Problem};
use crate::data::Pair;
use crate::error::{check_positive, Error};
use crate::method::Method;

const MIN_LAMBDA: f64 = 1.0e-25;
const JACOBIAN_STEP: f64 = 1.0e-6;

/// Configuration of [`LevenbergMarquardt`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LmaConfig {
    /// The initial damping.
    pub initial_lambda: f64,
    /// The factor the damping is multiplied by after a rejected step, and divided by after an
    /// accepted one.
    pub scale: f64,
    /// Once the damping grows past this, no step can improve the error and training is done.
    pub max_lambda: f64,
}

impl Default for LmaConfig {
    fn default() -> Self {
        Self {
            initial_lambda: 0.1,
            scale: 10.0,
            max_lambda: 1.0e25,
        }
    }
}

/// The Levenberg-Marquardt algorithm.
///
/// Each iteration approximates the Jacobian of every model output with respect to every
/// parameter by central differences, then solves `(JᵀJ + λI) δ = Jᵀe` by Cholesky decomposition,
/// increasing the damping `λ` until the step lowers the error. Works for any model, but needs
/// memory for one Jacobian row per training output.
#[derive(Clone, Debug)]
pub struct LevenbergMarquardt {
    config: LmaConfig,
    lambda: f64,
    weights: Vec<f64>,
    candidate: Vec<f64>,
    // Row-major, one row per training output
    jacobian: Vec<f64>,
    residuals: Vec<f64>,
    plus: Vec<f64>,
    minus: Vec<f64>,
    hessian: Vec<f64>,
    factor: Vec<f64>,
    gradient: Vec<f64>,
    step: Vec<f64>,
    done: bool,
}

impl LevenbergMarquardt {
    pub fn new(config: LmaConfig) -> Result<Self, Error> {
        check_positive("initial_lambda", config.initial_lambda)?;
        check_positive("max_lambda", config.max_lambda)?;
        if !(config.scale > 1.0 && config.scale.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "scale",
                reason: "must be finite and greater than one",
            });
        }

        Ok(Self {
            lambda: config.initial_lambda,
            config,
            weights: Vec::new(),
            candidate: Vec::new(),
            jacobian: Vec::new(),
            residuals: Vec::new(),
            plus: Vec::new(),
            minus: Vec::new(),
            hessian: Vec::new(),
            factor: Vec::new(),
            gradient: Vec::new(),
            step: Vec::new(),
            done: false,
        })
    }

    /// Returns the current damping.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Fills the Jacobian and the residuals at `self.weights`.
    fn compute_jacobian(&mut self, problem: &mut Problem<'_>) {
        let n = self.weights.len();
        let pairs = problem.pairs();
        let rows = pairs.len() * problem.method().output_count();

        self.jacobian.resize(rows * n, 0.0);
        self.residuals.resize(rows, 0.0);
        self.plus.resize(rows, 0.0);
        self.minus.resize(rows, 0.0);

        problem.set_params(&self.weights);
        compute_outputs(problem.method(), pairs, &mut self.residuals);
        let ideals = pairs.iter().flat_map(|pair| pair.ideal());
        for (e, ideal) in self.residuals.iter_mut().zip(ideals) {
            *e = ideal - *e;
        }

        self.candidate.copy_from_slice(&self.weights);
        for j in 0..n {
            let original = self.weights[j];
            let h = JACOBIAN_STEP * original.abs().max(1.0);

            self.candidate[j] = original + h;
            problem.set_params(&self.candidate);
            compute_outputs(problem.method(), pairs, &mut self.plus);

            self.candidate[j] = original - h;
            problem.set_params(&self.candidate);
            compute_outputs(problem.method(), pairs, &mut self.minus);

            self.candidate[j] = original;
            for r in 0..rows {
                self.jacobian[r * n + j] = (self.plus[r] - self.minus[r]) / (2.0 * h);
            }
        }

        problem.set_params(&self.weights);
    }

    /// Computes `JᵀJ` and `Jᵀe`.
    fn compute_normal_equations(&mut self) {
        let n = self.weights.len();
        let rows = self.residuals.len();

        for a in 0..n {
            for b in 0..=a {
                let sum: f64 = (0..rows)
                    .map(|r| self.jacobian[r * n + a] * self.jacobian[r * n + b])
                    .sum();
                self.hessian[a * n + b] = sum;
                self.hessian[b * n + a] = sum;
            }

            self.gradient[a] = (0..rows)
                .map(|r| self.jacobian[r * n + a] * self.residuals[r])
                .sum();
        }
    }

    /// Solves the damped system for `self.step`. Returns `false` if the damped matrix is not
    /// positive definite.
    fn solve_damped(&mut self) -> bool {
        let n = self.weights.len();

        self.factor.copy_from_slice(&self.hessian);
        for i in 0..n {
            self.factor[i * n + i] += self.lambda;
        }

        if !cholesky(&mut self.factor, n) {
            return false;
        }
        cholesky_solve(&self.factor, n, &self.gradient, &mut self.step);
        self.step.iter().all(|x| x.is_finite())
    }
}

impl Algorithm for LevenbergMarquardt {
    fn name(&self) -> &'static str {
        "levenberg-marquardt"
    }

    fn bind(&mut self, method: &dyn Method) -> Result<(), Error> {
        let n = check_not_empty(method)?;

        self.weights = vec![0.0; n];
        self.candidate = vec![0.0; n];
        self.hessian = vec![0.0; n * n];
        self.factor = vec![0.0; n * n];
        self.gradient = vec![0.0; n];
        self.step = vec![0.0; n];
        self.restart();
        Ok(())
    }

    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64 {
        if self.done {
            return problem.error();
        }

        problem.params(&mut self.weights);
        let error = problem.error();

        self.compute_jacobian(problem);
        self.compute_normal_equations();

        while !problem.is_cancelled() {
            if self.solve_damped() {
                for ((c, w), d) in self.candidate.iter_mut().zip(&self.weights).zip(&self.step) {
                    *c = w + d;
                }

                let new_error = problem.error_at(&self.candidate);
                if new_error < error {
                    self.lambda = (self.lambda / self.config.scale).max(MIN_LAMBDA);
                    return new_error;
                }
            }

            self.lambda *= self.config.scale;
            if self.lambda > self.config.max_lambda {
                debug!(
                    "levenberg-marquardt cannot improve further: error={} lambda={}",
                    error, self.lambda
                );
                self.done = true;
                break;
            }
        }

        problem.set_params(&self.weights);
        error
    }

    fn can_continue(&self) -> bool {
        !self.done
    }

    fn restart(&mut self) {
        self.lambda = self.config.initial_lambda;
        self.done = false;
    }
}

/// Writes the outputs for every pair into `out`, one pair after another.
fn compute_outputs(method: &dyn Method, pairs: &[Pair], out: &mut [f64]) {
    let count = method.output_count();
    for (pair, chunk) in pairs.iter().zip(out.chunks_mut(count)) {
        method.compute(pair.input(), chunk);
    }
}

/// Replaces the lower triangle of the symmetric `n` by `n` matrix `a` with its Cholesky factor.
/// Returns `false` if `a` is not positive definite.
fn cholesky(a: &mut [f64], n: usize) -> bool {
    for j in 0..n {
        let mut d = a[j * n + j];
        for k in 0..j {
            d -= a[j * n + k] * a[j * n + k];
        }
        if d <= 0.0 || !d.is_finite() {
            return false;
        }
        let d = d.sqrt();
        a[j * n + j] = d;

        for i in j + 1..n {
            let mut s = a[i * n + j];
            for k in 0..j {
                s -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = s / d;
        }
    }

    true
}

/// Solves `L Lᵀ x = b` for the factor computed by [`cholesky`].
fn cholesky_solve(l: &[f64], n: usize, b: &[f64], x: &mut [f64]) {
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[i * n + k] * x[k];
        }
        x[i] = s / l[i * n + i];
    }

    for i in (0..n).rev() {
        let mut s = x[i];
        for k in i + 1..n {
            s -= l[k * n + i] * x[k];
        }
        x[i] = s / l[i * n + i];
    }
}
