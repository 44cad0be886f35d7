//! Gradient descent with per-parameter update rules: backpropagation, resilient propagation and
//! the Manhattan update rule.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::gradient::{GradientMode, GradientSource};
use super::{check_not_empty, sign, Algorithm, LearningRate, Momentum, Problem};
use crate::error::{check_non_negative, check_positive, Error};
use crate::method::Method;

/// How a [`Propagation`] algorithm turns a gradient into a parameter change.
pub trait UpdateRule {
    /// The algorithm name reported by [`Algorithm::name`].
    const NAME: &'static str;

    /// Clears all per-parameter state and sizes it for `len` parameters.
    fn reset(&mut self, len: usize);

    /// Applies one update to `weights`, given the gradient of the error and the error itself at
    /// the current weights.
    fn update(&mut self, gradient: &[f64], weights: &mut [f64], error: f64);

    fn as_learning_rate(&mut self) -> Option<&mut dyn LearningRate> {
        None
    }

    fn as_momentum(&mut self) -> Option<&mut dyn Momentum> {
        None
    }
}

/// A gradient-based algorithm that processes the training set in batches and applies an
/// [`UpdateRule`] after each batch.
///
/// Every iteration makes one pass over the training set. With a batch size of zero the whole set
/// is one batch.
#[derive(Clone, Debug)]
pub struct Propagation<R> {
    rule: R,
    batch_size: usize,
    gradient_mode: GradientMode,
    source: GradientSource,
    weights: Vec<f64>,
    gradient: Vec<f64>,
}

/// Plain backpropagation.
pub type Backpropagation = Propagation<Backprop>;
/// Resilient propagation.
pub type ResilientPropagation = Propagation<Resilient>;
/// Manhattan update rule propagation.
pub type ManhattanPropagation = Propagation<Manhattan>;

impl<R: UpdateRule> Propagation<R> {
    /// Returns a new `Propagation` with the given rule.
    pub fn with_rule(rule: R, batch_size: usize, gradient_mode: GradientMode) -> Self {
        Self {
            rule,
            batch_size,
            gradient_mode,
            source: GradientSource::default(),
            weights: Vec::new(),
            gradient: Vec::new(),
        }
    }

    /// Returns the update rule.
    pub fn rule(&self) -> &R {
        &self.rule
    }
}

impl<R: UpdateRule> Algorithm for Propagation<R> {
    fn name(&self) -> &'static str {
        R::NAME
    }

    fn bind(&mut self, method: &dyn Method) -> Result<(), Error> {
        let len = check_not_empty(method)?;
        self.source = GradientSource::bind(self.gradient_mode, method, R::NAME)?;
        self.weights = vec![0.0; len];
        self.gradient = vec![0.0; len];
        self.rule.reset(len);
        Ok(())
    }

    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64 {
        let count = problem.pairs().len();
        let batch_size = match self.batch_size {
            0 => count,
            size => size.min(count),
        };

        let mut start = 0;
        while start < count {
            if problem.is_cancelled() {
                break;
            }

            let end = (start + batch_size).min(count);
            let error = self
                .source
                .compute(problem, start..end, &mut self.gradient);

            problem.params(&mut self.weights);
            self.rule.update(&self.gradient, &mut self.weights, error);
            problem.set_params(&self.weights);

            start = end;
        }

        problem.error()
    }

    fn restart(&mut self) {
        self.rule.reset(self.weights.len());
    }

    fn as_learning_rate(&mut self) -> Option<&mut dyn LearningRate> {
        self.rule.as_learning_rate()
    }

    fn as_momentum(&mut self) -> Option<&mut dyn Momentum> {
        self.rule.as_momentum()
    }
}

/// Configuration of [`Backpropagation`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackpropConfig {
    pub learning_rate: f64,
    pub momentum: f64,
    /// Pairs per update; `0` means the full training set.
    pub batch_size: usize,
    pub gradient: GradientMode,
}

impl Default for BackpropConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.7,
            momentum: 0.3,
            batch_size: 0,
            gradient: GradientMode::default(),
        }
    }
}

/// The backpropagation rule: `dw = -learning_rate * g + momentum * last_dw`.
#[derive(Clone, Debug)]
pub struct Backprop {
    learning_rate: f64,
    momentum: f64,
    last_delta: Vec<f64>,
}

impl UpdateRule for Backprop {
    const NAME: &'static str = "backpropagation";

    fn reset(&mut self, len: usize) {
        self.last_delta.clear();
        self.last_delta.resize(len, 0.0);
    }

    fn update(&mut self, gradient: &[f64], weights: &mut [f64], _error: f64) {
        for ((w, g), last) in weights.iter_mut().zip(gradient).zip(&mut self.last_delta) {
            let delta = -self.learning_rate * g + self.momentum * *last;
            *w += delta;
            *last = delta;
        }
    }

    fn as_learning_rate(&mut self) -> Option<&mut dyn LearningRate> {
        Some(self)
    }

    fn as_momentum(&mut self) -> Option<&mut dyn Momentum> {
        Some(self)
    }
}

impl LearningRate for Backprop {
    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, rate: f64) {
        self.learning_rate = rate;
    }
}

impl Momentum for Backprop {
    fn momentum(&self) -> f64 {
        self.momentum
    }

    fn set_momentum(&mut self, momentum: f64) {
        self.momentum = momentum;
    }
}

impl Propagation<Backprop> {
    pub fn backprop(config: BackpropConfig) -> Result<Self, Error> {
        check_positive("learning_rate", config.learning_rate)?;
        check_non_negative("momentum", config.momentum)?;

        let rule = Backprop {
            learning_rate: config.learning_rate,
            momentum: config.momentum,
            last_delta: Vec::new(),
        };
        Ok(Self::with_rule(rule, config.batch_size, config.gradient))
    }
}

/// The variant of resilient propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RpropVariant {
    /// RPROP with weight backtracking on a gradient sign change.
    RpropPlus,
    /// RPROP without weight backtracking.
    RpropMinus,
    /// Improved RPROP+: backtracks only when the error increased.
    IRpropPlus,
    /// Improved RPROP-: skips the update after a gradient sign change.
    IRpropMinus,
}

/// Configuration of [`ResilientPropagation`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResilientConfig {
    /// The step size every parameter starts with.
    pub initial_update: f64,
    pub max_step: f64,
    pub min_step: f64,
    pub variant: RpropVariant,
    pub batch_size: usize,
    pub gradient: GradientMode,
}

impl Default for ResilientConfig {
    fn default() -> Self {
        Self {
            initial_update: 0.1,
            max_step: 50.0,
            min_step: 1.0e-6,
            variant: RpropVariant::IRpropPlus,
            batch_size: 0,
            gradient: GradientMode::default(),
        }
    }
}

/// The resilient propagation rule.
///
/// Only the sign of the gradient is used. Each parameter has its own step size, which grows
/// while the gradient keeps its sign and shrinks when it flips, within `[min_step, max_step]`.
#[derive(Clone, Debug)]
pub struct Resilient {
    config: ResilientConfig,
    update_values: Vec<f64>,
    last_gradient: Vec<f64>,
    last_delta: Vec<f64>,
    last_error: f64,
}

const POSITIVE_ETA: f64 = 1.2;
const NEGATIVE_ETA: f64 = 0.5;

impl Resilient {
    /// Returns the current per-parameter step sizes.
    pub fn update_values(&self) -> &[f64] {
        &self.update_values
    }
}

impl UpdateRule for Resilient {
    const NAME: &'static str = "resilient propagation";

    fn reset(&mut self, len: usize) {
        self.update_values.clear();
        self.update_values.resize(len, self.config.initial_update);
        self.last_gradient.clear();
        self.last_gradient.resize(len, 0.0);
        self.last_delta.clear();
        self.last_delta.resize(len, 0.0);
        self.last_error = f64::INFINITY;
    }

    fn update(&mut self, gradient: &[f64], weights: &mut [f64], error: f64) {
        let ResilientConfig {
            max_step,
            min_step,
            variant,
            ..
        } = self.config;

        for i in 0..weights.len() {
            let g = gradient[i];
            let change = sign(g * self.last_gradient[i]);
            let step = &mut self.update_values[i];

            let delta = if change > 0.0 {
                *step = (*step * POSITIVE_ETA).min(max_step);
                self.last_gradient[i] = g;
                -sign(g) * *step
            } else if change < 0.0 {
                *step = (*step * NEGATIVE_ETA).max(min_step);

                match variant {
                    RpropVariant::RpropPlus => {
                        self.last_gradient[i] = 0.0;
                        -self.last_delta[i]
                    }
                    RpropVariant::IRpropPlus => {
                        self.last_gradient[i] = 0.0;
                        if error > self.last_error {
                            -self.last_delta[i]
                        } else {
                            0.0
                        }
                    }
                    RpropVariant::RpropMinus => {
                        self.last_gradient[i] = g;
                        -sign(g) * *step
                    }
                    RpropVariant::IRpropMinus => {
                        self.last_gradient[i] = 0.0;
                        0.0
                    }
                }
            } else {
                self.last_gradient[i] = g;
                -sign(g) * *step
            };

            weights[i] += delta;
            self.last_delta[i] = delta;
        }

        self.last_error = error;
    }
}

impl Propagation<Resilient> {
    pub fn resilient(config: ResilientConfig) -> Result<Self, Error> {
        check_positive("initial_update", config.initial_update)?;
        check_positive("max_step", config.max_step)?;
        check_positive("min_step", config.min_step)?;
        if config.min_step > config.max_step {
            return Err(Error::InvalidParameter {
                name: "min_step",
                reason: "must not exceed max_step",
            });
        }

        let (batch_size, gradient) = (config.batch_size, config.gradient);
        let rule = Resilient {
            config,
            update_values: Vec::new(),
            last_gradient: Vec::new(),
            last_delta: Vec::new(),
            last_error: f64::INFINITY,
        };
        Ok(Self::with_rule(rule, batch_size, gradient))
    }
}

/// Configuration of [`ManhattanPropagation`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManhattanConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub gradient: GradientMode,
}

impl Default for ManhattanConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 0,
            gradient: GradientMode::default(),
        }
    }
}

/// The Manhattan update rule: every parameter moves by exactly the learning rate against the
/// sign of its gradient.
#[derive(Clone, Debug)]
pub struct Manhattan {
    learning_rate: f64,
}

impl UpdateRule for Manhattan {
    const NAME: &'static str = "manhattan propagation";

    fn reset(&mut self, _len: usize) {}

    fn update(&mut self, gradient: &[f64], weights: &mut [f64], _error: f64) {
        for (w, g) in weights.iter_mut().zip(gradient) {
            *w -= self.learning_rate * sign(*g);
        }
    }

    fn as_learning_rate(&mut self) -> Option<&mut dyn LearningRate> {
        Some(self)
    }
}

impl LearningRate for Manhattan {
    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, rate: f64) {
        self.learning_rate = rate;
    }
}

impl Propagation<Manhattan> {
    pub fn manhattan(config: ManhattanConfig) -> Result<Self, Error> {
        check_positive("learning_rate", config.learning_rate)?;

        let rule = Manhattan {
            learning_rate: config.learning_rate,
        };
        Ok(Self::with_rule(rule, config.batch_size, config.gradient))
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::codec::{self, Encodable};
    use crate::model::{LinearModel, Perceptron};
    use crate::train::tests::line_data;
    use crate::{Activation, Dataset, Trainer};

    fn train<A: Algorithm + 'static>(algorithm: A, iterations: usize) -> Trainer<LinearModel> {
        let mut trainer = Trainer::new(LinearModel::new(1, 1), line_data(), algorithm).unwrap();
        for _ in 0..iterations {
            trainer.iteration();
        }
        trainer
    }

    fn check_fit(trainer: &Trainer<LinearModel>, tolerance: f64) {
        let params = codec::encode(trainer.method());
        assert_approx_eq!(2.0, params[0], tolerance);
        assert_approx_eq!(-1.0, params[1], tolerance);
    }

    #[test]
    fn test_backprop() {
        let backprop = Backpropagation::backprop(BackpropConfig {
            learning_rate: 0.3,
            momentum: 0.2,
            ..Default::default()
        })
        .unwrap();
        let trainer = train(backprop, 500);
        assert!(trainer.error().unwrap() < 1e-8);
        check_fit(&trainer, 1e-3);
    }

    #[test]
    fn test_backprop_mini_batches() {
        let backprop = Backpropagation::backprop(BackpropConfig {
            learning_rate: 0.1,
            momentum: 0.0,
            batch_size: 3,
            ..Default::default()
        })
        .unwrap();
        let trainer = train(backprop, 500);
        assert!(trainer.error().unwrap() < 1e-6);
    }

    #[test]
    fn test_resilient_variants() {
        for &variant in &[
            RpropVariant::RpropPlus,
            RpropVariant::RpropMinus,
            RpropVariant::IRpropPlus,
            RpropVariant::IRpropMinus,
        ] {
            let rprop = ResilientPropagation::resilient(ResilientConfig {
                variant,
                ..Default::default()
            })
            .unwrap();
            let trainer = train(rprop, 300);
            assert!(
                trainer.error().unwrap() < 1e-6,
                "{:?} did not converge: {:?}",
                variant,
                trainer.error()
            );
            check_fit(&trainer, 1e-2);
        }
    }

    #[test]
    fn test_resilient_step_bounds() {
        let config = ResilientConfig {
            initial_update: 0.5,
            max_step: 1.0,
            min_step: 0.1,
            ..Default::default()
        };
        let mut rule = Resilient {
            config,
            update_values: Vec::new(),
            last_gradient: Vec::new(),
            last_delta: Vec::new(),
            last_error: f64::INFINITY,
        };
        rule.reset(1);
        let mut w = [0.0];

        // Sign agreement grows the step up to the maximum
        for _ in 0..10 {
            rule.update(&[1.0], &mut w, 1.0);
        }
        assert_eq!(1.0, rule.update_values()[0]);

        // Sign flips shrink it down to the minimum
        for i in 0..20 {
            let g = if i % 2 == 0 { -1.0 } else { 1.0 };
            rule.update(&[g], &mut w, 1.0);
        }
        assert_eq!(0.1, rule.update_values()[0]);
    }

    #[test]
    fn test_manhattan() {
        let manhattan = ManhattanPropagation::manhattan(ManhattanConfig {
            learning_rate: 0.01,
            ..Default::default()
        })
        .unwrap();
        let trainer = train(manhattan, 400);
        // Fixed steps can only get within one learning rate of the optimum
        check_fit(&trainer, 0.05);
    }

    #[test]
    fn test_numeric_gradient_trains_perceptron() {
        let data = Dataset::from_slices(
            &[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]],
            &[[0.0], [1.0], [1.0], [1.0]],
        )
        .unwrap();
        let rprop = ResilientPropagation::resilient(ResilientConfig {
            gradient: GradientMode::Numeric,
            ..Default::default()
        })
        .unwrap();
        let mut model = Perceptron::new(2, 3, 1, Activation::Sigmoid);
        codec::decode(&vec![0.1; model.encoded_len()], &mut model).unwrap();
        // Break the symmetry between hidden neurons
        let mut params = codec::encode(&model);
        for (i, p) in params.iter_mut().enumerate() {
            *p += i as f64 * 0.05 - 0.3;
        }
        codec::decode(&params, &mut model).unwrap();

        let mut trainer = Trainer::new(model, data, rprop).unwrap();
        let first = trainer.iteration();
        for _ in 0..300 {
            trainer.iteration();
        }
        assert!(trainer.error().unwrap() < first);
        assert!(trainer.error().unwrap() < 0.05);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Backpropagation::backprop(BackpropConfig {
            learning_rate: 0.0,
            ..Default::default()
        })
        .is_err());
        assert!(ResilientPropagation::resilient(ResilientConfig {
            min_step: 2.0,
            max_step: 1.0,
            ..Default::default()
        })
        .is_err());
        assert!(ManhattanPropagation::manhattan(ManhattanConfig {
            learning_rate: -1.0,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_capabilities() {
        let mut backprop = Backpropagation::backprop(BackpropConfig::default()).unwrap();
        assert!(backprop.as_learning_rate().is_some());
        assert!(backprop.as_momentum().is_some());

        let mut rprop = ResilientPropagation::resilient(ResilientConfig::default()).unwrap();
        assert!(rprop.as_learning_rate().is_none());

        let mut manhattan = ManhattanPropagation::manhattan(ManhattanConfig::default()).unwrap();
        manhattan.as_learning_rate().unwrap().set_learning_rate(0.5);
        assert_eq!(0.5, manhattan.rule().learning_rate());
    }
}
