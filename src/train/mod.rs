//! Training algorithms and the [`Trainer`] that drives them.
//!
//! Every algorithm sees a model only through its flat parameter vector and an
//! [`ErrorEvaluator`]: it reads the current vector, evaluates candidate vectors, and leaves the
//! best one it found decoded into the model.

mod anneal;
mod genetic;
mod gradient;
mod lma;
mod nelder_mead;
mod propagation;
mod scg;
mod trainer;

pub use anneal::{AnnealConfig, SimulatedAnnealing};
pub use genetic::{GeneticAlgorithm, GeneticConfig};
pub use gradient::GradientMode;
pub use lma::{LevenbergMarquardt, LmaConfig};
pub use nelder_mead::{NelderMead, NelderMeadConfig, NelderMeadState};
pub use propagation::{
    Backprop, BackpropConfig, Backpropagation, Manhattan, ManhattanConfig, ManhattanPropagation,
    Propagation, Resilient, ResilientConfig, ResilientPropagation, RpropVariant, UpdateRule,
};
pub use scg::{ScaledConjugateGradient, ScgConfig};
pub use trainer::{StopReason, Trainer, TrainingState, TrainingSummary};

use crate::cancel::CancelToken;
use crate::data::Pair;
use crate::error::Error;
use crate::evaluate::{self, ErrorEvaluator};
use crate::method::Method;

/// An optimization algorithm that improves a model one iteration at a time.
pub trait Algorithm {
    /// Returns a short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Prepares the algorithm for `method`, allocating its working buffers.
    ///
    /// Called once when the algorithm is attached to a trainer (or to a hybrid strategy). Must
    /// return an error if the model lacks a capability the algorithm needs.
    fn bind(&mut self, method: &dyn Method) -> Result<(), Error>;

    /// Runs one iteration and returns the error of the parameters left in the model.
    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64;

    /// Returns `false` once the algorithm has reached a terminal state and further iterations
    /// cannot improve the model.
    fn can_continue(&self) -> bool {
        true
    }

    /// Discards state derived from earlier parameters. Called after a strategy replaced the
    /// model parameters (for example by resetting them).
    fn restart(&mut self) {}

    /// Returns the algorithm as a [`LearningRate`] if it has one.
    fn as_learning_rate(&mut self) -> Option<&mut dyn LearningRate> {
        None
    }

    /// Returns the algorithm as a [`Momentum`] if it has one.
    fn as_momentum(&mut self) -> Option<&mut dyn Momentum> {
        None
    }
}

impl<A: Algorithm + ?Sized> Algorithm for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn bind(&mut self, method: &dyn Method) -> Result<(), Error> {
        (**self).bind(method)
    }

    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64 {
        (**self).iteration(problem)
    }

    fn can_continue(&self) -> bool {
        (**self).can_continue()
    }

    fn restart(&mut self) {
        (**self).restart()
    }

    fn as_learning_rate(&mut self) -> Option<&mut dyn LearningRate> {
        (**self).as_learning_rate()
    }

    fn as_momentum(&mut self) -> Option<&mut dyn Momentum> {
        (**self).as_momentum()
    }
}

/// An algorithm with an adjustable learning rate.
pub trait LearningRate {
    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, rate: f64);
}

/// An algorithm with an adjustable momentum.
pub trait Momentum {
    fn momentum(&self) -> f64;

    fn set_momentum(&mut self, momentum: f64);
}

/// The model, data and error function an [`Algorithm`] works on during one iteration.
pub struct Problem<'a> {
    method: &'a mut dyn Method,
    pairs: &'a [Pair],
    evaluator: &'a dyn ErrorEvaluator,
    cancel: &'a CancelToken,
}

impl<'a> Problem<'a> {
    pub fn new(
        method: &'a mut dyn Method,
        pairs: &'a [Pair],
        evaluator: &'a dyn ErrorEvaluator,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            method,
            pairs,
            evaluator,
            cancel,
        }
    }

    /// Returns the model being trained.
    pub fn method(&self) -> &dyn Method {
        &*self.method
    }

    /// Returns the model being trained.
    pub fn method_mut(&mut self) -> &mut dyn Method {
        &mut *self.method
    }

    /// Returns the training pairs.
    pub fn pairs(&self) -> &'a [Pair] {
        self.pairs
    }

    /// Returns the length of the parameter vector.
    pub fn param_count(&self) -> usize {
        self.method.encoded_len()
    }

    /// Copies the current parameters into `out`.
    pub fn params(&self, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.method.encoded_len());
        self.method.encode_to(out);
    }

    /// Replaces the current parameters with `params`.
    pub fn set_params(&mut self, params: &[f64]) {
        debug_assert_eq!(params.len(), self.method.encoded_len());
        self.method.decode_from(params);
    }

    /// Returns the error of the current parameters over all training pairs.
    pub fn error(&self) -> f64 {
        self.error_on(self.pairs)
    }

    /// Returns the error of the current parameters over `pairs`.
    pub fn error_on(&self, pairs: &[Pair]) -> f64 {
        evaluate::sanitize(self.evaluator.evaluate(&*self.method, pairs))
    }

    /// Decodes `params` into the model and returns their error over all training pairs.
    pub fn error_at(&mut self, params: &[f64]) -> f64 {
        self.set_params(params);
        self.error()
    }

    /// Returns whether a model's analytic gradient is a gradient of this problem's error.
    pub fn is_mean_squared(&self) -> bool {
        self.evaluator.is_mean_squared()
    }

    /// Returns whether the trainer was asked to stop as soon as possible.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Returns an [`Error::EmptyModel`] if `method` has nothing to train.
pub(crate) fn check_not_empty(method: &dyn Method) -> Result<usize, Error> {
    match method.encoded_len() {
        0 => Err(Error::EmptyModel),
        n => Ok(n),
    }
}

/// Returns `-1`, `0` or `1`, treating values within a small tolerance of zero as zero.
pub(crate) fn sign(value: f64) -> f64 {
    const ZERO_TOLERANCE: f64 = 1.0e-17;

    if value.abs() < ZERO_TOLERANCE {
        0.0
    } else if value > 0.0 {
        1.0
    } else {
        -1.0
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::evaluate::DatasetError;
    use crate::model::LinearModel;

    /// Returns pairs sampled from `y = 2x - 1`.
    pub fn line_data() -> Dataset {
        let inputs: Vec<[f64; 1]> = (0..8).map(|i| [i as f64 / 4.0 - 1.0]).collect();
        let ideals: Vec<[f64; 1]> = inputs.iter().map(|x| [2.0 * x[0] - 1.0]).collect();
        Dataset::from_slices(&inputs, &ideals).unwrap()
    }

    #[test]
    fn test_problem_error_at() {
        let mut model = LinearModel::new(1, 1);
        let data = line_data();
        let evaluator = DatasetError::default();
        let cancel = CancelToken::new();
        let mut problem = Problem::new(&mut model, &data, &evaluator, &cancel);

        assert_eq!(2, problem.param_count());
        assert_eq!(0.0, problem.error_at(&[2.0, -1.0]));
        assert!(problem.error_at(&[0.0, 0.0]) > 0.0);

        let mut params = [1.0; 2];
        problem.params(&mut params);
        assert_eq!([0.0, 0.0], params);
        assert!(!problem.is_cancelled());
    }

    #[test]
    fn test_sign() {
        assert_eq!(1.0, sign(0.5));
        assert_eq!(-1.0, sign(-0.5));
        assert_eq!(0.0, sign(1.0e-20));
        assert_eq!(0.0, sign(0.0));
    }
}
