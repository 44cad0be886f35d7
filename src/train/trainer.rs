//! The trainer: one model, one dataset, one algorithm and any number of strategies.

use log::{debug, trace};

use super::{check_not_empty, Algorithm, Problem};
use crate::cancel::CancelToken;
use crate::data::{Dataset, Pair};
use crate::error::Error;
use crate::evaluate::{self, DatasetError, ErrorEvaluator};
use crate::method::Method;
use crate::strategy::Strategy;

/// Binds an [`Algorithm`] to a model and its training data, and runs it one iteration at a time
/// with the attached [`Strategy`]s observing every iteration.
///
/// # Examples
///
/// ```
/// use trainkit::model::LinearModel;
/// use trainkit::strategy::Greedy;
/// use trainkit::train::{ResilientConfig, ResilientPropagation};
/// use trainkit::{Dataset, Trainer};
///
/// let data = Dataset::from_slices(&[[0.0], [1.0], [2.0]], &[[1.0], [3.0], [5.0]]).unwrap();
/// let rprop = ResilientPropagation::resilient(ResilientConfig::default()).unwrap();
///
/// let mut trainer = Trainer::new(LinearModel::new(1, 1), data, rprop).unwrap();
/// trainer.add_strategy(Greedy::new()).unwrap();
///
/// for _ in 0..200 {
///     trainer.iteration();
/// }
/// assert!(trainer.error().unwrap() < 1e-6);
/// ```
pub struct Trainer<M> {
    method: M,
    data: Dataset,
    evaluator: Box<dyn ErrorEvaluator>,
    algorithm: Box<dyn Algorithm>,
    strategies: Vec<Box<dyn Strategy>>,
    // `None` until the first iteration
    error: Option<f64>,
    iteration: usize,
    cancel: CancelToken,
}

impl<M: Method + 'static> Trainer<M> {
    /// Returns a new `Trainer` that uses the mean squared error.
    ///
    /// Fails if the model has no parameters, the dataset is empty or does not match the model's
    /// input and output sizes, or the algorithm cannot train this model.
    pub fn new<A: Algorithm + 'static>(method: M, data: Dataset, algorithm: A) -> Result<Self, Error> {
        Self::from_boxed(method, data, Box::new(algorithm))
    }

    /// Same as [`new`][Self::new], for an already boxed algorithm.
    pub fn from_boxed(
        method: M,
        data: Dataset,
        mut algorithm: Box<dyn Algorithm>,
    ) -> Result<Self, Error> {
        check_not_empty(&method)?;
        check_shape(&method, &data)?;
        algorithm.bind(&method)?;

        debug!(
            "bound {} to a model with {} parameters and {} training pairs",
            algorithm.name(),
            method.encoded_len(),
            data.len()
        );

        Ok(Self {
            method,
            data,
            evaluator: Box::new(DatasetError::default()),
            algorithm,
            strategies: Vec::new(),
            error: None,
            iteration: 0,
            cancel: CancelToken::new(),
        })
    }

    /// Replaces the error evaluator.
    pub fn with_evaluator<E: ErrorEvaluator + 'static>(mut self, evaluator: E) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Initializes `strategy` against this trainer and attaches it. Strategies run in the order
    /// they are attached.
    pub fn add_strategy<S: Strategy + 'static>(&mut self, strategy: S) -> Result<(), Error> {
        self.add_boxed_strategy(Box::new(strategy))
    }

    /// Same as [`add_strategy`][Self::add_strategy], for an already boxed strategy.
    pub fn add_boxed_strategy(&mut self, mut strategy: Box<dyn Strategy>) -> Result<(), Error> {
        {
            let mut state = TrainingState::new(
                Problem::new(&mut self.method, &self.data, &*self.evaluator, &self.cancel),
                &mut *self.algorithm,
                &mut self.error,
                self.iteration,
            );
            strategy.init(&mut state)?;
        }

        self.strategies.push(strategy);
        Ok(())
    }

    /// Runs one training cycle: every strategy's `pre_iteration`, one algorithm iteration, then
    /// every strategy's `post_iteration`. Returns the resulting error.
    pub fn iteration(&mut self) -> f64 {
        let Self {
            method,
            data,
            evaluator,
            algorithm,
            strategies,
            error,
            iteration,
            cancel,
        } = self;

        for strategy in strategies.iter_mut() {
            let mut state = TrainingState::new(
                Problem::new(&mut *method, &**data, &**evaluator, &*cancel),
                &mut **algorithm,
                &mut *error,
                *iteration,
            );
            strategy.pre_iteration(&mut state);
        }

        let new_error = {
            let mut problem = Problem::new(&mut *method, &**data, &**evaluator, &*cancel);
            evaluate::sanitize(algorithm.iteration(&mut problem))
        };
        *error = Some(new_error);
        *iteration += 1;

        trace!("iteration {}: error={}", iteration, new_error);

        for strategy in strategies.iter_mut() {
            let mut state = TrainingState::new(
                Problem::new(&mut *method, &**data, &**evaluator, &*cancel),
                &mut **algorithm,
                &mut *error,
                *iteration,
            );
            strategy.post_iteration(&mut state);
        }

        error.unwrap_or(new_error)
    }

    /// Runs iterations until a strategy asks to stop, the algorithm cannot continue, the trainer
    /// is cancelled, or `max_iterations` iterations have run.
    pub fn train(&mut self, max_iterations: usize) -> TrainingSummary {
        let start = self.iteration;

        let reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if self.should_stop() {
                break StopReason::Strategy;
            }
            if !self.can_continue() {
                break StopReason::Converged;
            }
            if self.iteration - start >= max_iterations {
                break StopReason::IterationLimit;
            }

            self.iteration();
        };

        debug!(
            "training stopped after {} iterations ({:?}), error={:?}",
            self.iteration - start,
            reason,
            self.error
        );

        TrainingSummary {
            iterations: self.iteration - start,
            error: self.error,
            reason,
        }
    }
}

impl<M> Trainer<M> {
    /// Returns the error after the last iteration, or `None` before the first one.
    pub fn error(&self) -> Option<f64> {
        self.error
    }

    /// Overrides the current error.
    pub fn set_error(&mut self, error: f64) {
        self.error = Some(error);
    }

    /// Returns the model being trained.
    pub fn method(&self) -> &M {
        &self.method
    }

    /// Returns the model being trained.
    pub fn method_mut(&mut self) -> &mut M {
        &mut self.method
    }

    /// Consumes the trainer and returns the trained model.
    pub fn into_method(self) -> M {
        self.method
    }

    /// Returns the training data.
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Returns the number of iterations run so far.
    pub fn iteration_count(&self) -> usize {
        self.iteration
    }

    /// Returns the algorithm.
    pub fn algorithm(&self) -> &dyn Algorithm {
        &*self.algorithm
    }

    /// Returns `false` once the algorithm has converged or otherwise cannot make progress.
    pub fn can_continue(&self) -> bool {
        self.algorithm.can_continue()
    }

    /// Returns `true` if any attached strategy asks for training to stop.
    pub fn should_stop(&self) -> bool {
        self.strategies.iter().any(|s| s.should_stop())
    }

    /// Returns a handle that can cancel long-running iterations of this trainer.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

fn check_shape(method: &dyn Method, data: &Dataset) -> Result<(), Error> {
    let (input_size, ideal_size) = match (data.input_size(), data.ideal_size()) {
        (Some(input), Some(ideal)) => (input, ideal),
        _ => return Err(Error::EmptyDataset),
    };

    if input_size != method.input_count() {
        return Err(Error::ShapeMismatch {
            what: "input",
            expected: method.input_count(),
            actual: input_size,
        });
    }
    if ideal_size != method.output_count() {
        return Err(Error::ShapeMismatch {
            what: "ideal",
            expected: method.output_count(),
            actual: ideal_size,
        });
    }

    Ok(())
}

/// Why [`Trainer::train`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The iteration budget was used up.
    IterationLimit,
    /// A strategy asked to stop.
    Strategy,
    /// The algorithm reached a terminal state.
    Converged,
    /// The trainer was cancelled through its [`CancelToken`].
    Cancelled,
}

/// The outcome of [`Trainer::train`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingSummary {
    /// The number of iterations run by this call.
    pub iterations: usize,
    /// The final error, `None` if no iteration ever ran.
    pub error: Option<f64>,
    pub reason: StopReason,
}

/// The view of a trainer given to a [`Strategy`].
pub struct TrainingState<'a> {
    problem: Problem<'a>,
    algorithm: &'a mut dyn Algorithm,
    error: &'a mut Option<f64>,
    iteration: usize,
}

impl<'a> TrainingState<'a> {
    pub fn new(
        problem: Problem<'a>,
        algorithm: &'a mut dyn Algorithm,
        error: &'a mut Option<f64>,
        iteration: usize,
    ) -> Self {
        Self {
            problem,
            algorithm,
            error,
            iteration,
        }
    }

    /// Returns the trainer's current error, `None` before the first iteration.
    pub fn error(&self) -> Option<f64> {
        *self.error
    }

    /// Overrides the trainer's current error.
    pub fn set_error(&mut self, error: f64) {
        *self.error = Some(error);
    }

    /// Returns the number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn method(&self) -> &dyn Method {
        self.problem.method()
    }

    pub fn method_mut(&mut self) -> &mut dyn Method {
        self.problem.method_mut()
    }

    /// Returns the training pairs.
    pub fn pairs(&self) -> &[Pair] {
        self.problem.pairs()
    }

    /// Returns the error of the current parameters over `pairs`, using the trainer's evaluator.
    pub fn evaluate(&self, pairs: &[Pair]) -> f64 {
        self.problem.error_on(pairs)
    }

    /// Returns the problem the trainer's algorithm works on, for running another algorithm on
    /// the same model.
    pub fn problem_mut(&mut self) -> &mut Problem<'a> {
        &mut self.problem
    }

    /// Returns the trainer's algorithm.
    pub fn algorithm(&self) -> &dyn Algorithm {
        &*self.algorithm
    }

    /// Returns the trainer's algorithm.
    pub fn algorithm_mut(&mut self) -> &mut dyn Algorithm {
        &mut *self.algorithm
    }
}
