use log::debug;

use super::{relative_change, Strategy};
use crate::error::{Capability, Error};
use crate::train::TrainingState;

/// Adjusts the learning rate of the trainer's algorithm as training goes.
///
/// The rate starts at `1 / training size` and shrinks by 1% whenever an iteration raises the
/// error. Requires an algorithm with a [`LearningRate`][crate::train::LearningRate].
#[derive(Clone, Debug, Default)]
pub struct SmartLearningRate {
    last_error: Option<f64>,
    rate: f64,
}

const LEARNING_DECAY: f64 = 0.99;

impl SmartLearningRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the learning rate last applied.
    pub fn learning_rate(&self) -> f64 {
        self.rate
    }
}

impl Strategy for SmartLearningRate {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        let rate = 1.0 / state.pairs().len() as f64;
        match state.algorithm_mut().as_learning_rate() {
            Some(algorithm) => algorithm.set_learning_rate(rate),
            None => {
                return Err(Error::MissingCapability {
                    capability: Capability::LearningRate,
                    required_by: "smart learning rate",
                })
            }
        }

        self.rate = rate;
        self.last_error = None;
        Ok(())
    }

    fn pre_iteration(&mut self, state: &mut TrainingState<'_>) {
        self.last_error = state.error();
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        let rose = matches!(
            (self.last_error, state.error()),
            (Some(last), Some(current)) if current > last
        );
        if !rose {
            return;
        }

        if let Some(algorithm) = state.algorithm_mut().as_learning_rate() {
            self.rate *= LEARNING_DECAY;
            algorithm.set_learning_rate(self.rate);
            debug!("smart learning rate lowered to {}", self.rate);
        }
    }
}

const MIN_IMPROVEMENT: f64 = 0.0001;
const START_MOMENTUM: f64 = 0.1;
const MOMENTUM_INCREASE: f64 = 0.01;
const MOMENTUM_CYCLES: usize = 10;
const MAX_MOMENTUM: f64 = 4.0;

/// Adds momentum to the trainer's algorithm while training stagnates.
///
/// After more than 10 iterations that raise the error or improve it by less than 0.01%, the
/// momentum grows by 1% (starting from 0.1 when it is zero), up to 4. Any real improvement drops
/// the momentum back to zero. Requires an algorithm with a [`Momentum`][crate::train::Momentum].
#[derive(Clone, Debug, Default)]
pub struct SmartMomentum {
    last_error: Option<f64>,
    stagnant_cycles: usize,
    ready: bool,
}

impl SmartMomentum {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for SmartMomentum {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        if state.algorithm_mut().as_momentum().is_none() {
            return Err(Error::MissingCapability {
                capability: Capability::Momentum,
                required_by: "smart momentum",
            });
        }

        *self = Self::default();
        Ok(())
    }

    fn pre_iteration(&mut self, state: &mut TrainingState<'_>) {
        self.last_error = state.error();
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        if !self.ready {
            self.ready = true;
            return;
        }

        let improvement = match relative_change(self.last_error, state.error()) {
            Some(improvement) => improvement,
            None => return,
        };
        let algorithm = match state.algorithm_mut().as_momentum() {
            Some(algorithm) => algorithm,
            None => return,
        };

        if improvement > 0.0 || improvement.abs() < MIN_IMPROVEMENT {
            self.stagnant_cycles += 1;
            if self.stagnant_cycles > MOMENTUM_CYCLES {
                self.stagnant_cycles = 0;

                let mut momentum = algorithm.momentum();
                if momentum == 0.0 {
                    momentum = START_MOMENTUM;
                }
                momentum = (momentum * (1.0 + MOMENTUM_INCREASE)).min(MAX_MOMENTUM);
                algorithm.set_momentum(momentum);
                debug!("smart momentum raised to {}", momentum);
            }
        } else {
            algorithm.set_momentum(0.0);
        }
    }
}
