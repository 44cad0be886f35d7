//! Strategies: observers attached to a [`Trainer`][crate::Trainer] that run before and after
//! every iteration and may change the model, the error or the algorithm.

mod early_stopping;
mod end;
mod greedy;
mod hybrid;
mod required_improvement;
mod reset;
mod smart;
mod stop;

pub use early_stopping::EarlyStoppingStrategy;
pub use end::{EndIterationsStrategy, EndMaxErrorStrategy};
pub use greedy::Greedy;
pub use hybrid::HybridStrategy;
pub use required_improvement::RequiredImprovementStrategy;
pub use reset::ResetStrategy;
pub use smart::{SmartLearningRate, SmartMomentum};
pub use stop::StopTrainingStrategy;

use rand::RngCore;

use crate::error::{Capability, Error};
use crate::train::TrainingState;

/// An add-on to a trainer's iteration loop.
///
/// For every iteration the trainer calls [`pre_iteration`][Self::pre_iteration] on every
/// strategy, runs its algorithm once, then calls [`post_iteration`][Self::post_iteration] on every
/// strategy. Strategies run in the order they were attached.
pub trait Strategy {
    /// Binds the strategy to a trainer, discarding any state from a previous binding.
    ///
    /// Must fail with [`Error::MissingCapability`] if the trainer's model or algorithm lacks
    /// something the strategy needs.
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error>;

    fn pre_iteration(&mut self, _state: &mut TrainingState<'_>) {}

    fn post_iteration(&mut self, _state: &mut TrainingState<'_>) {}

    /// Returns `true` once the strategy decided that training should end.
    fn should_stop(&self) -> bool {
        false
    }
}

fn require_resettable(
    state: &mut TrainingState<'_>,
    required_by: &'static str,
) -> Result<(), Error> {
    match state.method_mut().as_resettable() {
        Some(_) => Ok(()),
        None => Err(Error::MissingCapability {
            capability: Capability::Resettable,
            required_by,
        }),
    }
}

/// Reinitializes the model, restarts the algorithm and recomputes the error.
fn reset_method(state: &mut TrainingState<'_>, rng: &mut dyn RngCore) {
    if let Some(resettable) = state.method_mut().as_resettable() {
        resettable.reset(rng);
    }
    state.algorithm_mut().restart();

    let error = state.evaluate(state.pairs());
    state.set_error(error);
}

/// Returns `(current - last) / last`, or `None` if there is nothing to compare.
fn relative_change(last: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (last, current) {
        (Some(last), Some(current)) if last != 0.0 => Some((current - last) / last),
        _ => None,
    }
}
