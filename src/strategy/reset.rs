use log::info;
use rand::prelude::*;

use super::{require_resettable, reset_method, Strategy};
use crate::error::Error;
use crate::train::TrainingState;

/// Resets the model to random parameters when the error stays above a threshold for too long.
///
/// Requires a [`Resettable`][crate::Resettable] model.
#[derive(Clone, Debug)]
pub struct ResetStrategy {
    required: f64,
    cycles: usize,
    bad_cycles: usize,
    resets: usize,
    rng: StdRng,
}

impl ResetStrategy {
    /// Returns a new `ResetStrategy` that resets the model after more than `cycles` consecutive
    /// iterations with an error above `required`.
    pub fn new(required: f64, cycles: usize) -> Self {
        Self::with_rng(required, cycles, StdRng::from_entropy())
    }

    /// Same as [`new`][Self::new], with a seeded random number generator for the resets.
    pub fn with_seed(required: f64, cycles: usize, seed: u64) -> Self {
        Self::with_rng(required, cycles, StdRng::seed_from_u64(seed))
    }

    fn with_rng(required: f64, cycles: usize, rng: StdRng) -> Self {
        Self {
            required,
            cycles,
            bad_cycles: 0,
            resets: 0,
            rng,
        }
    }

    /// Returns the number of consecutive iterations above the threshold so far.
    pub fn bad_cycles(&self) -> usize {
        self.bad_cycles
    }

    /// Returns the number of resets so far.
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl Strategy for ResetStrategy {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        require_resettable(state, "reset strategy")?;
        self.bad_cycles = 0;
        self.resets = 0;
        Ok(())
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        let error = match state.error() {
            Some(error) => error,
            None => return,
        };

        if error <= self.required {
            self.bad_cycles = 0;
            return;
        }

        self.bad_cycles += 1;
        if self.bad_cycles > self.cycles {
            info!(
                "reset strategy resetting the model after {} iterations above {}: error={}",
                self.bad_cycles, self.required, error
            );
            reset_method(state, &mut self.rng);
            self.bad_cycles = 0;
            self.resets += 1;
        }
    }
}
