use log::info;
use rand::prelude::*;

use super::{require_resettable, reset_method, Strategy};
use crate::error::Error;
use crate::train::TrainingState;

/// Resets the model to random parameters when training stops improving fast enough.
///
/// An iteration is bad when it improves on the best error so far by less than `required`. After
/// more than `cycles` consecutive bad iterations the model is reset. Nothing is counted while
/// the error is below `acceptable`. Requires a [`Resettable`][crate::Resettable] model.
#[derive(Clone, Debug)]
pub struct RequiredImprovementStrategy {
    required: f64,
    acceptable: f64,
    cycles: usize,
    best_error: Option<f64>,
    bad_cycles: usize,
    rng: StdRng,
}

impl RequiredImprovementStrategy {
    pub fn new(required: f64, acceptable: f64, cycles: usize) -> Self {
        Self::with_rng(required, acceptable, cycles, StdRng::from_entropy())
    }

    /// Same as [`new`][Self::new], with a seeded random number generator for the resets.
    pub fn with_seed(required: f64, acceptable: f64, cycles: usize, seed: u64) -> Self {
        Self::with_rng(required, acceptable, cycles, StdRng::seed_from_u64(seed))
    }

    fn with_rng(required: f64, acceptable: f64, cycles: usize, rng: StdRng) -> Self {
        Self {
            required,
            acceptable,
            cycles,
            best_error: None,
            bad_cycles: 0,
            rng,
        }
    }

    pub fn bad_cycles(&self) -> usize {
        self.bad_cycles
    }
}

impl Strategy for RequiredImprovementStrategy {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        require_resettable(state, "required improvement strategy")?;
        self.best_error = None;
        self.bad_cycles = 0;
        Ok(())
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        let error = match state.error() {
            Some(error) => error,
            None => return,
        };

        if error >= self.acceptable {
            if let Some(best) = self.best_error {
                if best - error < self.required {
                    self.bad_cycles += 1;

                    if self.bad_cycles > self.cycles {
                        info!(
                            "required improvement strategy resetting the model: error={} best={}",
                            error, best
                        );
                        reset_method(state, &mut self.rng);
                        self.bad_cycles = 0;
                        self.best_error = None;
                        return;
                    }
                } else {
                    self.bad_cycles = 0;
                }
            }
        }

        self.best_error = Some(self.best_error.map_or(error, |best| best.min(error)));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::strategy::tests::{Dial, Scripted};
    use crate::train::tests::line_data;
    use crate::Trainer;

    fn trainer(
        errors: &[f64],
        strategy: RequiredImprovementStrategy,
    ) -> (Trainer<Dial>, Rc<Cell<usize>>) {
        let dial = Dial::new(true);
        let resets = dial.resets.clone();
        let mut trainer = Trainer::new(dial, line_data(), Scripted::errors(errors)).unwrap();
        trainer.add_strategy(strategy).unwrap();
        (trainer, resets)
    }

    #[test]
    fn test_resets_on_stagnation() {
        // Improvements of 0.01 are below the required 0.1
        let errors: Vec<f64> = (0..10).map(|i| 1.0 - 0.01 * i as f64).collect();
        let (mut trainer, resets) =
            trainer(&errors, RequiredImprovementStrategy::with_seed(0.1, 0.0, 3, 2));

        // The first iteration sets the baseline, the next four are bad
        for _ in 0..4 {
            trainer.iteration();
        }
        assert_eq!(0, resets.get());
        trainer.iteration();
        assert_eq!(1, resets.get());
    }

    #[test]
    fn test_sufficient_improvement() {
        let errors: Vec<f64> = (0..10).map(|i| 1.0 - 0.1 * i as f64).collect();
        let (mut trainer, resets) =
            trainer(&errors, RequiredImprovementStrategy::with_seed(0.05, 0.0, 2, 2));

        for _ in 0..10 {
            trainer.iteration();
        }
        assert_eq!(0, resets.get());
    }

    #[test]
    fn test_skipped_below_acceptable() {
        let (mut trainer, resets) =
            trainer(&[0.01], RequiredImprovementStrategy::with_seed(0.1, 0.05, 1, 2));

        for _ in 0..10 {
            trainer.iteration();
        }
        assert_eq!(0, resets.get());
    }

    #[test]
    fn test_requires_resettable() {
        let mut trainer =
            Trainer::new(Dial::new(false), line_data(), Scripted::errors(&[1.0])).unwrap();
        let result = trainer.add_strategy(RequiredImprovementStrategy::new(0.1, 0.0, 3));
        assert!(result.is_err());
    }
}
