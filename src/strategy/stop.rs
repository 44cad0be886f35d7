use log::info;

use super::Strategy;
use crate::error::Error;
use crate::train::TrainingState;

/// Ends training once the error stops improving.
///
/// An iteration that fails to improve on the best error so far by at least `min_improvement` is
/// bad. After more than `tolerate_cycles` consecutive bad iterations,
/// [`should_stop`][Strategy::should_stop] returns `true`. Never changes the model.
#[derive(Clone, Debug)]
pub struct StopTrainingStrategy {
    min_improvement: f64,
    tolerate_cycles: usize,
    best_error: Option<f64>,
    bad_cycles: usize,
    stop: bool,
}

impl Default for StopTrainingStrategy {
    fn default() -> Self {
        Self::new(0.0000001, 100)
    }
}

impl StopTrainingStrategy {
    pub fn new(min_improvement: f64, tolerate_cycles: usize) -> Self {
        Self {
            min_improvement,
            tolerate_cycles,
            best_error: None,
            bad_cycles: 0,
            stop: false,
        }
    }
}

impl Strategy for StopTrainingStrategy {
    fn init(&mut self, _state: &mut TrainingState<'_>) -> Result<(), Error> {
        self.best_error = None;
        self.bad_cycles = 0;
        self.stop = false;
        Ok(())
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        let error = match state.error() {
            Some(error) => error,
            None => return,
        };

        let best = match self.best_error {
            Some(best) => best,
            None => {
                self.best_error = Some(error);
                return;
            }
        };

        if best - error < self.min_improvement {
            self.bad_cycles += 1;
            if self.bad_cycles > self.tolerate_cycles && !self.stop {
                info!(
                    "stop strategy ending training after {} iterations without improvement: best={}",
                    self.bad_cycles, best
                );
                self.stop = true;
            }
        } else {
            self.bad_cycles = 0;
        }

        self.best_error = Some(best.min(error));
    }

    fn should_stop(&self) -> bool {
        self.stop
    }
}
