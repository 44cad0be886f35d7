use super::Strategy;
use crate::error::Error;
use crate::train::TrainingState;

/// Ends training after a fixed number of iterations.
#[derive(Clone, Debug)]
pub struct EndIterationsStrategy {
    max_iterations: usize,
    done: bool,
}

impl EndIterationsStrategy {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            done: false,
        }
    }
}

impl Strategy for EndIterationsStrategy {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        self.done = state.iteration() >= self.max_iterations;
        Ok(())
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        self.done = state.iteration() >= self.max_iterations;
    }

    fn should_stop(&self) -> bool {
        self.done
    }
}

/// Ends training once the error reaches a target.
#[derive(Clone, Debug)]
pub struct EndMaxErrorStrategy {
    max_error: f64,
    done: bool,
}

impl EndMaxErrorStrategy {
    pub fn new(max_error: f64) -> Self {
        Self {
            max_error,
            done: false,
        }
    }
}

impl Strategy for EndMaxErrorStrategy {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        self.done = false;
        self.post_iteration(state);
        Ok(())
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        self.done = matches!(state.error(), Some(error) if error <= self.max_error);
    }

    fn should_stop(&self) -> bool {
        self.done
    }
}
