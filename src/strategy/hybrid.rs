use log::info;

use super::{relative_change, Strategy};
use crate::error::Error;
use crate::evaluate;
use crate::train::{Algorithm, TrainingState};

/// Escapes stagnation by running a few iterations of a second algorithm on the same model.
///
/// An iteration stagnates when its relative improvement `(current - last) / last` is positive
/// (the error rose) or smaller in magnitude than `min_improvement`. After more than
/// `tolerate_cycles` stagnant iterations the alternate algorithm runs `alternate_cycles`
/// iterations, the stagnation counter restarts from zero, and training resumes with the
/// trainer's own algorithm.
pub struct HybridStrategy {
    alternate: Box<dyn Algorithm>,
    min_improvement: f64,
    tolerate_cycles: usize,
    alternate_cycles: usize,
    last_error: Option<f64>,
    stagnant_cycles: usize,
}

impl HybridStrategy {
    /// Returns a new `HybridStrategy` with a minimum improvement of `0.00001`, tolerating 10
    /// stagnant iterations and running 5 alternate iterations.
    pub fn new<A: Algorithm + 'static>(alternate: A) -> Self {
        Self::from_boxed(Box::new(alternate), 0.00001, 10, 5)
    }

    pub fn with_settings<A: Algorithm + 'static>(
        alternate: A,
        min_improvement: f64,
        tolerate_cycles: usize,
        alternate_cycles: usize,
    ) -> Self {
        Self::from_boxed(
            Box::new(alternate),
            min_improvement,
            tolerate_cycles,
            alternate_cycles,
        )
    }

    pub fn from_boxed(
        alternate: Box<dyn Algorithm>,
        min_improvement: f64,
        tolerate_cycles: usize,
        alternate_cycles: usize,
    ) -> Self {
        Self {
            alternate,
            min_improvement,
            tolerate_cycles,
            alternate_cycles,
            last_error: None,
            stagnant_cycles: 0,
        }
    }

    /// Returns the alternate algorithm.
    pub fn alternate(&self) -> &dyn Algorithm {
        &*self.alternate
    }
}

impl Strategy for HybridStrategy {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        self.alternate.bind(state.method())?;
        self.last_error = None;
        self.stagnant_cycles = 0;
        Ok(())
    }

    fn pre_iteration(&mut self, state: &mut TrainingState<'_>) {
        self.last_error = state.error();
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        // Nothing to compare with before the trainer's first iteration
        let improvement = match relative_change(self.last_error, state.error()) {
            Some(improvement) => improvement,
            None => return,
        };
        if improvement <= 0.0 && improvement.abs() >= self.min_improvement {
            return;
        }

        self.stagnant_cycles += 1;
        if self.stagnant_cycles <= self.tolerate_cycles {
            return;
        }
        self.stagnant_cycles = 0;

        info!(
            "hybrid strategy switching to {} for {} iterations: error={:?}",
            self.alternate.name(),
            self.alternate_cycles,
            state.error()
        );

        let mut error = None;
        for _ in 0..self.alternate_cycles {
            error = Some(evaluate::sanitize(
                self.alternate.iteration(state.problem_mut()),
            ));
        }
        if let Some(error) = error {
            state.set_error(error);
        }
        state.algorithm_mut().restart();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{DatasetError, ErrorEvaluator};
    use crate::strategy::tests::{Dial, Scripted};
    use crate::train::tests::line_data;
    use crate::train::{NelderMead, NelderMeadConfig};
    use crate::Trainer;

    #[test]
    fn test_alternate_runs_exactly_alternate_cycles() {
        // The primary never improves
        let mut trainer =
            Trainer::new(Dial::new(false), line_data(), Scripted::errors(&[1.0])).unwrap();

        let alternate = Scripted::errors(&[0.5]);
        let calls = alternate.iterations.clone();
        trainer
            .add_strategy(HybridStrategy::with_settings(alternate, 0.01, 3, 5))
            .unwrap();

        // The first iteration has nothing to compare with; iterations 2 to 4 are tolerated
        for _ in 0..4 {
            trainer.iteration();
        }
        assert_eq!(0, calls.get());

        trainer.iteration();
        assert_eq!(5, calls.get());
        assert_eq!(Some(0.5), trainer.error());
        assert_eq!(0.5, trainer.method().value);

        // The counter starts over after a switch
        for _ in 0..3 {
            trainer.iteration();
        }
        assert_eq!(5, calls.get());
        trainer.iteration();
        assert_eq!(10, calls.get());
    }

    #[test]
    fn test_attached_mid_training() {
        let mut trainer =
            Trainer::new(Dial::new(false), line_data(), Scripted::errors(&[1.0])).unwrap();
        for _ in 0..2 {
            trainer.iteration();
        }

        let alternate = Scripted::errors(&[0.5]);
        let calls = alternate.iterations.clone();
        trainer
            .add_strategy(HybridStrategy::with_settings(alternate, 0.01, 3, 5))
            .unwrap();

        // The trainer already has an error, so the first iteration counts
        for _ in 0..3 {
            trainer.iteration();
        }
        assert_eq!(0, calls.get());
        trainer.iteration();
        assert_eq!(5, calls.get());
    }

    #[test]
    fn test_improving_primary_keeps_running() {
        let errors: Vec<f64> = (0..20).map(|i| 1.0 / (i + 1) as f64).collect();
        let mut trainer =
            Trainer::new(Dial::new(false), line_data(), Scripted::errors(&errors)).unwrap();

        let alternate = Scripted::errors(&[0.5]);
        let calls = alternate.iterations.clone();
        trainer
            .add_strategy(HybridStrategy::with_settings(alternate, 0.01, 3, 5))
            .unwrap();

        for _ in 0..20 {
            trainer.iteration();
        }
        assert_eq!(0, calls.get());
    }

    #[test]
    fn test_alternate_bound_at_init() {
        let mut trainer =
            Trainer::new(Dial::new(false), line_data(), Scripted::errors(&[1.0])).unwrap();
        let nm = NelderMead::new(NelderMeadConfig::default()).unwrap();
        trainer.add_strategy(HybridStrategy::new(nm)).unwrap();

        // The first switch happens on the 12th iteration
        for _ in 0..11 {
            trainer.iteration();
        }
        assert_eq!(1.0, trainer.method().value);
        trainer.iteration();

        // Nelder-Mead moved the constant output to the mean of the ideals
        assert!((trainer.method().value + 1.25).abs() < 1e-2);
        let error = DatasetError::default().evaluate(trainer.method(), trainer.data());
        assert_eq!(Some(error), trainer.error());
    }
}
