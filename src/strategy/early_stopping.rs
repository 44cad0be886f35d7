use log::{debug, info};

use super::Strategy;
use crate::data::Dataset;
use crate::error::Error;
use crate::train::TrainingState;

/// Ends training when the error on a held-out validation set starts to rise, following
/// Prechelt's early stopping criteria.
///
/// Training iterations are grouped into strips of `strip_length`. At the end of each strip the
/// validation error `v` is computed and two quantities are checked:
///
/// - the generalization loss `gl = 100 * (v / e_opt - 1)`, where `e_opt` is the lowest
///   validation error seen so far. Training stops when it exceeds `alpha`.
/// - the training progress `1000 * (sum / (k * min) - 1)` of the training errors in the strip,
///   which measures how much the training error still moves. Training stops when it falls below
///   `min_efficiency`.
#[derive(Clone, Debug)]
pub struct EarlyStoppingStrategy {
    validation: Dataset,
    strip_length: usize,
    alpha: f64,
    min_efficiency: f64,
    strip_sum: f64,
    strip_min: f64,
    strip_count: usize,
    validation_error: Option<f64>,
    optimal_error: f64,
    generalization_loss: f64,
    progress: f64,
    stop: bool,
}

impl EarlyStoppingStrategy {
    /// Returns a new `EarlyStoppingStrategy` with a strip length of 5, an `alpha` of 5 and a
    /// minimum efficiency of 0.1.
    pub fn new(validation: Dataset) -> Self {
        Self::with_settings(validation, 5, 5.0, 0.1)
    }

    pub fn with_settings(
        validation: Dataset,
        strip_length: usize,
        alpha: f64,
        min_efficiency: f64,
    ) -> Self {
        Self {
            validation,
            strip_length,
            alpha,
            min_efficiency,
            strip_sum: 0.0,
            strip_min: f64::INFINITY,
            strip_count: 0,
            validation_error: None,
            optimal_error: f64::INFINITY,
            generalization_loss: 0.0,
            progress: f64::INFINITY,
            stop: false,
        }
    }

    /// Returns the validation error at the end of the last strip.
    pub fn validation_error(&self) -> Option<f64> {
        self.validation_error
    }

    /// Returns the lowest validation error so far.
    pub fn optimal_error(&self) -> f64 {
        self.optimal_error
    }

    pub fn generalization_loss(&self) -> f64 {
        self.generalization_loss
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    fn end_strip(&mut self, validation_error: f64) {
        self.validation_error = Some(validation_error);
        self.optimal_error = self.optimal_error.min(validation_error);

        self.generalization_loss = if self.optimal_error > 0.0 {
            100.0 * (validation_error / self.optimal_error - 1.0)
        } else if validation_error > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let k = self.strip_count as f64;
        self.progress = if self.strip_min > 0.0 {
            1000.0 * (self.strip_sum / (k * self.strip_min) - 1.0)
        } else if self.strip_sum > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        self.strip_sum = 0.0;
        self.strip_min = f64::INFINITY;
        self.strip_count = 0;
    }
}

impl Strategy for EarlyStoppingStrategy {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        if self.strip_length == 0 {
            return Err(Error::InvalidParameter {
                name: "strip_length",
                reason: "must be at least 1",
            });
        }

        let method = state.method();
        match (self.validation.input_size(), self.validation.ideal_size()) {
            (Some(input), Some(ideal)) => {
                if input != method.input_count() {
                    return Err(Error::ShapeMismatch {
                        what: "validation input",
                        expected: method.input_count(),
                        actual: input,
                    });
                }
                if ideal != method.output_count() {
                    return Err(Error::ShapeMismatch {
                        what: "validation ideal",
                        expected: method.output_count(),
                        actual: ideal,
                    });
                }
            }
            _ => return Err(Error::EmptyDataset),
        }

        *self = Self::with_settings(
            std::mem::take(&mut self.validation),
            self.strip_length,
            self.alpha,
            self.min_efficiency,
        );
        Ok(())
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        let training_error = match state.error() {
            Some(error) => error,
            None => return,
        };

        self.strip_sum += training_error;
        self.strip_min = self.strip_min.min(training_error);
        self.strip_count += 1;

        if state.iteration() % self.strip_length != 0 {
            return;
        }

        let validation_error = state.evaluate(&self.validation);
        self.end_strip(validation_error);

        debug!(
            "early stopping strip ended at iteration {}: validation={} gl={} progress={}",
            state.iteration(),
            validation_error,
            self.generalization_loss,
            self.progress
        );

        if self.generalization_loss > self.alpha || self.progress < self.min_efficiency {
            info!(
                "early stopping at iteration {}: gl={} progress={}",
                state.iteration(),
                self.generalization_loss,
                self.progress
            );
            self.stop = true;
        }
    }

    fn should_stop(&self) -> bool {
        self.stop
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::strategy::tests::{Dial, Scripted};
    use crate::train::tests::line_data;
    use crate::train::StopReason;
    use crate::Trainer;

    // The dial outputs its parameter, so the validation error against an ideal of zero is the
    // square of the parameter
    fn validation() -> Dataset {
        Dataset::from_slices(&[[0.0]], &[[0.0]]).unwrap()
    }

    #[test]
    fn test_stops_on_rising_validation_error() {
        // Training error keeps falling while the validation error rises
        let steps = vec![
            (1.0, 1.0),
            (1.0, 0.5),
            (1.0, 0.25),
            (1.01, 0.125),
            (1.01, 0.0625),
            (1.1, 0.03125),
        ];
        let mut trainer = Trainer::new(Dial::new(false), line_data(), Scripted::new(steps)).unwrap();
        trainer
            .add_strategy(EarlyStoppingStrategy::with_settings(validation(), 2, 5.0, 0.1))
            .unwrap();

        for _ in 0..4 {
            trainer.iteration();
        }
        assert!(!trainer.should_stop());

        trainer.iteration();
        trainer.iteration();
        assert!(trainer.should_stop());
    }

    #[test]
    fn test_generalization_loss() {
        let mut strategy = EarlyStoppingStrategy::with_settings(validation(), 2, 5.0, 0.1);

        strategy.strip_sum = 1.5;
        strategy.strip_min = 0.5;
        strategy.strip_count = 2;
        strategy.end_strip(1.0);
        assert_approx_eq!(0.0, strategy.generalization_loss());
        assert_approx_eq!(500.0, strategy.progress());

        strategy.strip_sum = 0.375;
        strategy.strip_min = 0.125;
        strategy.strip_count = 2;
        strategy.end_strip(1.0201);
        assert_approx_eq!(2.01, strategy.generalization_loss());
        assert_approx_eq!(500.0, strategy.progress());
        assert_eq!(1.0, strategy.optimal_error());
    }

    #[test]
    fn test_stops_when_training_stalls() {
        let mut trainer =
            Trainer::new(Dial::new(false), line_data(), Scripted::errors(&[0.5])).unwrap();
        trainer
            .add_strategy(EarlyStoppingStrategy::with_settings(validation(), 3, 5.0, 0.1))
            .unwrap();

        let summary = trainer.train(100);
        assert_eq!(3, summary.iterations);
        assert_eq!(StopReason::Strategy, summary.reason);
    }

    #[test]
    fn test_validation_shape_checked() {
        let mut trainer =
            Trainer::new(Dial::new(false), line_data(), Scripted::errors(&[0.5])).unwrap();

        let wide = Dataset::from_slices(&[[0.0, 1.0]], &[[0.0]]).unwrap();
        let result = trainer.add_strategy(EarlyStoppingStrategy::new(wide));
        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                what: "validation input",
                ..
            })
        ));

        let result = trainer.add_strategy(EarlyStoppingStrategy::new(Dataset::new()));
        assert_eq!(Err(Error::EmptyDataset), result);
    }
}
