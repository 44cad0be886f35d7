use log::info;

use super::Strategy;
use crate::error::Error;
use crate::train::TrainingState;

/// Rejects every iteration that increases the error.
///
/// Before each iteration the parameters and the error are saved; afterwards, if the error rose,
/// both are restored. The error reported by the trainer therefore never increases.
#[derive(Clone, Debug, Default)]
pub struct Greedy {
    snapshot: Vec<f64>,
    last_error: Option<f64>,
    rejected: usize,
}

impl Greedy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of iterations rejected so far.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

impl Strategy for Greedy {
    fn init(&mut self, state: &mut TrainingState<'_>) -> Result<(), Error> {
        self.snapshot = vec![0.0; state.method().encoded_len()];
        self.last_error = None;
        self.rejected = 0;
        Ok(())
    }

    fn pre_iteration(&mut self, state: &mut TrainingState<'_>) {
        self.last_error = state.error();
        if self.last_error.is_some() {
            state.method().encode_to(&mut self.snapshot);
        }
    }

    fn post_iteration(&mut self, state: &mut TrainingState<'_>) {
        let (last, current) = match (self.last_error, state.error()) {
            (Some(last), Some(current)) => (last, current),
            _ => return,
        };

        if current > last {
            info!(
                "greedy strategy rejected iteration {}: error={} previous={}",
                state.iteration(),
                current,
                last
            );
            state.method_mut().decode_from(&self.snapshot);
            state.set_error(last);
            self.rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{DatasetError, ErrorEvaluator};
    use crate::model::LinearModel;
    use crate::strategy::tests::{Dial, Scripted};
    use crate::train::tests::line_data;
    use crate::train::{BackpropConfig, Backpropagation};
    use crate::Trainer;

    #[test]
    fn test_reverts_worse_iterations() {
        let scripted = Scripted::errors(&[3.0, 2.0, 5.0, 1.0, 4.0]);
        let mut trainer = Trainer::new(Dial::new(false), line_data(), scripted).unwrap();
        trainer.add_strategy(Greedy::new()).unwrap();

        let errors: Vec<f64> = (0..5).map(|_| trainer.iteration()).collect();
        assert_eq!(vec![3.0, 2.0, 2.0, 1.0, 1.0], errors);
        // The parameter was restored along with the error
        assert_eq!(1.0, trainer.method().value);
    }

    #[test]
    fn test_error_never_increases() {
        // A learning rate this large makes plain backpropagation diverge
        let backprop = Backpropagation::backprop(BackpropConfig {
            learning_rate: 3.0,
            momentum: 0.5,
            ..Default::default()
        })
        .unwrap();
        let mut trainer = Trainer::new(LinearModel::new(1, 1), line_data(), backprop).unwrap();
        trainer.add_strategy(Greedy::new()).unwrap();

        let mut last = f64::INFINITY;
        for _ in 0..50 {
            let error = trainer.iteration();
            assert!(error <= last);
            last = error;

            // The reported error belongs to the parameters left in the model
            let actual = DatasetError::default().evaluate(trainer.method(), trainer.data());
            assert_eq!(error, actual);
        }
    }
}
