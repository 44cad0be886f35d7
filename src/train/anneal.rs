//! Simulated annealing over the parameter vector.

use rand::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_not_empty, Algorithm, Problem};
use crate::error::{check_positive, Error};
use crate::method::Method;

/// Configuration of [`SimulatedAnnealing`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnnealConfig {
    pub start_temperature: f64,
    pub stop_temperature: f64,
    /// The number of perturbations tried per iteration.
    pub cycles: usize,
    /// Seed of the random number generator, or `None` to seed from system entropy.
    pub seed: Option<u64>,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            start_temperature: 10.0,
            stop_temperature: 2.0,
            cycles: 100,
            seed: None,
        }
    }
}

/// Randomly perturbs the parameters, cooling from the start to the stop temperature over every
/// iteration.
///
/// Worse candidates are accepted with the Metropolis probability `exp(-Δ / T)`, so the walk can
/// leave local minima while it is hot. The best vector seen is what the iteration leaves in the
/// model, so the error never increases from one iteration to the next.
#[derive(Clone, Debug)]
pub struct SimulatedAnnealing {
    config: AnnealConfig,
    rng: StdRng,
    current: Vec<f64>,
    candidate: Vec<f64>,
    best: Vec<f64>,
}

impl SimulatedAnnealing {
    pub fn new(config: AnnealConfig) -> Result<Self, Error> {
        check_positive("start_temperature", config.start_temperature)?;
        check_positive("stop_temperature", config.stop_temperature)?;
        if config.stop_temperature > config.start_temperature {
            return Err(Error::InvalidParameter {
                name: "stop_temperature",
                reason: "must not exceed start_temperature",
            });
        }
        if config.cycles == 0 {
            return Err(Error::InvalidParameter {
                name: "cycles",
                reason: "must be at least 1",
            });
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            rng,
            current: Vec::new(),
            candidate: Vec::new(),
            best: Vec::new(),
        })
    }

    /// Returns the factor the temperature is multiplied by after every cycle.
    fn cooling_ratio(&self) -> f64 {
        let AnnealConfig {
            start_temperature,
            stop_temperature,
            cycles,
            ..
        } = self.config;

        if cycles < 2 {
            return 1.0;
        }
        ((stop_temperature / start_temperature).ln() / (cycles - 1) as f64).exp()
    }
}

impl Algorithm for SimulatedAnnealing {
    fn name(&self) -> &'static str {
        "simulated annealing"
    }

    fn bind(&mut self, method: &dyn Method) -> Result<(), Error> {
        let n = check_not_empty(method)?;

        self.current = vec![0.0; n];
        self.candidate = vec![0.0; n];
        self.best = vec![0.0; n];
        Ok(())
    }

    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64 {
        let start = self.config.start_temperature;
        let ratio = self.cooling_ratio();

        problem.params(&mut self.current);
        self.best.copy_from_slice(&self.current);
        let mut current_error = problem.error();
        let mut best_error = current_error;
        let mut temperature = start;

        for _ in 0..self.config.cycles {
            if problem.is_cancelled() {
                break;
            }

            for (c, x) in self.candidate.iter_mut().zip(&self.current) {
                *c = x + (0.5 - self.rng.gen::<f64>()) / start * temperature;
            }
            let error = problem.error_at(&self.candidate);

            let accept = error < current_error
                || self.rng.gen::<f64>() < (-(error - current_error) / temperature).exp();
            if accept {
                std::mem::swap(&mut self.current, &mut self.candidate);
                current_error = error;

                if error < best_error {
                    self.best.copy_from_slice(&self.current);
                    best_error = error;
                }
            }

            temperature *= ratio;
        }

        problem.set_params(&self.best);
        best_error
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::model::LinearModel;
    use crate::train::tests::line_data;
    use crate::Trainer;

    fn annealing(seed: u64) -> SimulatedAnnealing {
        SimulatedAnnealing::new(AnnealConfig {
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_error_never_increases() {
        let mut trainer = Trainer::new(LinearModel::new(1, 1), line_data(), annealing(3)).unwrap();

        let mut last = f64::INFINITY;
        for _ in 0..50 {
            let error = trainer.iteration();
            assert!(error <= last);
            last = error;
        }
        assert!(last < 0.5);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let run = || {
            let mut trainer =
                Trainer::new(LinearModel::new(1, 1), line_data(), annealing(11)).unwrap();
            trainer.train(10);
            crate::codec::encode(trainer.method())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_cooling_ratio() {
        let sa = annealing(0);
        let ratio = sa.cooling_ratio();
        assert_approx_eq!(2.0, 10.0 * ratio.powi(99));
    }

    #[test]
    fn test_invalid_config() {
        assert!(SimulatedAnnealing::new(AnnealConfig {
            start_temperature: 1.0,
            stop_temperature: 2.0,
            ..Default::default()
        })
        .is_err());
        assert!(SimulatedAnnealing::new(AnnealConfig {
            cycles: 0,
            ..Default::default()
        })
        .is_err());
    }
}
