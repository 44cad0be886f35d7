//! Serializable descriptions of a training setup: which algorithm to run, which strategies to
//! attach and how to measure the error. See [`TrainingConfig`].

mod error;
#[cfg(feature = "json")]
mod functions;

#[cfg(feature = "json")]
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::evaluate::{DatasetError, ErrorMode};
use crate::method::Method;
use crate::strategy::{
    EarlyStoppingStrategy, EndIterationsStrategy, EndMaxErrorStrategy, Greedy, HybridStrategy,
    RequiredImprovementStrategy, ResetStrategy, SmartLearningRate, SmartMomentum, Strategy,
    StopTrainingStrategy,
};
use crate::train::{
    Algorithm, AnnealConfig, BackpropConfig, GeneticAlgorithm, GeneticConfig, LevenbergMarquardt,
    LmaConfig, ManhattanConfig, NelderMead, NelderMeadConfig, Propagation, ResilientConfig,
    ScaledConjugateGradient, ScgConfig, SimulatedAnnealing, Trainer,
};

pub use error::Error;

/// A complete training setup that can be saved, loaded and built into a [`Trainer`].
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "json")]
/// # {
/// use trainkit::config::TrainingConfig;
/// use trainkit::model::LinearModel;
/// use trainkit::Dataset;
///
/// let config = TrainingConfig::load_str(r#"{
///     "version": "1",
///     "config": {
///         "algorithm": { "type": "resilient" },
///         "strategies": [{ "type": "end_max_error", "max_error": 1e-8 }]
///     }
/// }"#).unwrap();
///
/// let data = Dataset::from_slices(&[[0.0], [1.0]], &[[1.0], [3.0]]).unwrap();
/// let mut trainer = config.build(LinearModel::new(1, 1), data).unwrap();
/// trainer.train(1000);
/// assert!(trainer.error().unwrap() <= 1e-8);
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub algorithm: AlgorithmConfig,
    /// Attached in order.
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub error_mode: ErrorMode,
}

/// Which algorithm a [`Trainer`] runs, with its settings. Omitted settings take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    NelderMead(NelderMeadConfig),
    Backprop(BackpropConfig),
    Resilient(ResilientConfig),
    Manhattan(ManhattanConfig),
    Scg(ScgConfig),
    Lma(LmaConfig),
    Anneal(AnnealConfig),
    Genetic(GeneticConfig),
}

impl AlgorithmConfig {
    /// Builds the algorithm, validating its settings.
    pub fn build(&self) -> Result<Box<dyn Algorithm>, crate::Error> {
        let algorithm: Box<dyn Algorithm> = match self {
            Self::NelderMead(c) => Box::new(NelderMead::new(c.clone())?),
            Self::Backprop(c) => Box::new(Propagation::backprop(c.clone())?),
            Self::Resilient(c) => Box::new(Propagation::resilient(c.clone())?),
            Self::Manhattan(c) => Box::new(Propagation::manhattan(c.clone())?),
            Self::Scg(c) => Box::new(ScaledConjugateGradient::new(c.clone())?),
            Self::Lma(c) => Box::new(LevenbergMarquardt::new(c.clone())?),
            Self::Anneal(c) => Box::new(SimulatedAnnealing::new(c.clone())?),
            Self::Genetic(c) => Box::new(GeneticAlgorithm::new(c.clone())?),
        };
        Ok(algorithm)
    }
}

/// A strategy to attach to a [`Trainer`], with its settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Greedy,
    Reset {
        required: f64,
        cycles: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
    RequiredImprovement {
        required: f64,
        acceptable: f64,
        cycles: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
    Hybrid {
        alternate: AlgorithmConfig,
        min_improvement: f64,
        tolerate_cycles: usize,
        alternate_cycles: usize,
    },
    StopTraining {
        min_improvement: f64,
        tolerate_cycles: usize,
    },
    EarlyStopping {
        validation: Dataset,
        strip_length: usize,
        alpha: f64,
        min_efficiency: f64,
    },
    SmartLearningRate,
    SmartMomentum,
    EndIterations {
        max_iterations: usize,
    },
    EndMaxError {
        max_error: f64,
    },
}

impl StrategyConfig {
    /// Builds the strategy. Settings that depend on the trainer are checked when it is attached.
    pub fn build(&self) -> Result<Box<dyn Strategy>, crate::Error> {
        let strategy: Box<dyn Strategy> = match self {
            Self::Greedy => Box::new(Greedy::new()),
            Self::Reset {
                required,
                cycles,
                seed,
            } => Box::new(match seed {
                Some(seed) => ResetStrategy::with_seed(*required, *cycles, *seed),
                None => ResetStrategy::new(*required, *cycles),
            }),
            Self::RequiredImprovement {
                required,
                acceptable,
                cycles,
                seed,
            } => Box::new(match seed {
                Some(seed) => {
                    RequiredImprovementStrategy::with_seed(*required, *acceptable, *cycles, *seed)
                }
                None => RequiredImprovementStrategy::new(*required, *acceptable, *cycles),
            }),
            Self::Hybrid {
                alternate,
                min_improvement,
                tolerate_cycles,
                alternate_cycles,
            } => Box::new(HybridStrategy::from_boxed(
                alternate.build()?,
                *min_improvement,
                *tolerate_cycles,
                *alternate_cycles,
            )),
            Self::StopTraining {
                min_improvement,
                tolerate_cycles,
            } => Box::new(StopTrainingStrategy::new(*min_improvement, *tolerate_cycles)),
            Self::EarlyStopping {
                validation,
                strip_length,
                alpha,
                min_efficiency,
            } => Box::new(EarlyStoppingStrategy::with_settings(
                validation.clone(),
                *strip_length,
                *alpha,
                *min_efficiency,
            )),
            Self::SmartLearningRate => Box::new(SmartLearningRate::new()),
            Self::SmartMomentum => Box::new(SmartMomentum::new()),
            Self::EndIterations { max_iterations } => {
                Box::new(EndIterationsStrategy::new(*max_iterations))
            }
            Self::EndMaxError { max_error } => Box::new(EndMaxErrorStrategy::new(*max_error)),
        };
        Ok(strategy)
    }
}

impl TrainingConfig {
    /// Returns a configuration that runs `algorithm` with no strategies and the mean squared
    /// error.
    pub fn new(algorithm: AlgorithmConfig) -> Self {
        Self {
            algorithm,
            strategies: Vec::new(),
            error_mode: ErrorMode::default(),
        }
    }

    /// Appends a strategy.
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Checks every algorithm and strategy setting that does not depend on a model.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.algorithm.build()?;
        for strategy in &self.strategies {
            strategy.build()?;
        }
        Ok(())
    }

    /// Builds a [`Trainer`] for `method` and `data`, attaching the strategies in order.
    pub fn build<M: Method + 'static>(
        &self,
        method: M,
        data: Dataset,
    ) -> Result<Trainer<M>, crate::Error> {
        let mut trainer = Trainer::from_boxed(method, data, self.algorithm.build()?)?
            .with_evaluator(DatasetError::new(self.error_mode));

        for strategy in &self.strategies {
            trainer.add_boxed_strategy(strategy.build()?)?;
        }

        Ok(trainer)
    }
}

#[cfg(feature = "json")]
impl TrainingConfig {
    /// Loads a configuration from a JSON string and checks its settings.
    pub fn load_str(s: &str) -> Result<Self, Error> {
        functions::load_str(s)
    }

    /// Loads a configuration from a JSON file and checks its settings.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        functions::load_file(path)
    }

    /// Returns the configuration as a JSON string.
    pub fn to_string(&self) -> Result<String, Error> {
        functions::to_string(self)
    }

    /// Saves the configuration to a JSON file, recursively creating missing directories if
    /// `create_dirs` is `true`.
    pub fn to_file<P: AsRef<Path>>(&self, path: P, create_dirs: bool) -> Result<(), Error> {
        functions::to_file(self, path, create_dirs)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::evaluate::ErrorEvaluator;
    use crate::model::LinearModel;
    use crate::train::tests::line_data;
    use crate::train::{RpropVariant, StopReason};

    fn get_file_path(file_name: &str) -> String {
        format!("{}/test_data/{}", env!("CARGO_MANIFEST_DIR"), file_name)
    }

    #[test]
    fn test_load_fixture() {
        let config = TrainingConfig::load_file(get_file_path("training_config.json")).unwrap();

        match &config.algorithm {
            AlgorithmConfig::Resilient(c) => {
                assert_eq!(RpropVariant::IRpropPlus, c.variant);
                assert_eq!(0.05, c.initial_update);
                // Omitted settings take their defaults
                assert_eq!(50.0, c.max_step);
            }
            other => panic!("unexpected algorithm {:?}", other),
        }
        assert_eq!(ErrorMode::Mse, config.error_mode);
        assert_eq!(3, config.strategies.len());
        assert!(matches!(
            config.strategies[1],
            StrategyConfig::Hybrid {
                alternate: AlgorithmConfig::NelderMead(_),
                ..
            }
        ));

        let mut trainer = config.build(LinearModel::new(1, 1), line_data()).unwrap();
        let summary = trainer.train(1000);
        assert_eq!(StopReason::Strategy, summary.reason);
        assert!(summary.error.unwrap() <= 1e-6);
    }

    #[test]
    fn test_round_trip() {
        let config = TrainingConfig::new(AlgorithmConfig::NelderMead(NelderMeadConfig {
            step: 1.0,
            reqmin: 1e-8,
            ..Default::default()
        }))
        .with_strategy(StrategyConfig::Greedy)
        .with_strategy(StrategyConfig::Reset {
            required: 0.5,
            cycles: 10,
            seed: Some(4),
        });

        let string = config.to_string().unwrap();
        assert!(string.contains("\"version\": \"1\""));
        assert!(string.contains("\"type\": \"nelder_mead\""));
        assert_eq!(config, TrainingConfig::load_str(&string).unwrap());
    }

    #[test]
    fn test_to_file() {
        let dir = std::env::temp_dir().join(format!("trainkit-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");
        let config = TrainingConfig::new(AlgorithmConfig::Lma(LmaConfig::default()));

        // Without `create_dirs` the missing directories are an error
        assert!(matches!(config.to_file(&path, false), Err(Error::Io(_))));

        config.to_file(&path, true).unwrap();
        assert_eq!(config, TrainingConfig::load_file(&path).unwrap());
        assert_eq!(
            config.to_string().unwrap(),
            std::fs::read_to_string(&path).unwrap()
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_settings() {
        let result = TrainingConfig::load_str(
            r#"{ "version": "1", "config": { "algorithm": { "type": "backprop", "learning_rate": -1.0 } } }"#,
        );
        assert!(matches!(
            result,
            Err(Error::Training(crate::Error::InvalidParameter { .. }))
        ));

        let result = TrainingConfig::load_str(r#"{ "version": "1", "config": {} }"#);
        assert!(matches!(result, Err(Error::Serde(_))));

        let result = TrainingConfig::load_file(get_file_path("missing.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_build_uses_error_mode() {
        let mut config = TrainingConfig::new(AlgorithmConfig::Anneal(AnnealConfig {
            seed: Some(3),
            ..Default::default()
        }));
        config.error_mode = ErrorMode::Ess;

        let mut trainer = config.build(LinearModel::new(1, 1), line_data()).unwrap();
        let error = trainer.iteration();

        let expected = DatasetError::new(ErrorMode::Ess).evaluate(trainer.method(), trainer.data());
        assert_eq!(expected, error);
    }
}
