//! Iterative optimizers and composable training strategies for any model whose trainable state
//! can be written as a flat vector of `f64`s.
//!
//! A model implements [`Encodable`] and [`Method`]. A [`Trainer`] binds it to a [`Dataset`] and
//! an [`Algorithm`][train::Algorithm] (Nelder-Mead, the propagation family, SCG, LMA, simulated
//! annealing or a genetic algorithm), then runs one iteration at a time. [`Strategy`]s attached
//! to the trainer observe every iteration and may revert, reset or redirect training, or ask for
//! it to stop.
//!
//! # Examples
//!
//! ```
//! use trainkit::model::LinearModel;
//! use trainkit::strategy::{EndMaxErrorStrategy, Greedy};
//! use trainkit::train::{NelderMead, NelderMeadConfig};
//! use trainkit::{Dataset, Method, Trainer};
//!
//! // Samples of y = 2x - 1
//! let data = Dataset::from_slices(&[[0.0], [1.0], [2.0]], &[[-1.0], [1.0], [3.0]]).unwrap();
//!
//! let config = NelderMeadConfig {
//!     step: 1.0,
//!     ..Default::default()
//! };
//! let mut trainer = Trainer::new(LinearModel::new(1, 1), data, NelderMead::new(config).unwrap())
//!     .unwrap();
//! trainer.add_strategy(Greedy::new()).unwrap();
//! trainer.add_strategy(EndMaxErrorStrategy::new(1e-8)).unwrap();
//!
//! trainer.train(100);
//!
//! let model = trainer.into_method();
//! let y = model.evaluate(&[4.0])[0];
//! assert!((y - 7.0).abs() < 1e-2);
//! ```

// Errors that come out non-finite are reported as `evaluate::NON_FINITE_ERROR`, so no algorithm
// ever compares against a NaN.

mod cancel;
pub mod codec;
mod data;
mod error;
pub mod evaluate;
mod method;
pub mod model;
pub mod strategy;
pub mod train;

#[cfg(feature = "serde")]
pub mod config;

pub use cancel::CancelToken;
pub use codec::Encodable;
pub use data::{Dataset, Pair};
pub use error::{Capability, Error};
pub use method::{Differentiable, Method, Resettable};
pub use model::Activation;
pub use strategy::Strategy;
pub use train::Trainer;
