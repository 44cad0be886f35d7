//! Ready-made models that implement [`Method`][crate::Method].
//!
//! Any type implementing [`Method`][crate::Method] can be trained. These are the ones used by the
//! demos and tests, and a starting point for small regression problems.

mod activation;
mod linear;
mod perceptron;

pub use activation::Activation;
pub use linear::LinearModel;
pub use perceptron::Perceptron;
