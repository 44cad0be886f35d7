//! Activation functions for the hidden layer of a [`Perceptron`][super::Perceptron].

use num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which activation function a hidden neuron applies to its weighted sum.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Activation {
    /// Identity function. Outputs `x`.
    Linear,
    /// Logistic function. Outputs `1 / (1 + exp(-x))`.
    Sigmoid,
    /// Hyperbolic tangent function. Outputs `tanh(x)`.
    Tanh,
    /// Softsign function. Outputs `x / (1 + abs(x))`.
    SoftSign,
    /// Bent identity function. Outputs `(sqrt(x^2 + 1) - 1) / 2 + x`.
    BentIdentity,
    /// Rectified linear unit. Outputs `max(x, 0)`.
    Relu,
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Tanh
    }
}

impl Activation {
    /// Applies the activation function to `x`.
    pub fn apply<T: Float>(&self, x: T) -> T {
        match self {
            Activation::Linear => x,
            Activation::Sigmoid => T::one() / (T::one() + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::SoftSign => x / (T::one() + x.abs()),
            Activation::BentIdentity => {
                let two = T::one() + T::one();
                ((x.powi(2) + T::one()).sqrt() - T::one()) / two + x
            }
            Activation::Relu => x.max(T::zero()),
        }
    }

    /// Applies the activation function to every value in place.
    pub fn apply_all<T: Float>(&self, values: &mut [T]) {
        for value in values {
            *value = self.apply(*value);
        }
    }
}
