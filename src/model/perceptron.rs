use rand::{Rng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Activation;
use crate::codec::Encodable;
use crate::method::{Method, Resettable};

/// A feedforward network with one hidden layer and a linear output layer.
///
/// Parameters are encoded in this order:
///
/// 1. hidden weights, `hidden` rows of `inputs` values each
/// 2. hidden biases
/// 3. output weights, `outputs` rows of `hidden` values each
/// 4. output biases
///
/// There is no analytic gradient, so gradient-based algorithms need
/// [`GradientMode::Numeric`][crate::train::GradientMode::Numeric] or
/// [`GradientMode::Auto`][crate::train::GradientMode::Auto] to train it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Perceptron {
    inputs: usize,
    hidden: usize,
    outputs: usize,
    activation: Activation,
    hidden_weights: Vec<f64>,
    hidden_biases: Vec<f64>,
    output_weights: Vec<f64>,
    output_biases: Vec<f64>,
}

impl Perceptron {
    /// Returns a new `Perceptron` with every parameter set to zero.
    pub fn new(inputs: usize, hidden: usize, outputs: usize, activation: Activation) -> Self {
        Self {
            inputs,
            hidden,
            outputs,
            activation,
            hidden_weights: vec![0.0; hidden * inputs],
            hidden_biases: vec![0.0; hidden],
            output_weights: vec![0.0; outputs * hidden],
            output_biases: vec![0.0; outputs],
        }
    }

    /// Returns the number of hidden neurons.
    pub fn hidden_count(&self) -> usize {
        self.hidden
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn layers(&self) -> [&Vec<f64>; 4] {
        [
            &self.hidden_weights,
            &self.hidden_biases,
            &self.output_weights,
            &self.output_biases,
        ]
    }

    fn layers_mut(&mut self) -> [&mut Vec<f64>; 4] {
        [
            &mut self.hidden_weights,
            &mut self.hidden_biases,
            &mut self.output_weights,
            &mut self.output_biases,
        ]
    }
}

impl Encodable for Perceptron {
    fn encoded_len(&self) -> usize {
        self.layers().iter().map(|l| l.len()).sum()
    }

    fn encode_to(&self, out: &mut [f64]) {
        let mut start = 0;
        for layer in self.layers() {
            out[start..start + layer.len()].copy_from_slice(layer);
            start += layer.len();
        }
    }

    fn decode_from(&mut self, params: &[f64]) {
        let mut start = 0;
        for layer in self.layers_mut() {
            let len = layer.len();
            layer.copy_from_slice(&params[start..start + len]);
            start += len;
        }
    }
}

impl Method for Perceptron {
    fn input_count(&self) -> usize {
        self.inputs
    }

    fn output_count(&self) -> usize {
        self.outputs
    }

    fn compute(&self, input: &[f64], output: &mut [f64]) {
        output.copy_from_slice(&self.output_biases);

        // Each hidden activation is added to the outputs as soon as it is known
        for j in 0..self.hidden {
            let weights = &self.hidden_weights[j * self.inputs..(j + 1) * self.inputs];
            let sum: f64 = weights.iter().zip(input).map(|(w, x)| w * x).sum();
            let activation = self.activation.apply(sum + self.hidden_biases[j]);

            for (o, out) in output.iter_mut().enumerate() {
                *out += self.output_weights[o * self.hidden + j] * activation;
            }
        }
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

impl Resettable for Perceptron {
    fn reset(&mut self, rng: &mut dyn RngCore) {
        for layer in self.layers_mut() {
            for p in layer.iter_mut() {
                *p = rng.gen_range(-1.0..1.0);
            }
        }
    }
}
