use rand::{Rng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::codec::Encodable;
use crate::data::Pair;
use crate::method::{Differentiable, Method, Resettable};

/// A single affine layer: every output is a weighted sum of the inputs plus a bias.
///
/// The parameter vector holds the weights row by row (all weights of the first output, then the
/// second, ...), followed by one bias per output. A model with one input and one output therefore
/// encodes `y = a * x + b` as `[a, b]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearModel {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl LinearModel {
    /// Returns a new `LinearModel` with every parameter set to zero.
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            outputs,
            weights: vec![0.0; inputs * outputs],
            biases: vec![0.0; outputs],
        }
    }

    /// Returns the weights of output `o`.
    pub fn weights(&self, o: usize) -> &[f64] {
        &self.weights[o * self.inputs..(o + 1) * self.inputs]
    }

    pub fn biases(&self) -> &[f64] {
        &self.biases
    }
}

impl Encodable for LinearModel {
    fn encoded_len(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    fn encode_to(&self, out: &mut [f64]) {
        let (weights, biases) = out.split_at_mut(self.weights.len());
        weights.copy_from_slice(&self.weights);
        biases.copy_from_slice(&self.biases);
    }

    fn decode_from(&mut self, params: &[f64]) {
        let (weights, biases) = params.split_at(self.weights.len());
        self.weights.copy_from_slice(weights);
        self.biases.copy_from_slice(biases);
    }
}

impl Method for LinearModel {
    fn input_count(&self) -> usize {
        self.inputs
    }

    fn output_count(&self) -> usize {
        self.outputs
    }

    fn compute(&self, input: &[f64], output: &mut [f64]) {
        for (o, out) in output.iter_mut().enumerate() {
            let sum: f64 = self
                .weights(o)
                .iter()
                .zip(input)
                .map(|(w, x)| w * x)
                .sum();
            *out = sum + self.biases[o];
        }
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }

    fn as_differentiable(&self) -> Option<&dyn Differentiable> {
        Some(self)
    }
}

impl Resettable for LinearModel {
    fn reset(&mut self, rng: &mut dyn RngCore) {
        for p in self.weights.iter_mut().chain(&mut self.biases) {
            *p = rng.gen_range(-1.0..1.0);
        }
    }
}

impl Differentiable for LinearModel {
    fn gradient(&self, pairs: &[Pair], gradient: &mut [f64]) -> f64 {
        gradient.iter_mut().for_each(|g| *g = 0.0);

        let (weight_grad, bias_grad) = gradient.split_at_mut(self.weights.len());
        let mut output = vec![0.0; self.outputs];
        let mut sum = 0.0;

        for pair in pairs {
            self.compute(pair.input(), &mut output);

            for (o, (actual, ideal)) in output.iter().zip(pair.ideal()).enumerate() {
                let diff = actual - ideal;
                sum += diff * diff;

                let row = &mut weight_grad[o * self.inputs..(o + 1) * self.inputs];
                for (g, x) in row.iter_mut().zip(pair.input()) {
                    *g += diff * x;
                }
                bias_grad[o] += diff;
            }
        }

        let count = (pairs.len() * self.outputs) as f64;
        if count == 0.0 {
            return 0.0;
        }

        // d/dp of sum(diff^2) / count
        for g in gradient.iter_mut() {
            *g *= 2.0 / count;
        }
        sum / count
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::prelude::*;

    use super::*;
    use crate::codec;
    use crate::evaluate::{DatasetError, ErrorEvaluator};
    use crate::train::tests::line_data;

    #[test]
    fn test_layout() {
        let mut model = LinearModel::new(2, 2);
        assert_eq!(6, model.encoded_len());

        codec::decode(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &mut model).unwrap();
        assert_eq!([1.0, 2.0], model.weights(0));
        assert_eq!([3.0, 4.0], model.weights(1));
        assert_eq!([5.0, 6.0], model.biases());

        assert_eq!(vec![1.0 + 4.0 + 5.0, 3.0 + 8.0 + 6.0], model.evaluate(&[1.0, 2.0]));
    }

    #[test]
    fn test_line() {
        let mut model = LinearModel::new(1, 1);
        assert_eq!(vec![0.0], model.evaluate(&[3.0]));

        codec::decode(&[2.0, -1.0], &mut model).unwrap();
        let data = line_data();
        for pair in data.iter() {
            assert_eq!(pair.ideal().to_vec(), model.evaluate(pair.input()));
        }
        assert_eq!(0.0, DatasetError::default().evaluate(&model, &data));
    }

    #[test]
    fn test_gradient() {
        let model = LinearModel::new(1, 1);
        let data = line_data();

        let mut gradient = [0.0; 2];
        let error = model.gradient(&data, &mut gradient);
        assert_approx_eq!(2.875, error);
        assert_approx_eq!(DatasetError::default().evaluate(&model, &data), error);

        // With zero parameters the bias gradient is -2 * mean(y)
        assert_approx_eq!(2.5, gradient[1]);
    }

    #[test]
    fn test_reset() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut model = LinearModel::new(3, 2);
        model.reset(&mut rng);

        let params = codec::encode(&model);
        assert!(params.iter().all(|p| (-1.0..1.0).contains(p)));
        assert!(params.iter().any(|&p| p != 0.0));
    }
}
