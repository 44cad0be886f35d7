//! Training data: a collection of input/ideal pairs.

use std::ops;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One training sample.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pair {
    input: Vec<f64>,
    ideal: Vec<f64>,
}

impl Pair {
    pub fn new(input: Vec<f64>, ideal: Vec<f64>) -> Self {
        Self { input, ideal }
    }

    /// Returns the input values.
    pub fn input(&self) -> &[f64] {
        &self.input
    }

    /// Returns the expected output values.
    pub fn ideal(&self) -> &[f64] {
        &self.ideal
    }
}

/// An ordered set of [`Pair`]s that all share the same input and ideal sizes.
///
/// Derefs to a slice, so it can be iterated any number of times and has a stable length.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<Pair>", into = "Vec<Pair>"))]
pub struct Dataset {
    pairs: Vec<Pair>,
}

impl ops::Deref for Dataset {
    type Target = [Pair];

    fn deref(&self) -> &Self::Target {
        &self.pairs
    }
}

impl Dataset {
    /// Returns an empty `Dataset`.
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Builds a `Dataset` from parallel slices of inputs and ideals.
    pub fn from_slices<I, J>(inputs: &[I], ideals: &[J]) -> Result<Self, Error>
    where
        I: AsRef<[f64]>,
        J: AsRef<[f64]>,
    {
        if inputs.len() != ideals.len() {
            return Err(Error::ShapeMismatch {
                what: "ideal count",
                expected: inputs.len(),
                actual: ideals.len(),
            });
        }

        let mut data = Self::new();
        for (input, ideal) in inputs.iter().zip(ideals) {
            data.push(Pair::new(input.as_ref().to_vec(), ideal.as_ref().to_vec()))?;
        }

        Ok(data)
    }

    /// Appends a pair, checking that its sizes match the pairs already present.
    pub fn push(&mut self, pair: Pair) -> Result<(), Error> {
        if let Some(first) = self.pairs.first() {
            if first.input.len() != pair.input.len() {
                return Err(Error::ShapeMismatch {
                    what: "input",
                    expected: first.input.len(),
                    actual: pair.input.len(),
                });
            }
            if first.ideal.len() != pair.ideal.len() {
                return Err(Error::ShapeMismatch {
                    what: "ideal",
                    expected: first.ideal.len(),
                    actual: pair.ideal.len(),
                });
            }
        }

        self.pairs.push(pair);
        Ok(())
    }

    /// Returns the input size of the pairs, or `None` if the dataset is empty.
    pub fn input_size(&self) -> Option<usize> {
        self.pairs.first().map(|p| p.input.len())
    }

    /// Returns the ideal size of the pairs, or `None` if the dataset is empty.
    pub fn ideal_size(&self) -> Option<usize> {
        self.pairs.first().map(|p| p.ideal.len())
    }

    /// Splits the dataset in two, the first part holding `fraction` of the pairs (rounded down).
    /// Order is preserved.
    pub fn split(&self, fraction: f64) -> Result<(Dataset, Dataset), Error> {
        crate::error::check_fraction("fraction", fraction)?;

        let at = (self.pairs.len() as f64 * fraction).floor() as usize;
        let first = Self {
            pairs: self.pairs[..at].to_vec(),
        };
        let second = Self {
            pairs: self.pairs[at..].to_vec(),
        };

        Ok((first, second))
    }
}

impl TryFrom<Vec<Pair>> for Dataset {
    type Error = Error;

    fn try_from(pairs: Vec<Pair>) -> Result<Self, Self::Error> {
        let mut data = Self::new();
        for pair in pairs {
            data.push(pair)?;
        }
        Ok(data)
    }
}

impl From<Dataset> for Vec<Pair> {
    fn from(data: Dataset) -> Self {
        data.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slices() {
        let data = Dataset::from_slices(&[[0.0, 1.0], [1.0, 0.0]], &[[1.0], [0.0]]).unwrap();
        assert_eq!(2, data.len());
        assert_eq!(Some(2), data.input_size());
        assert_eq!(Some(1), data.ideal_size());
        assert_eq!(&[1.0, 0.0], data[1].input());

        // The dataset can be iterated repeatedly
        let sum = |d: &Dataset| d.iter().map(|p| p.ideal()[0]).sum::<f64>();
        assert_eq!(sum(&data), sum(&data));
    }

    #[test]
    fn test_push_shape_mismatch() {
        let mut data = Dataset::new();
        data.push(Pair::new(vec![0.0], vec![0.0])).unwrap();

        assert_eq!(
            Err(Error::ShapeMismatch {
                what: "input",
                expected: 1,
                actual: 2
            }),
            data.push(Pair::new(vec![0.0, 1.0], vec![0.0]))
        );
        assert!(data.push(Pair::new(vec![0.0], vec![])).is_err());
        assert_eq!(1, data.len());

        assert!(Dataset::from_slices(&[[0.0]], &[[0.0], [1.0]]).is_err());
    }

    #[test]
    fn test_split() {
        let inputs: Vec<[f64; 1]> = (0..10).map(|i| [i as f64]).collect();
        let data = Dataset::from_slices(&inputs, &inputs).unwrap();

        let (train, validation) = data.split(0.75).unwrap();
        assert_eq!(7, train.len());
        assert_eq!(3, validation.len());
        assert_eq!(&[7.0], validation[0].input());

        assert!(data.split(2.0).is_err());
    }
}
