//! The flat parameter vector encoding shared by every trainer.
//!
//! Trainers never look inside a model. They copy its parameters out with [`encode`], work on the
//! copy, and write candidates back with [`decode`].

use crate::error::Error;

/// A model whose trainable parameters can be copied to and from a flat vector.
///
/// The order of the parameters is defined by the model and must be the same for
/// [`encode_to`][Self::encode_to] and [`decode_from`][Self::decode_from], so that decoding an
/// encoded vector leaves the model unchanged.
pub trait Encodable {
    /// Returns the number of trainable parameters.
    fn encoded_len(&self) -> usize;

    /// Writes every parameter into `out`, which is exactly [`encoded_len`][Self::encoded_len]
    /// elements long.
    fn encode_to(&self, out: &mut [f64]);

    /// Overwrites every parameter from `params`, which is exactly
    /// [`encoded_len`][Self::encoded_len] elements long.
    fn decode_from(&mut self, params: &[f64]);
}

/// Returns the parameters of `model` as a new vector.
pub fn encode<E: Encodable + ?Sized>(model: &E) -> Vec<f64> {
    let mut params = vec![0.0; model.encoded_len()];
    model.encode_to(&mut params);
    params
}

/// Writes the parameters of `model` into `out`.
///
/// Returns [`Error::LengthMismatch`] if `out` is not exactly as long as the encoding.
pub fn encode_into<E: Encodable + ?Sized>(model: &E, out: &mut [f64]) -> Result<(), Error> {
    check_len(model, out.len())?;
    model.encode_to(out);
    Ok(())
}

/// Writes `params` into `model`.
///
/// The length is checked before anything is written, so on error the model is left untouched.
pub fn decode<E: Encodable + ?Sized>(params: &[f64], model: &mut E) -> Result<(), Error> {
    check_len(model, params.len())?;
    model.decode_from(params);
    Ok(())
}

fn check_len<E: Encodable + ?Sized>(model: &E, actual: usize) -> Result<(), Error> {
    let expected = model.encoded_len();
    if expected == actual {
        Ok(())
    } else {
        Err(Error::LengthMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;

    use super::*;
    use crate::model::{LinearModel, Perceptron};
    use crate::Activation;

    #[test]
    fn test_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut linear = LinearModel::new(3, 2);
        let mut perceptron = Perceptron::new(2, 4, 1, Activation::Tanh);

        for _ in 0..20 {
            crate::Resettable::reset(&mut linear, &mut rng);
            crate::Resettable::reset(&mut perceptron, &mut rng);

            let before = linear.clone();
            let params = encode(&linear);
            assert_eq!(linear.encoded_len(), params.len());
            decode(&params, &mut linear).unwrap();
            assert_eq!(before, linear);

            let before = perceptron.clone();
            let params = encode(&perceptron);
            decode(&params, &mut perceptron).unwrap();
            assert_eq!(before, perceptron);
        }
    }

    #[test]
    fn test_decode_wrong_length() {
        let mut model = LinearModel::new(2, 1);
        let before = model.clone();

        let result = decode(&[1.0; 4], &mut model);
        assert_eq!(
            Err(Error::LengthMismatch {
                expected: 3,
                actual: 4
            }),
            result
        );
        assert_eq!(before, model);

        let mut out = [0.0; 2];
        assert!(encode_into(&model, &mut out).is_err());
        let mut out = [0.0; 3];
        assert!(encode_into(&model, &mut out).is_ok());
    }
}
