//! Trains a small perceptron on XOR with resilient propagation, falling back to Nelder-Mead when
//! training stalls. Run with `RUST_LOG=debug` to see the strategies at work.

use trainkit::model::Perceptron;
use trainkit::strategy::{EndMaxErrorStrategy, Greedy, HybridStrategy, StopTrainingStrategy};
use trainkit::train::{
    GradientMode, NelderMead, NelderMeadConfig, ResilientConfig, ResilientPropagation,
};
use trainkit::{Activation, Dataset, Method, Trainer};

const INPUTS: [[f64; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
const IDEALS: [[f64; 1]; 4] = [[0.0], [1.0], [1.0], [0.0]];

fn main() {
    env_logger::init();

    let data = Dataset::from_slices(&INPUTS, &IDEALS).unwrap();
    let mut model = Perceptron::new(2, 3, 1, Activation::Tanh);
    trainkit::Resettable::reset(&mut model, &mut rand::thread_rng());

    // Perceptrons have no analytic gradient, so use finite differences
    let rprop = ResilientPropagation::resilient(ResilientConfig {
        gradient: GradientMode::Numeric,
        ..Default::default()
    })
    .unwrap();
    let nelder_mead = NelderMead::new(NelderMeadConfig {
        step: 0.5,
        max_evaluations: Some(2000),
        ..Default::default()
    })
    .unwrap();

    let mut trainer = Trainer::new(model, data, rprop).unwrap();
    trainer.add_strategy(Greedy::new()).unwrap();
    trainer
        .add_strategy(HybridStrategy::with_settings(nelder_mead, 0.001, 20, 1))
        .unwrap();
    trainer.add_strategy(StopTrainingStrategy::default()).unwrap();
    trainer.add_strategy(EndMaxErrorStrategy::new(0.0001)).unwrap();

    let summary = trainer.train(5000);
    println!(
        "stopped after {} iterations ({:?}), error: {:?}",
        summary.iterations, summary.reason, summary.error
    );

    let model = trainer.into_method();
    for input in &INPUTS {
        println!("{:?} -> {:.4}", input, model.evaluate(input)[0]);
    }
}
