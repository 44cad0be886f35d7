//! Loads a training setup from a JSON file, trains a linear model with it, and saves the setup
//! back out. Requires the `json` feature.

use trainkit::config::TrainingConfig;
use trainkit::model::LinearModel;
use trainkit::{codec, Dataset};

fn main() {
    env_logger::init();

    // Samples of y = 2x - 1
    let inputs: Vec<[f64; 1]> = (0..8).map(|i| [i as f64 / 4.0 - 1.0]).collect();
    let ideals: Vec<[f64; 1]> = inputs.iter().map(|x| [2.0 * x[0] - 1.0]).collect();
    let data = Dataset::from_slices(&inputs, &ideals).unwrap();

    let config = TrainingConfig::load_file("test_data/training_config.json").unwrap();
    println!("config: {:?}", config);

    let mut trainer = config.build(LinearModel::new(1, 1), data).unwrap();
    let summary = trainer.train(1000);
    println!(
        "stopped after {} iterations ({:?}), error: {:?}",
        summary.iterations, summary.reason, summary.error
    );
    println!("parameters: {:?}", codec::encode(trainer.method()));

    config
        .to_file("test_output/training_config.json", true)
        .unwrap();
}
