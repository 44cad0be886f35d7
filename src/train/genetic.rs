//! A genetic algorithm whose genomes are parameter vectors.

use log::debug;
use rand::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_not_empty, Algorithm, Problem};
use crate::error::{check_fraction, check_positive, Error};
use crate::method::Method;

/// Configuration of [`GeneticAlgorithm`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneticConfig {
    pub population_size: usize,
    /// The probability that an offspring is mutated.
    pub mutation_percent: f64,
    /// The fraction of the population, best first, that mates every generation. Each mating
    /// produces two offspring, which replace the worst genomes once every mating is done.
    pub percent_to_mate: f64,
    /// The fraction of the population, best first, that fathers are picked from.
    pub mating_population: f64,
    /// The largest change a mutation makes to a single parameter.
    pub perturbation: f64,
    /// Seed of the random number generator, or `None` to seed from system entropy.
    pub seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 60,
            mutation_percent: 0.1,
            percent_to_mate: 0.25,
            mating_population: 0.5,
            perturbation: 0.5,
            seed: None,
        }
    }
}

/// Evolves a population of parameter vectors.
///
/// The population is seeded from the model's parameters plus uniform noise in `[-1, 1]` when
/// the first iteration runs. Every iteration is one generation: the best genomes mate by
/// two-point crossover, offspring may be mutated by perturbation, the offspring replace the
/// worst genomes, and the best genome is decoded into the model. The best genome never mates
/// away, so the error never increases.
#[derive(Clone, Debug)]
pub struct GeneticAlgorithm {
    config: GeneticConfig,
    rng: StdRng,
    // Genome-major, `population_size` genomes
    population: Vec<f64>,
    scores: Vec<f64>,
    // Genome indices from best to worst
    order: Vec<usize>,
    children: [Vec<f64>; 2],
    // Offspring of the current generation, written back once every mating is done
    offspring: Vec<f64>,
    genome_len: usize,
    initialized: bool,
}

impl GeneticAlgorithm {
    pub fn new(config: GeneticConfig) -> Result<Self, Error> {
        check_fraction("mutation_percent", config.mutation_percent)?;
        check_fraction("percent_to_mate", config.percent_to_mate)?;
        check_fraction("mating_population", config.mating_population)?;
        check_positive("perturbation", config.perturbation)?;

        let to_mate = (config.population_size as f64 * config.percent_to_mate) as usize;
        if to_mate == 0 || 2 * to_mate >= config.population_size {
            return Err(Error::InvalidParameter {
                name: "percent_to_mate",
                reason: "must select at least one mating and leave the best genome in place",
            });
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            rng,
            population: Vec::new(),
            scores: Vec::new(),
            order: Vec::new(),
            children: [Vec::new(), Vec::new()],
            offspring: Vec::new(),
            genome_len: 0,
            initialized: false,
        })
    }

    /// Returns the error of the best genome, or `None` before the first iteration.
    pub fn best_score(&self) -> Option<f64> {
        if self.initialized {
            Some(self.scores[self.order[0]])
        } else {
            None
        }
    }

    fn genome(&self, index: usize) -> &[f64] {
        let n = self.genome_len;
        &self.population[index * n..(index + 1) * n]
    }

    fn init_population(&mut self, problem: &mut Problem<'_>) {
        let n = self.genome_len;
        problem.params(&mut self.population[..n]);

        for i in 1..self.config.population_size {
            let (first, rest) = self.population.split_at_mut(i * n);
            for (gene, &seed) in rest[..n].iter_mut().zip(&first[..n]) {
                *gene = seed + self.rng.gen_range(-1.0..=1.0);
            }
        }

        for i in 0..self.config.population_size {
            let score = problem.error_at(self.genome(i));
            self.scores[i] = score;
        }
        self.sort();
        self.initialized = true;
    }

    fn sort(&mut self) {
        let scores = &self.scores;
        self.order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    }

    /// Fills `self.children` by two-point crossover of two genomes.
    fn crossover(&mut self, mother: usize, father: usize) {
        let n = self.genome_len;
        let cut_len = (n / 5).max(1);
        let cut1 = self.rng.gen_range(0..=n - cut_len);
        let cut2 = cut1 + cut_len;

        let [first, second] = &mut self.children;
        for i in 0..n {
            let (m, f) = (self.population[mother * n + i], self.population[father * n + i]);
            if (cut1..cut2).contains(&i) {
                first[i] = f;
                second[i] = m;
            } else {
                first[i] = m;
                second[i] = f;
            }
        }
    }

    fn mutate(&mut self, child: usize) {
        let p = self.config.perturbation;
        for gene in self.children[child].iter_mut() {
            *gene += self.rng.gen_range(-p..=p);
        }
    }
}

impl Algorithm for GeneticAlgorithm {
    fn name(&self) -> &'static str {
        "genetic algorithm"
    }

    fn bind(&mut self, method: &dyn Method) -> Result<(), Error> {
        let n = check_not_empty(method)?;
        let size = self.config.population_size;

        self.genome_len = n;
        self.population = vec![0.0; size * n];
        self.scores = vec![0.0; size];
        self.order = (0..size).collect();
        self.children = [vec![0.0; n], vec![0.0; n]];
        self.offspring = Vec::with_capacity(size * n);
        self.restart();
        Ok(())
    }

    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64 {
        let n = self.genome_len;
        let size = self.config.population_size;

        if !self.initialized {
            self.init_population(problem);
        }

        let to_mate = (size as f64 * self.config.percent_to_mate) as usize;
        let mating_size = ((size as f64 * self.config.mating_population) as usize).max(1);
        self.offspring.clear();

        for i in 0..to_mate {
            if problem.is_cancelled() {
                break;
            }

            let mother = self.order[i];
            let father = self.order[self.rng.gen_range(0..mating_size)];
            self.crossover(mother, father);

            for child in 0..2 {
                if self.rng.gen::<f64>() < self.config.mutation_percent {
                    self.mutate(child);
                }
                self.offspring.extend_from_slice(&self.children[child]);
            }
        }

        // Parents are read before any of them is replaced
        let first_slot = size - 2 * to_mate;
        for (k, child) in self.offspring.chunks(n).enumerate() {
            let slot = self.order[first_slot + k];
            self.population[slot * n..(slot + 1) * n].copy_from_slice(child);
            self.scores[slot] = problem.error_at(child);
        }

        self.sort();

        let best = self.order[0];
        let error = self.scores[best];
        problem.set_params(&self.population[best * n..(best + 1) * n]);

        debug!(
            "genetic algorithm generation done: best={} worst={}",
            error,
            self.scores[self.order[size - 1]]
        );
        error
    }

    fn restart(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::codec;
    use crate::evaluate::DatasetError;
    use crate::model::LinearModel;
    use crate::train::tests::line_data;
    use crate::Trainer;

    fn genetic(seed: u64) -> GeneticAlgorithm {
        GeneticAlgorithm::new(GeneticConfig {
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_best_never_gets_worse() {
        let mut trainer = Trainer::new(LinearModel::new(1, 1), line_data(), genetic(5)).unwrap();

        let mut last = f64::INFINITY;
        for _ in 0..100 {
            let error = trainer.iteration();
            assert!(error <= last);
            last = error;
        }
        assert!(last < 0.2);
    }

    #[test]
    fn test_population_seeded_from_model() {
        let mut model = LinearModel::new(1, 1);
        codec::decode(&[2.0, -1.0], &mut model).unwrap();
        let mut trainer = Trainer::new(model, line_data(), genetic(1)).unwrap();

        // The model itself is in the population and already optimal
        assert_eq!(0.0, trainer.iteration());
        assert_eq!(vec![2.0, -1.0], codec::encode(trainer.method()));
    }

    #[test]
    fn test_every_mother_mates_before_replacement() {
        // Eight offspring replace all but the two best of ten genomes
        let mut ga = GeneticAlgorithm::new(GeneticConfig {
            population_size: 10,
            mutation_percent: 0.0,
            percent_to_mate: 0.4,
            mating_population: 0.1,
            seed: Some(8),
            ..Default::default()
        })
        .unwrap();

        let mut model = LinearModel::new(1, 1);
        ga.bind(&model).unwrap();
        let data = line_data();
        let evaluator = DatasetError::default();
        let cancel = CancelToken::new();
        let mut problem = Problem::new(&mut model, &data, &evaluator, &cancel);

        ga.init_population(&mut problem);
        let before = ga.population.clone();
        let mothers: Vec<usize> = ga.order[..4].to_vec();
        ga.iteration(&mut problem);

        // Each first child keeps its mother's genes outside the crossover segment
        for &mother in &mothers {
            let genome = &before[mother * 2..(mother + 1) * 2];
            let inherited = ga
                .population
                .chunks(2)
                .any(|g| g.iter().zip(genome).any(|(a, b)| a == b));
            assert!(inherited, "genome {} did not mate", mother);
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(GeneticAlgorithm::new(GeneticConfig {
            percent_to_mate: 0.5,
            ..Default::default()
        })
        .is_err());
        assert!(GeneticAlgorithm::new(GeneticConfig {
            population_size: 2,
            ..Default::default()
        })
        .is_err());
        assert!(GeneticAlgorithm::new(GeneticConfig {
            mutation_percent: 1.5,
            ..Default::default()
        })
        .is_err());
    }
}
