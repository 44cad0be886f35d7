//! Nelder-Mead simplex search, following the ASA047 formulation.

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_not_empty, Algorithm, Problem};
use crate::error::{check_positive, Error};
use crate::method::Method;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
// Relative size of the factorial test steps, and of the simplex rebuilt after a premature stop
const EPS: f64 = 0.001;

/// Configuration of [`NelderMead`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NelderMeadConfig {
    /// The size of the initial simplex along every parameter.
    pub step: f64,
    /// The number of simplex moves between two convergence checks.
    pub konvge: usize,
    /// The convergence threshold for the variance of the vertex errors.
    pub reqmin: f64,
    /// An upper bound on error evaluations per iteration.
    pub max_evaluations: Option<usize>,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            step: 100.0,
            konvge: 500,
            reqmin: f64::EPSILON,
            max_evaluations: None,
        }
    }
}

/// The phase a [`NelderMead`] search is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NelderMeadState {
    /// No simplex has been built yet.
    Uninitialized,
    /// The simplex was built and evaluated.
    SimplexBuilt,
    /// The worst vertex is being reflected through the centroid of the others.
    Reflecting,
    /// The reflected point is being expanded, or the simplex contracted or shrunk.
    ExpandingContracting,
    /// The factorial test found no better point around the best vertex. Terminal.
    Converged,
}

/// Derivative-free minimization with a simplex of `n + 1` vertices.
///
/// A single iteration runs the simplex search until its vertex errors converge, then checks the
/// best vertex with a factorial test. If a small step along any axis improves on it, the search
/// stopped prematurely and the next iteration rebuilds a small simplex around the best point.
/// Otherwise the algorithm is converged and [`can_continue`][Algorithm::can_continue] returns
/// `false`. One iteration can therefore take far longer than an iteration of other algorithms.
#[derive(Clone, Debug)]
pub struct NelderMead {
    config: NelderMeadConfig,
    state: NelderMeadState,
    // Vertex-major, `n + 1` vertices of `n` parameters
    simplex: Vec<f64>,
    errors: Vec<f64>,
    centroid: Vec<f64>,
    reflected: Vec<f64>,
    trial: Vec<f64>,
    best: Vec<f64>,
    // Scale of the next simplex relative to `step`
    delta: f64,
    evaluations: usize,
    restarts: usize,
}

impl NelderMead {
    pub fn new(config: NelderMeadConfig) -> Result<Self, Error> {
        check_positive("step", config.step)?;
        check_positive("reqmin", config.reqmin)?;
        if config.konvge == 0 {
            return Err(Error::InvalidParameter {
                name: "konvge",
                reason: "must be at least 1",
            });
        }
        if config.max_evaluations == Some(0) {
            return Err(Error::InvalidParameter {
                name: "max_evaluations",
                reason: "must be at least 1",
            });
        }

        Ok(Self {
            config,
            state: NelderMeadState::Uninitialized,
            simplex: Vec::new(),
            errors: Vec::new(),
            centroid: Vec::new(),
            reflected: Vec::new(),
            trial: Vec::new(),
            best: Vec::new(),
            delta: 1.0,
            evaluations: 0,
            restarts: 0,
        })
    }

    pub fn state(&self) -> NelderMeadState {
        self.state
    }

    /// Returns the number of error evaluations made by the last iteration.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Returns how many times the search was restarted after a premature stop.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    fn dimension(&self) -> usize {
        self.best.len()
    }

    /// Builds the simplex around `self.best` and evaluates every vertex.
    fn build_simplex(&mut self, problem: &mut Problem<'_>) {
        let n = self.dimension();

        for j in 0..=n {
            let vertex = &mut self.simplex[j * n..(j + 1) * n];
            vertex.copy_from_slice(&self.best);
            if j < n {
                vertex[j] += self.config.step * self.delta;
            }
            self.errors[j] = evaluate(problem, vertex, &mut self.evaluations);
        }

        self.state = NelderMeadState::SimplexBuilt;
    }

    /// Computes the centroid of every vertex except `ihi`.
    fn compute_centroid(&mut self, ihi: usize) {
        let n = self.dimension();

        for i in 0..n {
            let sum: f64 = (0..=n)
                .filter(|&j| j != ihi)
                .map(|j| self.simplex[j * n + i])
                .sum();
            self.centroid[i] = sum / n as f64;
        }
    }

    /// Moves every vertex halfway towards vertex `ilo`.
    fn shrink(&mut self, problem: &mut Problem<'_>, ilo: usize) {
        let n = self.dimension();

        for j in (0..=n).filter(|&j| j != ilo) {
            for i in 0..n {
                let best = self.simplex[ilo * n + i];
                let value = &mut self.simplex[j * n + i];
                *value = (*value + best) * 0.5;
            }
            self.errors[j] = evaluate(
                problem,
                &self.simplex[j * n..(j + 1) * n],
                &mut self.evaluations,
            );
        }
    }

    fn replace(&mut self, j: usize, point: Point, error: f64) {
        let n = self.dimension();
        let source = match point {
            Point::Reflected => &self.reflected,
            Point::Trial => &self.trial,
        };
        self.simplex[j * n..(j + 1) * n].copy_from_slice(source);
        self.errors[j] = error;
    }

    /// Runs simplex moves until the vertex errors converge, the evaluation budget runs out or
    /// the search is cancelled. Returns the index of the best vertex and whether the search ran
    /// to convergence.
    fn search(&mut self, problem: &mut Problem<'_>) -> (usize, bool) {
        let n = self.dimension();
        let limit = self.config.max_evaluations.unwrap_or(usize::MAX);
        let rq = self.config.reqmin * n as f64;

        let mut ilo = index_of_min(&self.errors);
        let mut ylo = self.errors[ilo];
        let mut countdown = self.config.konvge;

        loop {
            if self.evaluations >= limit || problem.is_cancelled() {
                return (ilo, false);
            }

            self.state = NelderMeadState::Reflecting;
            let ihi = index_of_max(&self.errors);
            self.compute_centroid(ihi);

            for i in 0..n {
                self.reflected[i] = (1.0 + REFLECTION) * self.centroid[i]
                    - REFLECTION * self.simplex[ihi * n + i];
            }
            let ystar = evaluate(problem, &self.reflected, &mut self.evaluations);

            self.state = NelderMeadState::ExpandingContracting;
            if ystar < ylo {
                for i in 0..n {
                    self.trial[i] =
                        EXPANSION * self.reflected[i] + (1.0 - EXPANSION) * self.centroid[i];
                }
                let y2star = evaluate(problem, &self.trial, &mut self.evaluations);

                if ystar < y2star {
                    self.replace(ihi, Point::Reflected, ystar);
                } else {
                    self.replace(ihi, Point::Trial, y2star);
                }
            } else {
                let beaten = self.errors.iter().filter(|&&y| ystar < y).count();

                match beaten {
                    0 => {
                        // Contract on the side of the worst vertex
                        for i in 0..n {
                            self.trial[i] = CONTRACTION * self.simplex[ihi * n + i]
                                + (1.0 - CONTRACTION) * self.centroid[i];
                        }
                        let y2star = evaluate(problem, &self.trial, &mut self.evaluations);

                        if self.errors[ihi] < y2star {
                            self.shrink(problem, ilo);
                            ilo = index_of_min(&self.errors);
                            ylo = self.errors[ilo];
                            continue;
                        }
                        self.replace(ihi, Point::Trial, y2star);
                    }
                    1 => {
                        // Contract on the side of the reflected point
                        for i in 0..n {
                            self.trial[i] = CONTRACTION * self.reflected[i]
                                + (1.0 - CONTRACTION) * self.centroid[i];
                        }
                        let y2star = evaluate(problem, &self.trial, &mut self.evaluations);

                        if y2star <= ystar {
                            self.replace(ihi, Point::Trial, y2star);
                        } else {
                            self.replace(ihi, Point::Reflected, ystar);
                        }
                    }
                    _ => self.replace(ihi, Point::Reflected, ystar),
                }
            }

            if self.errors[ihi] < ylo {
                ylo = self.errors[ihi];
                ilo = ihi;
            }

            countdown -= 1;
            if countdown > 0 {
                continue;
            }
            countdown = self.config.konvge;

            if variance(&self.errors) <= rq {
                return (ilo, true);
            }
        }
    }

    /// Steps `self.best` along every axis. Returns the error of the first step that improves
    /// on `error`, leaving `self.best` at that step.
    fn factorial_test(&mut self, problem: &mut Problem<'_>, error: f64) -> Option<f64> {
        let offset = self.config.step * EPS;

        for i in 0..self.dimension() {
            let original = self.best[i];

            for &point in &[original + offset, original - offset] {
                self.best[i] = point;
                let y = evaluate(problem, &self.best, &mut self.evaluations);
                if y < error {
                    return Some(y);
                }
            }

            self.best[i] = original;
        }

        None
    }
}

#[derive(Clone, Copy)]
enum Point {
    Reflected,
    Trial,
}

impl Algorithm for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn bind(&mut self, method: &dyn Method) -> Result<(), Error> {
        let n = check_not_empty(method)?;

        self.simplex = vec![0.0; n * (n + 1)];
        self.errors = vec![0.0; n + 1];
        self.centroid = vec![0.0; n];
        self.reflected = vec![0.0; n];
        self.trial = vec![0.0; n];
        self.best = vec![0.0; n];
        self.restart();
        self.restarts = 0;
        Ok(())
    }

    fn iteration(&mut self, problem: &mut Problem<'_>) -> f64 {
        if self.state == NelderMeadState::Converged {
            return problem.error();
        }

        self.evaluations = 0;
        problem.params(&mut self.best);
        self.build_simplex(problem);

        let (ilo, converged) = self.search(problem);
        let n = self.dimension();
        self.best.copy_from_slice(&self.simplex[ilo * n..(ilo + 1) * n]);
        let mut error = self.errors[ilo];

        if converged {
            match self.factorial_test(problem, error) {
                Some(better) => {
                    error = better;
                    self.delta = EPS;
                    self.restarts += 1;
                    debug!(
                        "nelder-mead stopped prematurely, restarting: error={} evaluations={}",
                        error, self.evaluations
                    );
                }
                None => {
                    self.state = NelderMeadState::Converged;
                    debug!(
                        "nelder-mead converged: error={} evaluations={}",
                        error, self.evaluations
                    );
                }
            }
        } else if !problem.is_cancelled() {
            debug!(
                "nelder-mead used its budget of {} evaluations, error={}",
                self.evaluations, error
            );
        }

        problem.set_params(&self.best);
        error
    }

    fn can_continue(&self) -> bool {
        self.state != NelderMeadState::Converged
    }

    fn restart(&mut self) {
        self.state = NelderMeadState::Uninitialized;
        self.delta = 1.0;
    }
}

fn evaluate(problem: &mut Problem<'_>, point: &[f64], evaluations: &mut usize) -> f64 {
    *evaluations += 1;
    problem.error_at(point)
}

/// Returns the summed squared deviation of `errors` from their mean. Stays finite when every
/// error is [`NON_FINITE_ERROR`][crate::evaluate::NON_FINITE_ERROR].
fn variance(errors: &[f64]) -> f64 {
    let lo = errors.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = errors.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        return 0.0;
    }

    let count = errors.len() as f64;
    let mean: f64 = errors.iter().map(|y| y / count).sum();
    errors.iter().map(|y| (y - mean).powi(2)).sum()
}

fn index_of_min(values: &[f64]) -> usize {
    let mut index = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[index] {
            index = i;
        }
    }
    index
}

fn index_of_max(values: &[f64]) -> usize {
    let mut index = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[index] {
            index = i;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::codec;
    use crate::data::Pair;
    use crate::model::LinearModel;
    use crate::evaluate::DatasetError;
    use crate::train::tests::line_data;
    use crate::train::StopReason;
    use crate::{Dataset, Trainer};

    // Sum of squared parameters, minimal at the origin
    fn quadratic(method: &dyn Method, _: &[Pair]) -> f64 {
        codec::encode(method).iter().map(|p| p * p).sum()
    }

    fn config(step: f64) -> NelderMeadConfig {
        NelderMeadConfig {
            step,
            ..Default::default()
        }
    }

    #[test]
    fn test_converges_on_quadratic() {
        let mut model = LinearModel::new(2, 1);
        codec::decode(&[3.0, -2.0, 1.5], &mut model).unwrap();

        let data = Dataset::from_slices(&[[0.0, 0.0]], &[[0.0]]).unwrap();
        let nm = NelderMead::new(config(1.0)).unwrap();
        let mut trainer = Trainer::new(model, data, nm)
            .unwrap()
            .with_evaluator(quadratic);

        let summary = trainer.train(50);
        assert_eq!(StopReason::Converged, summary.reason);
        assert!(summary.error.unwrap() < 1e-6);
        assert!(!trainer.can_continue());
        for p in codec::encode(trainer.method()) {
            assert!(p.abs() < 1e-3);
        }
    }

    #[test]
    fn test_fits_line() {
        let nm = NelderMead::new(config(1.0)).unwrap();
        let mut trainer = Trainer::new(LinearModel::new(1, 1), line_data(), nm).unwrap();
        trainer.train(50);

        assert!(trainer.error().unwrap() < 1e-6);
        let params = codec::encode(trainer.method());
        assert!((params[0] - 2.0).abs() < 1e-2);
        assert!((params[1] + 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_states() {
        let mut nm = NelderMead::new(config(1.0)).unwrap();
        assert_eq!(NelderMeadState::Uninitialized, nm.state());

        let mut model = LinearModel::new(1, 1);
        nm.bind(&model).unwrap();
        let data = line_data();
        let evaluator = DatasetError::default();
        let cancel = CancelToken::new();
        let mut problem = Problem::new(&mut model, &data, &evaluator, &cancel);

        for _ in 0..50 {
            nm.iteration(&mut problem);
            if !nm.can_continue() {
                break;
            }
        }
        assert_eq!(NelderMeadState::Converged, nm.state());

        // Converged iterations do nothing
        let error = problem.error();
        assert_eq!(error, nm.iteration(&mut problem));

        nm.restart();
        assert_eq!(NelderMeadState::Uninitialized, nm.state());
        assert!(nm.can_continue());
    }

    #[test]
    fn test_evaluation_budget() {
        let mut nm = NelderMead::new(NelderMeadConfig {
            step: 1.0,
            max_evaluations: Some(20),
            ..Default::default()
        })
        .unwrap();
        let mut model = LinearModel::new(2, 1);
        codec::decode(&[3.0, -2.0, 1.5], &mut model).unwrap();
        nm.bind(&model).unwrap();

        let data = Dataset::from_slices(&[[0.0, 0.0]], &[[0.0]]).unwrap();
        let evaluator = quadratic;
        let cancel = CancelToken::new();
        let mut problem = Problem::new(&mut model, &data, &evaluator, &cancel);

        let error = nm.iteration(&mut problem);
        // The last simplex move may overshoot the budget by a shrink
        assert!(nm.evaluations() < 20 + 6);
        assert!(nm.can_continue());
        assert!(error < 3.0 * 3.0 + 2.0 * 2.0 + 1.5 * 1.5);
        assert_eq!(error, problem.error());
    }

    #[test]
    fn test_cancelled_iteration_keeps_best_vertex() {
        let mut nm = NelderMead::new(config(1.0)).unwrap();
        let mut model = LinearModel::new(1, 1);
        nm.bind(&model).unwrap();

        let data = line_data();
        let evaluator = DatasetError::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut problem = Problem::new(&mut model, &data, &evaluator, &cancel);

        let start = problem.error();
        let error = nm.iteration(&mut problem);
        // Only the simplex was evaluated
        assert_eq!(3, nm.evaluations());
        assert!(error <= start);
        assert_eq!(error, problem.error());
        assert_eq!(NelderMeadState::SimplexBuilt, nm.state());
    }

    #[test]
    fn test_converges_when_every_error_is_non_finite() {
        let nm = NelderMead::new(config(1.0)).unwrap();
        let mut trainer = Trainer::new(LinearModel::new(1, 1), line_data(), nm)
            .unwrap()
            .with_evaluator(|_: &dyn Method, _: &[Pair]| f64::NAN);

        let summary = trainer.train(5);
        assert_eq!(StopReason::Converged, summary.reason);
        assert_eq!(1, summary.iterations);
        assert_eq!(Some(crate::evaluate::NON_FINITE_ERROR), summary.error);
    }

    #[test]
    fn test_variance() {
        assert_eq!(0.0, variance(&[2.0, 2.0, 2.0]));
        assert!((variance(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-12);

        let max = crate::evaluate::NON_FINITE_ERROR;
        assert_eq!(0.0, variance(&[max, max, max]));
        assert!(variance(&[max, 1.0, max]) > 1.0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(NelderMead::new(config(0.0)).is_err());
        assert!(NelderMead::new(NelderMeadConfig {
            konvge: 0,
            ..Default::default()
        })
        .is_err());
        assert!(NelderMead::new(NelderMeadConfig {
            max_evaluations: Some(0),
            ..Default::default()
        })
        .is_err());
    }
}
