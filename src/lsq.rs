//! Bounded Levenberg–Marquardt for small dense problems.
//!
//! The problem supplies its residuals and analytic Jacobian through
//! [`LeastSquaresProblem::accumulate`], which folds them straight into
//! `JᵀJ` and `Jᵀr` so the full Jacobian is never stored. Bounds are
//! enforced by projecting every trial point onto the box.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{GeometryError, GeometryResult};

pub trait LeastSquaresProblem {
    fn num_params(&self) -> usize;

    /// Adds `JᵀJ` and `Jᵀr` at `params` into the buffers and returns `Σ r²`.
    fn accumulate(&self, params: &[f64], jtj: &mut DMatrix<f64>, jtr: &mut DVector<f64>) -> f64;

    /// `Σ r²` at `params`.
    fn cost(&self, params: &[f64]) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn project(&self, params: &mut [f64]) {
        for ((p, &lo), &hi) in params.iter_mut().zip(&self.lower).zip(&self.upper) {
            *p = p.clamp(lo, hi);
        }
    }

    pub fn contains(&self, params: &[f64]) -> bool {
        params
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(p, (lo, hi))| (*lo..=*hi).contains(p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    pub max_iter: usize,
    pub initial_lambda: f64,
    /// Relative cost decrease below which the fit is converged.
    pub cost_tolerance: f64,
    /// Step length, relative to the parameter size, below which the fit is converged.
    pub step_tolerance: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            max_iter: 200,
            initial_lambda: 1e-3,
            cost_tolerance: 1e-12,
            step_tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmReport {
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

const MAX_LAMBDA: f64 = 1e12;
const MIN_LAMBDA: f64 = 1e-12;

fn linearize<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    params: &[f64],
) -> GeometryResult<(DMatrix<f64>, DVector<f64>, f64)> {
    let n = problem.num_params();
    let mut jtj = DMatrix::zeros(n, n);
    let mut jtr = DVector::zeros(n);
    let cost = problem.accumulate(params, &mut jtj, &mut jtr);
    if !cost.is_finite() || jtj.iter().chain(jtr.iter()).any(|v| !v.is_finite()) {
        return Err(GeometryError::estimation("residuals or Jacobian are not finite"));
    }
    Ok((jtj, jtr, cost))
}

/// Marquardt-damped Gauss–Newton step `-(JᵀJ + λ·diag(JᵀJ))⁻¹ Jᵀr`.
fn damped_step(jtj: &DMatrix<f64>, jtr: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        a[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
    }
    let rhs = -jtr.clone();
    let step = match a.clone().cholesky() {
        Some(chol) => chol.solve(&rhs),
        None => a.lu().solve(&rhs)?,
    };
    step.iter().all(|v| v.is_finite()).then_some(step)
}

/// Minimises `Σ r²` inside `bounds` starting from `initial`.
///
/// # Errors
///
/// Returns `GeometryError::Estimation` when the residuals or the Jacobian
/// are not finite at an accepted point.
pub fn solve_bounded<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    bounds: &Bounds,
    initial: &[f64],
    settings: &LmSettings,
) -> GeometryResult<LmReport> {
    if initial.len() != problem.num_params() {
        return Err(GeometryError::estimation(format!(
            "{} initial values for {} parameters",
            initial.len(),
            problem.num_params()
        )));
    }
    let mut params = initial.to_vec();
    bounds.project(&mut params);
    let (mut jtj, mut jtr, mut cost) = linearize(problem, &params)?;
    let mut lambda = settings.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < settings.max_iter {
        iterations += 1;
        let Some(step) = damped_step(&jtj, &jtr, lambda) else {
            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                break;
            }
            continue;
        };
        let mut trial: Vec<f64> = params.iter().zip(step.iter()).map(|(p, s)| p + s).collect();
        bounds.project(&mut trial);
        let moved = trial
            .iter()
            .zip(&params)
            .map(|(t, p)| (t - p).abs())
            .fold(0.0, f64::max);
        let size = params.iter().fold(0.0, |acc: f64, p| acc.max(p.abs()));
        if moved <= settings.step_tolerance * (1.0 + size) {
            converged = true;
            break;
        }

        let trial_cost = problem.cost(&trial);
        if trial_cost.is_finite() && trial_cost < cost {
            let decrease = cost - trial_cost;
            params = trial;
            (jtj, jtr, cost) = linearize(problem, &params)?;
            lambda = (lambda / 10.0).max(MIN_LAMBDA);
            if decrease <= settings.cost_tolerance * (1.0 + cost) {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                // no descent direction left inside the box
                converged = true;
                break;
            }
        }
    }

    debug!(iterations, converged, cost, "levenberg-marquardt finished");
    Ok(LmReport {
        params,
        cost,
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fits `y = a·exp(b·x)`.
    struct Exponential {
        xs: Vec<f64>,
        ys: Vec<f64>,
    }

    impl LeastSquaresProblem for Exponential {
        fn num_params(&self) -> usize {
            2
        }

        fn accumulate(&self, p: &[f64], jtj: &mut DMatrix<f64>, jtr: &mut DVector<f64>) -> f64 {
            let mut cost = 0.0;
            for (&x, &y) in self.xs.iter().zip(&self.ys) {
                let e = (p[1] * x).exp();
                let r = p[0] * e - y;
                let j = [e, p[0] * x * e];
                for a in 0..2 {
                    jtr[a] += j[a] * r;
                    for b in 0..2 {
                        jtj[(a, b)] += j[a] * j[b];
                    }
                }
                cost += r * r;
            }
            cost
        }

        fn cost(&self, p: &[f64]) -> f64 {
            self.xs
                .iter()
                .zip(&self.ys)
                .map(|(&x, &y)| (p[0] * (p[1] * x).exp() - y).powi(2))
                .sum()
        }
    }

    fn exponential() -> Exponential {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let ys = xs.iter().map(|x| 2.0 * (-1.5 * x).exp()).collect();
        Exponential { xs, ys }
    }

    #[test]
    fn recovers_unconstrained_minimum() {
        let bounds = Bounds::new(vec![0.0, -5.0], vec![10.0, 5.0]);
        let report = solve_bounded(&exponential(), &bounds, &[1.0, 0.0], &LmSettings::default())
            .unwrap();
        assert!((report.params[0] - 2.0).abs() < 1e-6, "{:?}", report.params);
        assert!((report.params[1] + 1.5).abs() < 1e-6, "{:?}", report.params);
        assert!(report.converged);
    }

    #[test]
    fn respects_active_bound() {
        let bounds = Bounds::new(vec![0.0, -1.0], vec![10.0, 5.0]);
        let report = solve_bounded(&exponential(), &bounds, &[1.0, 0.0], &LmSettings::default())
            .unwrap();
        assert!(bounds.contains(&report.params));
        assert!((report.params[1] + 1.0).abs() < 1e-6, "{:?}", report.params);
    }

    #[test]
    fn exhausted_iterations_are_not_converged() {
        let bounds = Bounds::new(vec![0.0, -5.0], vec![10.0, 5.0]);
        let settings = LmSettings {
            max_iter: 1,
            ..LmSettings::default()
        };
        let report = solve_bounded(&exponential(), &bounds, &[1.0, 0.0], &settings).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn wrong_arity_is_an_error() {
        let bounds = Bounds::new(vec![0.0, -1.0], vec![10.0, 5.0]);
        assert!(solve_bounded(&exponential(), &bounds, &[1.0], &LmSettings::default()).is_err());
    }
}
