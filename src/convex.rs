//! Convex programs over one decision vector.
//!
//! A program is a weighted sum of loss terms, each applied to a set of
//! affine residual rows `a · x - target`. Equality constraints of the form
//! `y = x1 + x2` are expressed by substituting one side into the residual
//! rows, and yearly periodicity `x[i + 365] == x[i]` by folding the
//! decision vector onto one period. The solver is an iteratively
//! reweighted least-squares (majorise-minimise) scheme: every loss is
//! replaced by a quadratic upper bound at the current point and the
//! resulting normal equations are solved exactly.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{GeometryError, GeometryResult};

pub const DAYS_PER_YEAR: usize = 365;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Loss {
    /// `Σ r²`
    SumSquares,
    /// `‖r‖₂`
    Norm2,
    /// `Σ |r|`
    Norm1,
    /// `Σ huber(r)`, quadratic inside `delta`, linear outside.
    Huber { delta: f64 },
    /// Pinball loss `Σ ½|r| + (tau - ½) r`.
    Quantile { tau: f64 },
}

impl Loss {
    fn value(self, residuals: &[f64]) -> f64 {
        match self {
            Loss::SumSquares => residuals.iter().map(|r| r * r).sum(),
            Loss::Norm2 => residuals.iter().map(|r| r * r).sum::<f64>().sqrt(),
            Loss::Norm1 => residuals.iter().map(|r| r.abs()).sum(),
            Loss::Huber { delta } => residuals
                .iter()
                .map(|r| {
                    if r.abs() <= delta {
                        r * r
                    } else {
                        2.0 * delta * r.abs() - delta * delta
                    }
                })
                .sum(),
            Loss::Quantile { tau } => residuals
                .iter()
                .map(|r| 0.5 * r.abs() + (tau - 0.5) * r)
                .sum(),
        }
    }

    /// Curvature `c` and slope `l` of the bound `½ c r² + l r` at each residual.
    fn majorizer(self, residuals: &[f64], floor: f64) -> Vec<(f64, f64)> {
        match self {
            Loss::SumSquares => vec![(2.0, 0.0); residuals.len()],
            Loss::Norm2 => {
                let norm = residuals.iter().map(|r| r * r).sum::<f64>().sqrt();
                vec![(1.0 / norm.max(floor), 0.0); residuals.len()]
            }
            Loss::Norm1 => residuals
                .iter()
                .map(|r| (1.0 / r.abs().max(floor), 0.0))
                .collect(),
            Loss::Huber { delta } => residuals
                .iter()
                .map(|r| {
                    if r.abs() <= delta {
                        (2.0, 0.0)
                    } else {
                        (2.0 * delta / r.abs(), 0.0)
                    }
                })
                .collect(),
            Loss::Quantile { tau } => residuals
                .iter()
                .map(|r| (0.5 / r.abs().max(floor), tau - 0.5))
                .collect(),
        }
    }
}

/// Affine residual `Σ coefficient · x[index] - target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub entries: Vec<(usize, f64)>,
    pub target: f64,
}

impl Row {
    pub fn new(entries: Vec<(usize, f64)>, target: f64) -> Self {
        Self { entries, target }
    }

    pub fn single(index: usize, coefficient: f64, target: f64) -> Self {
        Self::new(vec![(index, coefficient)], target)
    }

    fn eval(&self, x: &[f64]) -> f64 {
        self.entries.iter().map(|&(i, a)| a * x[i]).sum::<f64>() - self.target
    }
}

#[derive(Debug, Clone)]
struct Term {
    loss: Loss,
    weight: f64,
    rows: Vec<Row>,
}

impl Term {
    fn residuals(&self, x: &[f64]) -> Vec<f64> {
        self.rows.iter().map(|row| row.eval(x)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub max_iter: usize,
    /// Relative change in the decision vector or objective that ends iteration.
    pub tolerance: f64,
    /// Residual magnitude, relative to the data scale, below which weights saturate.
    pub epsilon: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tolerance: 1e-9,
            epsilon: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct ConvexProgram {
    len: usize,
    period: Option<usize>,
    terms: Vec<Term>,
}

impl ConvexProgram {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            period: None,
            terms: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Constrains `x[i + period] == x[i]`. No effect when `len <= period`.
    pub fn periodic(mut self, period: usize) -> Self {
        self.period = Some(period);
        self
    }

    pub fn yearly_periodic(self) -> Self {
        self.periodic(DAYS_PER_YEAR)
    }

    /// Penalises second differences of the decision vector.
    pub fn smoothness(self, loss: Loss, weight: f64) -> Self {
        let rows = (0..self.len.saturating_sub(2))
            .map(|i| Row::new(vec![(i, 1.0), (i + 1, -2.0), (i + 2, 1.0)], 0.0))
            .collect();
        self.term(loss, weight, rows)
    }

    /// Adds `x[i] - y` residuals for each `(i, y)`.
    pub fn fit(self, loss: Loss, weight: f64, targets: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let rows = targets
            .into_iter()
            .map(|(i, y)| Row::single(i, 1.0, y))
            .collect();
        self.term(loss, weight, rows)
    }

    pub fn term(mut self, loss: Loss, weight: f64, rows: Vec<Row>) -> Self {
        if !rows.is_empty() && weight > 0.0 {
            self.terms.push(Term { loss, weight, rows });
        }
        self
    }

    pub fn objective(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|term| term.weight * term.loss.value(&term.residuals(x)))
            .sum()
    }

    fn reduced_len(&self) -> usize {
        match self.period {
            Some(p) if self.len > p => p,
            _ => self.len,
        }
    }

    fn expand(&self, z: &DVector<f64>) -> Vec<f64> {
        let n = z.len();
        (0..self.len).map(|i| z[i % n]).collect()
    }

    fn residual_scale(&self) -> f64 {
        self.terms
            .iter()
            .flat_map(|term| term.rows.iter().map(|row| row.target.abs()))
            .fold(1.0, f64::max)
    }

    fn normal_equations(&self, x: Option<&[f64]>, floor: f64) -> (DMatrix<f64>, DVector<f64>) {
        let n = self.reduced_len();
        let mut h = DMatrix::<f64>::zeros(n, n);
        let mut g = DVector::<f64>::zeros(n);
        for term in &self.terms {
            let weights = match x {
                Some(x) => term.loss.majorizer(&term.residuals(x), floor),
                None => vec![(2.0, 0.0); term.rows.len()],
            };
            for (row, &(c, l)) in term.rows.iter().zip(&weights) {
                let (c, l) = (term.weight * c, term.weight * l);
                for &(i, a) in &row.entries {
                    let fi = i % n;
                    g[fi] += a * (c * row.target - l);
                    for &(j, b) in &row.entries {
                        h[(fi, j % n)] += c * a * b;
                    }
                }
            }
        }
        (h, g)
    }

    pub fn solve(&self, settings: &SolverSettings) -> GeometryResult<Solution> {
        if self.len == 0 || self.terms.is_empty() {
            return Err(GeometryError::estimation("convex program has no variables or terms"));
        }
        let floor = settings.epsilon * self.residual_scale();

        let mut z = solve_normal(self.normal_equations(None, floor))?;
        let mut x = self.expand(&z);
        let mut objective = self.objective(&x);
        let mut best = (x.clone(), objective);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < settings.max_iter {
            iterations += 1;
            let next = solve_normal(self.normal_equations(Some(&x), floor))?;
            let step = (&next - &z).amax();
            let size = next.amax();
            z = next;
            x = self.expand(&z);
            let previous = objective;
            objective = self.objective(&x);
            if !objective.is_finite() {
                return Err(GeometryError::estimation("convex objective became non-finite"));
            }
            if objective < best.1 {
                best = (x.clone(), objective);
            }
            let small_step = step <= settings.tolerance * (1.0 + size);
            let flat = (previous - objective).abs() <= settings.tolerance * (1.0 + objective.abs());
            if small_step || (iterations > 1 && flat) {
                converged = true;
                break;
            }
        }

        debug!(
            variables = self.reduced_len(),
            iterations,
            converged,
            objective = best.1,
            "convex program solved"
        );
        Ok(Solution {
            x: best.0,
            objective: best.1,
            iterations,
            converged,
        })
    }
}

fn solve_normal((mut h, g): (DMatrix<f64>, DVector<f64>)) -> GeometryResult<DVector<f64>> {
    let n = h.nrows();
    let scale = (0..n).map(|i| h[(i, i)]).fold(0.0, f64::max);
    if !(scale.is_finite() && scale > 0.0) {
        return Err(GeometryError::estimation("normal equations are degenerate"));
    }
    for i in 0..n {
        h[(i, i)] += scale * 1e-13;
    }
    let z = match h.clone().cholesky() {
        Some(chol) => chol.solve(&g),
        None => h
            .lu()
            .solve(&g)
            .ok_or_else(|| GeometryError::estimation("normal equations are singular"))?,
    };
    if z.iter().all(|v| v.is_finite()) {
        Ok(z)
    } else {
        Err(GeometryError::estimation("convex solve produced non-finite values"))
    }
}
