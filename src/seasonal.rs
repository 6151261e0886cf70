//! Seasonal baselines fitted across days: the peak-power envelope and the
//! adaptive daytime threshold.

use ndarray::{Array2, ArrayView1, Axis};
use tracing::{debug, warn};

use crate::convex::{ConvexProgram, Loss, Row, SolverSettings};
use crate::error::{GeometryError, GeometryResult};
use crate::stats::quantile_sorted;
use crate::types::{DaytimeMask, QuantileParams};

pub const ENVELOPE_SMOOTHNESS_WEIGHT: f64 = 10.0;
pub const THRESHOLD_SMOOTHNESS_WEIGHT: f64 = 1e6;

/// Smooth, yearly-periodic upper envelope of daily peak power.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalEnvelope {
    pub values: Vec<f64>,
    /// True when the solver failed and the envelope is the flat overall peak.
    pub fallback: bool,
}

impl SeasonalEnvelope {
    pub fn peak(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

pub fn daily_max(matrix: &Array2<f64>) -> Vec<f64> {
    matrix
        .axis_iter(Axis(1))
        .map(|col| col.iter().copied().fold(0.0, f64::max))
        .collect()
}

pub fn column_quantile(column: ArrayView1<f64>, q: f64) -> f64 {
    let mut values: Vec<f64> = column.iter().copied().collect();
    values.sort_by(f64::total_cmp);
    quantile_sorted(&values, q).unwrap_or(0.0)
}

pub fn daily_quantile(matrix: &Array2<f64>, q: f64) -> Vec<f64> {
    matrix
        .axis_iter(Axis(1))
        .map(|col| column_quantile(col, q))
        .collect()
}

/// Fits the seasonal envelope of daily peaks.
///
/// Solves `min 10·‖Δ²s1‖₂ + ‖(y - s1)[clear]‖₂` with `s1` yearly periodic
/// when there are more than 365 days. Falls back to the overall peak when
/// there is nothing to anchor the fit or the solver fails.
pub fn fit_envelope(matrix: &Array2<f64>, clear_flags: &[bool]) -> SeasonalEnvelope {
    let y = daily_max(matrix);
    let peak = y.iter().copied().fold(0.0, f64::max);
    let flat = || SeasonalEnvelope {
        values: vec![peak; y.len()],
        fallback: true,
    };
    if peak <= 0.0 {
        warn!("no positive power, envelope is flat");
        return flat();
    }
    let anchors: Vec<(usize, f64)> = y
        .iter()
        .zip(clear_flags)
        .enumerate()
        .filter(|&(_, (_, &clear))| clear)
        .map(|(d, (&v, _))| (d, v / peak))
        .collect();
    if anchors.is_empty() {
        warn!("no clear days to anchor the envelope, using flat peak");
        return flat();
    }

    let program = ConvexProgram::new(y.len())
        .smoothness(Loss::Norm2, ENVELOPE_SMOOTHNESS_WEIGHT)
        .fit(Loss::Norm2, 1.0, anchors)
        .yearly_periodic();
    match program.solve(&SolverSettings::default()) {
        Ok(solution) => {
            debug!(
                days = y.len(),
                iterations = solution.iterations,
                "envelope fitted"
            );
            SeasonalEnvelope {
                values: solution.x.iter().map(|v| (v * peak).max(0.0)).collect(),
                fallback: false,
            }
        }
        Err(err) => {
            warn!(%err, "envelope fit failed, using flat peak");
            flat()
        }
    }
}

/// Fits the per-day adaptive daytime threshold.
///
/// `y[d]` is the `q`-quantile of day `d`. The threshold `x2` solves
/// `min ½‖x1‖₁ + (t - ½)·Σx1 + 10⁶·‖Δ²x2‖₂²` subject to `x1 + x2 = y`,
/// yearly periodic over more than 365 days.
pub fn fit_threshold(matrix: &Array2<f64>, params: QuantileParams) -> GeometryResult<Vec<f64>> {
    let y = daily_quantile(matrix, params.q);
    let scale = y.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()));
    if scale == 0.0 {
        return Ok(vec![0.0; y.len()]);
    }
    // x1 = y - x2 enters as the residual of the quantile loss
    let rows = y
        .iter()
        .enumerate()
        .map(|(d, &v)| Row::single(d, -1.0, -v / scale))
        .collect();
    let program = ConvexProgram::new(y.len())
        .term(Loss::Quantile { tau: params.t }, 1.0, rows)
        .smoothness(Loss::SumSquares, THRESHOLD_SMOOTHNESS_WEIGHT)
        .yearly_periodic();
    let solution = program.solve(&SolverSettings::default())?;
    let threshold: Vec<f64> = solution.x.iter().map(|v| v * scale).collect();
    if threshold.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::estimation("daytime threshold is not finite"));
    }
    debug!(
        days = y.len(),
        iterations = solution.iterations,
        "daytime threshold fitted"
    );
    Ok(threshold)
}

/// Marks `P[s, d] > threshold[d]`.
pub fn daytime_mask(matrix: &Array2<f64>, thresholds: &[f64]) -> DaytimeMask {
    Array2::from_shape_fn(matrix.dim(), |(s, d)| matrix[(s, d)] > thresholds[d])
}

pub fn fixed_daytime_mask(matrix: &Array2<f64>, threshold: f64) -> DaytimeMask {
    matrix.mapv(|p| p > threshold)
}

/// Marks samples above a fraction of their day's peak; dark days stay false.
pub fn relative_daytime_mask(matrix: &Array2<f64>, fraction: f64) -> DaytimeMask {
    let thresholds: Vec<f64> = daily_max(matrix)
        .into_iter()
        .map(|peak| if peak > 0.0 { fraction * peak } else { f64::INFINITY })
        .collect();
    daytime_mask(matrix, &thresholds)
}
