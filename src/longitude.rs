//! Longitude from per-day solar noon.
//!
//! Longitude is degrees east. The solar noon of day `d` at longitude `L`
//! is `(720 - EoT[d] - 4·(L - 15·G)) / 60` clock hours.

use tracing::debug;

use crate::angles::{DEGREES_PER_HOUR, MINUTES_PER_DEGREE};
use crate::convex::{ConvexProgram, Loss, Row, SolverSettings};
use crate::error::{GeometryError, GeometryResult};
use crate::stats::{nan_median, rms};
use crate::types::LongitudeEstimator;

pub const MIN_USABLE_DAYS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongitudeEstimate {
    pub longitude: f64,
    /// RMS solar-noon misfit over the days used, minutes.
    pub residual: f64,
    pub days_used: usize,
}

/// Modelled solar noon in clock hours.
pub fn modelled_solar_noon(longitude: f64, eot_minutes: f64, gmt_offset: f64) -> f64 {
    (720.0 - eot_minutes - MINUTES_PER_DEGREE * (longitude - DEGREES_PER_HOUR * gmt_offset)) / 60.0
}

fn usable_days(solar_noon: &[f64], eot: &[f64], days: &[bool]) -> GeometryResult<Vec<usize>> {
    let selected: Vec<usize> = (0..solar_noon.len())
        .filter(|&d| days[d] && solar_noon[d].is_finite() && eot[d].is_finite())
        .collect();
    if selected.len() < MIN_USABLE_DAYS {
        return Err(GeometryError::insufficient(format!(
            "{} usable solar-noon days, need at least {MIN_USABLE_DAYS}",
            selected.len()
        )));
    }
    Ok(selected)
}

fn check_lengths(solar_noon: &[f64], eot: &[f64], days: &[bool]) -> GeometryResult<()> {
    if eot.len() != solar_noon.len() || days.len() != solar_noon.len() {
        return Err(GeometryError::upstream(format!(
            "solar noon has {} days, equation of time {}, selector {}",
            solar_noon.len(),
            eot.len(),
            days.len()
        )));
    }
    Ok(())
}

fn summarize(
    longitude: f64,
    solar_noon: &[f64],
    eot: &[f64],
    gmt_offset: f64,
    selected: &[usize],
) -> LongitudeEstimate {
    let residual = rms(selected
        .iter()
        .map(|&d| 60.0 * (modelled_solar_noon(longitude, eot[d], gmt_offset) - solar_noon[d])));
    LongitudeEstimate {
        longitude,
        residual,
        days_used: selected.len(),
    }
}

/// Median of the per-day direct longitude `(720 - 60·sn - EoT)/4 + 15·G`.
pub fn calculate_longitude(
    solar_noon: &[f64],
    eot: &[f64],
    gmt_offset: f64,
    days: &[bool],
) -> GeometryResult<LongitudeEstimate> {
    check_lengths(solar_noon, eot, days)?;
    let selected = usable_days(solar_noon, eot, days)?;
    let longitude = nan_median(selected.iter().map(|&d| {
        (720.0 - 60.0 * solar_noon[d] - eot[d]) / MINUTES_PER_DEGREE + DEGREES_PER_HOUR * gmt_offset
    }))
    .ok_or_else(|| GeometryError::insufficient("no finite per-day longitude"))?;
    Ok(summarize(longitude, solar_noon, eot, gmt_offset, &selected))
}

/// Longitude minimising `Σ ρ(sn_model(L, d) - sn[d])` over the selected days.
///
/// # Errors
///
/// Returns `GeometryError::InsufficientData` with fewer than 30 usable days
/// and `GeometryError::Estimation` if the solver fails.
pub fn fit_longitude(
    solar_noon: &[f64],
    eot: &[f64],
    gmt_offset: f64,
    days: &[bool],
    loss: Loss,
) -> GeometryResult<LongitudeEstimate> {
    check_lengths(solar_noon, eot, days)?;
    let selected = usable_days(solar_noon, eot, days)?;
    let slope = -MINUTES_PER_DEGREE / 60.0;
    let rows = selected
        .iter()
        .map(|&d| {
            let intercept = modelled_solar_noon(0.0, eot[d], gmt_offset);
            Row::single(0, slope, solar_noon[d] - intercept)
        })
        .collect();
    let solution = ConvexProgram::new(1)
        .term(loss, 1.0, rows)
        .solve(&SolverSettings::default())?;
    let longitude = solution.x[0];
    if !longitude.is_finite() {
        return Err(GeometryError::estimation("longitude fit is not finite"));
    }
    debug!(?loss, iterations = solution.iterations, longitude, "longitude fitted");
    Ok(summarize(longitude, solar_noon, eot, gmt_offset, &selected))
}

/// Dispatches to the direct formula or the robust fit.
pub fn estimate_longitude(
    estimator: LongitudeEstimator,
    huber_delta: f64,
    solar_noon: &[f64],
    eot: &[f64],
    gmt_offset: f64,
    days: &[bool],
) -> GeometryResult<LongitudeEstimate> {
    match estimator {
        LongitudeEstimator::Calculated => calculate_longitude(solar_noon, eot, gmt_offset, days),
        LongitudeEstimator::FitL1 => fit_longitude(solar_noon, eot, gmt_offset, days, Loss::Norm1),
        LongitudeEstimator::FitL2 => fit_longitude(solar_noon, eot, gmt_offset, days, Loss::Norm2),
        LongitudeEstimator::FitHuber => fit_longitude(
            solar_noon,
            eot,
            gmt_offset,
            days,
            Loss::Huber { delta: huber_delta },
        ),
    }
}
