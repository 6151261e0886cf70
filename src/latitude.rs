//! Latitude from daylight hours and declination (Duffie & Beckman, eq. 1.6.11).

use tracing::debug;

use crate::angles::{deg_to_rad, rad_to_deg, DEGREES_PER_HOUR};
use crate::error::{GeometryError, GeometryResult};
use crate::stats::{nan_mad, nan_median};

/// Below this `|tan δ|` the day carries no latitude information.
pub const MIN_TAN_DECLINATION: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatitudeEstimate {
    pub latitude: f64,
    /// Median absolute deviation of the per-day latitudes, degrees.
    pub residual: f64,
    pub days_used: usize,
}

/// Latitude in degrees for one day, NaN when indeterminate.
///
/// `declination` is in radians, `daylight_hours` in hours.
pub fn day_latitude(daylight_hours: f64, declination: f64) -> f64 {
    let tan_decl = declination.tan();
    if !daylight_hours.is_finite()
        || !(0.0..=24.0).contains(&daylight_hours)
        || !tan_decl.is_finite()
        || tan_decl.abs() < MIN_TAN_DECLINATION
    {
        return f64::NAN;
    }
    let half_day = deg_to_rad(DEGREES_PER_HOUR / 2.0 * daylight_hours);
    rad_to_deg((-half_day.cos() / tan_decl).atan())
}

pub fn per_day_latitude(daylight_hours: &[f64], declination: &[f64]) -> Vec<f64> {
    daylight_hours
        .iter()
        .zip(declination)
        .map(|(&h, &decl)| day_latitude(h, decl))
        .collect()
}

/// Median of the per-day latitudes over usable days.
pub fn estimate_latitude(
    daylight_hours: &[f64],
    declination: &[f64],
    usable_flags: &[bool],
) -> GeometryResult<LatitudeEstimate> {
    if declination.len() != daylight_hours.len() || usable_flags.len() != daylight_hours.len() {
        return Err(GeometryError::upstream(format!(
            "daylight has {} days, declination {}, usable flags {}",
            daylight_hours.len(),
            declination.len(),
            usable_flags.len()
        )));
    }
    let values: Vec<f64> = per_day_latitude(daylight_hours, declination)
        .into_iter()
        .zip(usable_flags)
        .filter_map(|(v, &usable)| (usable && v.is_finite()).then_some(v))
        .collect();
    let latitude = nan_median(values.iter().copied())
        .ok_or_else(|| GeometryError::insufficient("no usable day yields a latitude"))?;
    let residual = nan_mad(values.iter().copied(), latitude).unwrap_or(f64::NAN);
    debug!(days = values.len(), latitude, residual, "latitude aggregated");
    Ok(LatitudeEstimate {
        latitude,
        residual,
        days_used: values.len(),
    })
}
