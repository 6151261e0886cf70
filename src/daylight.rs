use ndarray::Axis;
use tracing::debug;

use crate::error::{GeometryError, GeometryResult};
use crate::types::{DaylightMethod, DaytimeMask, PreparedData, SolarNoonMethod, SunriseSunset};

/// External estimator of per-day sunrise and sunset, in local clock hours.
pub trait SunriseSunsetOptimizer {
    fn estimate(&self, data: &PreparedData) -> GeometryResult<SunriseSunset>;
}

/// Sunrise and sunset from the first and last daytime sample of each day.
///
/// The transition is placed half a sample before the first and after the
/// last lit sample. Days without daytime samples are NaN.
pub fn rise_set_from_mask(mask: &DaytimeMask, sample_rate_min: u32) -> SunriseSunset {
    let step = sample_rate_min as f64 / 60.0;
    let (sunrise, sunset) = mask
        .axis_iter(Axis(1))
        .map(|col| {
            let first = col.iter().position(|&lit| lit);
            let last = col.iter().rposition(|&lit| lit);
            match (first, last) {
                (Some(f), Some(l)) => (
                    ((f as f64 - 0.5) * step).clamp(0.0, 24.0),
                    ((l as f64 + 0.5) * step).clamp(0.0, 24.0),
                ),
                _ => (f64::NAN, f64::NAN),
            }
        })
        .unzip();
    SunriseSunset { sunrise, sunset }
}

/// Solar noon as the energy-weighted mean clock hour of each day.
pub fn energy_center_of_mass(data: &PreparedData) -> Vec<f64> {
    data.matrix()
        .axis_iter(Axis(1))
        .map(|col| {
            let (weighted, total) = col
                .iter()
                .enumerate()
                .filter(|&(_, &p)| p > 0.0)
                .fold((0.0, 0.0), |(w, t), (s, &p)| {
                    (w + data.sample_hour(s) * p, t + p)
                });
            if total > 0.0 {
                weighted / total
            } else {
                f64::NAN
            }
        })
        .collect()
}

fn optimized(
    data: &PreparedData,
    optimizer: Option<&dyn SunriseSunsetOptimizer>,
) -> GeometryResult<SunriseSunset> {
    let optimizer = optimizer.ok_or_else(|| {
        GeometryError::configuration("optimized_estimates requires a sunrise/sunset optimizer")
    })?;
    let estimate = optimizer.estimate(data)?;
    let days = data.num_days();
    if estimate.sunrise.len() != days || estimate.sunset.len() != days {
        return Err(GeometryError::upstream(format!(
            "optimizer returned {}/{} values for {days} days",
            estimate.sunrise.len(),
            estimate.sunset.len()
        )));
    }
    Ok(estimate)
}

fn sanitize(values: Vec<f64>, usable_flags: &[bool]) -> Vec<f64> {
    values
        .into_iter()
        .zip(usable_flags)
        .map(|(v, &usable)| {
            if usable && v.is_finite() && (0.0..=24.0).contains(&v) {
                v
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Per-day solar noon in clock hours, NaN where indeterminate or unusable.
pub fn solar_noon(
    method: SolarNoonMethod,
    data: &PreparedData,
    night_mask: &DaytimeMask,
    optimizer: Option<&dyn SunriseSunsetOptimizer>,
) -> GeometryResult<Vec<f64>> {
    let values = match method {
        SolarNoonMethod::RiseSetAverage => {
            rise_set_from_mask(night_mask, data.sample_rate_min()).solar_noon()
        }
        SolarNoonMethod::EnergyCom => energy_center_of_mass(data),
        SolarNoonMethod::OptimizedEstimates => optimized(data, optimizer)?.solar_noon(),
    };
    let values = sanitize(values, data.usable_flags());
    debug!(
        method = method.name(),
        days = values.iter().filter(|v| v.is_finite()).count(),
        "solar noon computed"
    );
    Ok(values)
}

/// Per-day daylight hours, NaN where indeterminate or unusable.
pub fn daylight_hours(
    method: DaylightMethod,
    data: &PreparedData,
    night_mask: &DaytimeMask,
    optimizer: Option<&dyn SunriseSunsetOptimizer>,
) -> GeometryResult<Vec<f64>> {
    let values = match method {
        DaylightMethod::SunriseSunset => {
            rise_set_from_mask(night_mask, data.sample_rate_min()).daylight_hours()
        }
        DaylightMethod::OptimizedEstimates => optimized(data, optimizer)?.daylight_hours(),
    };
    let values = sanitize(values, data.usable_flags());
    debug!(
        method = method.name(),
        days = values.iter().filter(|v| v.is_finite()).count(),
        "daylight hours computed"
    );
    Ok(values)
}
