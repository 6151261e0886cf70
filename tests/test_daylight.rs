use ndarray::Array2;

use pv_geometry::daylight::*;
use pv_geometry::error::{GeometryError, GeometryResult};
use pv_geometry::types::{DaylightMethod, PreparedData, SolarNoonMethod, SunriseSunset};

macro_rules! assert_approx {
    ($left:expr, $right:expr, $tol:expr) => {
        let (l, r) = ($left as f64, $right as f64);
        assert!(
            (l - r).abs() <= $tol,
            "assert_approx failed: left={}, right={}, diff={}, tol={}",
            l, r, (l - r).abs(), $tol
        );
    };
}

/// Hourly data, lit from 06:00 to 17:00 inclusive on every day but the last.
fn hourly(days: usize, usable: Vec<bool>) -> PreparedData {
    let m = Array2::from_shape_fn((24, days), |(s, d)| {
        if d + 1 < days && (6..=17).contains(&s) {
            1.0 + (s as f64 - 11.5).abs()
        } else {
            0.0
        }
    });
    let doy = (1..=days as u32).collect();
    PreparedData::new(m, 60, doy, vec![true; days], usable, 0.0).unwrap()
}

struct FixedOptimizer(SunriseSunset);

impl SunriseSunsetOptimizer for FixedOptimizer {
    fn estimate(&self, _data: &PreparedData) -> GeometryResult<SunriseSunset> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_rise_set_uses_half_sample_transitions() {
    let data = hourly(3, vec![true; 3]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let rs = rise_set_from_mask(&mask, 60);
    assert_approx!(rs.sunrise[0], 5.5, 1e-12);
    assert_approx!(rs.sunset[0], 17.5, 1e-12);
    assert!(rs.sunrise[2].is_nan() && rs.sunset[2].is_nan());
}

#[test]
fn test_rise_set_clamps_to_day() {
    let mask = Array2::from_elem((24, 1), true);
    let rs = rise_set_from_mask(&mask, 60);
    assert_eq!(rs.sunrise[0], 0.0);
    assert_eq!(rs.sunset[0], 24.0);
}

#[test]
fn test_solar_noon_rise_set_average() {
    let data = hourly(3, vec![true; 3]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let sn = solar_noon(SolarNoonMethod::RiseSetAverage, &data, &mask, None).unwrap();
    assert_approx!(sn[0], 11.5, 1e-12);
    assert!(sn[2].is_nan());
}

#[test]
fn test_solar_noon_energy_center_of_mass_symmetric_day() {
    let data = hourly(2, vec![true; 2]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let sn = solar_noon(SolarNoonMethod::EnergyCom, &data, &mask, None).unwrap();
    assert_approx!(sn[0], 11.5, 1e-12);
    assert!(sn[1].is_nan());
}

#[test]
fn test_daylight_hours_from_mask() {
    let data = hourly(3, vec![true; 3]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let h = daylight_hours(DaylightMethod::SunriseSunset, &data, &mask, None).unwrap();
    assert_approx!(h[0], 12.0, 1e-12);
}

#[test]
fn test_unusable_days_are_nan() {
    let data = hourly(3, vec![true, false, true]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let sn = solar_noon(SolarNoonMethod::RiseSetAverage, &data, &mask, None).unwrap();
    assert!(sn[0].is_finite());
    assert!(sn[1].is_nan());
}

#[test]
fn test_optimized_estimates_use_optimizer() {
    let data = hourly(3, vec![true; 3]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let optimizer = FixedOptimizer(SunriseSunset {
        sunrise: vec![6.0, 6.5, 30.0],
        sunset: vec![18.0, 18.0, 31.0],
    });
    let sn = solar_noon(SolarNoonMethod::OptimizedEstimates, &data, &mask, Some(&optimizer))
        .unwrap();
    assert_approx!(sn[0], 12.0, 1e-12);
    assert_approx!(sn[1], 12.25, 1e-12);
    // out of range
    assert!(sn[2].is_nan());
    let h = daylight_hours(DaylightMethod::OptimizedEstimates, &data, &mask, Some(&optimizer))
        .unwrap();
    assert_approx!(h[1], 11.5, 1e-12);
}

#[test]
fn test_optimized_estimates_without_optimizer_is_configuration_error() {
    let data = hourly(2, vec![true; 2]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let err = solar_noon(SolarNoonMethod::OptimizedEstimates, &data, &mask, None).unwrap_err();
    assert!(matches!(err, GeometryError::Configuration(_)), "{err}");
}

#[test]
fn test_optimizer_length_mismatch_is_upstream_error() {
    let data = hourly(3, vec![true; 3]);
    let mask = data.matrix().mapv(|p| p > 0.0);
    let optimizer = FixedOptimizer(SunriseSunset {
        sunrise: vec![6.0],
        sunset: vec![18.0],
    });
    let err = daylight_hours(DaylightMethod::OptimizedEstimates, &data, &mask, Some(&optimizer))
        .unwrap_err();
    assert!(matches!(err, GeometryError::Upstream(_)), "{err}");
}
