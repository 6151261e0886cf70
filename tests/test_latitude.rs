use pv_geometry::angles::{daylight_hours, declination_by_day};
use pv_geometry::error::GeometryError;
use pv_geometry::latitude::*;
use pv_geometry::types::DeclinationMethod;

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

fn year(latitude: f64) -> (Vec<f64>, Vec<f64>) {
    let doy: Vec<u32> = (1..=365).collect();
    let decl = declination_by_day(&doy, DeclinationMethod::Cooper);
    let hours = decl.iter().map(|&d| daylight_hours(latitude, d)).collect();
    (hours, decl)
}

#[test]
fn test_recovers_latitude_from_exact_daylight() {
    let (hours, decl) = year(37.0);
    let est = estimate_latitude(&hours, &decl, &vec![true; 365]).unwrap();
    assert_approx!(est.latitude, 37.0, 1e-6);
    assert_approx!(est.residual, 0.0, 1e-6);
}

#[test]
fn test_equinox_days_are_nan_and_skipped() {
    let (mut hours, mut decl) = year(37.0);
    for d in 0..20 {
        decl[d] = 0.0;
        hours[d] = 12.0;
    }
    let per_day = per_day_latitude(&hours, &decl);
    assert!(per_day[..20].iter().all(|v| v.is_nan()));
    let est = estimate_latitude(&hours, &decl, &vec![true; 365]).unwrap();
    assert_approx!(est.latitude, 37.0, 1.0);
    assert!(est.days_used < 345);
}

#[test]
fn test_negated_declination_mirrors_hemisphere() {
    let (hours, decl) = year(37.0);
    let south: Vec<f64> = decl.iter().map(|d| -d).collect();
    let est = estimate_latitude(&hours, &south, &vec![true; 365]).unwrap();
    assert_approx!(est.latitude, -37.0, 1e-6);
}

#[test]
fn test_complementary_daylight_mirrors_hemisphere() {
    let (hours, decl) = year(37.0);
    let south: Vec<f64> = hours.iter().map(|h| 24.0 - h).collect();
    let est = estimate_latitude(&south, &decl, &vec![true; 365]).unwrap();
    assert_approx!(est.latitude, -37.0, 1e-6);
}

#[test]
fn test_noisy_daylight_median_is_robust() {
    let (mut hours, decl) = year(45.0);
    for (d, h) in hours.iter_mut().enumerate() {
        // five minute sampling jitter, plus a few broken days
        let jitter = if d % 2 == 0 { 2.5 } else { -2.5 };
        *h += jitter / 60.0;
        if d % 50 == 0 {
            *h = 3.0;
        }
    }
    let est = estimate_latitude(&hours, &decl, &vec![true; 365]).unwrap();
    assert_approx!(est.latitude, 45.0, 1.0);
}

#[test]
fn test_unusable_days_are_ignored() {
    let (mut hours, decl) = year(20.0);
    let usable: Vec<bool> = (0..365).map(|d| d % 2 == 0).collect();
    for d in (1..365).step_by(2) {
        hours[d] = 1.0;
    }
    let est = estimate_latitude(&hours, &decl, &usable).unwrap();
    assert_approx!(est.latitude, 20.0, 1e-6);
}

#[test]
fn test_no_usable_day_is_insufficient_data() {
    let (hours, decl) = year(37.0);
    let err = estimate_latitude(&hours, &decl, &vec![false; 365]).unwrap_err();
    assert!(matches!(err, GeometryError::InsufficientData(_)), "{err}");
}
