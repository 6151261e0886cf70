use pv_geometry::angles::eot_by_day;
use pv_geometry::convex::Loss;
use pv_geometry::error::GeometryError;
use pv_geometry::longitude::*;
use pv_geometry::types::{EotMethod, LongitudeEstimator};

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

const L_REF: f64 = -76.6636;
const GMT: f64 = -5.0;

fn baltimore() -> (Vec<f64>, Vec<f64>) {
    let doy: Vec<u32> = (1..=365).collect();
    let eot = eot_by_day(&doy, EotMethod::Duffie);
    let sn = eot
        .iter()
        .map(|e| 12.0 - (e + 4.0 * (L_REF - 15.0 * GMT)) / 60.0)
        .collect();
    (sn, eot)
}

// ── Direct formula ──

#[test]
fn test_calculate_longitude_exact_data() {
    let (sn, eot) = baltimore();
    let est = calculate_longitude(&sn, &eot, GMT, &vec![true; 365]).unwrap();
    assert_approx!(est.longitude, L_REF, 1e-3);
    assert_approx!(est.residual, 0.0, 1e-6);
    assert_eq!(est.days_used, 365);
}

#[test]
fn test_calculate_longitude_skips_nan_days() {
    let (mut sn, eot) = baltimore();
    for d in (0..365).step_by(3) {
        sn[d] = f64::NAN;
    }
    let est = calculate_longitude(&sn, &eot, GMT, &vec![true; 365]).unwrap();
    assert_approx!(est.longitude, L_REF, 1e-3);
    assert_eq!(est.days_used, 365 - 122);
}

// ── Convex fits ──

#[test]
fn test_fit_longitude_l2_exact_data() {
    let (sn, eot) = baltimore();
    let est = fit_longitude(&sn, &eot, GMT, &vec![true; 365], Loss::Norm2).unwrap();
    assert_approx!(est.longitude, L_REF, 1e-3);
}

#[test]
fn test_every_estimator_agrees_on_exact_data() {
    let (sn, eot) = baltimore();
    for &estimator in LongitudeEstimator::ALL {
        let est = estimate_longitude(estimator, 1.0, &sn, &eot, GMT, &vec![true; 365]).unwrap();
        assert_approx!(est.longitude, L_REF, 0.05);
    }
}

#[test]
fn test_l1_resists_outlier_days() {
    let (mut sn, eot) = baltimore();
    for d in 0..40 {
        sn[d * 9] += 1.0;
    }
    let days = vec![true; 365];
    let l1 = fit_longitude(&sn, &eot, GMT, &days, Loss::Norm1).unwrap();
    let l2 = fit_longitude(&sn, &eot, GMT, &days, Loss::Norm2).unwrap();
    let huber = fit_longitude(&sn, &eot, GMT, &days, Loss::Huber { delta: 0.1 }).unwrap();
    assert_approx!(l1.longitude, L_REF, 0.05);
    assert!((l2.longitude - L_REF).abs() > 1.0, "{}", l2.longitude);
    assert!((huber.longitude - L_REF).abs() < (l2.longitude - L_REF).abs());
}

#[test]
fn test_residual_reports_minutes() {
    let (mut sn, eot) = baltimore();
    // a uniform two minute delay shifts longitude half a degree west
    for v in sn.iter_mut() {
        *v += 2.0 / 60.0;
    }
    let est = fit_longitude(&sn, &eot, GMT, &vec![true; 365], Loss::Norm2).unwrap();
    assert_approx!(est.longitude, L_REF - 0.5, 1e-3);
    assert_approx!(est.residual, 0.0, 1e-3);
}

// ── Selection and errors ──

#[test]
fn test_day_selector_restricts_days() {
    let (mut sn, eot) = baltimore();
    let days: Vec<bool> = (0..365).map(|d| d < 100).collect();
    for v in sn.iter_mut().skip(100) {
        *v += 1.0;
    }
    let est = calculate_longitude(&sn, &eot, GMT, &days).unwrap();
    assert_approx!(est.longitude, L_REF, 1e-3);
    assert_eq!(est.days_used, 100);
}

#[test]
fn test_too_few_days_is_insufficient_data() {
    let (sn, eot) = baltimore();
    let days: Vec<bool> = (0..365).map(|d| d < MIN_USABLE_DAYS - 1).collect();
    for estimator in [LongitudeEstimator::Calculated, LongitudeEstimator::FitL1] {
        let err = estimate_longitude(estimator, 1.0, &sn, &eot, GMT, &days).unwrap_err();
        assert!(matches!(err, GeometryError::InsufficientData(_)), "{err}");
    }
}

#[test]
fn test_exactly_minimum_days_is_enough() {
    let (sn, eot) = baltimore();
    let days: Vec<bool> = (0..365).map(|d| d < MIN_USABLE_DAYS).collect();
    let est = calculate_longitude(&sn, &eot, GMT, &days).unwrap();
    assert_approx!(est.longitude, L_REF, 1e-3);
}

#[test]
fn test_length_mismatch_is_upstream_error() {
    let (sn, eot) = baltimore();
    let err = calculate_longitude(&sn, &eot[..100], GMT, &vec![true; 365]).unwrap_err();
    assert!(matches!(err, GeometryError::Upstream(_)), "{err}");
}
