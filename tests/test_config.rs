use std::path::Path;

use pv_geometry::error::GeometryError;
use pv_geometry::types::{
    DayWindow, DaySelection, DaylightMethod, DeclinationMethod, EotMethod, LongitudeEstimator,
    SolarNoonMethod,
};
use pv_geometry::EstimatorConfig;

// ── TOML parsing ──

#[test]
fn test_parses_every_option() {
    let cfg = EstimatorConfig::from_toml_str(
        r#"
        estimator = "fit_huber"
        eot_method = "da_rosa"
        day_selection = "cloudy"
        declination_method = "spencer"
        solar_noon_method = "energy_com"
        daylight_method = "optimized_estimates"
        daytime_threshold = 0.25
        day_window = [335, 45]
        n_random = 4
        seed = 17
        huber_delta = 0.5
        rise_set_fraction = 0.01
        fit_latitude = true

        [quantile_params]
        t = 0.8
        q = 0.95

        [initial_values]
        latitude = -20.0
        tilt = 15.0
        azimuth = 180.0
        "#,
    )
    .unwrap();
    assert_eq!(cfg.estimator, LongitudeEstimator::FitHuber);
    assert_eq!(cfg.eot_method, EotMethod::DaRosa);
    assert_eq!(cfg.day_selection, DaySelection::Cloudy);
    assert_eq!(cfg.declination_method, DeclinationMethod::Spencer);
    assert_eq!(cfg.solar_noon_method, SolarNoonMethod::EnergyCom);
    assert_eq!(cfg.daylight_method, DaylightMethod::OptimizedEstimates);
    assert_eq!(cfg.daytime_threshold, Some(0.25));
    assert_eq!(cfg.day_window, Some(DayWindow::new(335, 45)));
    assert_eq!(cfg.n_random, 4);
    assert_eq!(cfg.seed, 17);
    assert!(cfg.fit_latitude);
    assert_eq!(cfg.quantile_params.t, 0.8);
    assert_eq!(cfg.initial_values.azimuth, 180.0);
    assert!(cfg.validate().is_empty());
}

#[test]
fn test_daylight_method_accepts_both_spellings() {
    for name in ["sunrise-sunset", "sunrise_sunset"] {
        let cfg =
            EstimatorConfig::from_toml_str(&format!("daylight_method = \"{name}\"")).unwrap();
        assert_eq!(cfg.daylight_method, DaylightMethod::SunriseSunset);
    }
}

#[test]
fn test_partial_table_keeps_defaults() {
    let cfg = EstimatorConfig::from_toml_str("[quantile_params]\nt = 0.7\n").unwrap();
    assert_eq!(cfg.quantile_params.t, 0.7);
    assert_eq!(cfg.quantile_params.q, 0.9);
    assert_eq!(cfg.estimator, LongitudeEstimator::FitL1);
}

#[test]
fn test_unknown_field_is_rejected() {
    let err = EstimatorConfig::from_toml_str("estimater = \"fit_l1\"").unwrap_err();
    assert_eq!(err.field, "toml");
    assert!(err.message.contains("estimater"), "{}", err.message);
}

#[test]
fn test_unknown_option_value_is_rejected() {
    assert!(EstimatorConfig::from_toml_str("estimator = \"fit_l3\"").is_err());
    assert!(EstimatorConfig::from_toml_str("day_window = [1]").is_err());
}

#[test]
fn test_missing_file_is_reported() {
    let err = EstimatorConfig::from_toml_file(Path::new("/nonexistent/geometry.toml"))
        .unwrap_err();
    assert_eq!(err.field, "config");
    assert!(err.message.contains("geometry.toml"));
}

// ── Option names ──

#[test]
fn test_names_round_trip_through_from_str() {
    for &e in LongitudeEstimator::ALL {
        assert_eq!(e.name().parse::<LongitudeEstimator>().unwrap(), e);
    }
    for &m in SolarNoonMethod::ALL {
        assert_eq!(m.to_string().parse::<SolarNoonMethod>().unwrap(), m);
    }
    assert_eq!(
        "sunrise_sunset".parse::<DaylightMethod>().unwrap(),
        DaylightMethod::SunriseSunset
    );
}

#[test]
fn test_from_str_lists_valid_names() {
    let err = "julian".parse::<EotMethod>().unwrap_err();
    assert!(matches!(err, GeometryError::Configuration(_)));
    let text = err.to_string();
    assert!(text.contains("duffie") && text.contains("da_rosa"), "{text}");
}

// ── Validation ──

#[test]
fn test_validate_rejects_out_of_range_values() {
    let cfg = EstimatorConfig {
        daytime_threshold: Some(-1.0),
        day_window: Some(DayWindow::new(0, 400)),
        rise_set_fraction: 1.0,
        ..EstimatorConfig::default()
    };
    let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
    assert_eq!(
        fields,
        vec!["daytime_threshold", "day_window", "day_window", "rise_set_fraction"]
    );
}

#[test]
fn test_config_error_converts_to_configuration() {
    let err = EstimatorConfig::from_toml_str("seed = -1").unwrap_err();
    let geometry: GeometryError = err.into();
    assert!(matches!(geometry, GeometryError::Configuration(_)));
}
