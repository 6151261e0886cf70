use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::types::{
    DayWindow, DaySelection, DaylightMethod, DeclinationMethod, EotMethod, InitialValues,
    LongitudeEstimator, QuantileParams, SolarNoonMethod,
};

/// Options recognised by the orchestrator.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    pub estimator: LongitudeEstimator,
    pub eot_method: EotMethod,
    pub day_selection: DaySelection,
    pub declination_method: DeclinationMethod,
    pub solar_noon_method: SolarNoonMethod,
    pub daylight_method: DaylightMethod,
    /// Fixed daytime threshold in power units; `None` fits the adaptive one.
    pub daytime_threshold: Option<f64>,
    pub day_window: Option<DayWindow>,
    pub quantile_params: QuantileParams,
    /// Extra random starts for the orientation fit. With the default of
    /// zero, an array facing far from `initial_values.azimuth` may only be
    /// found by the opposite-azimuth retry made when the fit lies flat.
    pub n_random: usize,
    pub seed: u64,
    /// Huber transition for `fit_huber`, hours of solar-noon misfit.
    pub huber_delta: f64,
    /// Fraction of the daily peak above which a sample counts as lit for
    /// sunrise/sunset detection.
    pub rise_set_fraction: f64,
    /// Fit latitude jointly with tilt and azimuth instead of from daylight.
    ///
    /// Power alone pins only the plane normal, so the joint fit can trade
    /// latitude against tilt. Prefer the daylight estimate when available.
    pub fit_latitude: bool,
    pub initial_values: InitialValues,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            estimator: LongitudeEstimator::default(),
            eot_method: EotMethod::default(),
            day_selection: DaySelection::default(),
            declination_method: DeclinationMethod::default(),
            solar_noon_method: SolarNoonMethod::default(),
            daylight_method: DaylightMethod::default(),
            daytime_threshold: None,
            day_window: None,
            quantile_params: QuantileParams::default(),
            n_random: 0,
            seed: 0,
            huber_delta: 1.0,
            rise_set_fraction: 0.001,
            fit_latitude: false,
            initial_values: InitialValues::default(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g. `"quantile_params.t"`).
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl From<ConfigError> for GeometryError {
    fn from(err: ConfigError) -> Self {
        GeometryError::configuration(err.to_string())
    }
}

impl EstimatorConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Returns every violated constraint, empty when the config is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError {
                    field: field.into(),
                    message: message.into(),
                });
            }
        };

        let qp = &self.quantile_params;
        check(qp.t > 0.0 && qp.t < 1.0, "quantile_params.t", "must be in (0, 1)");
        check(qp.q > 0.0 && qp.q < 1.0, "quantile_params.q", "must be in (0, 1)");
        if let Some(threshold) = self.daytime_threshold {
            check(
                threshold.is_finite() && threshold >= 0.0,
                "daytime_threshold",
                "must be finite and >= 0",
            );
        }
        if let Some(window) = self.day_window {
            check((1..=366).contains(&window.start), "day_window", "start must be in 1..=366");
            check((1..=366).contains(&window.end), "day_window", "end must be in 1..=366");
        }
        check(
            self.huber_delta.is_finite() && self.huber_delta > 0.0,
            "huber_delta",
            "must be > 0",
        );
        check(
            self.rise_set_fraction > 0.0 && self.rise_set_fraction < 1.0,
            "rise_set_fraction",
            "must be in (0, 1)",
        );
        let init = &self.initial_values;
        check(
            (-90.0..=90.0).contains(&init.latitude),
            "initial_values.latitude",
            "must be in [-90, 90]",
        );
        check(
            (0.0..=90.0).contains(&init.tilt),
            "initial_values.tilt",
            "must be in [0, 90]",
        );
        check(
            (-180.0..=180.0).contains(&init.azimuth),
            "initial_values.azimuth",
            "must be in [-180, 180]",
        );

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let errors = EstimatorConfig::default().validate();
        assert!(errors.is_empty(), "default should be valid: {errors:?}");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = EstimatorConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EstimatorConfig::default());
    }

    #[test]
    fn collects_every_violation() {
        let cfg = EstimatorConfig {
            quantile_params: QuantileParams { t: 1.5, q: 0.0 },
            huber_delta: -1.0,
            ..EstimatorConfig::default()
        };
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["quantile_params.t", "quantile_params.q", "huber_delta"]
        );
    }
}
