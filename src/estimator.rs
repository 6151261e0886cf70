//! Orchestrates the estimators over one prepared dataset.
//!
//! Intermediates (envelope, masks, solar noon, daylight) are recomputed
//! from the borrowed data on demand. Only the `SystemGeometry` and the
//! diagnostics table persist between calls. A field that is already set,
//! whether supplied as a prior or estimated earlier, is never overwritten.

use tracing::info;

use crate::angles::{declination_by_day, declination_grid, eot_by_day, hour_angle_grid};
use crate::config::EstimatorConfig;
use crate::daylight::{self, SunriseSunsetOptimizer};
use crate::error::{GeometryError, GeometryResult};
use crate::latitude::{self, LatitudeEstimate};
use crate::longitude::{self, LongitudeEstimate};
use crate::orientation::{
    fit_mask, fit_orientation, OrientationFit, OrientationInputs, OrientationPriors,
    OrientationSettings,
};
use crate::report::{Quantity, ResultRow, ResultsTable};
use crate::seasonal::{self, SeasonalEnvelope};
use crate::types::{
    DayWindow, DaySelection, DaylightMethod, DaytimeMask, DeclinationMethod, EotMethod,
    LongitudeEstimator, PreparedData, QuantileParams, SystemGeometry,
};

/// Options of one longitude estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongitudeOptions {
    pub estimator: LongitudeEstimator,
    pub eot_method: EotMethod,
    pub day_selection: DaySelection,
}

impl From<&EstimatorConfig> for LongitudeOptions {
    fn from(config: &EstimatorConfig) -> Self {
        Self {
            estimator: config.estimator,
            eot_method: config.eot_method,
            day_selection: config.day_selection,
        }
    }
}

/// Priors and overrides for one orientation estimate.
///
/// Angles are degrees. `None` options fall back to the config.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationRequest {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub tilt: Option<f64>,
    pub azimuth: Option<f64>,
    pub day_window: Option<DayWindow>,
    pub quantile_params: Option<QuantileParams>,
}

pub struct GeometryEstimator<'a> {
    data: &'a PreparedData,
    config: EstimatorConfig,
    geometry: SystemGeometry,
    results: ResultsTable,
    optimizer: Option<&'a dyn SunriseSunsetOptimizer>,
}

impl<'a> GeometryEstimator<'a> {
    /// # Errors
    ///
    /// Returns `GeometryError::Configuration` listing every invalid option.
    pub fn new(data: &'a PreparedData, config: EstimatorConfig) -> GeometryResult<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(GeometryError::configuration(joined.join("; ")));
        }
        Ok(Self {
            data,
            config,
            geometry: SystemGeometry::default(),
            results: ResultsTable::new(),
            optimizer: None,
        })
    }

    /// Marks the given fields as known.
    pub fn with_priors(mut self, priors: SystemGeometry) -> Self {
        self.geometry = priors;
        self
    }

    pub fn with_optimizer(mut self, optimizer: &'a dyn SunriseSunsetOptimizer) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn data(&self) -> &PreparedData {
        self.data
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn geometry(&self) -> SystemGeometry {
        self.geometry
    }

    pub fn results(&self) -> &ResultsTable {
        &self.results
    }

    pub fn envelope(&self) -> SeasonalEnvelope {
        seasonal::fit_envelope(self.data.matrix(), self.data.clear_flags())
    }

    /// Daytime mask for the orientation fit: the fixed threshold when
    /// configured, else the adaptive one.
    pub fn daytime_mask(&self, params: QuantileParams) -> GeometryResult<DaytimeMask> {
        let matrix = self.data.matrix();
        match self.config.daytime_threshold {
            Some(threshold) => Ok(seasonal::fixed_daytime_mask(matrix, threshold)),
            None => {
                let thresholds = seasonal::fit_threshold(matrix, params)?;
                Ok(seasonal::daytime_mask(matrix, &thresholds))
            }
        }
    }

    /// Mask of lit samples used for sunrise and sunset detection.
    pub fn rise_set_mask(&self) -> DaytimeMask {
        let matrix = self.data.matrix();
        match self.config.daytime_threshold {
            Some(threshold) => seasonal::fixed_daytime_mask(matrix, threshold),
            None => seasonal::relative_daytime_mask(matrix, self.config.rise_set_fraction),
        }
    }

    pub fn solar_noon(&self) -> GeometryResult<Vec<f64>> {
        daylight::solar_noon(
            self.config.solar_noon_method,
            self.data,
            &self.rise_set_mask(),
            self.optimizer,
        )
    }

    pub fn daylight_hours(&self, method: DaylightMethod) -> GeometryResult<Vec<f64>> {
        daylight::daylight_hours(method, self.data, &self.rise_set_mask(), self.optimizer)
    }

    fn longitude_from(
        &self,
        solar_noon: &[f64],
        options: LongitudeOptions,
    ) -> GeometryResult<LongitudeEstimate> {
        let eot = eot_by_day(self.data.day_of_year(), options.eot_method);
        let days = options
            .day_selection
            .select(self.data.clear_flags(), self.data.usable_flags());
        longitude::estimate_longitude(
            options.estimator,
            self.config.huber_delta,
            solar_noon,
            &eot,
            self.data.gmt_offset(),
            &days,
        )
    }

    fn latitude_from(
        &self,
        daylight_hours: &[f64],
        declination_method: DeclinationMethod,
    ) -> GeometryResult<LatitudeEstimate> {
        let decl = declination_by_day(self.data.day_of_year(), declination_method);
        latitude::estimate_latitude(daylight_hours, &decl, self.data.usable_flags())
    }

    fn longitude_row(&self, options: LongitudeOptions, estimate: &LongitudeEstimate) -> ResultRow {
        ResultRow {
            estimator: Some(options.estimator),
            eot_method: Some(options.eot_method),
            solar_noon_method: Some(self.config.solar_noon_method),
            day_selection: Some(options.day_selection),
            ..ResultRow::new(Quantity::Longitude, estimate.longitude, estimate.residual)
        }
    }

    fn latitude_row(
        &self,
        method: DaylightMethod,
        declination_method: DeclinationMethod,
        estimate: &LatitudeEstimate,
    ) -> ResultRow {
        ResultRow {
            daylight_method: Some(method),
            declination_method: Some(declination_method),
            ..ResultRow::new(Quantity::Latitude, estimate.latitude, estimate.residual)
        }
    }

    /// Estimates longitude in degrees east unless it is already known.
    ///
    /// # Errors
    ///
    /// Propagates `InsufficientData` when fewer than 30 selected days have a
    /// solar noon, and solver or optimizer errors.
    pub fn estimate_longitude(&mut self, options: LongitudeOptions) -> GeometryResult<f64> {
        if let Some(longitude) = self.geometry.longitude {
            return Ok(longitude);
        }
        let solar_noon = self.solar_noon()?;
        let estimate = self.longitude_from(&solar_noon, options)?;
        info!(
            longitude = estimate.longitude,
            residual_min = estimate.residual,
            estimator = options.estimator.name(),
            eot = options.eot_method.name(),
            days = estimate.days_used,
            "longitude estimated"
        );
        self.results.push(self.longitude_row(options, &estimate));
        self.geometry.longitude = Some(estimate.longitude);
        Ok(estimate.longitude)
    }

    /// Latitude in degrees north from daylight hours, unless already known.
    pub fn estimate_latitude(&mut self, method: DaylightMethod) -> GeometryResult<f64> {
        if let Some(latitude) = self.geometry.latitude {
            return Ok(latitude);
        }
        let hours = self.daylight_hours(method)?;
        let declination_method = self.config.declination_method;
        let estimate = self.latitude_from(&hours, declination_method)?;
        info!(
            latitude = estimate.latitude,
            mad = estimate.residual,
            daylight = method.name(),
            days = estimate.days_used,
            "latitude estimated"
        );
        self.results
            .push(self.latitude_row(method, declination_method, &estimate));
        self.geometry.latitude = Some(estimate.latitude);
        Ok(estimate.latitude)
    }

    /// Fills tilt, azimuth and, when unknown, latitude.
    ///
    /// Values in `request` act as priors for fields not yet known. Missing
    /// longitude is estimated first. Missing latitude comes from daylight
    /// hours, or from the joint fit when `fit_latitude` is set.
    ///
    /// A failed call leaves the geometry and the results table as they were.
    ///
    /// # Errors
    ///
    /// - `GeometryError::Configuration` when `request` supplies latitude,
    ///   tilt and azimuth together.
    /// - `GeometryError::InsufficientData` when no sample survives the fit
    ///   mask, and errors from the longitude or latitude prerequisites.
    pub fn estimate_orientation(
        &mut self,
        request: OrientationRequest,
    ) -> GeometryResult<SystemGeometry> {
        if request.latitude.is_some() && request.tilt.is_some() && request.azimuth.is_some() {
            return Err(GeometryError::configuration(
                "orientation requested with latitude, tilt and azimuth all supplied",
            ));
        }
        let geometry = self.geometry;
        let rows = self.results.len();
        let outcome = self.orientation_with(request);
        if outcome.is_err() {
            self.geometry = geometry;
            self.results.truncate(rows);
        }
        outcome
    }

    fn orientation_with(&mut self, request: OrientationRequest) -> GeometryResult<SystemGeometry> {
        let g = &mut self.geometry;
        g.longitude = g.longitude.or(request.longitude);
        g.latitude = g.latitude.or(request.latitude);
        g.tilt = g.tilt.or(request.tilt);
        g.azimuth = g.azimuth.or(request.azimuth);
        if g.latitude.is_some() && g.tilt.is_some() && g.azimuth.is_some() {
            return Ok(*g);
        }

        let longitude = self.estimate_longitude(LongitudeOptions::from(&self.config))?;
        if !self.config.fit_latitude {
            self.estimate_latitude(self.config.daylight_method)?;
        }

        let day_window = request.day_window.or(self.config.day_window);
        let params = request.quantile_params.unwrap_or(self.config.quantile_params);
        let fit = self.fit_orientation_at(longitude, day_window, params)?;

        let g = &mut self.geometry;
        let mut fitted = Vec::new();
        if g.latitude.is_none() {
            g.latitude = Some(fit.latitude);
            fitted.push((Quantity::Latitude, fit.latitude));
        }
        if g.tilt.is_none() {
            g.tilt = Some(fit.tilt);
            fitted.push((Quantity::Tilt, fit.tilt));
        }
        if g.azimuth.is_none() {
            g.azimuth = Some(fit.azimuth);
            fitted.push((Quantity::Azimuth, fit.azimuth));
        }
        info!(
            tilt = fit.tilt,
            azimuth = fit.azimuth,
            latitude = fit.latitude,
            residual = fit.residual,
            samples = fit.n_samples,
            "orientation estimated"
        );
        for (quantity, value) in fitted {
            self.results.push(ResultRow {
                eot_method: Some(self.config.eot_method),
                declination_method: Some(self.config.declination_method),
                day_range: day_window,
                initial_values: Some(fit.initial_values),
                ..ResultRow::new(quantity, value, fit.residual)
            });
        }
        Ok(self.geometry)
    }

    fn fit_orientation_at(
        &self,
        longitude: f64,
        day_window: Option<DayWindow>,
        params: QuantileParams,
    ) -> GeometryResult<OrientationFit> {
        let data = self.data;
        let doy = data.day_of_year();
        let samples = data.samples_per_day();
        let hour_angle = hour_angle_grid(
            doy,
            samples,
            data.sample_rate_min(),
            longitude,
            data.gmt_offset(),
            self.config.eot_method,
        );
        let declination = declination_grid(doy, samples, self.config.declination_method);
        let envelope = self.envelope();
        let daytime = self.daytime_mask(params)?;
        let mask = fit_mask(
            &daytime,
            data.clear_flags(),
            data.usable_flags(),
            doy,
            day_window,
        );
        let inputs = OrientationInputs {
            matrix: data.matrix(),
            hour_angle: &hour_angle,
            declination: &declination,
            fit_mask: &mask,
            envelope_peak: envelope.peak(),
        };
        let priors = OrientationPriors {
            latitude: self.geometry.latitude,
            tilt: self.geometry.tilt,
            azimuth: self.geometry.azimuth,
        };
        let settings = OrientationSettings {
            initial_values: self.config.initial_values,
            n_random: self.config.n_random,
            seed: self.config.seed,
            ..OrientationSettings::default()
        };
        fit_orientation(&inputs, &priors, &settings)
    }

    /// Latitude, then longitude, then orientation.
    pub fn estimate_all(
        &mut self,
        day_window: Option<DayWindow>,
        quantile_params: Option<QuantileParams>,
    ) -> GeometryResult<SystemGeometry> {
        if !self.config.fit_latitude {
            self.estimate_latitude(self.config.daylight_method)?;
        }
        self.estimate_longitude(LongitudeOptions::from(&self.config))?;
        self.estimate_orientation(OrientationRequest {
            day_window,
            quantile_params,
            ..OrientationRequest::default()
        })
    }

    /// Adds one longitude row per estimator, EoT method and day selection.
    ///
    /// Failing combinations are recorded with a NaN value and their error.
    /// The geometry is left untouched.
    pub fn sweep_longitude(&mut self) -> &ResultsTable {
        let solar_noon = self.solar_noon();
        for &estimator in LongitudeEstimator::ALL {
            for &eot_method in EotMethod::ALL {
                for &day_selection in DaySelection::ALL {
                    let options = LongitudeOptions {
                        estimator,
                        eot_method,
                        day_selection,
                    };
                    let row = match solar_noon
                        .as_ref()
                        .map_err(Clone::clone)
                        .and_then(|sn| self.longitude_from(sn, options))
                    {
                        Ok(estimate) => self.longitude_row(options, &estimate),
                        Err(err) => ResultRow {
                            estimator: Some(estimator),
                            eot_method: Some(eot_method),
                            solar_noon_method: Some(self.config.solar_noon_method),
                            day_selection: Some(day_selection),
                            ..ResultRow::failed(Quantity::Longitude, err)
                        },
                    };
                    self.results.push(row);
                }
            }
        }
        &self.results
    }

    /// Adds one latitude row per daylight and declination method.
    pub fn sweep_latitude(&mut self) -> &ResultsTable {
        for &method in DaylightMethod::ALL {
            let hours = self.daylight_hours(method);
            for &declination_method in DeclinationMethod::ALL {
                let row = match hours
                    .as_ref()
                    .map_err(Clone::clone)
                    .and_then(|h| self.latitude_from(h, declination_method))
                {
                    Ok(estimate) => self.latitude_row(method, declination_method, &estimate),
                    Err(err) => ResultRow {
                        daylight_method: Some(method),
                        declination_method: Some(declination_method),
                        ..ResultRow::failed(Quantity::Latitude, err)
                    },
                };
                self.results.push(row);
            }
        }
        &self.results
    }
}
