use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, GeometryResult};

/// Shape-(S, D) boolean grid; true where a sample counts as daytime.
pub type DaytimeMask = Array2<bool>;

/// Minutes in one day; the prepared grid always spans exactly one day per column.
pub const MINUTES_PER_DAY: u32 = 1440;

macro_rules! named_options {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = GeometryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name $(| $alias)* => Ok($ty::$variant),)+
                    _ => Err(GeometryError::configuration(format!(
                        "unknown {} \"{}\", expected one of: {}",
                        $what,
                        s,
                        [$($name),+].join(", ")
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongitudeEstimator {
    Calculated,
    #[default]
    FitL1,
    FitL2,
    FitHuber,
}

named_options!(LongitudeEstimator, "longitude estimator", {
    Calculated => "calculated",
    FitL1 => "fit_l1",
    FitL2 => "fit_l2",
    FitHuber => "fit_huber",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EotMethod {
    #[default]
    Duffie,
    DaRosa,
}

named_options!(EotMethod, "equation of time method", {
    Duffie => "duffie",
    DaRosa => "da_rosa",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaySelection {
    #[default]
    All,
    Clear,
    Cloudy,
}

named_options!(DaySelection, "day selection", {
    All => "all",
    Clear => "clear",
    Cloudy => "cloudy",
});

impl DaySelection {
    /// Per-day selector, always intersected with the usable flags.
    pub fn select(self, clear_flags: &[bool], usable_flags: &[bool]) -> Vec<bool> {
        clear_flags
            .iter()
            .zip(usable_flags)
            .map(|(&clear, &usable)| {
                usable
                    && match self {
                        DaySelection::All => true,
                        DaySelection::Clear => clear,
                        DaySelection::Cloudy => !clear,
                    }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclinationMethod {
    #[default]
    Cooper,
    Spencer,
}

named_options!(DeclinationMethod, "declination method", {
    Cooper => "cooper",
    Spencer => "spencer",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolarNoonMethod {
    #[default]
    RiseSetAverage,
    EnergyCom,
    OptimizedEstimates,
}

named_options!(SolarNoonMethod, "solar noon method", {
    RiseSetAverage => "rise_set_average",
    EnergyCom => "energy_com",
    OptimizedEstimates => "optimized_estimates",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DaylightMethod {
    #[default]
    #[serde(rename = "sunrise-sunset", alias = "sunrise_sunset")]
    SunriseSunset,
    #[serde(rename = "optimized_estimates")]
    OptimizedEstimates,
}

named_options!(DaylightMethod, "daylight method", {
    SunriseSunset => "sunrise-sunset" | "sunrise_sunset",
    OptimizedEstimates => "optimized_estimates",
});

/// Inclusive day-of-year interval. `start > end` wraps over the year end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct DayWindow {
    pub start: u32,
    pub end: u32,
}

impl DayWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, day_of_year: u32) -> bool {
        if self.start <= self.end {
            (self.start..=self.end).contains(&day_of_year)
        } else {
            day_of_year >= self.start || day_of_year <= self.end
        }
    }
}

impl From<[u32; 2]> for DayWindow {
    fn from(bounds: [u32; 2]) -> Self {
        Self::new(bounds[0], bounds[1])
    }
}

impl From<DayWindow> for [u32; 2] {
    fn from(window: DayWindow) -> Self {
        [window.start, window.end]
    }
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parameters of the adaptive daytime threshold.
///
/// `q` is the per-day quantile of power, `t` the quantile level of the
/// seasonal regression through those per-day values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuantileParams {
    pub t: f64,
    pub q: f64,
}

impl Default for QuantileParams {
    fn default() -> Self {
        Self { t: 0.9, q: 0.9 }
    }
}

/// Starting point of the orientation fit, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitialValues {
    pub latitude: f64,
    pub tilt: f64,
    pub azimuth: f64,
}

impl Default for InitialValues {
    fn default() -> Self {
        Self {
            latitude: 30.0,
            tilt: 10.0,
            azimuth: 0.0,
        }
    }
}

impl fmt::Display for InitialValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lat={:.2};tilt={:.2};az={:.2}",
            self.latitude, self.tilt, self.azimuth
        )
    }
}

/// Estimated or supplied installation geometry.
///
/// Longitude is degrees east, latitude degrees north. Tilt is 0 for a
/// horizontal module; azimuth is 0 facing south, positive towards west.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemGeometry {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub tilt: Option<f64>,
    pub azimuth: Option<f64>,
}

impl SystemGeometry {
    pub fn is_complete(&self) -> bool {
        self.longitude.is_some()
            && self.latitude.is_some()
            && self.tilt.is_some()
            && self.azimuth.is_some()
    }
}

/// Per-day sunrise and sunset in local clock hours, NaN where unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct SunriseSunset {
    pub sunrise: Vec<f64>,
    pub sunset: Vec<f64>,
}

impl SunriseSunset {
    pub fn solar_noon(&self) -> Vec<f64> {
        self.sunrise
            .iter()
            .zip(&self.sunset)
            .map(|(&rise, &set)| (rise + set) / 2.0)
            .collect()
    }

    pub fn daylight_hours(&self) -> Vec<f64> {
        self.sunrise
            .iter()
            .zip(&self.sunset)
            .map(|(&rise, &set)| set - rise)
            .collect()
    }
}

/// Day-aligned power grid consumed by the estimators.
///
/// Rows are samples within the day, columns are consecutive days.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    matrix: Array2<f64>,
    sample_rate_min: u32,
    day_of_year: Vec<u32>,
    clear_flags: Vec<bool>,
    usable_flags: Vec<bool>,
    gmt_offset: f64,
}

impl PreparedData {
    /// Validates and wraps a preprocessed power matrix.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Upstream` if the per-day vectors do not match
    /// the matrix width, the sample rate does not tile one day, or the
    /// matrix holds non-finite values.
    pub fn new(
        matrix: Array2<f64>,
        sample_rate_min: u32,
        day_of_year: Vec<u32>,
        clear_flags: Vec<bool>,
        usable_flags: Vec<bool>,
        gmt_offset: f64,
    ) -> GeometryResult<Self> {
        let (samples, days) = matrix.dim();
        if samples == 0 || days == 0 {
            return Err(GeometryError::upstream("power matrix is empty"));
        }
        if sample_rate_min == 0 || sample_rate_min as usize * samples != MINUTES_PER_DAY as usize {
            return Err(GeometryError::upstream(format!(
                "{samples} samples per day at {sample_rate_min} min do not span one day"
            )));
        }
        for (name, len) in [
            ("day_of_year", day_of_year.len()),
            ("clear_flags", clear_flags.len()),
            ("usable_flags", usable_flags.len()),
        ] {
            if len != days {
                return Err(GeometryError::upstream(format!(
                    "{name} has {len} entries, matrix has {days} days"
                )));
            }
        }
        if let Some(&bad) = day_of_year.iter().find(|&&n| !(1..=366).contains(&n)) {
            return Err(GeometryError::upstream(format!("day of year {bad} out of range")));
        }
        if !gmt_offset.is_finite() {
            return Err(GeometryError::upstream("gmt offset is not finite"));
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(GeometryError::upstream("power matrix contains non-finite values"));
        }
        Ok(Self {
            matrix,
            sample_rate_min,
            day_of_year,
            clear_flags,
            usable_flags,
            gmt_offset,
        })
    }

    /// Builds the day index from the calendar date of the first column.
    pub fn from_start_date(
        matrix: Array2<f64>,
        sample_rate_min: u32,
        start: NaiveDate,
        clear_flags: Vec<bool>,
        usable_flags: Vec<bool>,
        gmt_offset: f64,
    ) -> GeometryResult<Self> {
        let day_of_year = (0..matrix.ncols() as u64)
            .map(|offset| {
                start
                    .checked_add_days(Days::new(offset))
                    .map(|date| date.ordinal())
                    .ok_or_else(|| GeometryError::upstream("day index overflows the calendar"))
            })
            .collect::<GeometryResult<Vec<_>>>()?;
        Self::new(
            matrix,
            sample_rate_min,
            day_of_year,
            clear_flags,
            usable_flags,
            gmt_offset,
        )
    }

    /// Replaces the usable flags, e.g. to drop clipped days.
    pub fn with_usable_flags(self, usable_flags: Vec<bool>) -> GeometryResult<Self> {
        Self::new(
            self.matrix,
            self.sample_rate_min,
            self.day_of_year,
            self.clear_flags,
            usable_flags,
            self.gmt_offset,
        )
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn sample_rate_min(&self) -> u32 {
        self.sample_rate_min
    }

    pub fn samples_per_day(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn num_days(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn day_of_year(&self) -> &[u32] {
        &self.day_of_year
    }

    pub fn clear_flags(&self) -> &[bool] {
        &self.clear_flags
    }

    pub fn usable_flags(&self) -> &[bool] {
        &self.usable_flags
    }

    pub fn gmt_offset(&self) -> f64 {
        self.gmt_offset
    }

    /// Local clock hour of sample `s`.
    pub fn sample_hour(&self, s: usize) -> f64 {
        s as f64 * self.sample_rate_min as f64 / 60.0
    }
}
