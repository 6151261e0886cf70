pub mod angles;
pub mod config;
pub mod convex;
pub mod daylight;
pub mod error;
pub mod estimator;
pub mod incidence;
pub mod latitude;
pub mod longitude;
pub mod lsq;
pub mod orientation;
pub mod report;
pub mod seasonal;
pub mod stats;
pub mod synthetic;
pub mod types;

pub use angles::{
    declination, declination_grid, deg_to_rad, equation_of_time, hour_angle_grid, rad_to_deg,
    solar_declination, DEGREES_PER_HOUR, EARTH_AXIAL_TILT,
};

pub use config::{ConfigError, EstimatorConfig};

pub use daylight::SunriseSunsetOptimizer;

pub use error::{GeometryError, GeometryResult};

pub use estimator::{GeometryEstimator, LongitudeOptions, OrientationRequest};

pub use incidence::IncidenceAngles;

pub use latitude::LatitudeEstimate;

pub use longitude::{LongitudeEstimate, MIN_USABLE_DAYS};

pub use orientation::{OrientationFit, OrientationPriors};

pub use report::{export_csv, write_csv, Quantity, ResultRow, ResultsTable};

pub use seasonal::SeasonalEnvelope;

pub use synthetic::SyntheticSite;

pub use types::{
    DayWindow, DaySelection, DaylightMethod, DaytimeMask, DeclinationMethod, EotMethod,
    InitialValues, LongitudeEstimator, PreparedData, QuantileParams, SolarNoonMethod,
    SunriseSunset, SystemGeometry,
};
