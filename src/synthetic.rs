//! Synthetic PV power with known geometry, for tests and demos.

use chrono::{Datelike, Days, NaiveDate};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::angles::{clock_hour_angle, declination, deg_to_rad, equation_of_time};
use crate::error::{GeometryError, GeometryResult};
use crate::incidence::{cos_zenith, IncidenceAngles};
use crate::types::{DeclinationMethod, EotMethod, PreparedData, MINUTES_PER_DAY};

/// A fixed-tilt array at a known site.
///
/// Angles are degrees: longitude east-positive, azimuth 0 facing south
/// and positive west.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSite {
    pub longitude: f64,
    pub latitude: f64,
    pub tilt: f64,
    pub azimuth: f64,
    pub gmt_offset: f64,
    pub capacity: f64,
    /// Sky-diffuse floor while the sun is above the horizon, fraction of capacity.
    pub diffuse_fraction: f64,
    pub sample_rate_min: u32,
    pub num_days: usize,
    pub year: i32,
    pub first_day_of_year: u32,
    /// Standard deviation of additive noise, fraction of capacity.
    pub noise_std: f64,
    /// Probability that a day is cloudy.
    pub cloudy_fraction: f64,
    pub seed: u64,
    pub declination_method: DeclinationMethod,
    pub eot_method: EotMethod,
}

impl Default for SyntheticSite {
    fn default() -> Self {
        Self {
            longitude: -120.0,
            latitude: 37.0,
            tilt: 25.0,
            azimuth: 0.0,
            gmt_offset: -8.0,
            capacity: 5.0,
            diffuse_fraction: 0.01,
            sample_rate_min: 5,
            num_days: 365,
            year: 2021,
            first_day_of_year: 1,
            noise_std: 0.0,
            cloudy_fraction: 0.0,
            seed: 0,
            declination_method: DeclinationMethod::default(),
            eot_method: EotMethod::default(),
        }
    }
}

/// Zero-mean Gaussian draw (Box–Muller).
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}

impl SyntheticSite {
    /// Clear flags follow the cloud draw; every day is usable.
    pub fn generate(&self) -> GeometryResult<PreparedData> {
        let start = NaiveDate::from_yo_opt(self.year, self.first_day_of_year).ok_or_else(|| {
            GeometryError::configuration(format!(
                "day {} does not exist in {}",
                self.first_day_of_year, self.year
            ))
        })?;
        if self.sample_rate_min == 0 || MINUTES_PER_DAY % self.sample_rate_min != 0 {
            return Err(GeometryError::configuration(format!(
                "sample rate {} min does not tile one day",
                self.sample_rate_min
            )));
        }
        let samples = (MINUTES_PER_DAY / self.sample_rate_min) as usize;
        let step_hours = self.sample_rate_min as f64 / 60.0;
        let plane = IncidenceAngles::new(
            deg_to_rad(self.latitude),
            deg_to_rad(self.tilt),
            deg_to_rad(self.azimuth),
        );
        let lat = deg_to_rad(self.latitude);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let attenuation: Vec<f64> = (0..self.num_days)
            .map(|_| {
                if rng.random::<f64>() < self.cloudy_fraction {
                    rng.random_range(0.2..=0.7)
                } else {
                    1.0
                }
            })
            .collect();
        let clear_flags: Vec<bool> = attenuation.iter().map(|&a| a == 1.0).collect();

        // day-of-year comes from the calendar, so leap years shift correctly
        let days_of_year: Vec<u32> = (0..self.num_days as u64)
            .map(|offset| {
                start
                    .checked_add_days(Days::new(offset))
                    .map(|date| date.ordinal())
                    .ok_or_else(|| GeometryError::configuration("synthetic range overflows"))
            })
            .collect::<GeometryResult<_>>()?;

        let mut matrix = Array2::<f64>::zeros((samples, self.num_days));
        for (d, &n) in days_of_year.iter().enumerate() {
            let decl = declination(n, self.declination_method);
            let eot = equation_of_time(n, self.eot_method);
            for s in 0..samples {
                let omega = deg_to_rad(clock_hour_angle(
                    s as f64 * step_hours,
                    self.longitude,
                    self.gmt_offset,
                    eot,
                ));
                if cos_zenith(lat, omega, decl) <= 0.0 {
                    continue;
                }
                let beam = plane.cos_theta(omega, decl).max(0.0);
                let clean = self.capacity * (beam + self.diffuse_fraction) * attenuation[d];
                let noisy = clean + gaussian_noise(&mut rng, self.noise_std * self.capacity);
                matrix[(s, d)] = noisy.max(0.0);
            }
        }

        PreparedData::from_start_date(
            matrix,
            self.sample_rate_min,
            start,
            clear_flags,
            vec![true; self.num_days],
            self.gmt_offset,
        )
    }
}
