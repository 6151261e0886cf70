use ndarray::Array2;

use crate::types::{DeclinationMethod, EotMethod};

pub const EARTH_AXIAL_TILT: f64 = 23.45;
pub const DEGREES_PER_HOUR: f64 = 15.0;
pub const MINUTES_PER_DEGREE: f64 = 4.0;

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * (std::f64::consts::PI / 180.0)
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad * (180.0 / std::f64::consts::PI)
}

/// Wraps an angle in degrees into [-180, 180).
pub fn wrap_degrees(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

pub fn intermediate_angle_b(n: u32) -> f64 {
    deg_to_rad((n as f64 - 1.0) * (360.0 / 365.0))
}

/// Duffie & Beckman (Spencer) equation of time, minutes.
pub fn eot_duffie(n: u32) -> f64 {
    let b = intermediate_angle_b(n);
    229.18
        * (0.000075
            + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.040849 * (2.0 * b).sin())
}

/// Da Rosa equation of time as used by Haghdadi et al., minutes.
pub fn eot_da_rosa(n: u32) -> f64 {
    let b = deg_to_rad(360.0 / 364.0 * (n as f64 - 81.0));
    9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
}

pub fn equation_of_time(n: u32, method: EotMethod) -> f64 {
    match method {
        EotMethod::Duffie => eot_duffie(n),
        EotMethod::DaRosa => eot_da_rosa(n),
    }
}

/// Cooper's declination, degrees.
pub fn solar_declination(n: u32) -> f64 {
    EARTH_AXIAL_TILT * deg_to_rad(360.0 * ((284 + n) as f64 / 365.0)).sin()
}

/// Spencer's Fourier series for declination, radians.
pub fn spencer_declination(n: u32) -> f64 {
    let b = intermediate_angle_b(n);
    0.006918 - 0.399912 * b.cos() + 0.070257 * b.sin() - 0.006758 * (2.0 * b).cos()
        + 0.000907 * (2.0 * b).sin()
        - 0.002697 * (3.0 * b).cos()
        + 0.00148 * (3.0 * b).sin()
}

/// Declination in radians.
pub fn declination(n: u32, method: DeclinationMethod) -> f64 {
    match method {
        DeclinationMethod::Cooper => deg_to_rad(solar_declination(n)),
        DeclinationMethod::Spencer => spencer_declination(n),
    }
}

pub fn hour_angle(local_solar_time: f64) -> f64 {
    DEGREES_PER_HOUR * (local_solar_time - 12.0)
}

/// Offset in degrees between local clock time and local solar time.
///
/// Zero hour angle falls at clock hour `12 - offset / 15`.
pub fn clock_offset_degrees(longitude: f64, gmt_offset: f64, eot_minutes: f64) -> f64 {
    longitude - DEGREES_PER_HOUR * gmt_offset + eot_minutes / MINUTES_PER_DEGREE
}

/// Hour angle in degrees at a local clock hour.
pub fn clock_hour_angle(clock_hour: f64, longitude: f64, gmt_offset: f64, eot_minutes: f64) -> f64 {
    hour_angle(clock_hour) + clock_offset_degrees(longitude, gmt_offset, eot_minutes)
}

pub fn solar_noon_hour(longitude: f64, gmt_offset: f64, eot_minutes: f64) -> f64 {
    12.0 - clock_offset_degrees(longitude, gmt_offset, eot_minutes) / DEGREES_PER_HOUR
}

pub fn eot_by_day(day_of_year: &[u32], method: EotMethod) -> Vec<f64> {
    day_of_year
        .iter()
        .map(|&n| equation_of_time(n, method))
        .collect()
}

pub fn declination_by_day(day_of_year: &[u32], method: DeclinationMethod) -> Vec<f64> {
    day_of_year.iter().map(|&n| declination(n, method)).collect()
}

/// Declination broadcast to an (S, D) grid, radians.
pub fn declination_grid(
    day_of_year: &[u32],
    samples_per_day: usize,
    method: DeclinationMethod,
) -> Array2<f64> {
    let per_day = declination_by_day(day_of_year, method);
    Array2::from_shape_fn((samples_per_day, day_of_year.len()), |(_, d)| per_day[d])
}

/// Hour angle over an (S, D) grid, radians.
///
/// Sample `s` sits at clock hour `s * sample_rate_min / 60`.
pub fn hour_angle_grid(
    day_of_year: &[u32],
    samples_per_day: usize,
    sample_rate_min: u32,
    longitude: f64,
    gmt_offset: f64,
    eot_method: EotMethod,
) -> Array2<f64> {
    let offsets: Vec<f64> = eot_by_day(day_of_year, eot_method)
        .into_iter()
        .map(|eot| clock_offset_degrees(longitude, gmt_offset, eot))
        .collect();
    let step_hours = sample_rate_min as f64 / 60.0;
    Array2::from_shape_fn((samples_per_day, day_of_year.len()), |(s, d)| {
        deg_to_rad(hour_angle(s as f64 * step_hours) + offsets[d])
    })
}

/// Day length in hours from the sunset hour angle, NaN during polar day or night.
pub fn daylight_hours(latitude: f64, declination_rad: f64) -> f64 {
    let cos_ws = -deg_to_rad(latitude).tan() * declination_rad.tan();
    if cos_ws.abs() > 1.0 {
        return f64::NAN;
    }
    2.0 * rad_to_deg(cos_ws.acos()) / DEGREES_PER_HOUR
}
