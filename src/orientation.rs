//! Tilt, azimuth and optionally latitude from the normalised power shape.
//!
//! Power divided by the envelope peak is treated as a direct measurement of
//! cos(θ) on clear daytime samples. The free subset of (φ, β, γ) is fitted
//! by bounded least squares against the Duffie incidence model.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::angles::{deg_to_rad, rad_to_deg, wrap_degrees};
use crate::error::{GeometryError, GeometryResult};
use crate::incidence::IncidenceAngles;
use crate::lsq::{solve_bounded, Bounds, LeastSquaresProblem, LmSettings};
use crate::types::{DayWindow, DaytimeMask, InitialValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param {
    Latitude,
    Tilt,
    Azimuth,
}

impl Param {
    const ALL: [Param; 3] = [Param::Latitude, Param::Tilt, Param::Azimuth];

    fn bounds(self) -> (f64, f64) {
        match self {
            Param::Latitude => (-FRAC_PI_2, FRAC_PI_2),
            Param::Tilt => (0.0, FRAC_PI_2),
            Param::Azimuth => (-PI, PI),
        }
    }
}

/// Known angles in degrees; `None` marks a parameter to fit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationPriors {
    pub latitude: Option<f64>,
    pub tilt: Option<f64>,
    pub azimuth: Option<f64>,
}

impl OrientationPriors {
    fn get(&self, param: Param) -> Option<f64> {
        match param {
            Param::Latitude => self.latitude,
            Param::Tilt => self.tilt,
            Param::Azimuth => self.azimuth,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrientationSettings {
    pub initial_values: InitialValues,
    /// Random starting points tried in addition to `initial_values`. When
    /// the best fit lies flat, starts facing the opposite azimuth are added.
    pub n_random: usize,
    pub seed: u64,
    pub lm: LmSettings,
}

impl Default for OrientationSettings {
    fn default() -> Self {
        Self {
            initial_values: InitialValues::default(),
            n_random: 0,
            seed: 0,
            lm: LmSettings::default(),
        }
    }
}

/// Grids over (S, D) feeding the fit.
///
/// `hour_angle` and `declination` are radians, `fit_mask` marks the
/// samples that take part.
#[derive(Debug, Clone, Copy)]
pub struct OrientationInputs<'a> {
    pub matrix: &'a Array2<f64>,
    pub hour_angle: &'a Array2<f64>,
    pub declination: &'a Array2<f64>,
    pub fit_mask: &'a DaytimeMask,
    pub envelope_peak: f64,
}

/// Fitted angles in degrees, priors passed through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationFit {
    pub latitude: f64,
    pub tilt: f64,
    pub azimuth: f64,
    /// RMS cos(θ) misfit.
    pub residual: f64,
    pub n_samples: usize,
    /// Starting point of the winning run, degrees.
    pub initial_values: InitialValues,
}

/// Daytime samples on clear, usable days inside the optional window.
pub fn fit_mask(
    daytime: &DaytimeMask,
    clear_flags: &[bool],
    usable_flags: &[bool],
    day_of_year: &[u32],
    window: Option<DayWindow>,
) -> DaytimeMask {
    let keep: Vec<bool> = (0..daytime.ncols())
        .map(|d| {
            clear_flags[d] && usable_flags[d] && window.map_or(true, |w| w.contains(day_of_year[d]))
        })
        .collect();
    Array2::from_shape_fn(daytime.dim(), |(s, d)| keep[d] && daytime[(s, d)])
}

struct Sample {
    hour_angle: f64,
    declination: f64,
    target: f64,
}

struct IncidenceProblem {
    samples: Vec<Sample>,
    free: Vec<Param>,
    fixed: [f64; 3],
}

impl IncidenceProblem {
    fn angles(&self, params: &[f64]) -> IncidenceAngles {
        let mut all = self.fixed;
        for (param, &value) in self.free.iter().zip(params) {
            all[*param as usize] = value;
        }
        IncidenceAngles::new(all[0], all[1], all[2])
    }
}

impl LeastSquaresProblem for IncidenceProblem {
    fn num_params(&self) -> usize {
        self.free.len()
    }

    fn accumulate(&self, params: &[f64], jtj: &mut DMatrix<f64>, jtr: &mut DVector<f64>) -> f64 {
        let angles = self.angles(params);
        let mut row = [0.0; 3];
        let mut cost = 0.0;
        for sample in &self.samples {
            let (model, grad) = angles.cos_theta_with_gradient(sample.hour_angle, sample.declination);
            let r = model - sample.target;
            for (slot, param) in row.iter_mut().zip(&self.free) {
                *slot = match param {
                    Param::Latitude => grad.latitude,
                    Param::Tilt => grad.tilt,
                    Param::Azimuth => grad.azimuth,
                };
            }
            let n = self.free.len();
            for a in 0..n {
                jtr[a] += row[a] * r;
                for b in 0..n {
                    jtj[(a, b)] += row[a] * row[b];
                }
            }
            cost += r * r;
        }
        cost
    }

    fn cost(&self, params: &[f64]) -> f64 {
        let angles = self.angles(params);
        self.samples
            .iter()
            .map(|s| (angles.cos_theta(s.hour_angle, s.declination) - s.target).powi(2))
            .sum()
    }
}

fn initial_point(values: &InitialValues, free: &[Param]) -> Vec<f64> {
    free.iter()
        .map(|param| {
            deg_to_rad(match param {
                Param::Latitude => values.latitude,
                Param::Tilt => values.tilt,
                Param::Azimuth => values.azimuth,
            })
        })
        .collect()
}

fn random_initial_values(rng: &mut StdRng, base: &InitialValues, free: &[Param]) -> InitialValues {
    let mut values = *base;
    for param in free {
        let (lo, hi) = param.bounds();
        let draw = rad_to_deg(rng.random_range(lo..=hi));
        match param {
            Param::Latitude => values.latitude = draw,
            Param::Tilt => values.tilt = draw,
            Param::Azimuth => values.azimuth = draw,
        }
    }
    values
}

/// Fitted tilt, radians, below which the fit is considered flat.
const FLAT_TILT: f64 = 1e-6;

/// Starts facing away from `base`. A start on the ±180° seam is tried on
/// both sides, since the azimuth box does not wrap.
fn opposite_starts(base: &InitialValues) -> Vec<InitialValues> {
    let opposite = wrap_degrees(base.azimuth + 180.0);
    let azimuths = if opposite <= -180.0 {
        vec![-180.0, 180.0]
    } else {
        vec![opposite]
    };
    azimuths
        .into_iter()
        .map(|azimuth| InitialValues { azimuth, ..*base })
        .collect()
}

#[derive(Default)]
struct Runs {
    best: Option<(Vec<f64>, f64, InitialValues)>,
    last_error: Option<GeometryError>,
    attempts: usize,
}

impl Runs {
    fn attempt(
        &mut self,
        problem: &IncidenceProblem,
        bounds: &Bounds,
        free: &[Param],
        start: InitialValues,
        lm: &LmSettings,
    ) {
        let attempt = self.attempts;
        self.attempts += 1;
        match solve_bounded(problem, bounds, &initial_point(&start, free), lm) {
            Ok(report) if !report.converged => {
                warn!(attempt, iterations = report.iterations, "orientation run did not converge");
                self.last_error = Some(GeometryError::estimation(format!(
                    "no convergence after {} iterations",
                    report.iterations
                )));
            }
            Ok(report) => {
                debug!(attempt, cost = report.cost, %start, "orientation run");
                if self.best.as_ref().map_or(true, |(_, cost, _)| report.cost < *cost) {
                    self.best = Some((report.params, report.cost, start));
                }
            }
            Err(err) => {
                warn!(attempt, %err, "orientation run failed");
                self.last_error = Some(err);
            }
        }
    }

    fn best_param(&self, slot: usize) -> Option<f64> {
        self.best.as_ref().map(|(params, _, _)| params[slot])
    }
}

/// Fits the free orientation angles.
///
/// # Errors
///
/// - `GeometryError::Configuration` when every angle is supplied.
/// - `GeometryError::InsufficientData` when no sample survives the mask or
///   the envelope peak is not positive.
/// - `GeometryError::Estimation` when no starting point converges.
pub fn fit_orientation(
    inputs: &OrientationInputs<'_>,
    priors: &OrientationPriors,
    settings: &OrientationSettings,
) -> GeometryResult<OrientationFit> {
    let free: Vec<Param> = Param::ALL
        .into_iter()
        .filter(|&p| priors.get(p).is_none())
        .collect();
    if free.is_empty() {
        return Err(GeometryError::configuration(
            "latitude, tilt and azimuth are all supplied, nothing to fit",
        ));
    }
    if !(inputs.envelope_peak.is_finite() && inputs.envelope_peak > 0.0) {
        return Err(GeometryError::insufficient("envelope peak is not positive"));
    }
    let dim = inputs.matrix.dim();
    if inputs.hour_angle.dim() != dim || inputs.declination.dim() != dim || inputs.fit_mask.dim() != dim
    {
        return Err(GeometryError::upstream("orientation grids differ in shape"));
    }

    let samples: Vec<Sample> = inputs
        .fit_mask
        .indexed_iter()
        .filter(|&(_, &keep)| keep)
        .map(|(idx, _)| Sample {
            hour_angle: inputs.hour_angle[idx],
            declination: inputs.declination[idx],
            target: inputs.matrix[idx] / inputs.envelope_peak,
        })
        .collect();
    if samples.is_empty() {
        return Err(GeometryError::insufficient("no samples left to fit orientation"));
    }

    let fixed = Param::ALL.map(|p| priors.get(p).map_or(0.0, deg_to_rad));
    let n_samples = samples.len();
    let problem = IncidenceProblem {
        samples,
        free: free.clone(),
        fixed,
    };
    let (lower, upper): (Vec<f64>, Vec<f64>) = free.iter().map(|p| p.bounds()).unzip();
    let bounds = Bounds::new(lower, upper);

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let starts: Vec<InitialValues> = std::iter::once(settings.initial_values)
        .chain((0..settings.n_random).map(|_| {
            random_initial_values(&mut rng, &settings.initial_values, &free)
        }))
        .collect();

    let mut runs = Runs::default();
    for start in &starts {
        runs.attempt(&problem, &bounds, &free, *start, &settings.lm);
    }
    // a flat fit can hide an array facing away from the initial azimuth
    let tilt_slot = free.iter().position(|&p| p == Param::Tilt);
    if let Some(slot) = tilt_slot.filter(|_| free.contains(&Param::Azimuth)) {
        if runs.best_param(slot).is_some_and(|tilt| tilt <= FLAT_TILT) {
            for start in opposite_starts(&settings.initial_values) {
                runs.attempt(&problem, &bounds, &free, start, &settings.lm);
            }
        }
    }
    let attempts = runs.attempts;
    let best = runs.best;
    let last_error = runs.last_error;
    let (params, cost, initial_values) = best.ok_or_else(|| {
        GeometryError::estimation(format!(
            "none of {} orientation runs converged: {}",
            attempts,
            last_error.map_or_else(String::new, |e| e.to_string())
        ))
    })?;

    let angles = problem.angles(&params);
    debug!(n_samples, cost, "orientation fitted");
    Ok(OrientationFit {
        latitude: priors.latitude.unwrap_or_else(|| rad_to_deg(angles.latitude)),
        tilt: priors.tilt.unwrap_or_else(|| rad_to_deg(angles.tilt)),
        azimuth: priors
            .azimuth
            .unwrap_or_else(|| wrap_degrees(rad_to_deg(angles.azimuth))),
        residual: (cost / n_samples as f64).sqrt(),
        n_samples,
        initial_values,
    })
}
