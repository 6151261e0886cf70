use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::types::{
    DayWindow, DaySelection, DaylightMethod, DeclinationMethod, EotMethod, InitialValues,
    LongitudeEstimator, SolarNoonMethod,
};

const HEADER: &str = "quantity,value,estimator,eot_method,solar_noon_method,daylight_method,\
                      day_selection,declination_method,residual,day_range,initial_values,error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Longitude,
    Latitude,
    Tilt,
    Azimuth,
}

impl Quantity {
    pub fn name(self) -> &'static str {
        match self {
            Quantity::Longitude => "longitude",
            Quantity::Latitude => "latitude",
            Quantity::Tilt => "tilt",
            Quantity::Azimuth => "azimuth",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One estimate and the options that produced it.
///
/// Options that do not apply to the quantity are `None`. A failed
/// configuration has a NaN `value` and the failure in `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub quantity: Quantity,
    pub value: f64,
    pub estimator: Option<LongitudeEstimator>,
    pub eot_method: Option<EotMethod>,
    pub solar_noon_method: Option<SolarNoonMethod>,
    pub daylight_method: Option<DaylightMethod>,
    pub day_selection: Option<DaySelection>,
    pub declination_method: Option<DeclinationMethod>,
    pub residual: f64,
    pub day_range: Option<DayWindow>,
    pub initial_values: Option<InitialValues>,
    pub error: Option<String>,
}

impl ResultRow {
    pub fn new(quantity: Quantity, value: f64, residual: f64) -> Self {
        Self {
            quantity,
            value,
            estimator: None,
            eot_method: None,
            solar_noon_method: None,
            daylight_method: None,
            day_selection: None,
            declination_method: None,
            residual,
            day_range: None,
            initial_values: None,
            error: None,
        }
    }

    pub fn failed(quantity: Quantity, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(quantity, f64::NAN, f64::NAN)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    rows: Vec<ResultRow>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn of(&self, quantity: Quantity) -> impl Iterator<Item = &ResultRow> + '_ {
        self.rows.iter().filter(move |row| row.quantity == quantity)
    }
}

fn opt<T: fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn number(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.6}")
    } else {
        String::new()
    }
}

pub fn export_csv(table: &ResultsTable, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_csv(table, io::BufWriter::new(file))
}

/// NaN values are written as empty fields.
pub fn write_csv(table: &ResultsTable, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER.split(',').map(str::trim))?;
    for r in table.rows() {
        wtr.write_record(&[
            r.quantity.to_string(),
            number(r.value),
            opt(&r.estimator),
            opt(&r.eot_method),
            opt(&r.solar_noon_method),
            opt(&r.daylight_method),
            opt(&r.day_selection),
            opt(&r.declination_method),
            number(r.residual),
            opt(&r.day_range),
            opt(&r.initial_values),
            r.error.clone().unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
