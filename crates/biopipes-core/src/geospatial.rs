use std::collections::BTreeMap;

use geo::{Distance, Geodesic, Point};
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::frame::{optional_string_column, set_string_column, StringColumn};

pub const LATITUDE_COLUMNS: [&str; 2] = ["Latitude 1", "Latitude 2"];
pub const LONGITUDE_COLUMNS: [&str; 2] = ["Longitude 1", "Longitude 2"];
pub const UNCERTAINTY_COLUMN: &str = "CoordinateUncertaintyInMeters";
pub const FOOTPRINT_COLUMN: &str = "footprint_wkt";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("{column} is missing")]
    MissingValue { column: &'static str },
    #[error("{column} value '{value}' is not numeric")]
    NotNumeric { column: &'static str, value: String },
    #[error("coordinate {value} outside the valid range for {column}")]
    OutOfRange { column: &'static str, value: f64 },
}

impl GeoError {
    pub fn reason(&self) -> &'static str {
        match self {
            GeoError::MissingValue { .. } => "missing_value",
            GeoError::NotNumeric { .. } => "not_numeric",
            GeoError::OutOfRange { .. } => "out_of_range",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Orders the two latitude and two longitude extrema regardless of input order.
    pub fn from_corners(lat_a: f64, lat_b: f64, lon_a: f64, lon_b: f64) -> Self {
        Self {
            min_lat: lat_a.min(lat_b),
            max_lat: lat_a.max(lat_b),
            min_lon: lon_a.min(lon_b),
            max_lon: lon_a.max(lon_b),
        }
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Closed five-vertex ring, longitude first.
    pub fn to_wkt(&self) -> String {
        let Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        } = *self;
        format!(
            "POLYGON (({min_lon:?} {min_lat:?}, {min_lon:?} {max_lat:?}, {max_lon:?} {max_lat:?}, {max_lon:?} {min_lat:?}, {min_lon:?} {min_lat:?}))"
        )
    }

    /// Geodesic distance in meters from the south-west corner to the centroid.
    pub fn uncertainty_m(&self) -> f64 {
        let (lat_c, lon_c) = self.centroid();
        geodesic_distance_m((self.min_lat, self.min_lon), (lat_c, lon_c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub uncertainty_m: f64,
    pub wkt: String,
}

/// Geodesic distance in meters on the WGS84 ellipsoid. Points are `(lat, lon)` in degrees.
pub fn geodesic_distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;
    Geodesic::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

fn parse_coordinate(column: &'static str, value: Option<&str>, limit: f64) -> Result<f64, GeoError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(GeoError::MissingValue { column })?;
    let parsed: f64 = raw.parse().map_err(|_| GeoError::NotNumeric {
        column,
        value: raw.to_string(),
    })?;
    if !parsed.is_finite() || parsed.abs() > limit {
        return Err(GeoError::OutOfRange {
            column,
            value: parsed,
        });
    }
    Ok(parsed)
}

/// Builds the footprint for one row from the raw `Latitude 1/2` and `Longitude 1/2` cells.
pub fn footprint(
    latitudes: [Option<&str>; 2],
    longitudes: [Option<&str>; 2],
) -> Result<Footprint, GeoError> {
    let lat_a = parse_coordinate(LATITUDE_COLUMNS[0], latitudes[0], 90.0)?;
    let lat_b = parse_coordinate(LATITUDE_COLUMNS[1], latitudes[1], 90.0)?;
    let lon_a = parse_coordinate(LONGITUDE_COLUMNS[0], longitudes[0], 180.0)?;
    let lon_b = parse_coordinate(LONGITUDE_COLUMNS[1], longitudes[1], 180.0)?;

    let bbox = BoundingBox::from_corners(lat_a, lat_b, lon_a, lon_b);
    Ok(Footprint {
        uncertainty_m: bbox.uncertainty_m(),
        wkt: bbox.to_wkt(),
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeoReport {
    pub computed: usize,
    /// Failure counts keyed by [`GeoError::reason`].
    pub failures: BTreeMap<&'static str, usize>,
}

impl GeoReport {
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

/// Adds `CoordinateUncertaintyInMeters` and `footprint_wkt`; failed rows get nulls in both.
pub fn enrich_footprints(df: &mut DataFrame) -> PolarsResult<GeoReport> {
    let height = df.height();
    let source: &DataFrame = df;
    let read = |name: &str| -> PolarsResult<StringColumn> {
        Ok(optional_string_column(source, name)?.unwrap_or_else(|| vec![None; height]))
    };
    let lat_1 = read(LATITUDE_COLUMNS[0])?;
    let lat_2 = read(LATITUDE_COLUMNS[1])?;
    let lon_1 = read(LONGITUDE_COLUMNS[0])?;
    let lon_2 = read(LONGITUDE_COLUMNS[1])?;

    let mut report = GeoReport::default();
    let mut uncertainty = Vec::with_capacity(height);
    let mut wkt = Vec::with_capacity(height);

    for row in 0..height {
        match footprint(
            [lat_1[row].as_deref(), lat_2[row].as_deref()],
            [lon_1[row].as_deref(), lon_2[row].as_deref()],
        ) {
            Ok(result) => {
                report.computed += 1;
                uncertainty.push(Some(result.uncertainty_m.to_string()));
                wkt.push(Some(result.wkt));
            }
            Err(err) => {
                debug!(row, error = %err, "footprint not computed");
                *report.failures.entry(err.reason()).or_default() += 1;
                uncertainty.push(None);
                wkt.push(None);
            }
        }
    }

    set_string_column(df, UNCERTAINTY_COLUMN, uncertainty)?;
    set_string_column(df, FOOTPRINT_COLUMN, wkt)?;
    Ok(report)
}
