use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;

use crate::frame::{distinct_rows, frame_from_columns, has_column, string_column};

/// Where a Darwin Core field takes its values from.
#[derive(Debug, Clone, Copy)]
pub enum FieldSource {
    /// Candidate source columns; the first one present wins.
    Aliases(&'static [&'static str]),
    /// No source column exists; the value is filled by a later enrichment step, if at all.
    Programmatic,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub target: &'static str,
    pub source: FieldSource,
}

const fn aliases(target: &'static str, names: &'static [&'static str]) -> FieldMapping {
    FieldMapping {
        target,
        source: FieldSource::Aliases(names),
    }
}

const fn programmatic(target: &'static str) -> FieldMapping {
    FieldMapping {
        target,
        source: FieldSource::Programmatic,
    }
}

pub const EVENT_MAPPING: &[FieldMapping] = &[
    aliases("eventID", &["eventID"]),
    aliases(
        "eventDate",
        &["yyyy-mm-ddThh:mm:ss.sss", "YYYY-MM-DDThh:mm:ss.sss"],
    ),
    aliases("parentEventID", &["parentEventID"]),
    aliases("decimalLatitude", &["Latitude"]),
    aliases("decimalLongitude", &["Longitude"]),
    aliases(
        "institutionCode",
        &["Originator", "institutionCode", "EDMO_code"],
    ),
    aliases("datasetName", &["EDMED references"]),
    aliases("maximumDepthInMeters", &["MaximumObservationDepth"]),
    aliases("minimumDepthInMeters", &["MinimumObservationDepth"]),
    aliases(
        "coordinateUncertaintyInMeters",
        &["CoordinateUncertaintyInMeters"],
    ),
    aliases("footprintWKT", &["footprint_wkt"]),
    programmatic("type"),
    programmatic("dataGeneralizations"),
    programmatic("eventRemarks"),
    aliases("samplingProtocol", &["Samplingprotocol", "SamplingProtocol"]),
    aliases("locationID", &["Station"]),
    aliases(
        "locality",
        &["locality", "Station name", "Alternative station name"],
    ),
    programmatic("locationRemarks"),
];

pub const OCCURRENCE_MAPPING: &[FieldMapping] = &[
    aliases("eventID", &["eventID"]),
    aliases("occurrenceID", &["occurrenceID"]),
    aliases("basisOfRecord", &["basisOfRecord"]),
    aliases("occurrenceStatus", &["occurrenceStatus"]),
    aliases("scientificName", &["ScientificName"]),
    aliases("scientificNameID", &["ScientificNameID"]),
];

/// Reduced event mapping for parent events built from the CDI metadata file.
pub const META_EVENT_MAPPING: &[FieldMapping] = &[
    aliases("eventID", &["eventID"]),
    programmatic("eventDate"),
    programmatic("parentEventID"),
    aliases("decimalLatitude", &["Latitude 1"]),
    aliases("decimalLongitude", &["Longitude 1"]),
    aliases(
        "institutionCode",
        &["Originator", "institutionCode", "EDMO_code"],
    ),
    aliases("datasetName", &["EDMED references"]),
    programmatic("maximumDepthInMeters"),
    programmatic("minimumDepthInMeters"),
    programmatic("coordinateUncertaintyInMeters"),
    programmatic("footprintWKT"),
    programmatic("type"),
    programmatic("dataGeneralizations"),
    programmatic("eventRemarks"),
    programmatic("samplingProtocol"),
    aliases("locationID", &["Station name"]),
    aliases(
        "locality",
        &["locality", "Station name", "Alternative station name"],
    ),
    programmatic("locationRemarks"),
];

/// Returns the first alias that exists as a column of `df`.
pub fn resolve<'a>(df: &DataFrame, aliases: &[&'a str]) -> Option<&'a str> {
    aliases.iter().copied().find(|alias| has_column(df, alias))
}

/// Projects `df` onto the targets of `mapping`.
///
/// Targets whose aliases all miss (and programmatic targets) are absent from the result.
/// Rows are deduplicated by full identity.
pub fn map_columns(df: &DataFrame, mapping: &[FieldMapping]) -> PolarsResult<DataFrame> {
    let mut columns = Vec::new();
    for field in mapping {
        let FieldSource::Aliases(candidates) = field.source else {
            continue;
        };
        match resolve(df, candidates) {
            Some(source) => {
                columns.push((field.target.to_string(), string_column(df, source)?));
            }
            None => debug!(field = field.target, "no source column for mapped field"),
        }
    }

    let mapped = frame_from_columns(columns)?;
    distinct_rows(&mapped)
}

/// Lowercased target names and aliases of every given mapping.
pub fn mapped_names(mappings: &[&[FieldMapping]]) -> HashSet<String> {
    let mut names = HashSet::new();
    for mapping in mappings {
        for field in mapping.iter() {
            names.insert(field.target.to_lowercase());
            if let FieldSource::Aliases(candidates) = field.source {
                names.extend(candidates.iter().map(|alias| alias.to_lowercase()));
            }
        }
    }
    names
}
