use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::error;

use crate::frame::{column_names, optional_string_column, set_string_column, StringColumn};

/// Columns hashed into `eventID`, in order. Several are spelling variants of the same field;
/// whichever exist in the table contribute.
pub const EVENT_KEY_FIELDS: &[&str] = &[
    "LOCAL_CDI_ID",
    "Station",
    "yyyy-mm-ddThh:mm:ss.sss",
    "YYYY-MM-DDThh:mm:ss.sss",
    "Samplingprotocol",
    "SamplingProtocol",
    "maximumDepthInMeters",
    "MaximumObservationDepth",
    "minimumDepthInMeters",
    "MinimumObservationDepth",
];

pub const EVENT_ID_LEN: usize = 20;
pub const NAME_DIGEST_LEN: usize = 8;

static TRAILING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+$").expect("valid trailing digits regex"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("no ScientificName column to derive a taxon identity from")]
    NoScientificNameColumn,
    #[error("no SampleID column to anchor occurrence identifiers")]
    NoSampleColumn,
    #[error("row {row} has no SampleID value")]
    MissingSample { row: usize },
    #[error("row {row} has neither a ScientificNameID nor a ScientificName value")]
    UnresolvedTaxon { row: usize },
}

#[derive(Debug, Default, Clone)]
pub struct IdentifierReport {
    pub rows: usize,
    pub occurrence_failures: usize,
    pub errors: Vec<IdentifierError>,
}

fn sha1_prefix(input: &str, len: usize) -> String {
    let mut hex = format!("{:x}", Sha1::digest(input.as_bytes()));
    hex.truncate(len);
    hex
}

/// Hashes the composite key parts into a 20 character hex `eventID`.
///
/// Parts are joined with `_` and all whitespace is removed before hashing.
pub fn event_id<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(|part| part.as_ref())
        .collect::<Vec<_>>()
        .join("_");
    let compact: String = joined.chars().filter(|c| !c.is_whitespace()).collect();
    sha1_prefix(&compact, EVENT_ID_LEN)
}

/// Taxon identity: the trailing digits of the taxon identifier (e.g. an AphiaID) when
/// available, otherwise the scientific name with spaces replaced by underscores.
pub fn taxon_identity(
    row: usize,
    name: Option<&str>,
    name_id: Option<&str>,
) -> Result<String, IdentifierError> {
    if let Some(digits) = name_id.and_then(|id| TRAILING_DIGITS.find(id.trim())) {
        return Ok(digits.as_str().to_string());
    }
    match name {
        Some(name) if !name.trim().is_empty() => Ok(name.replace(' ', "_")),
        _ => Err(IdentifierError::UnresolvedTaxon { row }),
    }
}

/// `sample_[subsample_]taxon_digest`, where the digest is taken over the raw scientific name.
pub fn occurrence_id(sample: &str, subsample: Option<&str>, taxon: &str, raw_name: &str) -> String {
    let digest = sha1_prefix(raw_name, NAME_DIGEST_LEN);
    match subsample {
        Some(subsample) => format!("{sample}_{subsample}_{taxon}_{digest}"),
        None => format!("{sample}_{taxon}_{digest}"),
    }
}

fn first_with_prefix<'a>(names: &'a [String], prefix: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|name| name.starts_with(prefix))
        .map(String::as_str)
}

struct OccurrenceColumns {
    sample: StringColumn,
    subsample: Option<StringColumn>,
    name: StringColumn,
    name_id: Option<StringColumn>,
}

fn occurrence_columns(df: &DataFrame) -> PolarsResult<Result<OccurrenceColumns, IdentifierError>> {
    let names = column_names(df);
    let name_id_column = first_with_prefix(&names, "ScientificNameID");
    let name_column = names
        .iter()
        .find(|name| name.starts_with("ScientificName") && !name.starts_with("ScientificNameID"))
        .map(String::as_str);

    let Some(name_column) = name_column else {
        return Ok(Err(IdentifierError::NoScientificNameColumn));
    };
    let Some(sample_column) = first_with_prefix(&names, "SampleID") else {
        return Ok(Err(IdentifierError::NoSampleColumn));
    };

    Ok(Ok(OccurrenceColumns {
        sample: optional_string_column(df, sample_column)?.unwrap_or_default(),
        subsample: match first_with_prefix(&names, "SubsampleID") {
            Some(column) => optional_string_column(df, column)?,
            None => None,
        },
        name: optional_string_column(df, name_column)?.unwrap_or_default(),
        name_id: match name_id_column {
            Some(column) => optional_string_column(df, column)?,
            None => None,
        },
    }))
}

fn row_occurrence_id(columns: &OccurrenceColumns, row: usize) -> Result<String, IdentifierError> {
    let name = columns.name[row].as_deref();
    let name_id = columns
        .name_id
        .as_ref()
        .and_then(|values| values[row].as_deref());
    let taxon = taxon_identity(row, name, name_id)?;
    let sample = columns.sample[row]
        .as_deref()
        .ok_or(IdentifierError::MissingSample { row })?;
    let subsample = columns
        .subsample
        .as_ref()
        .and_then(|values| values[row].as_deref());
    Ok(occurrence_id(sample, subsample, &taxon, name.unwrap_or_default()))
}

/// Adds `eventID`, `occurrenceID` and `parentEventID` to the normalized record table.
///
/// Rows whose occurrence identity cannot be resolved are logged and get a null
/// `occurrenceID`; the failures are returned in the report.
pub fn assign_identifiers(df: &mut DataFrame) -> PolarsResult<IdentifierReport> {
    let height = df.height();
    let mut report = IdentifierReport {
        rows: height,
        ..IdentifierReport::default()
    };

    let key_columns: Vec<StringColumn> = EVENT_KEY_FIELDS
        .iter()
        .filter_map(|field| optional_string_column(df, field).transpose())
        .collect::<PolarsResult<_>>()?;
    let event_ids: StringColumn = (0..height)
        .map(|row| {
            let parts: Vec<&str> = key_columns
                .iter()
                .map(|values| values[row].as_deref().unwrap_or_default())
                .collect();
            Some(event_id(&parts))
        })
        .collect();

    let occurrence_ids: StringColumn = match occurrence_columns(df)? {
        Ok(columns) => (0..height)
            .map(|row| match row_occurrence_id(&columns, row) {
                Ok(id) => Some(id),
                Err(err) => {
                    error!(row, error = %err, "failed to derive occurrenceID");
                    report.occurrence_failures += 1;
                    report.errors.push(err);
                    None
                }
            })
            .collect(),
        Err(err) => {
            if height > 0 {
                error!(error = %err, rows = height, "failed to derive occurrenceID for any row");
                report.occurrence_failures = height;
                report.errors.push(err);
            }
            vec![None; height]
        }
    };

    let parent_ids = optional_string_column(df, "LOCAL_CDI_ID")?.unwrap_or_else(|| vec![None; height]);

    set_string_column(df, "eventID", event_ids)?;
    set_string_column(df, "occurrenceID", occurrence_ids)?;
    set_string_column(df, "parentEventID", parent_ids)?;
    Ok(report)
}
