use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::frame::{distinct_rows, optional_string_column, StringColumn};
use crate::ingestion::{IngestedFile, SCOPE_COLUMN};
use crate::vocabulary::VocabularyCache;

use super::{nerc_uri, EmofBuilder, EmofRow};

pub const INSTRUMENT_TYPE: &str = "instrument";
pub const INSTRUMENT_UNIT: &str = "Dmnless";

/// One semantic parameter of one source file, with its vocabulary URIs resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterDescriptor {
    pub scope: String,
    pub measurement_type: String,
    pub type_id: String,
    pub unit: String,
    pub unit_id: String,
    /// L22 instrument URI when the parameter names the device used.
    pub instrument_id: Option<String>,
}

/// Every file's parameters crossed with the file's scope tag, deduplicated in first-seen order.
pub fn parameter_table(files: &[IngestedFile], vocabulary: &VocabularyCache) -> Vec<ParameterDescriptor> {
    let mut seen = HashSet::new();
    let mut table = Vec::new();
    for file in files {
        for parameter in &file.odv.parameters {
            let key = (file.scope.clone(), parameter.clone());
            if !seen.insert(key) {
                continue;
            }
            let unit_id = nerc_uri("P06", parameter.units_code());
            table.push(ParameterDescriptor {
                scope: file.scope.clone(),
                measurement_type: parameter.local_name().to_string(),
                type_id: nerc_uri("P01", parameter.object_code()),
                unit: vocabulary.label(&unit_id),
                unit_id,
                instrument_id: parameter.instrument_code().map(|code| nerc_uri("L22", code)),
            });
        }
    }
    debug!(parameters = table.len(), "built parameter table");
    table
}

/// One fact per record row whose scope matches the parameter and whose measured column is
/// non-null, plus an occurrence-less instrument fact for parameters naming a device.
pub fn occurrence_measurements(
    records: &DataFrame,
    parameters: &[ParameterDescriptor],
    vocabulary: &VocabularyCache,
) -> PolarsResult<DataFrame> {
    let height = records.height();
    let read = |name: &str| -> PolarsResult<StringColumn> {
        Ok(optional_string_column(records, name)?.unwrap_or_else(|| vec![None; height]))
    };
    let scopes = read(SCOPE_COLUMN)?;
    let event_ids = read("eventID")?;
    let occurrence_ids = read("occurrenceID")?;

    let mut builder = EmofBuilder::default();
    for parameter in parameters {
        let Some(values) = optional_string_column(records, &parameter.measurement_type)? else {
            debug!(
                column = %parameter.measurement_type,
                scope = %parameter.scope,
                "measured column missing, skipping parameter"
            );
            continue;
        };
        let instrument = parameter
            .instrument_id
            .as_ref()
            .map(|uri| (uri, vocabulary.label(uri)));

        for row in 0..height {
            if scopes[row].as_deref() != Some(parameter.scope.as_str()) {
                continue;
            }
            let Some(value) = values[row].clone() else {
                continue;
            };

            builder.push(EmofRow {
                event_id: event_ids[row].clone(),
                occurrence_id: occurrence_ids[row].clone(),
                measurement_id: Some(Uuid::new_v4().to_string()),
                value: Some(value),
                value_id: None,
                measurement_type: Some(parameter.measurement_type.clone()),
                type_id: Some(parameter.type_id.clone()),
                unit: Some(parameter.unit.clone()),
                unit_id: Some(parameter.unit_id.clone()),
                method: None,
            });

            if let Some((uri, label)) = &instrument {
                builder.push(EmofRow {
                    event_id: event_ids[row].clone(),
                    value: Some(label.clone()),
                    value_id: Some(uri.to_string()),
                    measurement_type: Some(INSTRUMENT_TYPE.to_string()),
                    type_id: Some(nerc_uri("L19", "SDNKG01")),
                    unit: Some(INSTRUMENT_UNIT.to_string()),
                    unit_id: Some(nerc_uri("P06", "UUUU")),
                    ..EmofRow::default()
                });
            }
        }
    }

    distinct_rows(&builder.finish()?)
}
