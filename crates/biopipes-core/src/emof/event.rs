use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::frame::{optional_string_column, StringColumn};
use crate::metadata::{cdi_prefix, CDI_COLUMN};

use super::{EmofBuilder, EmofRow};

static REGISTRY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d+)\)").expect("valid registry code regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeUri {
    None,
    Fixed(&'static str),
    /// Prefix completed by the registry code found in parentheses in the value.
    CodePrefix(&'static str),
}

/// A fact read straight off one column of the CDI metadata file.
#[derive(Debug, Clone, Copy)]
pub struct EventTemplate {
    pub column: &'static str,
    pub type_uri: TypeUri,
    pub value_uri_prefix: Option<&'static str>,
    pub unit: &'static str,
    pub unit_uri: &'static str,
    pub method_column: Option<&'static str>,
}

macro_rules! nerc {
    ($path:literal) => {
        concat!("http://vocab.nerc.ac.uk/collection/", $path)
    };
}

pub const EVENT_TEMPLATES: &[EventTemplate] = &[
    EventTemplate {
        column: "Minimum instrument depth (m)",
        type_uri: TypeUri::Fixed(nerc!("P01/current/MINWDIST/")),
        value_uri_prefix: None,
        unit: "m",
        unit_uri: nerc!("P06/current/ULAA/"),
        method_column: None,
    },
    EventTemplate {
        column: "Maximum instrument depth (m)",
        type_uri: TypeUri::Fixed(nerc!("P01/current/MAXWDIST/")),
        value_uri_prefix: None,
        unit: "m",
        unit_uri: nerc!("P06/current/ULAA/"),
        method_column: None,
    },
    EventTemplate {
        column: "Water depth (m)",
        type_uri: TypeUri::None,
        value_uri_prefix: None,
        unit: "m",
        unit_uri: nerc!("P06/current/ULAA/"),
        method_column: Some("Depth reference"),
    },
    EventTemplate {
        column: "Instrument / gear type",
        type_uri: TypeUri::CodePrefix(nerc!("L05/current/")),
        value_uri_prefix: None,
        unit: "NA",
        unit_uri: nerc!("P06/current/XXXX/"),
        method_column: None,
    },
    EventTemplate {
        column: "Platform type",
        type_uri: TypeUri::Fixed(nerc!("W06/current/CLSS0001/")),
        value_uri_prefix: Some(nerc!("L06/current/")),
        unit: "NA",
        unit_uri: nerc!("P06/current/XXXX/"),
        method_column: None,
    },
];

/// Registry code embedded as `(<digits>)` in a free-text value, e.g. `22` in
/// `Van Veen grab (22)`.
pub fn registry_code(value: &str) -> Option<&str> {
    REGISTRY_CODE
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_str())
}

fn coded_uri(prefix: &str, value: &str) -> Option<String> {
    registry_code(value).map(|code| format!("{prefix}{code}/"))
}

/// Applies [`EVENT_TEMPLATES`] to the metadata table; `eventID` is the CDI prefix.
pub fn event_measurements(metadata: &DataFrame) -> PolarsResult<DataFrame> {
    let mut builder = EmofBuilder::default();
    let Some(cdi_ids) = optional_string_column(metadata, CDI_COLUMN)? else {
        return builder.finish();
    };
    let event_ids: StringColumn = cdi_ids
        .iter()
        .map(|id| id.as_deref().map(|id| cdi_prefix(id).to_string()))
        .collect();

    for template in EVENT_TEMPLATES {
        let Some(values) = optional_string_column(metadata, template.column)? else {
            debug!(column = template.column, "metadata column missing, skipping template");
            continue;
        };
        let methods = match template.method_column {
            Some(column) => optional_string_column(metadata, column)?,
            None => None,
        };

        for (row, value) in values.iter().enumerate() {
            let Some(value) = value else {
                continue;
            };
            let type_id = match template.type_uri {
                TypeUri::None => None,
                TypeUri::Fixed(uri) => Some(uri.to_string()),
                TypeUri::CodePrefix(prefix) => coded_uri(prefix, value),
            };
            builder.push(EmofRow {
                event_id: event_ids[row].clone(),
                value: Some(value.clone()),
                value_id: template
                    .value_uri_prefix
                    .and_then(|prefix| coded_uri(prefix, value)),
                measurement_type: Some(template.column.to_string()),
                type_id,
                unit: Some(template.unit.to_string()),
                unit_id: Some(template.unit_uri.to_string()),
                method: methods.as_ref().and_then(|methods| methods[row].clone()),
                ..EmofRow::default()
            });
        }
    }

    builder.finish()
}
