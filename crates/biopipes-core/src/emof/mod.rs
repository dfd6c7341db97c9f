//! Extended Measurement Or Fact generation.
//!
//! Facts come from two places: the semantic parameters of each ODV file applied to the record
//! table ([`occurrence`]) and a static template table applied to the CDI metadata
//! ([`event`]). Both are merged and filtered by [`cleanup`].

pub mod cleanup;
pub mod event;
pub mod occurrence;

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::frame::{concat_diagonal, frame_from_columns, StringColumn};
use crate::ingestion::IngestedFile;
use crate::vocabulary::VocabularyCache;

pub use cleanup::{cleanup, default_exclusions};
pub use event::{event_measurements, EventTemplate, TypeUri, EVENT_TEMPLATES};
pub use occurrence::{occurrence_measurements, parameter_table, ParameterDescriptor};

pub const NERC_COLLECTION: &str = "http://vocab.nerc.ac.uk/collection";

pub const EMOF_COLUMNS: [&str; 10] = [
    "eventID",
    "occurrenceID",
    "measurementID",
    "measurementValue",
    "measurementValueID",
    "measurementType",
    "measurementTypeID",
    "measurementUnit",
    "measurementUnitID",
    "measurementMethod",
];

/// `http://vocab.nerc.ac.uk/collection/<collection>/current/<code>/`
pub fn nerc_uri(collection: &str, code: &str) -> String {
    format!("{NERC_COLLECTION}/{collection}/current/{code}/")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmofRow {
    pub event_id: Option<String>,
    pub occurrence_id: Option<String>,
    pub measurement_id: Option<String>,
    pub value: Option<String>,
    pub value_id: Option<String>,
    pub measurement_type: Option<String>,
    pub type_id: Option<String>,
    pub unit: Option<String>,
    pub unit_id: Option<String>,
    pub method: Option<String>,
}

/// Accumulates rows column-wise in [`EMOF_COLUMNS`] order.
#[derive(Debug, Default)]
pub struct EmofBuilder {
    columns: [StringColumn; 10],
}

impl EmofBuilder {
    pub fn push(&mut self, row: EmofRow) {
        let values = [
            row.event_id,
            row.occurrence_id,
            row.measurement_id,
            row.value,
            row.value_id,
            row.measurement_type,
            row.type_id,
            row.unit,
            row.unit_id,
            row.method,
        ];
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> PolarsResult<DataFrame> {
        frame_from_columns(
            EMOF_COLUMNS
                .iter()
                .map(|name| name.to_string())
                .zip(self.columns),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmofReport {
    pub event_rows: usize,
    pub occurrence_rows: usize,
    pub removed_by_cleanup: usize,
    pub rows: usize,
}

/// Builds the final EMOF table: event-path facts first, then occurrence-path facts, cleaned.
pub fn generate_emof(
    records: &DataFrame,
    files: &[IngestedFile],
    metadata: &DataFrame,
    vocabulary: &VocabularyCache,
) -> PolarsResult<(DataFrame, EmofReport)> {
    let event_facts = event_measurements(metadata)?;
    let parameters = parameter_table(files, vocabulary);
    let occurrence_facts = occurrence_measurements(records, &parameters, vocabulary)?;

    let combined = concat_diagonal(&[event_facts.clone(), occurrence_facts.clone()])?;
    let cleaned = cleanup(&combined, &default_exclusions())?;

    let report = EmofReport {
        event_rows: event_facts.height(),
        occurrence_rows: occurrence_facts.height(),
        removed_by_cleanup: combined.height() - cleaned.height(),
        rows: cleaned.height(),
    };
    info!(
        event_rows = report.event_rows,
        occurrence_rows = report.occurrence_rows,
        removed = report.removed_by_cleanup,
        "generated EMOF table"
    );
    Ok((cleaned, report))
}
