use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use biopipes_odv::unique_column_names;
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConversionConfig;
use crate::derive::add_derived_columns;
use crate::frame::{column_names, frame_from_columns, optional_string_column, set_string_column, string_column, StringColumn};
use crate::mapping::{map_columns, META_EVENT_MAPPING};

pub const CDI_COLUMN: &str = "LOCAL_CDI_ID";
pub const JOIN_KEY_COLUMN: &str = "LOCAL_CDI_ID_split";
pub const COLLISION_SUFFIX: &str = "_meta";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse metadata CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("metadata file has no LOCAL_CDI_ID column")]
    MissingKey,
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// The identifier prefix before the first `/`.
pub fn cdi_prefix(local_cdi_id: &str) -> &str {
    local_cdi_id.split('/').next().unwrap_or(local_cdi_id)
}

fn prefixes(values: &StringColumn) -> StringColumn {
    values
        .iter()
        .map(|value| value.as_deref().map(|id| cdi_prefix(id).to_string()))
        .collect()
}

/// Reads the CDI metadata CSV as text and adds `LOCAL_CDI_ID_split`.
pub fn read_metadata(path: &Path) -> Result<DataFrame, MetadataError> {
    let contents = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = parse_metadata(&contents)?;
    info!(path = %path.display(), rows = metadata.height(), "read metadata file");
    Ok(metadata)
}

pub fn parse_metadata(contents: &str) -> Result<DataFrame, MetadataError> {
    let contents = contents.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let headers = unique_column_names(reader.headers()?.iter().map(str::trim));
    let mut columns: Vec<StringColumn> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        for (idx, column) in columns.iter_mut().enumerate() {
            let cell = record
                .get(idx)
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .map(str::to_string);
            column.push(cell);
        }
    }

    let key_index = headers
        .iter()
        .position(|name| name == CDI_COLUMN)
        .ok_or(MetadataError::MissingKey)?;
    let split = prefixes(&columns[key_index]);

    let mut metadata = frame_from_columns(headers.into_iter().zip(columns))?;
    set_string_column(&mut metadata, JOIN_KEY_COLUMN, split)?;
    Ok(metadata)
}

/// Left-joins metadata onto the record table on `LOCAL_CDI_ID == LOCAL_CDI_ID_split`.
///
/// Every record row is kept; a record matching several metadata rows is repeated once per
/// match. Metadata columns whose names already exist in `records` get a `_meta` suffix and
/// the join key itself is not carried over.
pub fn join_metadata(records: &DataFrame, metadata: &DataFrame) -> PolarsResult<DataFrame> {
    if metadata.height() == 0 || optional_string_column(metadata, JOIN_KEY_COLUMN)?.is_none() {
        return Ok(records.clone());
    }

    let keys = string_column(metadata, JOIN_KEY_COLUMN)?;
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row, key) in keys.iter().enumerate() {
        if let Some(key) = key.as_deref() {
            index.entry(key).or_default().push(row);
        }
    }

    let height = records.height();
    let record_keys =
        optional_string_column(records, CDI_COLUMN)?.unwrap_or_else(|| vec![None; height]);
    let mut record_rows = Vec::with_capacity(height);
    let mut meta_rows: Vec<Option<usize>> = Vec::with_capacity(height);
    let mut unmatched = 0usize;
    for (row, key) in record_keys.iter().enumerate() {
        match key.as_deref().and_then(|key| index.get(key)) {
            Some(matches) => {
                for &meta_row in matches {
                    record_rows.push(row);
                    meta_rows.push(Some(meta_row));
                }
            }
            None => {
                unmatched += 1;
                record_rows.push(row);
                meta_rows.push(None);
            }
        }
    }
    debug!(rows = record_rows.len(), unmatched, "joined metadata");

    let record_names = column_names(records);
    let existing: HashSet<&str> = record_names.iter().map(String::as_str).collect();
    let mut columns: Vec<(String, StringColumn)> = Vec::new();
    for name in &record_names {
        let values = string_column(records, name)?;
        columns.push((
            name.clone(),
            record_rows.iter().map(|&row| values[row].clone()).collect(),
        ));
    }
    for name in column_names(metadata) {
        if name == JOIN_KEY_COLUMN {
            continue;
        }
        let values = string_column(metadata, &name)?;
        let target = if existing.contains(name.as_str()) {
            format!("{name}{COLLISION_SUFFIX}")
        } else {
            name
        };
        columns.push((
            target,
            meta_rows
                .iter()
                .map(|row| row.and_then(|row| values[row].clone()))
                .collect(),
        ));
    }

    frame_from_columns(columns)
}

/// Parent events: one event row per metadata row, keyed by the CDI prefix.
pub fn parent_events(metadata: &DataFrame, config: &ConversionConfig) -> PolarsResult<DataFrame> {
    if metadata.height() == 0 {
        return Ok(DataFrame::default());
    }
    let mut events = metadata.clone();
    if let Some(keys) = optional_string_column(&events, JOIN_KEY_COLUMN)? {
        set_string_column(&mut events, "eventID", keys)?;
    }
    add_derived_columns(&mut events, config)?;
    map_columns(&events, META_EVENT_MAPPING)
}
