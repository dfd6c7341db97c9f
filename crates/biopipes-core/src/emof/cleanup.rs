use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;

use crate::frame::{optional_string_column, take_rows};
use crate::mapping::{mapped_names, EVENT_MAPPING, OCCURRENCE_MAPPING};

/// Lowercased field names and aliases already represented in the Event and Occurrence tables.
pub fn default_exclusions() -> HashSet<String> {
    mapped_names(&[OCCURRENCE_MAPPING, EVENT_MAPPING])
}

/// Drops facts whose `measurementType` (case-insensitive) is in `exclusions` and facts
/// without a `measurementValue`.
pub fn cleanup(emof: &DataFrame, exclusions: &HashSet<String>) -> PolarsResult<DataFrame> {
    let height = emof.height();
    let types = optional_string_column(emof, "measurementType")?.unwrap_or_else(|| vec![None; height]);
    let values = optional_string_column(emof, "measurementValue")?.unwrap_or_else(|| vec![None; height]);

    let keep: Vec<usize> = (0..height)
        .filter(|&row| values[row].is_some())
        .filter(|&row| {
            types[row]
                .as_deref()
                .map_or(true, |kind| !exclusions.contains(&kind.to_lowercase()))
        })
        .collect();

    debug!(kept = keep.len(), dropped = height - keep.len(), "cleaned EMOF rows");
    if keep.len() == height {
        return Ok(emof.clone());
    }
    take_rows(emof, &keep)
}
