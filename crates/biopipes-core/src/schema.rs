use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::frame::{column_names, frame_from_columns, string_column, StringColumn};

static ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\[[^\]]*\]|:INDEXED_TEXT\b").expect("valid column annotation regex")
});

/// Strips unit annotations (`Latitude [degrees_north]`) and `:INDEXED_TEXT` markers.
///
/// A name that would become empty is returned unchanged.
pub fn normalize_column_name(name: &str) -> String {
    let stripped = ANNOTATION.replace_all(name, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        name.to_string()
    } else {
        stripped.to_string()
    }
}

/// Renames every column to its bare name.
///
/// Polars frames cannot hold two columns with one name, so a column whose bare name is already
/// taken keeps its original name. Merging such columns is [`coalesce_duplicate_columns`]'s job.
pub fn normalize_frame(df: &DataFrame) -> PolarsResult<DataFrame> {
    let names = column_names(df);
    let mut taken: HashSet<String> = names
        .iter()
        .filter(|name| normalize_column_name(name) == **name)
        .cloned()
        .collect();

    let mut renamed = df.clone();
    for original in names {
        let bare = normalize_column_name(&original);
        if bare == original {
            continue;
        }
        if taken.insert(bare.clone()) {
            renamed.rename(&original, bare.as_str().into())?;
        } else {
            debug!(column = %original, bare = %bare, "bare name taken, keeping original");
        }
    }
    Ok(renamed)
}

/// Merges columns that share a bare name into one column under that name, placed where the
/// first of them stood. Per row the value is the first non-null one, scanning left to right.
pub fn coalesce_duplicate_columns(df: &DataFrame) -> PolarsResult<DataFrame> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, StringColumn> = HashMap::new();

    for name in column_names(df) {
        let bare = normalize_column_name(&name);
        let values = string_column(df, &name)?;
        match merged.get_mut(&bare) {
            Some(existing) => {
                debug!(column = %name, into = %bare, "coalescing duplicate column");
                coalesce_into(existing, values);
            }
            None => {
                order.push(bare.clone());
                merged.insert(bare, values);
            }
        }
    }

    frame_from_columns(order.into_iter().map(|name| {
        let values = merged.remove(&name).unwrap_or_default();
        (name, values)
    }))
}

fn coalesce_into(target: &mut StringColumn, later: StringColumn) {
    for (slot, value) in target.iter_mut().zip(later) {
        if slot.is_none() {
            *slot = value;
        }
    }
}
