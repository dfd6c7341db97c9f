use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::config::DuplicatePolicy;
use crate::error::{PipelineError, Result};
use crate::frame::{optional_string_column, take_rows};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    pub key_columns: Vec<String>,
    /// Every row whose key tuple occurs more than once, first occurrences included.
    pub rows: Vec<usize>,
    /// Number of distinct key tuples that are duplicated.
    pub duplicated_keys: usize,
    /// Rows with a null in any key column. They never count as duplicates of each other.
    pub null_key_rows: Vec<usize>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

type KeyTuple = Vec<String>;

/// Key tuple per row; `None` when any key cell is null or the key column is missing.
fn key_tuples(df: &DataFrame, key_columns: &[&str]) -> PolarsResult<Vec<Option<KeyTuple>>> {
    let height = df.height();
    let columns = key_columns
        .iter()
        .map(|name| Ok(optional_string_column(df, name)?.unwrap_or_else(|| vec![None; height])))
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok((0..height)
        .map(|row| columns.iter().map(|values| values[row].clone()).collect())
        .collect())
}

/// Flags every row whose key tuple is shared with another row. Rows with a null key are
/// listed in `null_key_rows` instead.
pub fn find_duplicates(df: &DataFrame, key_columns: &[&str]) -> PolarsResult<DuplicateReport> {
    let tuples = key_tuples(df, key_columns)?;
    let mut counts: HashMap<&KeyTuple, usize> = HashMap::new();
    for tuple in tuples.iter().flatten() {
        *counts.entry(tuple).or_default() += 1;
    }

    let mut rows = Vec::new();
    let mut null_key_rows = Vec::new();
    for (row, tuple) in tuples.iter().enumerate() {
        match tuple {
            Some(tuple) if counts.get(tuple).copied().unwrap_or_default() > 1 => rows.push(row),
            Some(_) => {}
            None => null_key_rows.push(row),
        }
    }

    Ok(DuplicateReport {
        key_columns: key_columns.iter().map(|name| name.to_string()).collect(),
        rows,
        duplicated_keys: counts.values().filter(|&&count| count > 1).count(),
        null_key_rows,
    })
}

/// Keeps the first row of every key tuple, preserving row order. Rows with a null key are
/// all kept.
pub fn keep_first(df: &DataFrame, key_columns: &[&str]) -> PolarsResult<DataFrame> {
    let tuples = key_tuples(df, key_columns)?;
    let mut seen = HashSet::new();
    let keep: Vec<usize> = tuples
        .iter()
        .enumerate()
        .filter(|(_, tuple)| tuple.as_ref().map_or(true, |tuple| seen.insert(tuple)))
        .map(|(row, _)| row)
        .collect();
    if keep.len() == df.height() {
        return Ok(df.clone());
    }
    take_rows(df, &keep)
}

/// Checks `column` of a generated table for duplicates and applies `policy`.
pub fn enforce_unique(
    df: DataFrame,
    table: &'static str,
    column: &'static str,
    policy: DuplicatePolicy,
) -> Result<(DataFrame, DuplicateReport)> {
    let report = find_duplicates(&df, &[column])?;
    if !report.null_key_rows.is_empty() {
        warn!(
            table,
            column,
            rows = report.null_key_rows.len(),
            "rows without an identifier kept in output"
        );
    }
    if report.is_empty() {
        return Ok((df, report));
    }

    match policy {
        DuplicatePolicy::Warn => {
            warn!(
                table,
                column,
                rows = report.rows.len(),
                keys = report.duplicated_keys,
                "possible issues with duplicate identifiers"
            );
            Ok((df, report))
        }
        DuplicatePolicy::Fail => Err(PipelineError::duplicates(table, column, &report)),
        DuplicatePolicy::KeepFirst => {
            let deduped = keep_first(&df, &[column])?;
            warn!(
                table,
                column,
                dropped = df.height() - deduped.height(),
                "dropped rows with duplicate identifiers"
            );
            Ok((deduped, report))
        }
    }
}
