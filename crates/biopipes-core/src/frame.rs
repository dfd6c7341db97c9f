//! Helpers for the all-text frames the converter works on.
//!
//! Every table in a conversion holds its cells as nullable strings, so these helpers read and
//! rebuild frames column by column instead of relying on typed polars kernels.

use std::collections::HashSet;

use polars::prelude::*;

pub type StringColumn = Vec<Option<String>>;

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Reads a column as text, casting non-string columns first.
pub fn string_column(df: &DataFrame, name: &str) -> PolarsResult<StringColumn> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

pub fn optional_string_column(df: &DataFrame, name: &str) -> PolarsResult<Option<StringColumn>> {
    if has_column(df, name) {
        string_column(df, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Builds a frame from named text columns. No columns yields an empty frame.
pub fn frame_from_columns<I>(columns: I) -> PolarsResult<DataFrame>
where
    I: IntoIterator<Item = (String, StringColumn)>,
{
    let columns: Vec<Column> = columns
        .into_iter()
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();
    if columns.is_empty() {
        return Ok(DataFrame::default());
    }
    DataFrame::new(columns)
}

/// Adds or replaces a text column.
pub fn set_string_column(df: &mut DataFrame, name: &str, values: StringColumn) -> PolarsResult<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

fn all_string_columns(df: &DataFrame) -> PolarsResult<Vec<(String, StringColumn)>> {
    column_names(df)
        .into_iter()
        .map(|name| {
            let values = string_column(df, &name)?;
            Ok((name, values))
        })
        .collect()
}

/// Gathers rows by index; indices may repeat or reorder rows.
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> PolarsResult<DataFrame> {
    let columns = all_string_columns(df)?;
    frame_from_columns(columns.into_iter().map(|(name, values)| {
        let picked = rows.iter().map(|&row| values[row].clone()).collect();
        (name, picked)
    }))
}

/// Stacks frames with different column sets. Columns appear in first-seen order and cells
/// of columns a frame lacks are null.
pub fn concat_diagonal(frames: &[DataFrame]) -> PolarsResult<DataFrame> {
    let mut order: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for frame in frames {
        for name in column_names(frame) {
            if seen.insert(name.clone()) {
                order.push(name);
            }
        }
    }

    let mut combined: Vec<StringColumn> = vec![Vec::new(); order.len()];
    for frame in frames {
        let height = frame.height();
        for (name, target) in order.iter().zip(combined.iter_mut()) {
            match optional_string_column(frame, name)? {
                Some(values) => target.extend(values),
                None => target.extend(std::iter::repeat(None).take(height)),
            }
        }
    }

    frame_from_columns(order.into_iter().zip(combined))
}

/// Drops rows whose full tuple of values was already seen, keeping first occurrences.
pub fn distinct_rows(df: &DataFrame) -> PolarsResult<DataFrame> {
    let columns = all_string_columns(df)?;
    let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
    let keep: Vec<usize> = (0..df.height())
        .filter(|&row| {
            let tuple = columns
                .iter()
                .map(|(_, values)| values[row].clone())
                .collect::<Vec<_>>();
            seen.insert(tuple)
        })
        .collect();

    if keep.len() == df.height() {
        return Ok(df.clone());
    }
    take_rows(df, &keep)
}
