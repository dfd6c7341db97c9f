use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OdvError {
    #[error("file has no column header line")]
    MissingHeader,

    #[error("header line {line} is not tab, semicolon or comma separated")]
    UnknownDelimiter { line: usize },

    #[error("header line {line}: column {column} has an empty name")]
    EmptyColumnName { line: usize, column: usize },

    #[error("failed to read data rows: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to build frame: {0}")]
    Frame(#[from] PolarsError),

    #[error("file did not contain any data rows")]
    EmptyData,
}
