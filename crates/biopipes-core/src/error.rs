use thiserror::Error;

use crate::config::ConfigError;
use crate::integrity::DuplicateReport;
use crate::vocabulary::VocabularyError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive extraction failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),

    #[error("duplicate {column} values in {table} table: {count} rows affected")]
    DuplicateIdentifiers {
        table: &'static str,
        column: &'static str,
        count: usize,
    },

    #[error("Data processing error: {0}")]
    Processing(String),
}

impl PipelineError {
    pub fn duplicates(table: &'static str, column: &'static str, report: &DuplicateReport) -> Self {
        PipelineError::DuplicateIdentifiers {
            table,
            column,
            count: report.rows.len(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
