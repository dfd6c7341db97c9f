use std::io::Write;
use std::path::Path;

use polars::prelude::{DataFrame, PolarsResult};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::frame::{column_names, string_column};

/// Writes `df` as CSV with a header row; nulls become empty cells.
pub fn write_csv<W: Write>(df: &DataFrame, writer: W) -> Result<()> {
    let names = column_names(df);
    let columns = names
        .iter()
        .map(|name| string_column(df, name))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&names)?;
    for row in 0..df.height() {
        csv_writer.write_record(
            columns
                .iter()
                .map(|values| values[row].as_deref().unwrap_or_default()),
        )?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_csv_file(df: &DataFrame, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(df, std::io::BufWriter::new(file))?;
    info!(path = %path.display(), rows = df.height(), "wrote table");
    Ok(())
}

pub fn write_json_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
