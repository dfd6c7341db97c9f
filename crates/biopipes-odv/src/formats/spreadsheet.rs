use polars::prelude::*;

use crate::errors::OdvError;
use crate::model::{OdvFile, SkippedRow};

use super::columns::metavariable_width;
use super::{parse_comment_block, unique_column_names};

/// Column separator of an ODV spreadsheet. ODV writes tab separated files; semicolon and
/// comma exports come from spreadsheet round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Semicolon,
    Comma,
}

impl Delimiter {
    const PRECEDENCE: [Delimiter; 3] = [Delimiter::Tab, Delimiter::Semicolon, Delimiter::Comma];

    /// The first of tab, semicolon and comma that occurs in the header line.
    pub fn detect(header_line: &str) -> Option<Self> {
        Self::PRECEDENCE
            .into_iter()
            .find(|delimiter| header_line.contains(delimiter.as_char()))
    }

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Tab => '\t',
            Delimiter::Semicolon => ';',
            Delimiter::Comma => ',',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Delimiter::Tab => "tab",
            Delimiter::Semicolon => "semicolon",
            Delimiter::Comma => "comma",
        }
    }
}

fn reader_builder(delimiter: Delimiter) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter.as_char() as u8)
        .quoting(false);
    builder
}

/// Parses a SeaDataNet ODV spreadsheet.
///
/// Data lines with blank metavariables continue the previous station. Trailing empty fields
/// beyond the header width are ignored; a line with extra non-empty fields is skipped and
/// listed in [`OdvFile::skipped_rows`].
pub fn parse_odv_file(content: &str) -> Result<OdvFile, OdvError> {
    let lines: Vec<&str> = content.lines().collect();
    let (block, header_index) = parse_comment_block(&lines);
    let header_index = header_index.ok_or(OdvError::MissingHeader)?;

    let header_line = lines[header_index].trim_start_matches('\u{feff}');
    let delimiter = Delimiter::detect(header_line).ok_or(OdvError::UnknownDelimiter {
        line: header_index,
    })?;

    let raw_headers: Vec<String> = header_line
        .split(delimiter.as_char())
        .map(|name| name.trim().to_string())
        .collect();
    if let Some(position) = raw_headers.iter().position(|name| name.is_empty()) {
        return Err(OdvError::EmptyColumnName {
            line: header_index,
            column: position + 1,
        });
    }
    let headers = unique_column_names(&raw_headers);
    let width = headers.len();
    let meta_width = metavariable_width(&headers);

    let body = lines[header_index + 1..].join("\n");
    let mut reader = reader_builder(delimiter).from_reader(body.as_bytes());

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    let mut previous_meta: Vec<Option<String>> = vec![None; meta_width];
    let mut skipped_rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if record.iter().skip(width).any(|cell| !cell.trim().is_empty()) {
            skipped_rows.push(SkippedRow {
                line: header_index + record.position().map_or(0, |pos| pos.line() as usize),
                fields: record.len(),
            });
            continue;
        }

        let cells: Vec<Option<String>> = (0..width).map(|idx| clean_cell(record.get(idx))).collect();

        let starts_station = cells[..meta_width].iter().any(Option::is_some);
        for (idx, cell) in cells.into_iter().enumerate() {
            if idx < meta_width {
                if starts_station {
                    previous_meta[idx] = cell.clone();
                    columns[idx].push(cell);
                } else {
                    columns[idx].push(previous_meta[idx].clone());
                }
            } else {
                columns[idx].push(cell);
            }
        }
    }

    if columns.first().map_or(true, Vec::is_empty) {
        return Err(OdvError::EmptyData);
    }

    let mut series: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();
    let data_columns = series.split_off(meta_width);

    Ok(OdvFile {
        delimiter,
        comments: block.comments,
        parameters: block.parameters,
        references: block.references,
        metavariables: DataFrame::new(series)?,
        data: DataFrame::new(data_columns)?,
        skipped_rows,
    })
}

fn clean_cell(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}
