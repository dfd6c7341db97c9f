use std::collections::HashSet;
use std::path::{Path, PathBuf};

use biopipes_odv::{parse_odv_file, OdvFile};
use blake3::Hasher;
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::frame::{concat_diagonal, set_string_column};

pub const SCOPE_COLUMN: &str = "scope";
pub const DEFINED_BY_COLUMN: &str = "defined_by";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Duplicate,
    Parsed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub hash: String,
    pub status: FileStatus,
    pub delimiter: Option<&'static str>,
    pub rows: usize,
    /// Data lines dropped for carrying more fields than the header.
    pub skipped_rows: Vec<usize>,
    pub message: Option<String>,
}

/// One accepted ODV file with its provenance tags.
#[derive(Debug)]
pub struct IngestedFile {
    pub path: PathBuf,
    pub hash: String,
    pub scope: String,
    pub defined_by: Option<String>,
    pub odv: OdvFile,
}

#[derive(Debug)]
pub struct IngestionBatch {
    pub files: Vec<IngestedFile>,
    pub reports: Vec<FileReport>,
}

impl IngestionBatch {
    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.status == FileStatus::Failed)
            .count()
    }

    /// Concatenates every file's rows, tagged with `scope` and `defined_by`.
    pub fn records(&self) -> PolarsResult<DataFrame> {
        let frames = self
            .files
            .iter()
            .map(|file| {
                let mut frame = file.odv.to_frame()?;
                let height = frame.height();
                set_string_column(&mut frame, SCOPE_COLUMN, vec![Some(file.scope.clone()); height])?;
                set_string_column(&mut frame, DEFINED_BY_COLUMN, vec![file.defined_by.clone(); height])?;
                Ok(frame)
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        concat_diagonal(&frames)
    }
}

fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

/// Lists candidate ODV files in `dir`, sorted, skipping subdirectories and `exclude`.
pub fn list_input_files(dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let excluded = exclude.and_then(|path| path.file_name().map(|name| name.to_os_string()));
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if excluded.as_deref() == path.file_name() {
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}

fn failed(path: &Path, hash: String, message: String) -> FileReport {
    warn!(path = %path.display(), reason = %message, "skipping ODV file");
    FileReport {
        path: path.display().to_string(),
        hash,
        status: FileStatus::Failed,
        delimiter: None,
        rows: 0,
        skipped_rows: Vec::new(),
        message: Some(message),
    }
}

/// Parses one file's contents. Never fails the batch; problems end up in the report.
pub fn ingest_contents(
    path: &Path,
    contents: &[u8],
    seen: &mut HashSet<String>,
) -> (FileReport, Option<IngestedFile>) {
    let hash = compute_hash(contents);
    if !seen.insert(hash.clone()) {
        info!(path = %path.display(), "skipping byte-identical duplicate file");
        let report = FileReport {
            path: path.display().to_string(),
            hash,
            status: FileStatus::Duplicate,
            delimiter: None,
            rows: 0,
            skipped_rows: Vec::new(),
            message: None,
        };
        return (report, None);
    }

    let Ok(text) = std::str::from_utf8(contents) else {
        return (
            failed(path, hash, "file contents were not valid UTF-8".to_string()),
            None,
        );
    };

    let odv = match parse_odv_file(text) {
        Ok(odv) => odv,
        Err(err) => return (failed(path, hash, err.to_string()), None),
    };

    let Some(reference) = odv.primary_reference() else {
        return (
            failed(path, hash, "file has no sdn_reference".to_string()),
            None,
        );
    };
    let Some(scope) = reference.scope_tag().map(str::to_string) else {
        return (
            failed(path, hash, "sdn_reference has no sdn:scope".to_string()),
            None,
        );
    };
    let defined_by = reference.href().map(str::to_string);

    let skipped_rows: Vec<usize> = odv.skipped_rows.iter().map(|row| row.line).collect();
    if !skipped_rows.is_empty() {
        warn!(
            path = %path.display(),
            lines = ?skipped_rows,
            "dropped data lines with more fields than the header"
        );
    }

    let report = FileReport {
        path: path.display().to_string(),
        hash: hash.clone(),
        status: FileStatus::Parsed,
        delimiter: Some(odv.delimiter.name()),
        rows: odv.height(),
        skipped_rows,
        message: None,
    };
    let file = IngestedFile {
        path: path.to_path_buf(),
        hash,
        scope,
        defined_by,
        odv,
    };
    (report, Some(file))
}

/// Reads and parses every path. Unreadable or unparseable files are reported and skipped.
pub fn ingest_paths(paths: &[PathBuf]) -> IngestionBatch {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut reports = Vec::new();

    for path in paths {
        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(err) => {
                reports.push(failed(path, String::new(), err.to_string()));
                continue;
            }
        };
        let (report, file) = ingest_contents(path, &contents, &mut seen);
        reports.push(report);
        files.extend(file);
    }

    info!(
        parsed = files.len(),
        failed = reports.iter().filter(|r| r.status == FileStatus::Failed).count(),
        "ingested ODV files"
    );
    IngestionBatch { files, reports }
}
