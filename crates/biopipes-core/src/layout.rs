use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

pub const META_ARCHIVE: &str = "meta.zip";
pub const UNZIP_DIR: &str = "unzip";
pub const DWC_DIR: &str = "dwc";

/// Where one conversion job reads its inputs and writes its tables.
///
/// For an order archive `<dir>/<order>.zip` the layout is:
///
/// ```text
/// <dir>/meta.zip
/// <dir>/unzip/            extracted ODV files and <order>.csv metadata
/// <dir>/dwc/event.csv
/// <dir>/dwc/occ.csv
/// <dir>/dwc/emof.csv
/// <dir>/dwc/all.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    pub order_archive: Option<PathBuf>,
    pub meta_archive: Option<PathBuf>,
    pub input_dir: PathBuf,
    pub metadata_path: PathBuf,
    pub output_dir: PathBuf,
}

impl JobLayout {
    pub fn from_archive(order_archive: &Path) -> Self {
        let root = order_archive
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = order_archive
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "metadata".to_string());
        let input_dir = root.join(UNZIP_DIR);
        Self {
            order_archive: Some(order_archive.to_path_buf()),
            meta_archive: Some(root.join(META_ARCHIVE)),
            metadata_path: input_dir.join(format!("{stem}.csv")),
            input_dir,
            output_dir: root.join(DWC_DIR),
        }
    }

    pub fn from_extracted(input_dir: &Path, metadata_path: &Path, output_dir: &Path) -> Self {
        Self {
            order_archive: None,
            meta_archive: None,
            input_dir: input_dir.to_path_buf(),
            metadata_path: metadata_path.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn event_path(&self) -> PathBuf {
        self.output_dir.join("event.csv")
    }

    pub fn occurrence_path(&self) -> PathBuf {
        self.output_dir.join("occ.csv")
    }

    pub fn emof_path(&self) -> PathBuf {
        self.output_dir.join("emof.csv")
    }

    pub fn all_data_path(&self) -> PathBuf {
        self.output_dir.join("all.csv")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("summary.json")
    }

    /// Creates the extraction and output directories.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.input_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Extracts the order archive and the metadata archive into `input_dir`. Returns the
    /// number of archive entries written.
    pub fn extract_archives(&self) -> Result<usize> {
        self.prepare()?;
        let mut extracted = 0;
        for archive in [&self.order_archive, &self.meta_archive].into_iter().flatten() {
            extracted += extract_zip(archive, &self.input_dir)?;
        }
        info!(
            input_dir = %self.input_dir.display(),
            entries = extracted,
            "extracted job archives"
        );
        Ok(extracted)
    }
}

pub fn extract_zip(archive_path: &Path, target: &Path) -> Result<usize> {
    debug!(archive = %archive_path.display(), target = %target.display(), "unzipping");
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
    let entries = archive.len();
    archive.extract(target)?;
    Ok(entries)
}
