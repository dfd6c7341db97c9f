use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ConversionConfig;
use crate::derive::add_derived_columns;
use crate::emof::{generate_emof, EmofReport};
use crate::error::{PipelineError, Result};
use crate::frame::concat_diagonal;
use crate::geospatial::{enrich_footprints, GeoReport};
use crate::identifiers::assign_identifiers;
use crate::ingestion::{ingest_paths, list_input_files, FileReport};
use crate::integrity::enforce_unique;
use crate::layout::JobLayout;
use crate::mapping::{map_columns, EVENT_MAPPING, OCCURRENCE_MAPPING};
use crate::metadata::{join_metadata, parent_events, read_metadata};
use crate::outputs::{write_csv_file, write_json_file};
use crate::schema::{coalesce_duplicate_columns, normalize_frame};
use crate::vocabulary::{resolver_from_config, VocabularyCache, VocabularyStats};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RowCounts {
    pub records: usize,
    pub parent_events: usize,
    pub events: usize,
    pub occurrences: usize,
    pub emof: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateCounts {
    pub policy: String,
    pub event_rows: usize,
    pub occurrence_rows: usize,
    /// Occurrence rows kept without an `occurrenceID`.
    pub occurrence_null_ids: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub metadata_error: Option<String>,
    pub rows: RowCounts,
    pub occurrence_id_failures: usize,
    pub duplicates: DuplicateCounts,
    pub geospatial: GeoReport,
    pub emof: EmofReport,
    pub vocabulary: VocabularyStats,
}

/// The four tables of one conversion plus its summary.
#[derive(Debug)]
pub struct ConversionOutput {
    pub events: DataFrame,
    pub occurrences: DataFrame,
    pub emof: DataFrame,
    pub all_data: DataFrame,
    pub summary: ConversionSummary,
}

/// Runs the conversion for an already extracted job without writing anything.
pub fn convert(
    layout: &JobLayout,
    config: &ConversionConfig,
    vocabulary: &VocabularyCache,
) -> Result<ConversionOutput> {
    let started_at = Utc::now();
    if !layout.input_dir.is_dir() {
        return Err(PipelineError::Processing(format!(
            "input directory {} does not exist",
            layout.input_dir.display()
        )));
    }
    info!(input_dir = %layout.input_dir.display(), "converting ODV job to Darwin Core");

    let paths = list_input_files(&layout.input_dir, Some(&layout.metadata_path))?;
    let batch = ingest_paths(&paths);
    let records = batch.records()?;

    let (metadata, metadata_error) = match read_metadata(&layout.metadata_path) {
        Ok(metadata) => (metadata, None),
        Err(err) => {
            warn!(
                path = %layout.metadata_path.display(),
                error = %err,
                "problem reading metadata file, continuing without it"
            );
            (DataFrame::default(), Some(err.to_string()))
        }
    };

    let mut joined = join_metadata(&records, &metadata)?;
    let geospatial = enrich_footprints(&mut joined)?;
    if geospatial.failed() > 0 {
        warn!(failed = geospatial.failed(), failures = ?geospatial.failures, "footprints not computed for some rows");
    }

    let mut all_data = coalesce_duplicate_columns(&normalize_frame(&joined)?)?;
    add_derived_columns(&mut all_data, config)?;
    let identifiers = assign_identifiers(&mut all_data)?;

    let parents = parent_events(&metadata, config)?;
    let sampling_events = map_columns(&all_data, EVENT_MAPPING)?;
    let events = concat_diagonal(&[parents.clone(), sampling_events])?;

    let (emof, emof_report) = generate_emof(&all_data, &batch.files, &metadata, vocabulary)?;

    let (events, event_duplicates) =
        enforce_unique(events, "event", "eventID", config.duplicate_policy)?;
    let occurrences = map_columns(&all_data, OCCURRENCE_MAPPING)?;
    let (occurrences, occurrence_duplicates) =
        enforce_unique(occurrences, "occurrence", "occurrenceID", config.duplicate_policy)?;

    let summary = ConversionSummary {
        started_at,
        finished_at: Utc::now(),
        files: batch.reports,
        metadata_error,
        rows: RowCounts {
            records: all_data.height(),
            parent_events: parents.height(),
            events: events.height(),
            occurrences: occurrences.height(),
            emof: emof.height(),
        },
        occurrence_id_failures: identifiers.occurrence_failures,
        duplicates: DuplicateCounts {
            policy: config.duplicate_policy.to_string(),
            event_rows: event_duplicates.rows.len(),
            occurrence_rows: occurrence_duplicates.rows.len(),
            occurrence_null_ids: occurrence_duplicates.null_key_rows.len(),
        },
        geospatial,
        emof: emof_report,
        vocabulary: vocabulary.stats(),
    };

    Ok(ConversionOutput {
        events,
        occurrences,
        emof,
        all_data,
        summary,
    })
}

/// Writes `event.csv`, `occ.csv`, `emof.csv`, `all.csv` and `summary.json`.
pub fn write_outputs(layout: &JobLayout, output: &ConversionOutput) -> Result<()> {
    std::fs::create_dir_all(&layout.output_dir)?;
    write_csv_file(&output.events, &layout.event_path())?;
    write_csv_file(&output.occurrences, &layout.occurrence_path())?;
    write_csv_file(&output.emof, &layout.emof_path())?;
    write_csv_file(&output.all_data, &layout.all_data_path())?;
    write_json_file(&output.summary, &layout.summary_path())?;
    Ok(())
}

/// Converts one job and writes its tables.
pub fn convert_job(
    layout: &JobLayout,
    config: &ConversionConfig,
    vocabulary: &VocabularyCache,
) -> Result<ConversionSummary> {
    let output = convert(layout, config, vocabulary)?;
    write_outputs(layout, &output)?;
    info!(
        output_dir = %layout.output_dir.display(),
        events = output.summary.rows.events,
        occurrences = output.summary.rows.occurrences,
        emof = output.summary.rows.emof,
        "finished converting job"
    );
    Ok(output.summary)
}

/// Builds the vocabulary cache the config describes, seeded from its snapshot if any.
pub fn vocabulary_from_config(config: &ConversionConfig) -> Result<VocabularyCache> {
    let cache = VocabularyCache::new(resolver_from_config(&config.vocabulary)?);
    if let Some(path) = &config.vocabulary.cache_path {
        cache.load_snapshot(path)?;
    }
    Ok(cache)
}

/// Persists resolved labels to the configured snapshot, if any.
pub fn persist_vocabulary(config: &ConversionConfig, cache: &VocabularyCache) -> Result<()> {
    if let Some(path) = &config.vocabulary.cache_path {
        let saved = cache.save_snapshot(path)?;
        info!(path = %path.display(), labels = saved, "saved vocabulary snapshot");
    }
    Ok(())
}
