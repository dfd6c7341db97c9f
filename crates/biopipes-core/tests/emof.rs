use std::collections::HashSet;
use std::path::{Path, PathBuf};

use polars::df;
use polars::prelude::*;

use biopipes_core::emof::{
    cleanup, default_exclusions, event_measurements, nerc_uri, occurrence_measurements,
    parameter_table, EMOF_COLUMNS,
};
use biopipes_core::frame::{column_names, string_column};
use biopipes_core::identifiers::assign_identifiers;
use biopipes_core::ingestion::ingest_contents;
use biopipes_core::metadata::{join_metadata, read_metadata};
use biopipes_core::schema::{coalesce_duplicate_columns, normalize_frame};
use biopipes_core::vocabulary::{TermResolver, VocabularyCache, VocabularyError};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../biopipes-odv/tests/data")
        .join(name)
}

/// Labels every URI with its last path segment.
struct SegmentResolver;

impl TermResolver for SegmentResolver {
    fn resolve(&self, uri: &str) -> Result<String, VocabularyError> {
        Ok(uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_lowercase())
    }
}

fn count_type(emof: &DataFrame, kind: &str) -> PolarsResult<usize> {
    Ok(string_column(emof, "measurementType")?
        .iter()
        .filter(|value| value.as_deref() == Some(kind))
        .count())
}

#[test]
fn identifier_fields_are_excluded_in_any_case() -> PolarsResult<()> {
    let emof = df!(
        "measurementType" => [Some("EVENTID"), Some("eventID"), Some("Abundance"), Some("Biomass"), Some("Latitude")],
        "measurementValue" => [Some("x"), Some("y"), Some("12"), None, Some("51.2")]
    )?;

    let cleaned = cleanup(&emof, &default_exclusions())?;
    assert_eq!(
        string_column(&cleaned, "measurementType")?,
        vec![Some("Abundance".to_string())]
    );
    Ok(())
}

#[test]
fn cleanup_with_no_exclusions_only_drops_nulls() -> PolarsResult<()> {
    let emof = df!(
        "measurementType" => [Some("eventID"), None],
        "measurementValue" => [Some("x"), Some("y")]
    )?;
    let cleaned = cleanup(&emof, &HashSet::new())?;
    assert_eq!(cleaned.height(), 2);
    Ok(())
}

#[test]
fn event_facts_follow_the_templates() -> anyhow::Result<()> {
    let metadata = read_metadata(&fixture("benthos_westdiep_meta.csv"))?;
    let facts = event_measurements(&metadata)?;

    assert_eq!(column_names(&facts), EMOF_COLUMNS.to_vec());
    assert_eq!(facts.height(), 9);
    assert_eq!(count_type(&facts, "Water depth (m)")?, 1);

    let types = string_column(&facts, "measurementType")?;
    let type_ids = string_column(&facts, "measurementTypeID")?;
    let value_ids = string_column(&facts, "measurementValueID")?;
    let methods = string_column(&facts, "measurementMethod")?;
    let events = string_column(&facts, "eventID")?;

    let row = |kind: &str| {
        types
            .iter()
            .position(|value| value.as_deref() == Some(kind))
            .expect("template row")
    };

    let gear = row("Instrument / gear type");
    assert_eq!(
        type_ids[gear].as_deref(),
        Some("http://vocab.nerc.ac.uk/collection/L05/current/22/")
    );
    assert_eq!(events[gear].as_deref(), Some("CDI-A"));

    let platform = row("Platform type");
    assert_eq!(
        type_ids[platform].as_deref(),
        Some("http://vocab.nerc.ac.uk/collection/W06/current/CLSS0001/")
    );
    assert_eq!(
        value_ids[platform].as_deref(),
        Some("http://vocab.nerc.ac.uk/collection/L06/current/31/")
    );

    let water = row("Water depth (m)");
    assert_eq!(type_ids[water], None);
    assert_eq!(methods[water].as_deref(), Some("sea level"));

    assert!(events.iter().all(|id| matches!(id.as_deref(), Some("CDI-A" | "CDI-B"))));
    Ok(())
}

#[test]
fn occurrence_facts_use_resolved_units_and_instruments() -> anyhow::Result<()> {
    let path = fixture("benthos_westdiep.txt");
    let contents = std::fs::read(&path)?;
    let (_, file) = ingest_contents(&path, &contents, &mut HashSet::new());
    let file = file.expect("fixture parses");
    let files = vec![file];

    let vocabulary = VocabularyCache::new(Box::new(SegmentResolver));
    let parameters = parameter_table(&files, &vocabulary);
    assert_eq!(parameters.len(), 7);
    let abundance = parameters
        .iter()
        .find(|p| p.measurement_type == "Abundance")
        .expect("abundance parameter");
    assert_eq!(abundance.scope, "CDI-A");
    assert_eq!(abundance.unit, "upms");
    assert_eq!(abundance.type_id, nerc_uri("P01", "SDBIOL01"));
    assert_eq!(abundance.instrument_id.as_deref(), Some(nerc_uri("L22", "TOOL0653").as_str()));

    let batch_records = {
        let mut frame = files[0].odv.to_frame()?;
        let height = frame.height();
        biopipes_core::frame::set_string_column(&mut frame, "scope", vec![Some("CDI-A".to_string()); height])?;
        frame
    };
    let metadata = read_metadata(&fixture("benthos_westdiep_meta.csv"))?;
    let mut records =
        coalesce_duplicate_columns(&normalize_frame(&join_metadata(&batch_records, &metadata)?)?)?;
    assign_identifiers(&mut records)?;

    let facts = occurrence_measurements(&records, &parameters, &vocabulary)?;
    assert_eq!(count_type(&facts, "Abundance")?, 4);
    assert_eq!(count_type(&facts, "Biomass")?, 3);
    // one instrument fact per sampling event
    assert_eq!(count_type(&facts, "instrument")?, 2);

    let types = string_column(&facts, "measurementType")?;
    let values = string_column(&facts, "measurementValue")?;
    let occurrences = string_column(&facts, "occurrenceID")?;
    let measurement_ids = string_column(&facts, "measurementID")?;
    let instrument = types
        .iter()
        .position(|kind| kind.as_deref() == Some("instrument"))
        .expect("instrument row");
    assert_eq!(values[instrument].as_deref(), Some("tool0653"));
    assert_eq!(occurrences[instrument], None);
    assert_eq!(measurement_ids[instrument], None);

    let ids: HashSet<_> = measurement_ids.iter().flatten().collect();
    assert_eq!(ids.len(), measurement_ids.iter().flatten().count());
    Ok(())
}

#[test]
fn rows_outside_the_parameter_scope_are_ignored() -> anyhow::Result<()> {
    let path = fixture("benthos_westdiep.txt");
    let contents = std::fs::read(&path)?;
    let (_, file) = ingest_contents(&path, &contents, &mut HashSet::new());
    let files = vec![file.expect("fixture parses")];
    let vocabulary = VocabularyCache::new(Box::new(SegmentResolver));
    let parameters = parameter_table(&files, &vocabulary);

    let records = df!(
        "scope" => ["CDI-Z"],
        "eventID" => ["e1"],
        "occurrenceID" => ["o1"],
        "Abundance" => ["5"]
    )?;
    let facts = occurrence_measurements(&records, &parameters, &vocabulary)?;
    assert_eq!(facts.height(), 0);
    Ok(())
}
