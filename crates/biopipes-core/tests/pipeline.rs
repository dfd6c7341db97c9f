use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use biopipes_core::config::{ConversionConfig, DuplicatePolicy};
use biopipes_core::emof::default_exclusions;
use biopipes_core::error::PipelineError;
use biopipes_core::frame::string_column;
use biopipes_core::ingestion::FileStatus;
use biopipes_core::layout::JobLayout;
use biopipes_core::pipeline::{convert, convert_job};
use biopipes_core::vocabulary::{OfflineResolver, VocabularyCache};
use tempfile::TempDir;

const ODV_FILE: &str = "benthos_westdiep.txt";
const METADATA_FILE: &str = "order.csv";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../biopipes-odv/tests/data")
        .join(name)
}

fn offline_vocabulary() -> VocabularyCache {
    VocabularyCache::new(Box::new(OfflineResolver))
}

/// Lays out an extracted job: the ODV fixture, a non-ODV file and the metadata CSV.
fn extracted_job(odv_contents: &str) -> anyhow::Result<(TempDir, JobLayout)> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("unzip");
    std::fs::create_dir_all(&input)?;
    std::fs::write(input.join(ODV_FILE), odv_contents)?;
    std::fs::copy(fixture("not_odv.txt"), input.join("not_odv.txt"))?;
    std::fs::copy(fixture("benthos_westdiep_meta.csv"), input.join(METADATA_FILE))?;

    let layout =
        JobLayout::from_extracted(&input, &input.join(METADATA_FILE), &dir.path().join("dwc"));
    Ok((dir, layout))
}

fn fixture_text() -> anyhow::Result<String> {
    Ok(std::fs::read_to_string(fixture(ODV_FILE))?)
}

/// Gives the first ST01 continuation row explicit metadata with a different latitude, so the
/// two rows share an eventID but disagree on the event's fields.
fn conflicting_event_fixture() -> anyhow::Result<String> {
    let text = fixture_text()?;
    let conflicting = text.replacen(
        "\t\t\t\t\t\t\t\t\t0\t0.1\tS1\t",
        "WD2021\tST01\tB\t2021-06-01T10:15:00.000\t3.1500\t51.2600\tCDI-A\t486\t35\t0\t0.1\tS1\t",
        1,
    );
    assert_ne!(text, conflicting);
    Ok(conflicting)
}

#[test]
fn converts_fixture_job_end_to_end() -> anyhow::Result<()> {
    let (_dir, layout) = extracted_job(&fixture_text()?)?;
    let output = convert(&layout, &ConversionConfig::default(), &offline_vocabulary())?;
    let summary = &output.summary;

    assert_eq!(summary.files.len(), 2);
    let statuses: Vec<_> = summary.files.iter().map(|file| file.status).collect();
    assert!(statuses.contains(&FileStatus::Parsed));
    assert!(statuses.contains(&FileStatus::Failed));
    assert!(summary.metadata_error.is_none());

    assert_eq!(summary.rows.records, 4);
    assert_eq!(summary.rows.parent_events, 2);
    assert_eq!(output.events.height(), 4);
    assert_eq!(output.occurrences.height(), 4);
    assert_eq!(summary.occurrence_id_failures, 0);
    assert_eq!(summary.geospatial.computed, 4);
    assert_eq!(summary.emof.event_rows, 9);
    assert_eq!(output.emof.height(), 22);
    assert_eq!(summary.duplicates.event_rows, 0);

    let event_ids: HashSet<_> = string_column(&output.events, "eventID")?
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(event_ids.len(), 4);
    assert!(event_ids.contains("CDI-A") && event_ids.contains("CDI-B"));

    // sampling events are the rows pointing at a parent
    let parents = string_column(&output.events, "parentEventID")?;
    let all_ids = string_column(&output.events, "eventID")?;
    let sampling: HashSet<_> = all_ids
        .iter()
        .zip(&parents)
        .filter(|(_, parent)| parent.is_some())
        .filter_map(|(id, _)| id.as_deref())
        .collect();
    assert_eq!(sampling.len(), 2);

    let occurrence_ids = string_column(&output.occurrences, "occurrenceID")?;
    let mut prefixes: Vec<_> = occurrence_ids
        .iter()
        .flatten()
        .map(|id| id.rsplit_once('_').map(|(head, _)| head.to_string()).unwrap_or_default())
        .collect();
    prefixes.sort();
    assert_eq!(
        prefixes,
        vec!["S1_130359", "S1_141433", "S2_141433", "S2_Polychaeta_indet"]
    );

    for id in string_column(&output.occurrences, "eventID")?.iter().flatten() {
        assert!(event_ids.contains(id), "occurrence points at unknown event {id}");
    }
    for id in string_column(&output.emof, "eventID")?.iter().flatten() {
        assert!(event_ids.contains(id), "fact points at unknown event {id}");
    }

    let exclusions = default_exclusions();
    let types = string_column(&output.emof, "measurementType")?;
    assert!(types
        .iter()
        .flatten()
        .all(|kind| !exclusions.contains(&kind.to_lowercase())));
    assert!(string_column(&output.emof, "measurementValue")?
        .iter()
        .all(Option::is_some));
    Ok(())
}

#[test]
fn missing_metadata_still_converts() -> anyhow::Result<()> {
    let (dir, _) = extracted_job(&fixture_text()?)?;
    let input = dir.path().join("unzip");
    let layout = JobLayout::from_extracted(&input, &input.join("missing.csv"), &dir.path().join("dwc"));

    let output = convert(&layout, &ConversionConfig::default(), &offline_vocabulary())?;
    assert!(output.summary.metadata_error.is_some());
    assert_eq!(output.summary.rows.parent_events, 0);
    assert_eq!(output.events.height(), 2);
    assert_eq!(output.summary.emof.event_rows, 0);
    assert_eq!(output.summary.geospatial.computed, 0);
    assert_eq!(output.summary.geospatial.failures.get("missing_value"), Some(&4));
    Ok(())
}

#[test]
fn missing_input_directory_is_an_error() {
    let layout = JobLayout::from_extracted(
        Path::new("/nonexistent/unzip"),
        Path::new("/nonexistent/unzip/order.csv"),
        Path::new("/nonexistent/dwc"),
    );
    let result = convert(&layout, &ConversionConfig::default(), &offline_vocabulary());
    assert!(matches!(result, Err(PipelineError::Processing(_))));
}

#[test]
fn duplicate_policy_controls_conflicting_events() -> anyhow::Result<()> {
    let (_dir, layout) = extracted_job(&conflicting_event_fixture()?)?;
    let vocabulary = offline_vocabulary();

    let warn = convert(&layout, &ConversionConfig::default(), &vocabulary)?;
    assert_eq!(warn.events.height(), 5);
    assert_eq!(warn.summary.duplicates.event_rows, 2);
    assert_eq!(warn.summary.duplicates.policy, "warn");

    let keep_first = ConversionConfig {
        duplicate_policy: DuplicatePolicy::KeepFirst,
        ..ConversionConfig::default()
    };
    let kept = convert(&layout, &keep_first, &vocabulary)?;
    assert_eq!(kept.events.height(), 4);

    let fail = ConversionConfig {
        duplicate_policy: DuplicatePolicy::Fail,
        ..ConversionConfig::default()
    };
    match convert(&layout, &fail, &vocabulary) {
        Err(PipelineError::DuplicateIdentifiers { table, column, count }) => {
            assert_eq!(table, "event");
            assert_eq!(column, "eventID");
            assert_eq!(count, 2);
        }
        other => panic!("expected duplicate identifiers, got {other:?}"),
    }
    Ok(())
}

fn write_zip(path: &Path, name: &str, contents: &[u8]) -> anyhow::Result<()> {
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path)?);
    writer.start_file(name, zip::write::FileOptions::default())?;
    writer.write_all(contents)?;
    writer.finish()?;
    Ok(())
}

#[test]
fn order_archive_job_writes_all_tables() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let order = dir.path().join("order.zip");
    write_zip(&order, ODV_FILE, fixture_text()?.as_bytes())?;
    write_zip(
        &dir.path().join("meta.zip"),
        METADATA_FILE,
        &std::fs::read(fixture("benthos_westdiep_meta.csv"))?,
    )?;

    let layout = JobLayout::from_archive(&order);
    assert_eq!(layout.extract_archives()?, 2);
    let summary = convert_job(&layout, &ConversionConfig::default(), &offline_vocabulary())?;
    assert_eq!(summary.rows.events, 4);

    for path in [
        layout.event_path(),
        layout.occurrence_path(),
        layout.emof_path(),
        layout.all_data_path(),
        layout.summary_path(),
    ] {
        assert!(path.is_file(), "{} was not written", path.display());
    }

    let event_csv = std::fs::read_to_string(layout.event_path())?;
    assert!(event_csv.starts_with("eventID,"));
    assert_eq!(event_csv.lines().count(), 5);

    let emof_csv = std::fs::read_to_string(layout.emof_path())?;
    assert_eq!(
        emof_csv.lines().next(),
        Some("eventID,occurrenceID,measurementID,measurementValue,measurementValueID,measurementType,measurementTypeID,measurementUnit,measurementUnitID,measurementMethod")
    );

    let summary_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(layout.summary_path())?)?;
    assert_eq!(summary_json["rows"]["occurrences"], 4);
    assert_eq!(summary_json["vocabulary"]["fallbacks"].as_u64().map(|n| n > 0), Some(true));
    Ok(())
}
