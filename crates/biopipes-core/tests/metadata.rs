use std::path::{Path, PathBuf};

use polars::df;

use biopipes_core::config::ConversionConfig;
use biopipes_core::frame::{column_names, string_column};
use biopipes_core::metadata::{
    cdi_prefix, join_metadata, parent_events, parse_metadata, read_metadata, MetadataError,
    JOIN_KEY_COLUMN,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../biopipes-odv/tests/data")
        .join(name)
}

#[test]
fn prefix_is_taken_before_the_first_slash() {
    assert_eq!(cdi_prefix("CDI-A/2021/x"), "CDI-A");
    assert_eq!(cdi_prefix("CDI-A"), "CDI-A");
}

#[test]
fn metadata_reads_as_text_with_split_key() -> anyhow::Result<()> {
    let metadata = read_metadata(&fixture("benthos_westdiep_meta.csv"))?;
    assert_eq!(metadata.height(), 2);
    assert_eq!(
        string_column(&metadata, JOIN_KEY_COLUMN)?,
        vec![Some("CDI-A".to_string()), Some("CDI-B".to_string())]
    );
    assert_eq!(string_column(&metadata, "Water depth (m)")?[1], None);
    assert_eq!(string_column(&metadata, "Latitude 1")?[0].as_deref(), Some("51.20"));
    Ok(())
}

#[test]
fn metadata_without_key_is_an_error() {
    let result = parse_metadata("Station name,EDMO_code\nWestdiep,486\n");
    assert!(matches!(result, Err(MetadataError::MissingKey)));
}

#[test]
fn join_keeps_every_record_and_repeats_on_multiple_matches() -> anyhow::Result<()> {
    let metadata = parse_metadata(
        "\u{feff}LOCAL_CDI_ID,Station,Water depth (m)\nCDI-A/1,North,35\nCDI-A/2,South,36\n",
    )?;
    let records = df!(
        "LOCAL_CDI_ID" => [Some("CDI-A"), Some("CDI-Z"), None],
        "Station" => ["ST01", "ST09", "ST10"]
    )?;

    let joined = join_metadata(&records, &metadata)?;
    assert_eq!(joined.height(), 4);
    assert_eq!(
        column_names(&joined),
        vec!["LOCAL_CDI_ID", "Station", "LOCAL_CDI_ID_meta", "Station_meta", "Water depth (m)"]
    );
    assert_eq!(
        string_column(&joined, "Water depth (m)")?,
        vec![Some("35".to_string()), Some("36".to_string()), None, None]
    );
    Ok(())
}

#[test]
fn parent_events_use_the_cdi_prefix() -> anyhow::Result<()> {
    let metadata = read_metadata(&fixture("benthos_westdiep_meta.csv"))?;
    let events = parent_events(&metadata, &ConversionConfig::default())?;

    assert_eq!(events.height(), 2);
    assert_eq!(
        string_column(&events, "eventID")?,
        vec![Some("CDI-A".to_string()), Some("CDI-B".to_string())]
    );
    assert_eq!(
        string_column(&events, "locality")?[0].as_deref(),
        Some("Westdiep 1_WD1")
    );
    assert_eq!(
        string_column(&events, "locationID")?[1].as_deref(),
        Some("Westdiep 2")
    );
    assert_eq!(
        string_column(&events, "institutionCode")?[0].as_deref(),
        Some("RBINS (486)")
    );
    assert!(events.column("parentEventID").is_err());
    Ok(())
}
