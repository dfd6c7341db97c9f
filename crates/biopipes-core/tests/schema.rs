use polars::df;
use polars::prelude::*;

use biopipes_core::frame::{column_names, string_column};
use biopipes_core::schema::{coalesce_duplicate_columns, normalize_column_name, normalize_frame};

#[test]
fn strips_units_and_index_markers() {
    assert_eq!(normalize_column_name("Latitude [degrees_north]"), "Latitude");
    assert_eq!(normalize_column_name("ScientificName:INDEXED_TEXT"), "ScientificName");
    assert_eq!(normalize_column_name("Abundance [#/m2]"), "Abundance");
    assert_eq!(normalize_column_name("Station"), "Station");
    assert_eq!(normalize_column_name("QV:SEADATANET.1"), "QV:SEADATANET.1");
}

#[test]
fn name_that_would_vanish_is_kept() {
    assert_eq!(normalize_column_name("[m]"), "[m]");
    assert_eq!(normalize_column_name(":INDEXED_TEXT"), ":INDEXED_TEXT");
}

#[test]
fn normalizing_twice_equals_normalizing_once() {
    let names = [
        "Latitude [degrees_north]",
        "Bot. Depth [m]",
        "SampleID:INDEXED_TEXT",
        "Temperature [degC] [raw]",
        "[m]",
        "odd [a [b]]",
        "plain",
        "",
    ];
    for name in names {
        let once = normalize_column_name(name);
        assert_eq!(normalize_column_name(&once), once, "not idempotent for {name:?}");
    }
}

#[test]
fn normalizer_leaves_collisions_alone() -> PolarsResult<()> {
    let frame = df!(
        "Temperature [degC]" => [Some("12.1"), None],
        "Station" => ["A", "B"],
        "Temperature [deg_C]" => [Some("99"), Some("11.8")]
    )?;

    let normalized = normalize_frame(&frame)?;
    assert_eq!(
        column_names(&normalized),
        vec!["Temperature", "Station", "Temperature [deg_C]"]
    );
    assert_eq!(
        string_column(&normalized, "Temperature [deg_C]")?,
        vec![Some("99".to_string()), Some("11.8".to_string())]
    );
    Ok(())
}

#[test]
fn bare_column_keeps_its_name_over_annotated_twin() -> PolarsResult<()> {
    let frame = df!(
        "Latitude [degrees_north]" => [Some("51.1")],
        "Latitude" => [Some("51.2")]
    )?;

    let normalized = normalize_frame(&frame)?;
    assert_eq!(
        column_names(&normalized),
        vec!["Latitude [degrees_north]", "Latitude"]
    );

    let merged = coalesce_duplicate_columns(&normalized)?;
    assert_eq!(column_names(&merged), vec!["Latitude"]);
    assert_eq!(string_column(&merged, "Latitude")?, vec![Some("51.1".to_string())]);
    Ok(())
}

#[test]
fn colliding_columns_coalesce_left_to_right() -> PolarsResult<()> {
    let frame = df!(
        "Temperature [degC]" => [Some("12.1"), None, None],
        "Station" => ["A", "B", "C"],
        "Temperature [deg_C]" => [Some("99"), Some("11.8"), None]
    )?;

    let merged = coalesce_duplicate_columns(&normalize_frame(&frame)?)?;
    assert_eq!(column_names(&merged), vec!["Temperature", "Station"]);
    assert_eq!(
        string_column(&merged, "Temperature")?,
        vec![Some("12.1".to_string()), Some("11.8".to_string()), None]
    );
    Ok(())
}

#[test]
fn semicolon_fixture_columns_merge_after_parsing() -> PolarsResult<()> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../biopipes-odv/tests/data/ctd_semicolon.txt");
    let content = std::fs::read_to_string(path).expect("read fixture");
    let parsed = biopipes_odv::parse_odv_file(&content).expect("parse");

    let merged = coalesce_duplicate_columns(&normalize_frame(&parsed.to_frame()?)?)?;
    let temperature = string_column(&merged, "Temperature")?;
    assert_eq!(temperature[0].as_deref(), Some("12.1"));
    assert_eq!(temperature[1].as_deref(), Some("11.8"));
    assert!(merged.column("Longitude").is_ok());
    Ok(())
}
