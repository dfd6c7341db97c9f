use polars::prelude::*;

use crate::config::ConversionConfig;
use crate::frame::{optional_string_column, set_string_column};

const ABSENT_MARKERS: &[&str] = &["0", "false", "absent", "no"];

fn occurrence_status(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(flag) if ABSENT_MARKERS.iter().any(|m| flag.eq_ignore_ascii_case(m)) => {
            "absent".to_string()
        }
        Some(flag) if !flag.is_empty() => "present".to_string(),
        _ => default.to_string(),
    }
}

/// Adds `occurrenceStatus`, `basisOfRecord`, `institutionCode` and `locality`.
///
/// `institutionCode` is only written when an `EDMO_code` column exists and `locality` only
/// when both station name columns exist.
pub fn add_derived_columns(df: &mut DataFrame, config: &ConversionConfig) -> PolarsResult<()> {
    let height = df.height();

    let status = match optional_string_column(df, "PresenceOrAbsence")? {
        Some(flags) => flags
            .iter()
            .map(|flag| Some(occurrence_status(flag.as_deref(), &config.occurrence_status)))
            .collect(),
        None => vec![Some(config.occurrence_status.clone()); height],
    };
    set_string_column(df, "occurrenceStatus", status)?;
    set_string_column(
        df,
        "basisOfRecord",
        vec![Some(config.basis_of_record.clone()); height],
    )?;

    if let Some(codes) = optional_string_column(df, "EDMO_code")? {
        let institution = codes
            .into_iter()
            .map(|code| code.map(|code| format!("EDMO:{code}")))
            .collect();
        set_string_column(df, "institutionCode", institution)?;
    }

    if let (Some(names), Some(alternatives)) = (
        optional_string_column(df, "Station name")?,
        optional_string_column(df, "Alternative station name")?,
    ) {
        let locality = names
            .into_iter()
            .zip(alternatives)
            .map(|(name, alternative)| match (name, alternative) {
                (None, None) => None,
                (name, alternative) => Some(format!(
                    "{}_{}",
                    name.unwrap_or_default(),
                    alternative.unwrap_or_default()
                )),
            })
            .collect();
        set_string_column(df, "locality", locality)?;
    }

    Ok(())
}
