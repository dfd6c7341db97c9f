use std::collections::BTreeMap;

use polars::prelude::*;

use crate::formats::Delimiter;

/// One `<subject>/<object>/<units>[/<instrument>]` annotation from the file header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticParameter {
    pub subject: String,
    pub object: String,
    pub units: String,
    pub instrument: Option<String>,
}

impl SemanticParameter {
    /// Local column name the parameter describes, e.g. `Abundance` for `SDN:LOCAL:Abundance`.
    pub fn local_name(&self) -> &str {
        last_segment(&self.subject, ":")
    }

    /// Vocabulary code of the measured property, e.g. `SDBIOL01` for `SDN:P01::SDBIOL01`.
    pub fn object_code(&self) -> &str {
        last_segment(&self.object, "::")
    }

    pub fn units_code(&self) -> &str {
        last_segment(&self.units, "::")
    }

    pub fn instrument_code(&self) -> Option<&str> {
        self.instrument
            .as_deref()
            .map(|value| last_segment(value, "::"))
            .filter(|code| !code.is_empty())
    }
}

/// Attributes of one `<sdn_reference .../>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reference {
    pub attributes: BTreeMap<String, String>,
}

impl Reference {
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    pub fn href(&self) -> Option<&str> {
        self.get("xlink:href")
    }

    pub fn scope(&self) -> Option<&str> {
        self.get("sdn:scope")
    }

    /// Provenance tag used to line rows up with their parameters: the last
    /// `:`-segment of `sdn:scope`.
    pub fn scope_tag(&self) -> Option<&str> {
        self.scope()
            .map(|scope| last_segment(scope, ":"))
            .filter(|tag| !tag.is_empty())
    }
}

/// A data line dropped because it carried more non-empty fields than the header names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Zero-based line index in the file.
    pub line: usize,
    pub fields: usize,
}

#[derive(Debug, Clone)]
pub struct OdvFile {
    pub delimiter: Delimiter,
    pub comments: Vec<String>,
    pub parameters: Vec<SemanticParameter>,
    pub references: Vec<Reference>,
    pub metavariables: DataFrame,
    pub data: DataFrame,
    pub skipped_rows: Vec<SkippedRow>,
}

impl OdvFile {
    pub fn primary_reference(&self) -> Option<&Reference> {
        self.references.first()
    }

    pub fn height(&self) -> usize {
        self.data.height().max(self.metavariables.height())
    }

    /// Metavariable columns followed by data columns, one row per data line.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = self.metavariables.get_columns().to_vec();
        columns.extend(self.data.get_columns().iter().cloned());
        DataFrame::new(columns)
    }
}

fn last_segment<'a>(value: &'a str, separator: &str) -> &'a str {
    value.rsplit(separator).next().unwrap_or(value).trim()
}
