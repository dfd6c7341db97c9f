use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Reference, SemanticParameter};

static PARAMETER_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(subject|object|units|instrument)>\s*([^<]*?)\s*</(?:subject|object|units|instrument)>")
        .expect("valid parameter regex")
});

static REFERENCE_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<sdn_reference\b([^>]*)/?>").expect("valid reference regex"));

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\w:.-]+)\s*=\s*"([^"]*)""#).expect("valid attribute regex"));

#[derive(Debug, Default)]
pub(crate) struct CommentBlock {
    pub comments: Vec<String>,
    pub parameters: Vec<SemanticParameter>,
    pub references: Vec<Reference>,
}

/// Splits the `//` comment lines off the front of an ODV file.
///
/// Returns the parsed block and the zero-based index of the first line that is neither a
/// comment nor blank (the column header), if any.
pub(crate) fn parse_comment_block(lines: &[&str]) -> (CommentBlock, Option<usize>) {
    let mut block = CommentBlock::default();

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start_matches('\u{feff}').trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(body) = trimmed.strip_prefix("//") else {
            return (block, Some(index));
        };

        if let Some(parameter) = parse_parameter(body) {
            block.parameters.push(parameter);
        } else if let Some(reference) = parse_reference(body) {
            block.references.push(reference);
        } else {
            block.comments.push(body.to_string());
        }
    }

    (block, None)
}

fn parse_parameter(body: &str) -> Option<SemanticParameter> {
    let mut subject = None;
    let mut object = None;
    let mut units = None;
    let mut instrument = None;

    for captures in PARAMETER_ELEMENT.captures_iter(body) {
        let value = captures[2].to_string();
        match &captures[1] {
            "subject" => subject = Some(value),
            "object" => object = Some(value),
            "units" => units = Some(value),
            "instrument" => instrument = Some(value).filter(|v| !v.is_empty()),
            _ => {}
        }
    }

    Some(SemanticParameter {
        subject: subject?,
        object: object?,
        units: units?,
        instrument,
    })
}

fn parse_reference(body: &str) -> Option<Reference> {
    let captures = REFERENCE_ELEMENT.captures(body)?;
    let attributes: BTreeMap<String, String> = ATTRIBUTE
        .captures_iter(&captures[1])
        .map(|attr| (attr[1].to_string(), attr[2].to_string()))
        .collect();
    Some(Reference { attributes })
}
