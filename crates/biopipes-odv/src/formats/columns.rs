use std::collections::HashMap;

const KNOWN_METAVARIABLES: &[&str] = &[
    "Cruise",
    "Station",
    "Type",
    "yyyy-mm-ddThh:mm:ss.sss",
    "yyyy-mm-ddThh:mm:ss",
    "yyyy-mm-ddThh:mm",
    "yyyy-mm-dd",
    "mon/day/yr",
    "hh:mm",
    "Longitude",
    "Latitude",
    "LOCAL_CDI_ID",
    "EDMO_code",
    "Bot. Depth",
    "Instrument Info",
];

/// Whether an ODV header names a metavariable (station-level column).
pub fn is_metavariable(header: &str) -> bool {
    let header = header.trim();
    if header.contains(":METAVAR") {
        return true;
    }
    KNOWN_METAVARIABLES.iter().any(|known| {
        if header.len() < known.len() || !header.is_char_boundary(known.len()) {
            return false;
        }
        let (head, rest) = header.split_at(known.len());
        head.eq_ignore_ascii_case(known) && (rest.is_empty() || rest.starts_with(" ["))
    })
}

/// Disambiguates repeated header names by suffixing later occurrences with `.1`, `.2`, ...
pub fn unique_column_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unique = Vec::new();

    for name in names {
        let base = name.as_ref().to_string();
        let mut suffix = seen.get(&base).copied().unwrap_or(0);
        if suffix == 0 {
            seen.insert(base.clone(), 1);
            unique.push(base);
            continue;
        }

        let candidate = loop {
            let candidate = format!("{base}.{suffix}");
            suffix += 1;
            if !seen.contains_key(&candidate) {
                break candidate;
            }
        };
        seen.insert(base, suffix);
        seen.insert(candidate.clone(), 1);
        unique.push(candidate);
    }

    unique
}

/// Number of leading columns that belong to the metavariable block.
pub(crate) fn metavariable_width(headers: &[String]) -> usize {
    headers
        .iter()
        .take_while(|header| is_metavariable(header))
        .count()
}
