use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// What to do when generated event or occurrence identifiers collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Log a warning and write the table unchanged.
    #[default]
    Warn,
    /// Abort the conversion.
    Fail,
    /// Keep the first row of every duplicated key.
    KeepFirst,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Warn => "warn",
            DuplicatePolicy::Fail => "fail",
            DuplicatePolicy::KeepFirst => "keep-first",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "warn" => Ok(DuplicatePolicy::Warn),
            "fail" => Ok(DuplicatePolicy::Fail),
            "keep-first" => Ok(DuplicatePolicy::KeepFirst),
            _ => Err(ConfigError::InvalidValue {
                key: "duplicate_policy",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Query string appended to a term URI to request the JSON-LD rendering.
    pub profile_query: String,
    pub timeout_secs: u64,
    /// Where resolved labels are persisted between runs.
    pub cache_path: Option<PathBuf>,
    /// Never contact the term registry; every lookup falls back to `Unknown`.
    pub offline: bool,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            profile_query: "_profile=nvs&_mediatype=application/ld+json".to_string(),
            timeout_secs: 30,
            cache_path: None,
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub occurrence_status: String,
    pub basis_of_record: String,
    pub duplicate_policy: DuplicatePolicy,
    pub vocabulary: VocabularyConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            occurrence_status: "present".to_string(),
            basis_of_record: "MaterialSample".to_string(),
            duplicate_policy: DuplicatePolicy::default(),
            vocabulary: VocabularyConfig::default(),
        }
    }
}

impl ConversionConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<ConversionConfig>(toml_str)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Applies `BIOPIPES_*` environment overrides on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("BIOPIPES_VOCAB_CACHE") {
            self.vocabulary.cache_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("BIOPIPES_VOCAB_TIMEOUT_SECS") {
            self.vocabulary.timeout_secs =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "BIOPIPES_VOCAB_TIMEOUT_SECS",
                        value: value.clone(),
                    })?;
        }
        if let Some(value) = lookup("BIOPIPES_OFFLINE") {
            self.vocabulary.offline = parse_flag("BIOPIPES_OFFLINE", &value)?;
        }
        if let Some(value) = lookup("BIOPIPES_DUPLICATE_POLICY") {
            self.duplicate_policy = value.parse()?;
        }
        Ok(())
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ConversionConfig::from_toml_str("").expect("config");
        assert_eq!(config.occurrence_status, "present");
        assert_eq!(config.basis_of_record, "MaterialSample");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Warn);
        assert_eq!(config.vocabulary.timeout_secs, 30);
    }

    #[test]
    fn toml_overrides_nested_fields() {
        let config = ConversionConfig::from_toml_str(
            r#"
            duplicate_policy = "keep-first"

            [vocabulary]
            offline = true
            cache_path = "/tmp/vocab.json"
            "#,
        )
        .expect("config");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepFirst);
        assert!(config.vocabulary.offline);
        assert_eq!(
            config.vocabulary.cache_path.as_deref(),
            Some(Path::new("/tmp/vocab.json"))
        );
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BIOPIPES_OFFLINE", "yes"),
            ("BIOPIPES_DUPLICATE_POLICY", "FAIL"),
            ("BIOPIPES_VOCAB_TIMEOUT_SECS", "5"),
        ]);
        let mut config = ConversionConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("overrides");
        assert!(config.vocabulary.offline);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Fail);
        assert_eq!(config.vocabulary.timeout_secs, 5);
    }

    #[test]
    fn bad_policy_is_rejected() {
        let err = "sometimes".parse::<DuplicatePolicy>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
