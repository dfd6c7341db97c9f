//! Controlled-vocabulary label lookup.
//!
//! Labels are fetched through a [`TermResolver`] and memoized per URI in a
//! [`VocabularyCache`]. The cache is safe to share between threads; two threads racing on
//! the same URI may both fetch it, and both store the same label.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::VocabularyConfig;

pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("request for {uri} failed: {message}")]
    Request { uri: String, message: String },
    #[error("term registry answered {status} for {uri}")]
    Status { uri: String, status: u16 },
    #[error("response for {uri} has no usable altLabel: {message}")]
    Shape { uri: String, message: String },
    #[error("vocabulary lookups are disabled (offline) for {uri}")]
    Offline { uri: String },
    #[error("failed to access vocabulary snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("vocabulary snapshot is not valid JSON: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

/// Resolves a vocabulary term URI to its human-readable label.
pub trait TermResolver: Send + Sync {
    fn resolve(&self, uri: &str) -> Result<String, VocabularyError>;
}

/// Never touches the network; every lookup fails and falls back to [`UNKNOWN_LABEL`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineResolver;

impl TermResolver for OfflineResolver {
    fn resolve(&self, uri: &str) -> Result<String, VocabularyError> {
        Err(VocabularyError::Offline {
            uri: uri.to_string(),
        })
    }
}

/// Blocking client for the NERC Vocabulary Server JSON-LD profile.
#[cfg(feature = "remote")]
pub struct NercResolver {
    client: reqwest::blocking::Client,
    profile_query: String,
}

#[cfg(feature = "remote")]
impl NercResolver {
    pub fn new(config: &VocabularyConfig) -> Result<Self, VocabularyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| VocabularyError::Request {
                uri: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            profile_query: config.profile_query.clone(),
        })
    }

    fn request_url(&self, uri: &str) -> String {
        let separator = if uri.contains('?') { '&' } else { '?' };
        format!("{uri}{separator}{}", self.profile_query)
    }
}

#[cfg(feature = "remote")]
impl TermResolver for NercResolver {
    fn resolve(&self, uri: &str) -> Result<String, VocabularyError> {
        let request_error = |err: reqwest::Error| VocabularyError::Request {
            uri: uri.to_string(),
            message: err.to_string(),
        };
        let response = self
            .client
            .get(self.request_url(uri))
            .send()
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(VocabularyError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }
        let body: Value = response.json().map_err(request_error)?;
        label_from_json_ld(&body).ok_or_else(|| VocabularyError::Shape {
            uri: uri.to_string(),
            message: truncate(&body.to_string(), 200),
        })
    }
}

#[cfg(feature = "remote")]
fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(label) => Some(label.clone()),
        Value::Array(items) => items.iter().find_map(first_string),
        Value::Object(map) => map.get("@value").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Picks the `altLabel` out of a JSON-LD concept: a plain string, the first string of a
/// list, or an `{"@value": ...}` literal. `@graph` wrappers are searched node by node.
pub fn label_from_json_ld(body: &Value) -> Option<String> {
    let Value::Object(map) = body else {
        return match body {
            Value::Array(nodes) => nodes.iter().find_map(label_from_json_ld),
            _ => None,
        };
    };
    for key in ["altLabel", "skos:altLabel"] {
        if let Some(label) = map.get(key).and_then(first_string) {
            return Some(label);
        }
    }
    map.get("@graph").and_then(label_from_json_ld)
}

/// Builds the resolver the config asks for.
pub fn resolver_from_config(
    config: &VocabularyConfig,
) -> Result<Box<dyn TermResolver>, VocabularyError> {
    if config.offline {
        return Ok(Box::new(OfflineResolver));
    }
    #[cfg(feature = "remote")]
    {
        Ok(Box::new(NercResolver::new(config)?))
    }
    #[cfg(not(feature = "remote"))]
    {
        warn!("built without the `remote` feature; vocabulary lookups fall back to Unknown");
        Ok(Box::new(OfflineResolver))
    }
}

#[derive(Debug, Clone)]
struct CachedLabel {
    label: String,
    resolved: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct VocabularyStats {
    pub hits: usize,
    pub fetches: usize,
    pub fallbacks: usize,
    pub cached: usize,
}

pub struct VocabularyCache {
    resolver: Box<dyn TermResolver>,
    labels: RwLock<HashMap<String, CachedLabel>>,
    hits: AtomicUsize,
    fetches: AtomicUsize,
    fallbacks: AtomicUsize,
}

impl VocabularyCache {
    pub fn new(resolver: Box<dyn TermResolver>) -> Self {
        Self {
            resolver,
            labels: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
        }
    }

    /// Label for `uri`, fetching it on first use. Failed lookups yield [`UNKNOWN_LABEL`],
    /// which is remembered for the rest of the run.
    pub fn label(&self, uri: &str) -> String {
        if let Some(cached) = self.read_labels().get(uri) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached.label.clone();
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let entry = match self.resolver.resolve(uri) {
            Ok(label) => {
                debug!(uri, label = %label, "resolved vocabulary term");
                CachedLabel {
                    label,
                    resolved: true,
                }
            }
            Err(err) => {
                warn!(uri, error = %err, "failure to resolve vocabulary label");
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                CachedLabel {
                    label: UNKNOWN_LABEL.to_string(),
                    resolved: false,
                }
            }
        };

        let label = entry.label.clone();
        self.write_labels().entry(uri.to_string()).or_insert(entry);
        label
    }

    pub fn stats(&self) -> VocabularyStats {
        VocabularyStats {
            hits: self.hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            cached: self.read_labels().len(),
        }
    }

    /// Seeds the cache from a JSON object of `uri -> label`. Returns the number of labels read;
    /// a missing file reads as empty.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize, VocabularyError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(VocabularyError::Snapshot {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let snapshot: BTreeMap<String, String> = serde_json::from_str(&contents)?;
        let count = snapshot.len();
        let mut labels = self.write_labels();
        for (uri, label) in snapshot {
            labels.insert(
                uri,
                CachedLabel {
                    label,
                    resolved: true,
                },
            );
        }
        info!(path = %path.display(), count, "loaded vocabulary snapshot");
        Ok(count)
    }

    /// Writes every successfully resolved label. Fallback labels are left out so the next run
    /// retries them.
    pub fn save_snapshot(&self, path: &Path) -> Result<usize, VocabularyError> {
        let snapshot: BTreeMap<String, String> = self
            .read_labels()
            .iter()
            .filter(|(_, cached)| cached.resolved)
            .map(|(uri, cached)| (uri.clone(), cached.label.clone()))
            .collect();
        let snapshot_error = |source| VocabularyError::Snapshot {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(snapshot_error)?;
        }
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json).map_err(snapshot_error)?;
        Ok(snapshot.len())
    }

    fn read_labels(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CachedLabel>> {
        self.labels.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_labels(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CachedLabel>> {
        self.labels.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for VocabularyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VocabularyCache")
            .field("stats", &self.stats())
            .finish()
    }
}
