//! Per-language translation snapshots and their on-disk store.
//!
//! A snapshot maps resource keys to translated text for one target language
//! and is stored as `<output>/<language>.json`. Snapshots only grow by keyed
//! merges; keys are removed only when the source resources no longer contain
//! them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source resources: key -> source-language text
pub type ResourceSet = BTreeMap<String, String>;

/// Translated values: key -> target-language text
pub type TranslationMap = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read snapshot {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Snapshot {} is not a valid JSON object of strings ({source}); fix or remove it and run again",
        .path.display()
    )]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize snapshot for {language}: {source}")]
    Serialize {
        language: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Language id '{language}' cannot be used as a snapshot file name")]
    InvalidLanguage { language: String },

    #[error("Failed to write snapshot {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a merge did with a provider result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of requested keys written into the snapshot
    pub merged: usize,

    /// Requested keys the provider left out
    pub omitted: Vec<String>,

    /// Keys the provider returned that were never requested
    pub ignored: Vec<String>,
}

/// Translated values for one target language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageSnapshot {
    entries: TranslationMap,
}

impl LanguageSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: TranslationMap) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &TranslationMap {
        &self.entries
    }

    pub fn into_entries(self) -> TranslationMap {
        self.entries
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop keys that no longer exist in the source resources.
    ///
    /// Returns the removed keys in sorted order.
    pub fn prune_stale(&mut self, resources: &ResourceSet) -> Vec<String> {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|key| !resources.contains_key(*key))
            .cloned()
            .collect();

        for key in &stale {
            self.entries.remove(key);
        }

        stale
    }

    /// Source entries that have no translation yet
    pub fn missing(&self, resources: &ResourceSet) -> ResourceSet {
        resources
            .iter()
            .filter(|(key, _)| !self.entries.contains_key(*key))
            .map(|(key, text)| (key.clone(), text.clone()))
            .collect()
    }

    /// Merge provider output for a batch of requested keys.
    ///
    /// Only keys present in both `requested` and `translated` are written.
    pub fn merge(
        &mut self,
        requested: &ResourceSet,
        mut translated: TranslationMap,
    ) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for key in requested.keys() {
            match translated.remove(key) {
                Some(value) => {
                    self.entries.insert(key.clone(), value);
                    summary.merged += 1;
                }
                None => summary.omitted.push(key.clone()),
            }
        }

        summary.ignored = translated.into_keys().collect();
        summary
    }
}

/// Directory of per-language snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file for a language id
    ///
    /// Ids that are empty, contain a path separator or contain `..` are
    /// rejected so every snapshot stays directly inside the output directory.
    pub fn path_for(&self, language: &str) -> Result<PathBuf, SnapshotError> {
        let unsafe_id = language.is_empty()
            || language.contains(['/', '\\'])
            || language.contains("..");
        if unsafe_id {
            return Err(SnapshotError::InvalidLanguage {
                language: language.to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.json", language)))
    }

    /// Create the output directory (and parents) if needed
    pub fn ensure_dir(&self) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::CreateDir {
            path: self.dir.clone(),
            source,
        })
    }

    /// Load a language's snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot exists yet. A file that exists but is
    /// not a JSON object of strings is an error, never an empty snapshot.
    pub fn load(&self, language: &str) -> Result<Option<LanguageSnapshot>, SnapshotError> {
        let path = self.path_for(language)?;

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot for {} at {}", language, path.display());
                return Ok(None);
            }
            Err(source) => return Err(SnapshotError::Read { path, source }),
        };

        let snapshot: LanguageSnapshot = serde_json::from_str(&contents)
            .map_err(|source| SnapshotError::Corrupt {
                path: path.clone(),
                source,
            })?;

        debug!(
            "Loaded {} translations for {} from {}",
            snapshot.len(),
            language,
            path.display()
        );
        Ok(Some(snapshot))
    }

    /// Replace a language's snapshot file.
    ///
    /// The JSON is written to a temporary file in the output directory and then
    /// renamed over the target, so readers never observe a half-written file.
    pub fn persist(
        &self,
        language: &str,
        snapshot: &LanguageSnapshot,
    ) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(language)?;

        let mut json =
            serde_json::to_string_pretty(snapshot).map_err(|source| SnapshotError::Serialize {
                language: language.to_string(),
                source,
            })?;
        json.push('\n');

        let write_err = |source: std::io::Error| SnapshotError::Write {
            path: path.clone(),
            source,
        };

        let mut file = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(
            "Wrote {} translations for {} to {}",
            snapshot.len(),
            language,
            path.display()
        );
        Ok(path)
    }
}
