//! Per-language translation job: diff, translate, merge.

use crate::repair::RepairLoop;
use crate::snapshot::{LanguageSnapshot, ResourceSet};
use tracing::{error, info, warn};

/// How a language's job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Nothing was missing; no provider call was made
    UpToDate,

    /// Every missing key was translated
    Complete { translated: usize },

    /// The provider answered but left some requested keys out
    Partial {
        translated: usize,
        untranslated: Vec<String>,
    },

    /// A batch ran out of attempts; `translated` keys from earlier batches were kept
    Failed { translated: usize, error: String },
}

impl JobOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    /// Number of keys newly translated by this job
    pub fn translated(&self) -> usize {
        match self {
            JobOutcome::UpToDate => 0,
            JobOutcome::Complete { translated }
            | JobOutcome::Partial { translated, .. }
            | JobOutcome::Failed { translated, .. } => *translated,
        }
    }

    /// Whether the job's snapshot should replace the one on disk.
    ///
    /// A failed job that merged nothing leaves the previous file untouched.
    pub fn should_persist(&self) -> bool {
        !matches!(self, JobOutcome::Failed { translated: 0, .. })
    }
}

/// Snapshot and outcome produced by a finished job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub snapshot: LanguageSnapshot,
    pub outcome: JobOutcome,
    pub provider_calls: u32,
}

/// Translation work for one target language.
///
/// The job owns its snapshot; concurrent jobs for other languages never see it.
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub language: String,
    pub display_name: String,
    pub missing: ResourceSet,
    pub snapshot: LanguageSnapshot,
}

impl TranslationJob {
    /// Create a job for the keys of `resources` that `snapshot` does not translate yet
    pub fn new(
        language: impl Into<String>,
        display_name: impl Into<String>,
        snapshot: LanguageSnapshot,
        resources: &ResourceSet,
    ) -> Self {
        Self {
            language: language.into(),
            display_name: display_name.into(),
            missing: snapshot.missing(resources),
            snapshot,
        }
    }

    /// Split the missing keys into request batches.
    ///
    /// `None` puts every missing key into a single request.
    pub fn batches(&self, batch_size: Option<usize>) -> Vec<ResourceSet> {
        if self.missing.is_empty() {
            return Vec::new();
        }

        let size = batch_size.unwrap_or(usize::MAX).max(1);
        let mut batches = Vec::new();
        let mut current = ResourceSet::new();

        for (key, text) in &self.missing {
            current.insert(key.clone(), text.clone());
            if current.len() == size {
                batches.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }

        batches
    }

    /// Translate the missing keys and merge them into the snapshot.
    ///
    /// Batches run one after another; the first exhausted batch ends the job
    /// and keeps whatever earlier batches merged.
    pub async fn run(mut self, repair: &RepairLoop, batch_size: Option<usize>) -> JobResult {
        if self.missing.is_empty() {
            info!(
                "{} ({}): all {} keys already translated",
                self.display_name,
                self.language,
                self.snapshot.len()
            );
            return JobResult {
                snapshot: self.snapshot,
                outcome: JobOutcome::UpToDate,
                provider_calls: 0,
            };
        }

        let batches = self.batches(batch_size);
        info!(
            "{} ({}): translating {} missing keys in {} request(s)",
            self.display_name,
            self.language,
            self.missing.len(),
            batches.len()
        );

        let mut provider_calls = 0;
        let mut translated = 0;
        let mut untranslated = Vec::new();

        for (index, batch) in batches.iter().enumerate() {
            let payload = match serde_json::to_string(batch) {
                Ok(payload) => payload,
                Err(e) => {
                    let error = format!("Failed to encode payload: {}", e);
                    return self.failed(translated, provider_calls, error);
                }
            };

            match repair.run(&self.display_name, &payload, batch).await {
                Ok(repaired) => {
                    provider_calls += repaired.attempts;
                    let summary = self.snapshot.merge(batch, repaired.translated);
                    translated += summary.merged;

                    if !summary.ignored.is_empty() {
                        warn!(
                            "{} ({}): ignoring {} unrequested keys in response: {:?}",
                            self.display_name,
                            self.language,
                            summary.ignored.len(),
                            summary.ignored
                        );
                    }
                    if !summary.omitted.is_empty() {
                        warn!(
                            "{} ({}): response left out {} keys: {:?}",
                            self.display_name,
                            self.language,
                            summary.omitted.len(),
                            summary.omitted
                        );
                    }
                    untranslated.extend(summary.omitted);
                }
                Err(e) => {
                    provider_calls += e.attempts();
                    error!(
                        "{} ({}): batch {}/{} failed: {}",
                        self.display_name,
                        self.language,
                        index + 1,
                        batches.len(),
                        e
                    );
                    return self.failed(translated, provider_calls, e.to_string());
                }
            }
        }

        let outcome = if untranslated.is_empty() {
            JobOutcome::Complete { translated }
        } else {
            JobOutcome::Partial {
                translated,
                untranslated,
            }
        };

        JobResult {
            snapshot: self.snapshot,
            outcome,
            provider_calls,
        }
    }

    fn failed(self, translated: usize, provider_calls: u32, error: String) -> JobResult {
        JobResult {
            snapshot: self.snapshot,
            outcome: JobOutcome::Failed { translated, error },
            provider_calls,
        }
    }
}
