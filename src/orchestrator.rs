//! Runs one translation job per target language and persists the results.
//!
//! All snapshots are loaded (and stale keys pruned) before the first provider
//! call, so a corrupt snapshot aborts the run without spending any requests.
//! Jobs then run concurrently, one tokio task per language. Each task owns its
//! snapshot, persists it when it finishes and hands back a report through its
//! join handle; a failing or panicking language never affects the others.

use crate::i18n::LanguageTable;
use crate::provider::TranslationProvider;
use crate::repair::{PlaceholderPolicy, RepairLoop};
use crate::snapshot::{ResourceSet, SnapshotError, SnapshotStore};
use crate::task::{JobOutcome, TranslationJob};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one language in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageReport {
    pub language: String,
    pub display_name: String,
    pub outcome: JobOutcome,
    pub provider_calls: u32,
}

/// Per-language results, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub languages: Vec<LanguageReport>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.languages.iter().all(|l| !l.outcome.is_failure())
    }

    pub fn failed_languages(&self) -> Vec<&str> {
        self.languages
            .iter()
            .filter(|l| l.outcome.is_failure())
            .map(|l| l.language.as_str())
            .collect()
    }

    pub fn total_provider_calls(&self) -> u32 {
        self.languages.iter().map(|l| l.provider_calls).sum()
    }

    pub fn get(&self, language: &str) -> Option<&LanguageReport> {
        self.languages.iter().find(|l| l.language == language)
    }
}

/// Drives the incremental translation pipeline for a set of languages.
pub struct Orchestrator {
    provider: Arc<dyn TranslationProvider>,
    store: SnapshotStore,
    languages: LanguageTable,
    batch_size: Option<usize>,
    placeholder_policy: PlaceholderPolicy,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        store: SnapshotStore,
        languages: LanguageTable,
    ) -> Self {
        Self {
            provider,
            store,
            languages,
            batch_size: None,
            placeholder_policy: PlaceholderPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_placeholder_policy(mut self, policy: PlaceholderPolicy) -> Self {
        self.placeholder_policy = policy;
        self
    }

    /// Translate `resources` into every language in `targets`.
    ///
    /// Returns an error only for problems found before any provider call
    /// (output directory, unusable language ids, unreadable or corrupt
    /// snapshots). Per-language failures are reported in the `RunReport`.
    pub async fn run(
        &self,
        resources: &ResourceSet,
        targets: &[String],
    ) -> Result<RunReport, SnapshotError> {
        let targets = dedup_languages(targets);
        self.warn_unsupported(&targets);

        self.store.ensure_dir()?;
        let jobs = self.prepare_jobs(resources, &targets)?;

        let pending: usize = jobs.iter().map(|j| j.missing.len()).sum();
        info!(
            "Translating {} resources to {} languages ({} missing translations)",
            resources.len(),
            jobs.len(),
            pending
        );

        let repair = RepairLoop::new(Arc::clone(&self.provider))
            .with_placeholder_policy(self.placeholder_policy);

        let mut labels = Vec::with_capacity(jobs.len());
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            labels.push((job.language.clone(), job.display_name.clone()));
            handles.push(tokio::spawn(run_and_persist(
                job,
                repair.clone(),
                self.store.clone(),
                self.batch_size,
            )));
        }

        let results = join_all(handles).await;

        let languages = labels
            .into_iter()
            .zip(results)
            .map(|((language, display_name), result)| match result {
                Ok(report) => report,
                Err(e) => {
                    error!("{} ({}): translation task aborted: {}", display_name, language, e);
                    LanguageReport {
                        language,
                        display_name,
                        outcome: JobOutcome::Failed {
                            translated: 0,
                            error: format!("Translation task aborted: {}", e),
                        },
                        provider_calls: 0,
                    }
                }
            })
            .collect();

        let report = RunReport { languages };
        info!(
            "Translation run finished: {} languages, {} failed, {} provider calls",
            report.languages.len(),
            report.failed_languages().len(),
            report.total_provider_calls()
        );
        Ok(report)
    }

    /// Load and reconcile every language's snapshot before any provider call
    fn prepare_jobs(
        &self,
        resources: &ResourceSet,
        targets: &[String],
    ) -> Result<Vec<TranslationJob>, SnapshotError> {
        let mut jobs = Vec::with_capacity(targets.len());

        for language in targets {
            let mut snapshot = self.store.load(language)?.unwrap_or_default();

            let stale = snapshot.prune_stale(resources);
            if !stale.is_empty() {
                info!(
                    "{}: dropped {} keys no longer in resources: {:?}",
                    language,
                    stale.len(),
                    stale
                );
            }

            let display_name = self.languages.display_name_or_code(language);
            jobs.push(TranslationJob::new(
                language.as_str(),
                display_name,
                snapshot,
                resources,
            ));
        }

        Ok(jobs)
    }

    fn warn_unsupported(&self, targets: &[String]) {
        let unsupported = self.languages.unsupported(targets);
        if unsupported.is_empty() {
            return;
        }

        warn!(
            "The following languages are not officially supported: {:?}. \
             They will still be sent to the provider, but results are not guaranteed",
            unsupported
        );
        let supported = self
            .languages
            .list_all()
            .iter()
            .map(|lang| format!("{} - {}", lang.code, lang.name))
            .collect::<Vec<_>>()
            .join(", ");
        info!("Supported languages: {}", supported);
    }
}

/// Run one job and persist its snapshot once it has finished
async fn run_and_persist(
    job: TranslationJob,
    repair: RepairLoop,
    store: SnapshotStore,
    batch_size: Option<usize>,
) -> LanguageReport {
    let language = job.language.clone();
    let display_name = job.display_name.clone();
    info!("Started processing language: {} ({})", display_name, language);

    let result = job.run(&repair, batch_size).await;
    let mut outcome = result.outcome;

    if outcome.should_persist() {
        match store.persist(&language, &result.snapshot) {
            Ok(path) => info!(
                "{} ({}): saved {} translations to {}",
                display_name,
                language,
                result.snapshot.len(),
                path.display()
            ),
            Err(e) => {
                error!("{} ({}): {}", display_name, language, e);
                outcome = JobOutcome::Failed {
                    translated: outcome.translated(),
                    error: e.to_string(),
                };
            }
        }
    } else {
        warn!(
            "{} ({}): nothing translated, keeping previous snapshot",
            display_name, language
        );
    }

    LanguageReport {
        language,
        display_name,
        outcome,
        provider_calls: result.provider_calls,
    }
}

/// Remove repeated language ids, keeping the first occurrence
fn dedup_languages(targets: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .filter(|language| {
            let first = seen.insert(language.as_str());
            if !first {
                warn!("Language {} is listed more than once; translating it once", language);
            }
            first
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::ScriptedProvider;
    use crate::provider::{ProviderError, ProviderRequest};
    use crate::snapshot::LanguageSnapshot;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    /// Panics for one language and answers every other one with `reply`
    struct PanickingProvider {
        panic_for: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl TranslationProvider for PanickingProvider {
        async fn complete(
            &self,
            target_language: &str,
            _request: ProviderRequest<'_>,
        ) -> Result<String, ProviderError> {
            if target_language == self.panic_for {
                panic!("provider crashed while translating {}", target_language);
            }
            Ok(self.reply.to_string())
        }
    }

    /// Answers only once every expected language is waiting on the barrier
    struct RendezvousProvider {
        barrier: Barrier,
    }

    #[async_trait]
    impl TranslationProvider for RendezvousProvider {
        async fn complete(
            &self,
            _target_language: &str,
            _request: ProviderRequest<'_>,
        ) -> Result<String, ProviderError> {
            self.barrier.wait().await;
            Ok(r#"{"a": "x"}"#.to_string())
        }
    }

    fn map(entries: &[(&str, &str)]) -> ResourceSet {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn orchestrator(provider: Arc<ScriptedProvider>, dir: &TempDir) -> Orchestrator {
        Orchestrator::new(
            provider,
            SnapshotStore::new(dir.path()),
            LanguageTable::builtin(),
        )
    }

    // ==================== Dedup Tests ====================

    #[test]
    fn test_dedup_languages_keeps_first_occurrence() {
        assert_eq!(
            dedup_languages(&langs(&["ja", "es", "ja", "fr", "es"])),
            langs(&["ja", "es", "fr"])
        );
    }

    // ==================== Report Tests ====================

    #[test]
    fn test_run_report_helpers() {
        let report = RunReport {
            languages: vec![
                LanguageReport {
                    language: "ja".into(),
                    display_name: "Japanese".into(),
                    outcome: JobOutcome::Complete { translated: 2 },
                    provider_calls: 1,
                },
                LanguageReport {
                    language: "es".into(),
                    display_name: "Spanish".into(),
                    outcome: JobOutcome::Failed {
                        translated: 0,
                        error: "boom".into(),
                    },
                    provider_calls: 3,
                },
            ],
        };

        assert!(!report.all_succeeded());
        assert_eq!(report.failed_languages(), vec!["es"]);
        assert_eq!(report.total_provider_calls(), 4);
        assert_eq!(report.get("ja").unwrap().provider_calls, 1);
        assert!(report.get("fr").is_none());
    }

    // ==================== Pipeline Tests ====================

    #[tokio::test]
    async fn test_first_run_translates_and_persists_every_language() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("Japanese", r#"{"hello": "こんにちは"}"#)
                .reply("Spanish", r#"{"hello": "Hola"}"#),
        );

        let report = orchestrator(provider.clone(), &dir)
            .run(&map(&[("hello", "Hello")]), &langs(&["ja", "es"]))
            .await
            .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.languages[0].language, "ja");
        assert_eq!(report.languages[1].language, "es");

        let mut requested: Vec<_> = provider.requests().into_iter().map(|r| r.language).collect();
        requested.sort();
        assert_eq!(requested, vec!["Japanese", "Spanish"]);

        let store = SnapshotStore::new(dir.path());
        assert_eq!(store.load("ja").unwrap().unwrap().get("hello"), Some("こんにちは"));
        assert_eq!(store.load("es").unwrap().unwrap().get("hello"), Some("Hola"));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent_and_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let resources = map(&[("hello", "Hello")]);
        let provider = Arc::new(ScriptedProvider::new().reply("Spanish", r#"{"hello": "Hola"}"#));
        let orchestrator = orchestrator(provider.clone(), &dir);

        orchestrator.run(&resources, &langs(&["es"])).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("es.json")).unwrap();

        let report = orchestrator.run(&resources, &langs(&["es"])).await.unwrap();
        let second = std::fs::read_to_string(dir.path().join("es.json")).unwrap();

        assert_eq!(report.languages[0].outcome, JobOutcome::UpToDate);
        assert_eq!(report.total_provider_calls(), 0);
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_keys_are_pruned_before_diffing() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store
            .persist(
                "es",
                &LanguageSnapshot::from_entries(map(&[("a", "Á"), ("d", "Dé")])),
            )
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new());

        let report = orchestrator(provider.clone(), &dir)
            .run(&map(&[("a", "A")]), &langs(&["es"]))
            .await
            .unwrap();

        assert_eq!(report.languages[0].outcome, JobOutcome::UpToDate);
        assert!(provider.requests().is_empty());
        assert_eq!(
            store.load("es").unwrap().unwrap().entries(),
            &map(&[("a", "Á")])
        );
    }

    #[tokio::test]
    async fn test_failed_language_is_isolated() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let previous = LanguageSnapshot::from_entries(map(&[("a", "Á")]));
        store.persist("ja", &previous).unwrap();
        let before = std::fs::read_to_string(dir.path().join("ja.json")).unwrap();

        // Japanese has no scripted replies, so every call fails with 500
        let provider = Arc::new(
            ScriptedProvider::new().reply("Spanish", r#"{"a": "A-es", "b": "B-es"}"#),
        );

        let report = orchestrator(provider.clone(), &dir)
            .run(&map(&[("a", "A"), ("b", "B")]), &langs(&["ja", "es"]))
            .await
            .unwrap();

        assert_eq!(report.failed_languages(), vec!["ja"]);
        assert_eq!(report.get("ja").unwrap().provider_calls, 3);
        assert_eq!(
            report.get("es").unwrap().outcome,
            JobOutcome::Complete { translated: 2 }
        );
        let after = std::fs::read_to_string(dir.path().join("ja.json")).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.load("es").unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_first_run_writes_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new().always("Japanese", "not json"));

        let report = orchestrator(provider.clone(), &dir)
            .run(&map(&[("a", "A")]), &langs(&["ja"]))
            .await
            .unwrap();

        assert!(!report.all_succeeded());
        assert!(!dir.path().join("ja.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_aborts_before_any_call() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("es.json"), "{oops").unwrap();
        let provider = Arc::new(
            ScriptedProvider::new()
                .always("Japanese", r#"{"a": "x"}"#)
                .always("Spanish", r#"{"a": "x"}"#),
        );

        let result = orchestrator(provider.clone(), &dir)
            .run(&map(&[("a", "A")]), &langs(&["ja", "es"]))
            .await;

        assert!(matches!(result, Err(SnapshotError::Corrupt { .. })));
        assert!(provider.requests().is_empty());
        assert!(!dir.path().join("ja.json").exists());
    }

    #[tokio::test]
    async fn test_unknown_language_uses_code_as_display_name() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new().reply("Klingon", r#"{"a": "tlhIngan"}"#));

        let report = orchestrator(provider.clone(), &dir)
            .run(&map(&[("a", "A")]), &langs(&["Klingon"]))
            .await
            .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.languages[0].display_name, "Klingon");
        assert!(dir.path().join("Klingon.json").exists());
    }

    #[tokio::test]
    async fn test_duplicate_languages_run_once() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new().always("Spanish", r#"{"a": "Á"}"#));

        let report = orchestrator(provider.clone(), &dir)
            .run(&map(&[("a", "A")]), &langs(&["es", "es"]))
            .await
            .unwrap();

        assert_eq!(report.languages.len(), 1);
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_size_is_applied() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("Spanish", r#"{"a": "Á"}"#)
                .reply("Spanish", r#"{"b": "Bé"}"#),
        );

        let report = orchestrator(provider.clone(), &dir)
            .with_batch_size(Some(1))
            .run(&map(&[("a", "A"), ("b", "B")]), &langs(&["es"]))
            .await
            .unwrap();

        assert_eq!(report.total_provider_calls(), 2);
        assert_eq!(
            report.languages[0].outcome,
            JobOutcome::Complete { translated: 2 }
        );
    }

    #[tokio::test]
    async fn test_output_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("i18n").join("resources");
        let provider = Arc::new(ScriptedProvider::new().reply("Spanish", r#"{"a": "Á"}"#));

        Orchestrator::new(provider, SnapshotStore::new(&nested), LanguageTable::builtin())
            .run(&map(&[("a", "A")]), &langs(&["es"]))
            .await
            .unwrap();

        assert!(nested.join("es.json").exists());
    }

    #[tokio::test]
    async fn test_panicking_language_does_not_cancel_siblings() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(PanickingProvider {
            panic_for: "Japanese",
            reply: r#"{"a": "x"}"#,
        });

        let orchestrator =
            Orchestrator::new(provider, SnapshotStore::new(dir.path()), LanguageTable::builtin());

        let report = orchestrator
            .run(&map(&[("a", "A")]), &langs(&["ja", "es", "fr"]))
            .await
            .unwrap();

        assert_eq!(report.languages.len(), 3);
        assert_eq!(report.failed_languages(), vec!["ja"]);
        match &report.get("ja").unwrap().outcome {
            JobOutcome::Failed { translated, error } => {
                assert_eq!(*translated, 0);
                assert!(error.contains("aborted"));
            }
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(
            report.get("es").unwrap().outcome,
            JobOutcome::Complete { translated: 1 }
        );
        assert!(!dir.path().join("ja.json").exists());
        assert!(dir.path().join("es.json").exists());
        assert!(dir.path().join("fr.json").exists());
    }

    #[tokio::test]
    async fn test_languages_are_translated_concurrently() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(RendezvousProvider {
            barrier: Barrier::new(3),
        });
        let orchestrator =
            Orchestrator::new(provider, SnapshotStore::new(dir.path()), LanguageTable::builtin());

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.run(&map(&[("a", "A")]), &langs(&["ja", "es", "fr"])),
        )
        .await
        .expect("all languages should be in flight at the same time")
        .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.total_provider_calls(), 3);
    }

    #[tokio::test]
    async fn test_language_id_with_path_separator_aborts_before_any_call() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out");
        let provider = Arc::new(ScriptedProvider::new().always("Spanish", r#"{"a": "x"}"#));

        let result = Orchestrator::new(
            provider.clone(),
            SnapshotStore::new(&output),
            LanguageTable::builtin(),
        )
        .run(&map(&[("a", "A")]), &langs(&["es", "../escape"]))
        .await;

        assert!(matches!(result, Err(SnapshotError::InvalidLanguage { .. })));
        assert!(provider.requests().is_empty());
        assert!(!output.join("es.json").exists());
        assert!(!dir.path().join("escape.json").exists());
    }
}
