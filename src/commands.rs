//! `init` and `generate` command implementations used by the binary.

use crate::config::{ConfigError, ProjectConfig, ProviderConfig};
use crate::i18n::LanguageTable;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::provider::OpenRouterProvider;
use crate::repair::PlaceholderPolicy;
use crate::snapshot::SnapshotStore;
use crate::task::JobOutcome;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Write the starter configuration to `path`, replacing any existing file
pub fn write_starter_config(path: &Path) -> Result<(), ConfigError> {
    ProjectConfig::starter().save(path)?;
    info!("Created {}", path.display());
    Ok(())
}

/// Load the project configuration and translate every missing resource.
///
/// Configuration problems (missing file, missing credential, corrupt
/// snapshot) are returned as errors before any provider call is made.
pub async fn generate(config_path: &Path, provider_config: &ProviderConfig) -> Result<RunReport> {
    let config = ProjectConfig::load(config_path)?;
    config.validate()?;
    info!("Loaded configuration from {}", config_path.display());

    let provider = OpenRouterProvider::new(provider_config, config.access_token()?)?;

    let placeholder_policy = if config.strict_placeholders {
        PlaceholderPolicy::Strict
    } else {
        PlaceholderPolicy::Warn
    };

    let orchestrator = Orchestrator::new(
        Arc::new(provider),
        SnapshotStore::new(&config.output),
        LanguageTable::builtin(),
    )
    .with_batch_size(config.batch_size)
    .with_placeholder_policy(placeholder_policy);

    orchestrator
        .run(&config.resource, &config.languages)
        .await
        .context("Translation run aborted before any request was sent")
}

/// Human-readable per-language summary of a run
pub fn format_report(report: &RunReport) -> String {
    let mut lines = Vec::with_capacity(report.languages.len() + 1);

    for entry in &report.languages {
        let status = match &entry.outcome {
            JobOutcome::UpToDate => "up to date".to_string(),
            JobOutcome::Complete { translated } => format!("translated {} keys", translated),
            JobOutcome::Partial {
                translated,
                untranslated,
            } => format!(
                "translated {} keys, {} still missing: {}",
                translated,
                untranslated.len(),
                untranslated.join(", ")
            ),
            JobOutcome::Failed { translated, error } => {
                format!("FAILED after keeping {} keys: {}", translated, error)
            }
        };
        lines.push(format!(
            "  {} ({}): {}",
            entry.display_name, entry.language, status
        ));
    }

    lines.push(format!(
        "{} languages, {} failed, {} provider calls",
        report.languages.len(),
        report.failed_languages().len(),
        report.total_provider_calls()
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONFIG_NAME;
    use crate::orchestrator::LanguageReport;
    use tempfile::TempDir;

    #[test]
    fn test_write_starter_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_NAME);

        write_starter_config(&path).unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.languages, vec!["en", "zh-CN"]);
        assert_eq!(config.resource.get("initial_example").unwrap(), "this is example");
    }

    #[tokio::test]
    async fn test_generate_missing_config_file() {
        let dir = TempDir::new().unwrap();

        let err = generate(&dir.path().join("missing.json"), &ProviderConfig::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_format_report() {
        let report = RunReport {
            languages: vec![
                LanguageReport {
                    language: "en".into(),
                    display_name: "English".into(),
                    outcome: JobOutcome::UpToDate,
                    provider_calls: 0,
                },
                LanguageReport {
                    language: "ja".into(),
                    display_name: "Japanese".into(),
                    outcome: JobOutcome::Partial {
                        translated: 1,
                        untranslated: vec!["bye".into()],
                    },
                    provider_calls: 1,
                },
                LanguageReport {
                    language: "es".into(),
                    display_name: "Spanish".into(),
                    outcome: JobOutcome::Failed {
                        translated: 0,
                        error: "All 3 attempts failed".into(),
                    },
                    provider_calls: 3,
                },
            ],
        };

        let text = format_report(&report);

        assert!(text.contains("English (en): up to date"));
        assert!(text.contains("Japanese (ja): translated 1 keys, 1 still missing: bye"));
        assert!(text.contains("Spanish (es): FAILED"));
        assert!(text.ends_with("3 languages, 1 failed, 4 provider calls"));
    }
}
