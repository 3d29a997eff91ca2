//! Bounded repair loop around a translation provider.
//!
//! Each attempt sends one request and tries to parse the reply as a JSON
//! object of strings. A reply that does not parse is sent back to the provider
//! with a "fix this JSON" prompt; a provider error resubmits the original
//! payload. There is no delay between attempts: the provider's own request
//! timeout is the only time bound.

use crate::i18n::PlaceholderValidator;
use crate::provider::{ProviderError, ProviderRequest, TranslationProvider};
use crate::snapshot::{ResourceSet, TranslationMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Attempts per payload, including the first one
pub const MAX_ATTEMPTS: u32 = 3;

/// How changed format tokens in a parsed reply are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaceholderPolicy {
    /// Log a warning and accept the reply
    #[default]
    Warn,
    /// Reject the reply; the attempt counts as failed and the original payload is resubmitted
    Strict,
}

/// Why a single attempt did not produce a usable translation.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Response is not a JSON object of strings: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Format placeholders changed for keys: {}", .0.join(", "))]
    Placeholders(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("All {attempts} attempts failed. Last error: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: AttemptError,
    },
}

impl RepairError {
    /// Provider calls spent before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RepairError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// A parsed translation and the number of provider calls it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    pub translated: TranslationMap,
    pub attempts: u32,
}

/// What the next attempt submits.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    Original,
    Repair { malformed: String },
}

/// Loop state, moved from one attempt to the next.
#[derive(Debug)]
enum State {
    Attempt { number: u32, submission: Submission },
    Done(Repaired),
    Failed(RepairError),
}

/// Drives a provider until it returns a parseable translation or attempts run out.
#[derive(Clone)]
pub struct RepairLoop {
    provider: Arc<dyn TranslationProvider>,
    max_attempts: u32,
    placeholder_policy: PlaceholderPolicy,
}

impl RepairLoop {
    pub fn new(provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            provider,
            max_attempts: MAX_ATTEMPTS,
            placeholder_policy: PlaceholderPolicy::default(),
        }
    }

    /// Set the maximum number of attempts (at least 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_placeholder_policy(mut self, policy: PlaceholderPolicy) -> Self {
        self.placeholder_policy = policy;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Translate `payload` (the JSON form of `source`) into `target_language`.
    pub async fn run(
        &self,
        target_language: &str,
        payload: &str,
        source: &ResourceSet,
    ) -> Result<Repaired, RepairError> {
        let mut state = State::Attempt {
            number: 1,
            submission: Submission::Original,
        };

        loop {
            state = match state {
                State::Attempt { number, submission } => {
                    self.attempt(target_language, payload, source, number, submission)
                        .await
                }
                State::Done(repaired) => return Ok(repaired),
                State::Failed(error) => return Err(error),
            };
        }
    }

    async fn attempt(
        &self,
        target_language: &str,
        payload: &str,
        source: &ResourceSet,
        number: u32,
        submission: Submission,
    ) -> State {
        let request = match &submission {
            Submission::Original => ProviderRequest::Translate { payload },
            Submission::Repair { malformed } => ProviderRequest::Repair {
                malformed: malformed.as_str(),
            },
        };

        let (error, next) = match self.provider.complete(target_language, request).await {
            Ok(raw) => match parse_translation(&raw) {
                Ok(translated) => {
                    if let Err(e) = self.check_placeholders(target_language, source, &translated) {
                        (e, Submission::Original)
                    } else {
                        if number > 1 {
                            debug!(
                                "{}: Succeeded on attempt {}/{}",
                                target_language, number, self.max_attempts
                            );
                        }
                        return State::Done(Repaired {
                            translated,
                            attempts: number,
                        });
                    }
                }
                Err(e) => (
                    AttemptError::Malformed(e),
                    Submission::Repair { malformed: raw },
                ),
            },
            Err(e) => (AttemptError::Provider(e), Submission::Original),
        };

        if number >= self.max_attempts {
            warn!(
                "{}: All {} attempts failed. Last error: {}",
                target_language, self.max_attempts, error
            );
            return State::Failed(RepairError::Exhausted {
                attempts: number,
                last_error: error,
            });
        }

        warn!(
            "{}: Attempt {}/{} failed ({}), {}",
            target_language,
            number,
            self.max_attempts,
            error,
            match next {
                Submission::Original => "resubmitting original payload",
                Submission::Repair { .. } => "asking provider to repair its response",
            }
        );

        State::Attempt {
            number: number + 1,
            submission: next,
        }
    }

    fn check_placeholders(
        &self,
        target_language: &str,
        source: &ResourceSet,
        translated: &TranslationMap,
    ) -> Result<(), AttemptError> {
        let report = PlaceholderValidator::validate(source, translated);
        if report.is_clean() {
            return Ok(());
        }

        match self.placeholder_policy {
            PlaceholderPolicy::Warn => {
                for mismatch in &report.mismatches {
                    warn!(
                        "{}: Placeholder mismatch for '{}': expected {:?}, got {:?}",
                        target_language, mismatch.key, mismatch.expected, mismatch.found
                    );
                }
                Ok(())
            }
            PlaceholderPolicy::Strict => Err(AttemptError::Placeholders(report.keys())),
        }
    }
}

/// Parse a provider reply as a JSON object of strings.
///
/// Surrounding whitespace and a single enclosing markdown code fence are
/// tolerated; anything else must be valid JSON.
pub fn parse_translation(raw: &str) -> Result<TranslationMap, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };

    // Skip the info string ("json") on the opening fence line
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}
