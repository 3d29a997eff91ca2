//! Placeholder preservation checks for translated resources.
//!
//! Source strings may embed C-style format tokens (`%s`, `%d`, `%.2f`,
//! `%1$s`, `%%`) that are substituted at runtime. A translation that drops or
//! alters one of them breaks the string when it is formatted.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// A translated value whose format tokens differ from its source value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMismatch {
    /// Resource key
    pub key: String,

    /// Tokens found in the source text
    pub expected: Vec<String>,

    /// Tokens found in the translated text
    pub found: Vec<String>,
}

/// Result of checking a batch of translations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderReport {
    pub mismatches: Vec<PlaceholderMismatch>,
}

impl PlaceholderReport {
    /// Check if every translated value kept its tokens
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Keys whose tokens changed
    pub fn keys(&self) -> Vec<String> {
        self.mismatches.iter().map(|m| m.key.clone()).collect()
    }
}

/// Validator for format-token preservation.
pub struct PlaceholderValidator;

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

impl PlaceholderValidator {
    /// Compare format tokens of every translated key against its source text.
    ///
    /// Keys present in only one of the maps are skipped; key-set shape is
    /// handled by the merge step. Tokens must appear in the same order, except
    /// when every token is positional (`%1$s`), since translations may legally
    /// reorder those.
    pub fn validate(
        source: &BTreeMap<String, String>,
        translated: &BTreeMap<String, String>,
    ) -> PlaceholderReport {
        let mut report = PlaceholderReport::default();

        for (key, source_text) in source {
            let Some(translated_text) = translated.get(key) else {
                continue;
            };

            let expected = Self::extract(source_text);
            let found = Self::extract(translated_text);

            if !Self::tokens_match(&expected, &found) {
                report.mismatches.push(PlaceholderMismatch {
                    key: key.clone(),
                    expected,
                    found,
                });
            }
        }

        report
    }

    /// Extract all format tokens from text, in order of appearance
    pub fn extract(text: &str) -> Vec<String> {
        let regex = PLACEHOLDER_REGEX.get_or_init(|| {
            Regex::new(
                r"%(?:\d+\$)?[-+#0]*(?:\d+|\*)?(?:\.(?:\d+|\*))?(?:hh|h|ll|l|L|q|j|z|t)?[diouxXeEfFgGaAcspn@%]",
            )
            .unwrap()
        });

        regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn tokens_match(expected: &[String], found: &[String]) -> bool {
        let all_positional = !expected.is_empty() && expected.iter().all(|t| t.contains('$'));
        if !all_positional {
            return expected == found;
        }

        let mut expected = expected.to_vec();
        let mut found = found.to_vec();
        expected.sort_unstable();
        found.sort_unstable();
        expected == found
    }
}
