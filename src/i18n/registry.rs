//! Language table: display names for the target languages verilis knows about.
//!
//! The table is an immutable value built at startup and handed to the
//! orchestrator. A language missing from the table is still translated; the
//! provider simply receives the raw language id as the display name.

/// A known target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageEntry {
    /// Language id used in config files and snapshot names (e.g., "en", "zh-CN")
    pub code: &'static str,

    /// English display name sent to the provider (e.g., "Chinese (Simplified)")
    pub name: &'static str,
}

/// Lookup table from language id to display name.
#[derive(Debug, Clone)]
pub struct LanguageTable {
    languages: Vec<LanguageEntry>,
}

impl LanguageTable {
    /// Build a table from an explicit list of languages.
    pub fn new(languages: Vec<LanguageEntry>) -> Self {
        Self { languages }
    }

    /// The 20 most widely used languages plus English.
    pub fn builtin() -> Self {
        Self::new(builtin_languages())
    }

    /// Get a language entry by its id.
    ///
    /// Matching is exact: "zh-cn" does not resolve to "zh-CN".
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageEntry> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get the display name for a language id, if the language is known.
    pub fn display_name(&self, code: &str) -> Option<&'static str> {
        self.get_by_code(code).map(|lang| lang.name)
    }

    /// Display name for a language id, falling back to the id itself.
    pub fn display_name_or_code<'a>(&self, code: &'a str) -> &'a str {
        self.display_name(code).unwrap_or(code)
    }

    /// Check if a language id is in the table.
    pub fn is_supported(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    /// All languages, in table order.
    pub fn list_all(&self) -> &[LanguageEntry] {
        &self.languages
    }

    /// Language ids from `codes` that are not in the table, in input order.
    pub fn unsupported<'a>(&self, codes: &'a [String]) -> Vec<&'a str> {
        codes
            .iter()
            .map(String::as_str)
            .filter(|code| !self.is_supported(code))
            .collect()
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_languages() -> Vec<LanguageEntry> {
    [
        ("en", "English"),
        ("zh-CN", "Chinese (Simplified)"),
        ("zh-TW", "Chinese (Traditional)"),
        ("es", "Spanish"),
        ("ar", "Arabic"),
        ("hi", "Hindi"),
        ("fr", "French"),
        ("ru", "Russian"),
        ("pt", "Portuguese"),
        ("id", "Indonesian"),
        ("de", "German"),
        ("ja", "Japanese"),
        ("bn", "Bengali"),
        ("ur", "Urdu"),
        ("tr", "Turkish"),
        ("it", "Italian"),
        ("ko", "Korean"),
        ("vi", "Vietnamese"),
        ("pl", "Polish"),
        ("nl", "Dutch"),
        ("th", "Thai"),
    ]
    .into_iter()
    .map(|(code, name)| LanguageEntry { code, name })
    .collect()
}
