use crate::snapshot::ResourceSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project configuration file looked up in the working directory
pub const DEFAULT_CONFIG_NAME: &str = "verilis.config.json";

/// OpenRouter chat completions endpoint
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-preview";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variable used when the config file carries no access token
pub const ACCESS_TOKEN_ENV: &str = "VERILIS_ACCESS_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{} not found. Run 'verilis init' to create a configuration file first", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(
        "Access token not provided. Set access_token in the config file or VERILIS_ACCESS_TOKEN \
         (keys are available at https://openrouter.ai/settings/keys)"
    )]
    MissingAccessToken,

    #[error("Output directory is not set")]
    MissingOutput,

    #[error("batch_size must be at least 1")]
    InvalidBatchSize,
}

/// Per-project settings stored in `verilis.config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// OpenRouter API key; may be left empty when `VERILIS_ACCESS_TOKEN` is set
    #[serde(default)]
    pub access_token: String,

    /// Directory holding one `<language>.json` snapshot per target language
    pub output: PathBuf,

    /// Target language ids, in processing order
    #[serde(rename = "support_languages", default)]
    pub languages: Vec<String>,

    /// Source strings to translate
    #[serde(default)]
    pub resource: ResourceSet,

    /// Split each language's missing keys into requests of at most this many keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Treat changed format tokens as a malformed response instead of a warning
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strict_placeholders: bool,
}

impl ProjectConfig {
    /// Configuration written by `verilis init`
    pub fn starter() -> Self {
        Self {
            access_token: String::new(),
            output: PathBuf::from("./i18n/resources"),
            languages: vec!["en".to_string(), "zh-CN".to_string()],
            resource: ResourceSet::from([(
                "initial_example".to_string(),
                "this is example".to_string(),
            )]),
            batch_size: None,
            strict_placeholders: false,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the configuration as indented JSON, replacing any existing file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, json + "\n").map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Access token from the file, or from `VERILIS_ACCESS_TOKEN` when the file has none
    pub fn access_token(&self) -> Result<String, ConfigError> {
        let token = self.access_token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }

        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingAccessToken)
    }

    /// Reject configurations that cannot run before any provider call is made
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.access_token()?;

        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::MissingOutput);
        }

        if self.batch_size == Some(0) {
            return Err(ConfigError::InvalidBatchSize);
        }

        Ok(())
    }
}

/// Translation provider settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("VERILIS_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            model: std::env::var("VERILIS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("VERILIS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
