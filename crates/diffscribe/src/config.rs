//! Configuration: provider endpoint, message preferences, tool limits.
//!
//! Resolution order, lowest precedence first:
//! 1. built-in defaults
//! 2. TOML file (`--config`, `$DIFFSCRIBE_CONFIG`, or
//!    `<config_dir>/diffscribe/config.toml`); a missing file is not an error
//! 3. environment (`DIFFSCRIBE_BASE_URL`, `DIFFSCRIBE_MODEL`,
//!    `DIFFSCRIBE_API_KEY`, falling back to `OPENAI_API_KEY`)
//! 4. command-line flags, applied by the binary

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::{OrchestratorConfig, DEFAULT_MAX_TOOL_CALLS};

pub const CONFIG_ENV: &str = "DIFFSCRIBE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Commit message shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MessageStyle {
    /// Single subject line.
    #[default]
    Concise,
    /// Subject, blank line, body.
    Descriptive,
}

impl fmt::Display for MessageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concise => write!(f, "concise"),
            Self::Descriptive => write!(f, "descriptive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(alias = "conventional")]
    pub use_conventional_commits: bool,
    pub style: MessageStyle,
    /// Free-form extra instruction, e.g. "reference the ticket id".
    pub custom_guideline: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            use_conventional_commits: true,
            style: MessageStyle::Concise,
            custom_guideline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            api_key: None,
            temperature: defaults.temperature,
            request_timeout_secs: defaults.request_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolLimits {
    /// Per-session ceiling on executed tool calls. `None` (library callers
    /// only) disables the ceiling.
    pub max_tool_calls: Option<usize>,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_tool_calls: Some(DEFAULT_MAX_TOOL_CALLS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub preferences: Preferences,
    pub tools: ToolLimits,
}

impl AppConfig {
    /// Load from `explicit`, `$DIFFSCRIBE_CONFIG`, or the user config dir,
    /// then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => Self::from_file(p)?,
            Some(ref p) if explicit.is_some() => {
                return Err(ConfigError::Read {
                    path: p.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DIFFSCRIBE_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(model) = non_empty("DIFFSCRIBE_MODEL") {
            self.provider.model = model;
        }
        if let Some(key) = non_empty("DIFFSCRIBE_API_KEY") {
            self.provider.api_key = Some(key);
        } else if self.provider.api_key.is_none() {
            self.provider.api_key = non_empty("OPENAI_API_KEY");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.model must not be empty".into()));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid(format!(
                "provider.temperature must be within 0..=2, got {}",
                self.provider.temperature
            )));
        }
        if self.tools.max_tool_calls == Some(0) {
            return Err(ConfigError::Invalid(
                "tools.max_tool_calls must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.provider.model.clone(),
            base_url: self.provider.base_url.clone(),
            api_key: self.provider.api_key.clone(),
            temperature: self.provider.temperature,
            request_timeout_secs: self.provider.request_timeout_secs,
            max_tool_calls: self.tools.max_tool_calls,
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("diffscribe").join("config.toml"))
}
