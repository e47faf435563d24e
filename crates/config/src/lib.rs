//! Configuration loading, validation, and management for recurchat.
//!
//! Loads configuration from `~/.recurchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Largest accepted context window radius.
const MAX_CONTEXT_WINDOW: usize = 1000;

/// The root configuration structure.
///
/// Maps directly to `~/.recurchat/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend used when the front-end does not pick one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per reply
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Context retrieval settings
    #[serde(default)]
    pub context: ContextConfig,

    /// System instruction settings
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Transcript log settings
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Prompt history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Generation backends, keyed by model identifier
    #[serde(default = "default_backends")]
    pub backends: BTreeMap<String, BackendConfig>,
}

fn default_model() -> String {
    "mythomax-l2-13b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    150
}
fn default_true() -> bool {
    true
}

fn default_backends() -> BTreeMap<String, BackendConfig> {
    let mut backends = BTreeMap::new();
    backends.insert(
        default_model(),
        BackendConfig::Local {
            model: "mythomax-l2-13b".into(),
            tokenizer: None,
            seed: default_seed(),
        },
    );
    backends
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Lines of context kept on each side of a matching line
    #[serde(default = "default_window")]
    pub window: usize,

    /// Document used for grounding when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_window() -> usize {
    2
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Replace the built-in system instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_transcript_path")]
    pub path: PathBuf,
}

fn default_transcript_path() -> PathBuf {
    PathBuf::from("chat_log.txt")
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_transcript_path(),
        }
    }
}

/// Prompt history settings.
///
/// Leaving `max_turns` unset sends every past turn to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<usize>,
}

/// How to reach the engine behind a model identifier.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-process GGUF inference
    Local {
        /// Path to a `.gguf` file or a preset alias
        model: String,

        /// Explicit `tokenizer.json`; defaults to one next to the model file
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokenizer: Option<PathBuf>,

        #[serde(default = "default_seed")]
        seed: u64,
    },

    /// An OpenAI-compatible `/completions` server
    OpenaiCompat {
        api_url: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,

        /// Model name sent to the server (defaults to the backend's key)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_model: Option<String>,
    },
}

fn default_seed() -> u64 {
    42
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { model, tokenizer, seed } => f
                .debug_struct("Local")
                .field("model", model)
                .field("tokenizer", tokenizer)
                .field("seed", seed)
                .finish(),
            Self::OpenaiCompat {
                api_url,
                api_key,
                remote_model,
            } => f
                .debug_struct("OpenaiCompat")
                .field("api_url", api_url)
                .field("api_key", &redact(api_key))
                .field("remote_model", remote_model)
                .finish(),
        }
    }
}

impl BackendConfig {
    /// Short label for listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::OpenaiCompat { .. } => "openai_compat",
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recurchat/config.toml).
    ///
    /// Environment overrides:
    /// - `RECURCHAT_MODEL` replaces `default_model`
    /// - `RECURCHAT_CONTEXT_FILE` replaces `context.file`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `RECURCHAT_*` overrides, reading variables through `lookup`.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("RECURCHAT_MODEL") {
            self.default_model = model;
        }

        if let Some(file) = lookup("RECURCHAT_CONTEXT_FILE") {
            self.context.file = Some(PathBuf::from(file));
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recurchat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be > 0".into(),
            ));
        }

        if self.context.window > MAX_CONTEXT_WINDOW {
            return Err(ConfigError::ValidationError(format!(
                "context.window must be at most {MAX_CONTEXT_WINDOW}"
            )));
        }

        for (name, backend) in &self.backends {
            match backend {
                BackendConfig::Local { model, .. } if model.trim().is_empty() => {
                    return Err(ConfigError::ValidationError(format!(
                        "backends.{name}.model must not be empty"
                    )));
                }
                BackendConfig::OpenaiCompat { api_url, .. }
                    if !(api_url.starts_with("http://") || api_url.starts_with("https://")) =>
                {
                    return Err(ConfigError::ValidationError(format!(
                        "backends.{name}.api_url must be an http(s) URL"
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            context: ContextConfig::default(),
            persona: PersonaConfig::default(),
            transcript: TranscriptConfig::default(),
            history: HistoryConfig::default(),
            backends: default_backends(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
