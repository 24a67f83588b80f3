//! Configuration loading for the dialogue engine.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/dialogue-engine/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::DialogueError;

/// Main engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional path to a TOML pattern-table override.
    /// When unset the compiled-in tables are used.
    #[serde(default)]
    pub patterns_path: Option<String>,

    /// Maximum time for the profile fetch that resolves the protocol mode (ms).
    /// If exceeded, the turn proceeds with the baseline tier.
    #[serde(default = "default_profile_timeout_ms")]
    pub profile_timeout_ms: u64,

    /// How long a fetched protocol mode is reused before refetching (seconds).
    #[serde(default = "default_profile_cache_secs")]
    pub profile_cache_secs: u64,

    /// Whether the engine attaches a proactive topic suggestion to turn outcomes.
    #[serde(default = "default_true")]
    pub suggestions_enabled: bool,

    /// Retries for a turn whose conditional state write lost a race.
    #[serde(default = "default_store_max_retries")]
    pub store_max_retries: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_profile_timeout_ms() -> u64 {
    250
}

fn default_profile_cache_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_store_max_retries() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            patterns_path: None,
            profile_timeout_ms: default_profile_timeout_ms(),
            profile_cache_secs: default_profile_cache_secs(),
            suggestions_enabled: default_true(),
            store_max_retries: default_store_max_retries(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/dialogue-engine/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (DIALOGUE_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, DialogueError> {
        let config_dir = ProjectDirs::from("", "", "dialogue-engine")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| DialogueError::Config(e.to_string()))?
            .set_default("profile_timeout_ms", default_profile_timeout_ms() as i64)
            .map_err(|e| DialogueError::Config(e.to_string()))?
            .set_default("profile_cache_secs", default_profile_cache_secs() as i64)
            .map_err(|e| DialogueError::Config(e.to_string()))?
            .set_default("suggestions_enabled", default_true())
            .map_err(|e| DialogueError::Config(e.to_string()))?
            .set_default("store_max_retries", default_store_max_retries() as i64)
            .map_err(|e| DialogueError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: DIALOGUE_LOG_LEVEL, DIALOGUE_PATTERNS_PATH, DIALOGUE_PROFILE_TIMEOUT_MS, ...
        // Field names contain underscores, so nesting uses a double underscore.
        builder = builder.add_source(
            Environment::with_prefix("DIALOGUE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| DialogueError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| DialogueError::Config(e.to_string()))?;
        settings.validate().map_err(DialogueError::Config)?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.profile_timeout_ms == 0 {
            return Err("profile_timeout_ms must be > 0".to_string());
        }
        if self.log_level.trim().is_empty() {
            return Err("log_level must not be empty".to_string());
        }
        Ok(())
    }

    /// Profile fetch timeout as a `Duration`.
    pub fn profile_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.profile_timeout_ms)
    }

    /// Profile cache lifetime as a `Duration`.
    pub fn profile_cache(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.profile_cache_secs)
    }
}
