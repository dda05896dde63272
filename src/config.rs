//! Configuration System
//!
//! Layered configuration built with the `config` crate. Precedence (lowest to highest):
//! built-in defaults, the global file, an explicitly requested file, then `READYGATE__*`
//! environment variables (double underscore separates nested keys).

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const ENV_PREFIX: &str = "READYGATE";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Queue tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Pending-list length at which a retention warning is logged (0 disables it).
    /// Nothing is ever rejected or dropped because of this value.
    #[serde(default = "default_pending_warn_threshold")]
    pub pending_warn_threshold: usize,
}

fn default_pending_warn_threshold() -> usize {
    1024
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pending_warn_threshold: default_pending_warn_threshold(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl GateConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`GateConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration, optionally from an explicit file which must then exist.
    pub fn load(explicit: Option<&Path>) -> Result<GateConfig, ApiError> {
        let mut builder = builder_with_defaults()?;

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                debug!(config_path = %global.display(), "Loading global configuration");
                builder = builder.add_source(File::from(global).required(false));
            }
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ApiError::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            debug!(config_path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: GateConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/readygate/config.toml`, falling back to `~/.config/readygate/config.toml`.
    pub fn global_config_path() -> Option<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return Some(PathBuf::from(xdg).join("readygate").join("config.toml"));
            }
        }
        std::env::var("HOME").ok().map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("readygate")
                .join("config.toml")
        })
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ApiError> {
    let defaults = GateConfig::default();
    Ok(Config::builder()
        .set_default(
            "queue.pending_warn_threshold",
            defaults.queue.pending_warn_threshold as i64,
        )?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", defaults.logging.format)?
        .set_default("logging.output", defaults.logging.output)?)
}
