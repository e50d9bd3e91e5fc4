//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/rowtree/rowtree.toml`
//! 3. Local config: an explicit TOML file passed by the caller
//! 4. Environment variables: `ROWTREE_*` prefix (`ROWTREE_STREAM__ORDER=depth-first`)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::Order;
use crate::stream::{Framing, JsonCodec, DEFAULT_MAX_RECORD_BYTES};

const ENV_PREFIX: &str = "ROWTREE";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("config error: {message}")]
    Config { message: String },
}

/// Record stream settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamSettings {
    /// Traversal order used when serializing
    pub order: Order,
    /// Record framing on the wire
    pub framing: Framing,
    /// Encoded records the producer may queue ahead of the reader (0 = hand over one at a time)
    pub channel_capacity: usize,
    /// Largest record accepted when decoding
    pub max_record_bytes: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            order: Order::BreadthFirst,
            framing: Framing::JsonLines,
            channel_capacity: 0,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl StreamSettings {
    /// JSON codec matching these settings.
    pub fn codec<T>(&self) -> JsonCodec<T> {
        JsonCodec::new(self.framing).with_max_record_bytes(self.max_record_bytes)
    }

    fn merge(&self, overlay: &RawStreamSettings) -> Self {
        Self {
            order: overlay.order.unwrap_or(self.order),
            framing: overlay.framing.unwrap_or(self.framing),
            channel_capacity: overlay.channel_capacity.unwrap_or(self.channel_capacity),
            max_record_bytes: overlay.max_record_bytes.unwrap_or(self.max_record_bytes),
        }
    }
}

/// Raw stream settings: `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStreamSettings {
    order: Option<Order>,
    framing: Option<Framing>,
    channel_capacity: Option<usize>,
    max_record_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    stream: RawStreamSettings,
}

/// Unified configuration for rowtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub stream: StreamSettings,
}

/// Get the XDG config directory for rowtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rowtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("rowtree.toml"))
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| SettingsError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            stream: self.stream.merge(&overlay.stream),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// A missing global file is skipped. A `local` path that is given must exist.
    #[instrument(level = "debug")]
    pub fn load(local: Option<&Path>) -> Result<Self, SettingsError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!(path = %global_path.display(), "global config");
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(local_path) = local {
            debug!(path = %local_path.display(), "local config");
            current = current.merge_with(&load_raw_settings(local_path)?);
        }

        current.apply_env_overrides(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
    }

    /// Apply `ROWTREE_*` variables as explicit overrides.
    fn apply_env_overrides(mut self, env: Environment) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(env)
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("stream.order") {
            self.stream.order = val.parse().map_err(|message| SettingsError::Config { message })?;
        }
        if let Ok(val) = config.get_string("stream.framing") {
            self.stream.framing = val.parse().map_err(|message| SettingsError::Config { message })?;
        }
        if let Ok(val) = config.get_string("stream.channel_capacity") {
            self.stream.channel_capacity = parse_count("stream.channel_capacity", &val)?;
        }
        if let Ok(val) = config.get_string("stream.max_record_bytes") {
            self.stream.max_record_bytes = parse_count("stream.max_record_bytes", &val)?;
        }

        Ok(self)
    }

    /// Parse settings from TOML text, filling unspecified fields with defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let raw: RawSettings = toml::from_str(content).map_err(|e| SettingsError::Config {
            message: format!("parse config: {e}"),
        })?;
        Ok(Self::default().merge_with(&raw))
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(|e| SettingsError::Config {
            message: format!("serialize config: {e}"),
        })
    }
}

fn parse_count(key: &str, val: &str) -> Result<usize, SettingsError> {
    val.trim().parse().map_err(|e| SettingsError::Config {
        message: format!("{key}: {e}"),
    })
}

fn config_err(e: ConfigError) -> SettingsError {
    SettingsError::Config {
        message: e.to_string(),
    }
}
