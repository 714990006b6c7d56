//! CLI-specific configuration: a TOML-loadable wrapper around
//! [`rf_ids_core::EngineConfig`] plus operator-facing logging settings.

use color_eyre::eyre::{Context, Result};
use rf_ids_core::config::EngineConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

/// Deep-merge `override_val` on top of `base`; objects merge key by key,
/// arrays and scalars are replaced outright. Lets an operator's TOML file
/// override only the knobs it mentions.
fn merge_json_values(base: &mut JsonValue, override_val: JsonValue) {
    match (base, override_val) {
        (JsonValue::Object(base_map), JsonValue::Object(override_map)) => {
            for (key, value) in override_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_json_values(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_val, override_val) => {
            *base_val = override_val;
        }
    }
}

/// Complete CLI configuration bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub center_freq_hz: f64,

    #[serde(default)]
    pub terminal: TerminalConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            center_freq_hz: 433_920_000.0,
            terminal: TerminalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_counter_interval")]
    pub counter_interval_secs: f64,
}

fn default_counter_interval() -> f64 {
    10.0
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            counter_interval_secs: default_counter_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_target")]
    pub target: LogTarget,

    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_target() -> LogTarget {
    LogTarget::Stderr
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: default_log_target(),
            file_path: None,
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Logfmt,
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl CliConfig {
    /// Load from a TOML file, merged on top of [`CliConfig::default`] so a
    /// file only needs to mention the knobs it overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;

        let raw: toml::Value = toml::from_str(&content).wrap_err("failed to parse TOML configuration")?;
        let override_json = serde_json::to_value(&raw).wrap_err("failed to convert TOML to JSON")?;

        let mut base_json = serde_json::to_value(Self::default()).wrap_err("failed to serialize default config")?;
        merge_json_values(&mut base_json, override_json);

        let config: CliConfig = serde_json::from_value(base_json).wrap_err("failed to parse merged configuration")?;
        config.engine.validate().wrap_err("invalid engine configuration")?;
        Ok(config)
    }
}
