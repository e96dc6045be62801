//! Configuration management for Parley
//!
//! Configuration comes from defaults, a TOML file, or environment variables,
//! and is validated before use.

use crate::logging::LogLevel;
use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Live message streaming
    pub stream: StreamConfig,

    /// Content codecs
    pub codec: CodecConfig,

    /// Legacy contact-list compatibility
    pub legacy: LegacyConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

/// Streaming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// How long the substrate may take to register a stream callback
    #[serde(with = "humantime_serde")]
    pub registration_timeout: Duration,
}

/// Codec configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Upper bound on a decompressed payload
    pub max_decompressed_bytes: usize,
}

/// Legacy compatibility configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    /// Mirror consent changes into the legacy allow/deny lists
    pub dual_stack: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            registration_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_decompressed_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

/// Parse `var` if `lookup` finds it
fn env_value<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidEnv {
            var,
            message: e.to_string(),
        }),
        None => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: PARLEY_<SECTION>_<KEY>
    /// Example: PARLEY_STREAM_REGISTRATION_TIMEOUT=10s
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|var| env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(level) = env_value::<String>(&lookup, "PARLEY_LOGGING_LEVEL")? {
            config.logging.level = level.to_lowercase();
        }
        if let Some(json) = env_value(&lookup, "PARLEY_LOGGING_JSON_FORMAT")? {
            config.logging.json_format = json;
        }
        if let Some(with_target) = env_value(&lookup, "PARLEY_LOGGING_WITH_TARGET")? {
            config.logging.with_target = with_target;
        }
        if let Some(timeout) = env_value::<humantime::Duration>(&lookup, "PARLEY_STREAM_REGISTRATION_TIMEOUT")? {
            config.stream.registration_timeout = timeout.into();
        }
        if let Some(max_bytes) = env_value(&lookup, "PARLEY_CODEC_MAX_DECOMPRESSED_BYTES")? {
            config.codec.max_decompressed_bytes = max_bytes;
        }
        if let Some(dual_stack) = env_value(&lookup, "PARLEY_LEGACY_DUAL_STACK")? {
            config.legacy.dual_stack = dual_stack;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.registration_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "registration_timeout must be greater than 0".to_string(),
            ));
        }

        if self.codec.max_decompressed_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_decompressed_bytes must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
