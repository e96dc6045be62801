//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write configuration file {path}: {message}")]
    Write { path: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidEnv { var: &'static str, message: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}
