//! Error types for the channel layer

use crate::config::ConfigError;
use crate::core_codec::CodecError;
use crate::core_dm::substrate::SubstrateError;
use std::time::Duration;
use thiserror::Error;

/// Result type for channel operations
pub type DmResult<T> = Result<T, DmError>;

/// Errors that can occur in channel operations
#[derive(Error, Debug, Clone)]
pub enum DmError {
    /// Encoding or decoding content failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The substrate rejected the operation; passed through unchanged
    #[error("Substrate error: {0}")]
    Substrate(#[from] SubstrateError),

    /// A direct channel without a second participant
    #[error("Missing peer: conversation {0} has no member other than this client")]
    MissingPeer(String),

    /// History query parameters cannot be represented
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The substrate did not finish registering a stream callback in time
    #[error("Stream registration timed out after {0:?}")]
    StreamRegistrationTimeout(Duration),

    /// The client configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ConfigError> for DmError {
    fn from(err: ConfigError) -> Self {
        DmError::Config(err.to_string())
    }
}
