//! Error types for content codecs

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding message content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No codec is registered for the requested content type
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// An inbound envelope names a content type with no registered codec
    #[error("Codec not found for content type: {0}")]
    CodecNotFound(String),

    /// The content value does not match what the codec expects
    #[error("Invalid content: codec {expected} cannot handle {found} content")]
    InvalidContent { expected: String, found: String },

    /// Envelope or payload bytes are malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Content could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Compressing or decompressing the payload failed
    #[error("Compression error: {0}")]
    Compression(String),
}
