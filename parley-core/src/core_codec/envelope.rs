//! Encoded content envelope and its wire form

use crate::core_codec::compression::Compression;
use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::errors::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version written as the first byte of every serialized envelope
pub const ENVELOPE_VERSION: u8 = 1;

/// A codec-tagged, serialized content unit exchanged between channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedContent {
    /// Codec that produced `content`
    pub content_type: ContentTypeId,

    /// Codec-defined string parameters
    pub parameters: BTreeMap<String, String>,

    /// Human-readable text for clients that cannot render this type
    pub fallback: Option<String>,

    /// Compression applied to `content`, if any
    pub compression: Option<Compression>,

    /// Codec-opaque payload
    pub content: Vec<u8>,
}

impl EncodedContent {
    /// Create an uncompressed envelope with no parameters
    pub fn new(content_type: ContentTypeId, content: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            parameters: BTreeMap::new(),
            fallback: None,
            compression: None,
            content: content.into(),
        }
    }

    /// Add a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Set the fallback text
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Look up a parameter
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Compress the payload in place and record the compression tag
    pub fn compress(mut self, compression: Compression) -> CodecResult<Self> {
        if let Some(existing) = self.compression {
            return Err(CodecError::Compression(format!(
                "payload is already {} compressed",
                existing
            )));
        }

        self.content = compression.compress(&self.content)?;
        self.compression = Some(compression);
        Ok(self)
    }

    /// Undo [`compress`](Self::compress); uncompressed envelopes pass through
    pub fn decompress(mut self, max_bytes: usize) -> CodecResult<Self> {
        if let Some(compression) = self.compression.take() {
            self.content = compression.decompress(&self.content, max_bytes)?;
        }
        Ok(self)
    }

    /// Serialize for the substrate: version byte followed by the bincode body
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))?;

        let mut bytes = Vec::with_capacity(body.len() + 1);
        bytes.push(ENVELOPE_VERSION);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Parse bytes produced by [`to_bytes`](Self::to_bytes)
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let (version, body) = bytes
            .split_first()
            .ok_or_else(|| CodecError::Decode("empty envelope".to_string()))?;

        if *version != ENVELOPE_VERSION {
            return Err(CodecError::Decode(format!(
                "unsupported envelope version {}",
                version
            )));
        }

        bincode::deserialize(body).map_err(|e| CodecError::Decode(format!("malformed envelope: {}", e)))
    }
}
