//! Encode/decode orchestration

use crate::core_codec::codec::Content;
use crate::core_codec::compression::Compression;
use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::envelope::EncodedContent;
use crate::core_codec::errors::{CodecError, CodecResult};
use crate::core_codec::registry::CodecRegistry;
use tracing::trace;

/// Per-message encoding options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Codec to use; `None` selects the default text codec
    pub content_type: Option<ContentTypeId>,

    /// Compress the encoded payload
    pub compression: Option<Compression>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: ContentTypeId) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }
}

/// Encode `content` with the codec selected by `options`
///
/// Steps: resolve the codec, encode, attach fallback text, then compress.
/// Reads the registry and nothing else, so identical inputs give identical
/// envelopes.
pub fn encode_content(
    registry: &CodecRegistry,
    content: &Content,
    options: Option<&SendOptions>,
) -> CodecResult<EncodedContent> {
    let codec = registry.find(options.and_then(|o| o.content_type.as_ref()))?;

    let mut encoded = codec.encode(content)?;

    if let Some(fallback) = codec.fallback(content)? {
        encoded.fallback = Some(fallback);
    }

    if let Some(compression) = options.and_then(|o| o.compression) {
        encoded = encoded.compress(compression)?;
    }

    trace!(
        content_type = %encoded.content_type,
        bytes = encoded.content.len(),
        compression = ?encoded.compression,
        "Encoded content"
    );

    Ok(encoded)
}

/// Decode an envelope with the codec its type tag names
///
/// The payload is decompressed, up to `max_decompressed_bytes`, before the
/// codec sees it.
pub fn decode_content(
    registry: &CodecRegistry,
    encoded: &EncodedContent,
    max_decompressed_bytes: usize,
) -> CodecResult<Content> {
    let codec = registry
        .find(Some(&encoded.content_type))
        .map_err(|_| CodecError::CodecNotFound(encoded.content_type.to_string()))?;

    let plain = encoded.clone().decompress(max_decompressed_bytes)?;
    codec.decode(&plain)
}
