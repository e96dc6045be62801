//! Content values and the codec capability trait

use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::envelope::EncodedContent;
use crate::core_codec::errors::{CodecError, CodecResult};
use crate::core_codec::reaction::Reaction;
use crate::core_codec::read_receipt::ReadReceipt;
use serde::{Deserialize, Serialize};

/// Typed application payload carried by a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    /// Plain text
    Text(String),
    /// Emoji or shortcode reaction to an earlier message
    Reaction(Reaction),
    /// Marks the conversation as read up to this message
    ReadReceipt(ReadReceipt),
    /// Application-defined content handled by a custom codec
    Custom {
        content_type: ContentTypeId,
        value: serde_json::Value,
    },
}

impl Content {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Reaction(_) => "reaction",
            Content::ReadReceipt(_) => "read receipt",
            Content::Custom { .. } => "custom",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_reaction(&self) -> Option<&Reaction> {
        match self {
            Content::Reaction(reaction) => Some(reaction),
            _ => None,
        }
    }

    pub fn is_read_receipt(&self) -> bool {
        matches!(self, Content::ReadReceipt(_))
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Reaction> for Content {
    fn from(reaction: Reaction) -> Self {
        Content::Reaction(reaction)
    }
}

impl From<ReadReceipt> for Content {
    fn from(receipt: ReadReceipt) -> Self {
        Content::ReadReceipt(receipt)
    }
}

/// Encode/decode/fallback capability for one content type
///
/// Codecs are registered in a [`CodecRegistry`](crate::core_codec::CodecRegistry)
/// under [`content_type`](ContentCodec::content_type) and must be cheap to share
/// between channels.
pub trait ContentCodec: Send + Sync {
    /// Type tag this codec handles
    fn content_type(&self) -> ContentTypeId;

    /// Encode `content` into an envelope
    ///
    /// Returns [`CodecError::InvalidContent`] when `content` is a variant this
    /// codec does not handle.
    fn encode(&self, content: &Content) -> CodecResult<EncodedContent>;

    /// Decode an (already decompressed) envelope
    fn decode(&self, encoded: &EncodedContent) -> CodecResult<Content>;

    /// Text shown by clients that cannot render this type
    fn fallback(&self, content: &Content) -> CodecResult<Option<String>>;
}

/// Error for a codec handed a content variant it does not support
pub(crate) fn invalid_content(codec: &dyn ContentCodec, content: &Content) -> CodecError {
    CodecError::InvalidContent {
        expected: codec.content_type().to_string(),
        found: content.kind().to_string(),
    }
}
