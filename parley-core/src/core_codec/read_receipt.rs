//! Read receipt codec

use crate::core_codec::codec::{invalid_content, Content, ContentCodec};
use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::envelope::EncodedContent;
use crate::core_codec::errors::CodecResult;
use serde::{Deserialize, Serialize};

/// Signals that the sender has read the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadReceipt;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadReceiptCodec;

impl ReadReceiptCodec {
    pub fn content_type_id() -> ContentTypeId {
        ContentTypeId::builtin("readReceipt", 1, 0)
    }
}

impl ContentCodec for ReadReceiptCodec {
    fn content_type(&self) -> ContentTypeId {
        Self::content_type_id()
    }

    fn encode(&self, content: &Content) -> CodecResult<EncodedContent> {
        match content {
            Content::ReadReceipt(_) => Ok(EncodedContent::new(self.content_type(), Vec::new())),
            other => Err(invalid_content(self, other)),
        }
    }

    fn decode(&self, _encoded: &EncodedContent) -> CodecResult<Content> {
        Ok(Content::ReadReceipt(ReadReceipt))
    }

    fn fallback(&self, _content: &Content) -> CodecResult<Option<String>> {
        Ok(None)
    }
}
