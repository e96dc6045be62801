//! Plain text codec, the registry default

use crate::core_codec::codec::{invalid_content, Content, ContentCodec};
use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::envelope::EncodedContent;
use crate::core_codec::errors::{CodecError, CodecResult};

const ENCODING_PARAM: &str = "encoding";
const UTF8: &str = "UTF-8";

/// UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl TextCodec {
    pub fn content_type_id() -> ContentTypeId {
        ContentTypeId::builtin("text", 1, 0)
    }
}

impl ContentCodec for TextCodec {
    fn content_type(&self) -> ContentTypeId {
        Self::content_type_id()
    }

    fn encode(&self, content: &Content) -> CodecResult<EncodedContent> {
        let Content::Text(text) = content else {
            return Err(invalid_content(self, content));
        };

        Ok(EncodedContent::new(self.content_type(), text.as_bytes().to_vec())
            .with_parameter(ENCODING_PARAM, UTF8))
    }

    fn decode(&self, encoded: &EncodedContent) -> CodecResult<Content> {
        if let Some(encoding) = encoded.parameter(ENCODING_PARAM) {
            if !encoding.eq_ignore_ascii_case(UTF8) {
                return Err(CodecError::Decode(format!(
                    "unrecognized text encoding: {}",
                    encoding
                )));
            }
        }

        String::from_utf8(encoded.content.clone())
            .map(Content::Text)
            .map_err(|e| CodecError::Decode(format!("text is not valid UTF-8: {}", e)))
    }

    fn fallback(&self, _content: &Content) -> CodecResult<Option<String>> {
        Ok(None)
    }
}
