//! Generic JSON codec for application-defined content types

use crate::core_codec::codec::{invalid_content, Content, ContentCodec};
use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::envelope::EncodedContent;
use crate::core_codec::errors::{CodecError, CodecResult};

/// Carries [`Content::Custom`] values of one content type as JSON
///
/// ```ignore
/// let poll = ContentTypeId::new("example.org", "poll", 1, 0);
/// client.register(JsonCodec::new(poll.clone()).with_fallback("Sent a poll"));
/// ```
#[derive(Debug, Clone)]
pub struct JsonCodec {
    content_type: ContentTypeId,
    fallback: Option<String>,
}

impl JsonCodec {
    pub fn new(content_type: ContentTypeId) -> Self {
        Self {
            content_type,
            fallback: None,
        }
    }

    /// Fixed fallback text attached to every encoded value
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

impl ContentCodec for JsonCodec {
    fn content_type(&self) -> ContentTypeId {
        self.content_type.clone()
    }

    fn encode(&self, content: &Content) -> CodecResult<EncodedContent> {
        match content {
            Content::Custom { content_type, value } if content_type.same_type(&self.content_type) => {
                let body = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;
                Ok(EncodedContent::new(self.content_type(), body))
            }
            other => Err(invalid_content(self, other)),
        }
    }

    fn decode(&self, encoded: &EncodedContent) -> CodecResult<Content> {
        let value = serde_json::from_slice(&encoded.content)
            .map_err(|e| CodecError::Decode(format!("malformed {} body: {}", self.content_type, e)))?;

        Ok(Content::Custom {
            content_type: encoded.content_type.clone(),
            value,
        })
    }

    fn fallback(&self, _content: &Content) -> CodecResult<Option<String>> {
        Ok(self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn poll_type() -> ContentTypeId {
        ContentTypeId::new("example.org", "poll", 1, 0)
    }

    #[test]
    fn test_custom_value_round_trip() {
        let codec = JsonCodec::new(poll_type()).with_fallback("Sent a poll");
        let content = Content::Custom {
            content_type: poll_type(),
            value: json!({"question": "lunch?", "options": ["yes", "no"]}),
        };

        let encoded = codec.encode(&content).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), content);
        assert_eq!(codec.fallback(&content).unwrap().as_deref(), Some("Sent a poll"));
    }

    #[test]
    fn test_rejects_foreign_custom_type() {
        let codec = JsonCodec::new(poll_type());
        let other = Content::Custom {
            content_type: ContentTypeId::new("example.org", "vote", 1, 0),
            value: json!(1),
        };

        assert!(matches!(codec.encode(&other), Err(CodecError::InvalidContent { .. })));
    }
}
