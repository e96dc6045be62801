//! Reaction codec
//!
//! Reactions are sent as a JSON body:
//!
//! ```json
//! { "reference": "<message id>", "action": "added", "content": "smile", "schema": "shortcode" }
//! ```
//!
//! Older clients put `action`, `reference` and `schema` in the envelope
//! parameters and the reaction itself in the payload. Both forms decode to the
//! same [`Reaction`]. Unrecognized enum strings, including empty ones, decode to
//! the `Unknown` variants.

use crate::core_codec::codec::{invalid_content, Content, ContentCodec};
use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::envelope::EncodedContent;
use crate::core_codec::errors::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the reaction does to the referenced message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReactionAction {
    Added,
    Removed,
    #[default]
    Unknown,
}

impl ReactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionAction::Added => "added",
            ReactionAction::Removed => "removed",
            ReactionAction::Unknown => "unknown",
        }
    }

    /// Parse leniently; anything unrecognized is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "added" => ReactionAction::Added,
            "removed" => ReactionAction::Removed,
            _ => ReactionAction::Unknown,
        }
    }
}

impl From<String> for ReactionAction {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ReactionAction> for String {
    fn from(action: ReactionAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for ReactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `Reaction::content` should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReactionSchema {
    /// A unicode emoji, e.g. `U+1F603`
    Unicode,
    /// A shortcode, e.g. `smile`
    Shortcode,
    /// Application-defined
    Custom,
    #[default]
    Unknown,
}

impl ReactionSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionSchema::Unicode => "unicode",
            ReactionSchema::Shortcode => "shortcode",
            ReactionSchema::Custom => "custom",
            ReactionSchema::Unknown => "unknown",
        }
    }

    /// Parse leniently; anything unrecognized is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "unicode" => ReactionSchema::Unicode,
            "shortcode" => ReactionSchema::Shortcode,
            "custom" => ReactionSchema::Custom,
            _ => ReactionSchema::Unknown,
        }
    }
}

impl From<String> for ReactionSchema {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ReactionSchema> for String {
    fn from(schema: ReactionSchema) -> Self {
        schema.as_str().to_string()
    }
}

/// A reaction to an earlier message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Reaction {
    /// Id of the message being reacted to
    pub reference: String,
    pub action: ReactionAction,
    pub content: String,
    pub schema: ReactionSchema,
}

impl Reaction {
    pub fn new(
        reference: impl Into<String>,
        action: ReactionAction,
        content: impl Into<String>,
        schema: ReactionSchema,
    ) -> Self {
        Self {
            reference: reference.into(),
            action,
            content: content.into(),
            schema,
        }
    }
}

/// Codec for [`Reaction`] content
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactionCodec;

impl ReactionCodec {
    pub fn content_type_id() -> ContentTypeId {
        ContentTypeId::builtin("reaction", 1, 0)
    }

    fn decode_legacy(encoded: &EncodedContent) -> CodecResult<Reaction> {
        let content = String::from_utf8(encoded.content.clone())
            .map_err(|e| CodecError::Decode(format!("reaction is not valid UTF-8: {}", e)))?;

        Ok(Reaction {
            reference: encoded.parameter("reference").unwrap_or_default().to_string(),
            action: ReactionAction::parse(encoded.parameter("action").unwrap_or_default()),
            content,
            schema: ReactionSchema::parse(encoded.parameter("schema").unwrap_or_default()),
        })
    }
}

impl ContentCodec for ReactionCodec {
    fn content_type(&self) -> ContentTypeId {
        Self::content_type_id()
    }

    fn encode(&self, content: &Content) -> CodecResult<EncodedContent> {
        let Content::Reaction(reaction) = content else {
            return Err(invalid_content(self, content));
        };

        let body = serde_json::to_vec(reaction).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(EncodedContent::new(self.content_type(), body))
    }

    fn decode(&self, encoded: &EncodedContent) -> CodecResult<Content> {
        // Only a JSON object counts as the canonical form; a legacy payload such
        // as `"smile"` or `123` would otherwise parse as a JSON scalar.
        let canonical = serde_json::from_slice::<serde_json::Value>(&encoded.content)
            .ok()
            .filter(serde_json::Value::is_object)
            .map(serde_json::from_value::<Reaction>);

        let reaction = match canonical {
            Some(Ok(reaction)) => reaction,
            Some(Err(e)) => {
                return Err(CodecError::Decode(format!("malformed reaction body: {}", e)));
            }
            None => Self::decode_legacy(encoded)?,
        };

        Ok(Content::Reaction(reaction))
    }

    fn fallback(&self, content: &Content) -> CodecResult<Option<String>> {
        let Content::Reaction(reaction) = content else {
            return Err(invalid_content(self, content));
        };

        Ok(match reaction.action {
            ReactionAction::Added => {
                Some(format!("Reacted \"{}\" to an earlier message", reaction.content))
            }
            ReactionAction::Removed => {
                Some(format!("Removed \"{}\" from an earlier message", reaction.content))
            }
            ReactionAction::Unknown => None,
        })
    }
}
