//! Content type identifiers

use crate::core_codec::errors::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authority used by the built-in codecs
pub const DEFAULT_AUTHORITY: &str = "parley.im";

/// Identifies the codec that produced an envelope.
///
/// Rendered as `authority/type:major.minor`, e.g. `parley.im/text:1.0`.
/// The rendered form is the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentTypeId {
    /// Organisation that defines the type
    pub authority_id: String,
    /// Type name within the authority
    pub type_id: String,
    /// Incompatible revisions bump the major version
    pub version_major: u32,
    /// Backwards-compatible revisions bump the minor version
    pub version_minor: u32,
}

impl ContentTypeId {
    /// Create a new content type identifier
    pub fn new(
        authority_id: impl Into<String>,
        type_id: impl Into<String>,
        version_major: u32,
        version_minor: u32,
    ) -> Self {
        Self {
            authority_id: authority_id.into(),
            type_id: type_id.into(),
            version_major,
            version_minor,
        }
    }

    /// Identifier under [`DEFAULT_AUTHORITY`]
    pub fn builtin(type_id: &str, version_major: u32, version_minor: u32) -> Self {
        Self::new(DEFAULT_AUTHORITY, type_id, version_major, version_minor)
    }

    /// Registry key for this type
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// Whether both identifiers name the same authority and type, ignoring version
    pub fn same_type(&self, other: &ContentTypeId) -> bool {
        self.authority_id == other.authority_id && self.type_id == other.type_id
    }
}

impl fmt::Display for ContentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}.{}",
            self.authority_id, self.type_id, self.version_major, self.version_minor
        )
    }
}

impl FromStr for ContentTypeId {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        let invalid = || CodecError::UnsupportedContentType(s.to_string());

        let (authority, rest) = s.split_once('/').ok_or_else(invalid)?;
        let (type_id, version) = rest.split_once(':').ok_or_else(invalid)?;
        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;

        if authority.is_empty() || type_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(
            authority,
            type_id,
            major.parse().map_err(|_| invalid())?,
            minor.parse().map_err(|_| invalid())?,
        ))
    }
}
