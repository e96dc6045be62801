//! Codec registry
//!
//! Shared by every channel of a client. Registration replaces any codec already
//! registered for the same content type (last registration wins) and is visible
//! to every later lookup.

use crate::core_codec::codec::ContentCodec;
use crate::core_codec::content_type::ContentTypeId;
use crate::core_codec::errors::{CodecError, CodecResult};
use crate::core_codec::reaction::ReactionCodec;
use crate::core_codec::read_receipt::ReadReceiptCodec;
use crate::core_codec::text::TextCodec;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Maps content type ids to codecs
pub struct CodecRegistry {
    codecs: RwLock<HashMap<String, Arc<dyn ContentCodec>>>,
    default_codec: Arc<dyn ContentCodec>,
}

impl CodecRegistry {
    /// Registry containing only the default [`TextCodec`]
    pub fn new() -> Self {
        let default_codec: Arc<dyn ContentCodec> = Arc::new(TextCodec);
        let mut codecs = HashMap::new();
        codecs.insert(default_codec.content_type().id(), Arc::clone(&default_codec));

        Self {
            codecs: RwLock::new(codecs),
            default_codec,
        }
    }

    /// Registry seeded with every built-in codec
    pub fn with_standard_codecs() -> Self {
        let registry = Self::new();
        registry.register(ReactionCodec);
        registry.register(ReadReceiptCodec);
        registry
    }

    /// Register a codec under its own content type
    pub fn register<C: ContentCodec + 'static>(&self, codec: C) {
        self.register_shared(Arc::new(codec));
    }

    /// Register an already shared codec
    pub fn register_shared(&self, codec: Arc<dyn ContentCodec>) {
        let key = codec.content_type().id();
        let replaced = self
            .codecs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), codec)
            .is_some();

        debug!(content_type = %key, replaced, "Registered codec");
    }

    /// Find the codec for `content_type`; `None` selects the default text codec
    pub fn find(&self, content_type: Option<&ContentTypeId>) -> CodecResult<Arc<dyn ContentCodec>> {
        match content_type {
            // A re-registered text codec replaces the default too.
            None => Ok(self
                .find_by_id(&self.default_codec.content_type().id())
                .unwrap_or_else(|_| Arc::clone(&self.default_codec))),
            Some(content_type) => self.find_by_id(&content_type.id()),
        }
    }

    /// Find a codec by its rendered id, e.g. `parley.im/text:1.0`
    pub fn find_by_id(&self, id: &str) -> CodecResult<Arc<dyn ContentCodec>> {
        self.codecs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| CodecError::UnsupportedContentType(id.to_string()))
    }

    pub fn contains(&self, content_type: &ContentTypeId) -> bool {
        self.codecs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&content_type.id())
    }

    /// Registered content type ids, sorted
    pub fn content_types(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .codecs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("content_types", &self.content_types())
            .finish()
    }
}
