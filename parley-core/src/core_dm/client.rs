//! The owning client of a set of direct channels
//!
//! A [`Client`] carries what every channel needs but does not own itself: the
//! local inbox identity, the shared [`CodecRegistry`], the validated
//! [`Config`], and (optionally) the legacy contacts collaborator used for
//! dual-stack consent mirroring.

use crate::config::Config;
use crate::core_codec::{CodecRegistry, ContentCodec};
use crate::core_dm::errors::DmResult;
use crate::core_dm::substrate::SubstrateResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Legacy contact-list allow/deny store
///
/// Older clients read consent from flat allow/deny lists keyed by channel id.
/// While both generations coexist, consent changes are mirrored into it.
#[async_trait]
pub trait LegacyContacts: Send + Sync {
    async fn allow_groups(&self, group_ids: &[String]) -> SubstrateResult<()>;

    async fn deny_groups(&self, group_ids: &[String]) -> SubstrateResult<()>;
}

/// Local client state shared by all of its channels
pub struct Client {
    inbox_id: String,
    registry: Arc<CodecRegistry>,
    config: Arc<Config>,
    legacy: Option<Arc<dyn LegacyContacts>>,
}

impl Client {
    /// Create a client with a text-only codec registry
    ///
    /// The configuration is validated up front.
    pub fn new(inbox_id: impl Into<String>, config: Config) -> DmResult<Self> {
        config.validate()?;

        Ok(Self {
            inbox_id: inbox_id.into(),
            registry: Arc::new(CodecRegistry::new()),
            config: Arc::new(config),
            legacy: None,
        })
    }

    /// Attach the legacy contacts store
    ///
    /// Mirroring only happens when `legacy.dual_stack` is also enabled.
    pub fn with_legacy_contacts(mut self, legacy: Arc<dyn LegacyContacts>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Share an existing registry, e.g. one seeded with the standard codecs
    pub fn with_registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn inbox_id(&self) -> &str {
        &self.inbox_id
    }

    /// Register a codec; visible to every channel of this client
    pub fn register<C: ContentCodec + 'static>(&self, codec: C) {
        self.registry.register(codec);
    }

    pub fn codec_registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Legacy store to mirror consent into, if running dual-stack
    pub(crate) fn legacy_contacts(&self) -> Option<&Arc<dyn LegacyContacts>> {
        if self.config.legacy.dual_stack {
            self.legacy.as_ref()
        } else {
            None
        }
    }

    pub fn has_legacy_stack(&self) -> bool {
        self.legacy_contacts().is_some()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("inbox_id", &self.inbox_id)
            .field("registry", &self.registry)
            .field("dual_stack", &self.has_legacy_stack())
            .finish()
    }
}
