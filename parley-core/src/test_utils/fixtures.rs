//! Test fixtures for creating common test objects
//!
//! Two inboxes, `alix` and `bo`, share one in-memory network. Each side gets
//! its own client and channel view; the raw [`MemoryConversation`] is kept
//! alongside so tests can script substrate behavior.

use crate::config::Config;
use crate::core_codec::{CodecRegistry, Content, EncodedContent};
use crate::core_dm::adapters::memory::{MemoryConversation, MemoryNetwork};
use crate::core_dm::{Client, Dm, LegacyContacts, SubstrateResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ALIX: &str = "alix";
pub const BO: &str = "bo";

/// Config with a short stream registration timeout
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.stream.registration_timeout = Duration::from_secs(2);
    config
}

/// One participant's side of a direct channel
pub struct DmSide {
    pub client: Arc<Client>,
    pub dm: Dm,
    pub conversation: Arc<MemoryConversation>,
}

/// Both sides of a direct channel between `alix` and `bo`
pub struct DmPair {
    pub network: MemoryNetwork,
    pub alix: DmSide,
    pub bo: DmSide,
}

/// Builder for [`DmPair`]
pub struct DmPairBuilder {
    config: Config,
    registry: Option<Arc<CodecRegistry>>,
    legacy: Option<Arc<dyn LegacyContacts>>,
}

impl DmPairBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            registry: None,
            legacy: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Seed both clients with every built-in codec
    pub fn with_standard_codecs(mut self) -> Self {
        self.registry = Some(Arc::new(CodecRegistry::with_standard_codecs()));
        self
    }

    /// Run `alix` dual-stack with `legacy` as its contact store
    pub fn with_alix_legacy_contacts(mut self, legacy: Arc<dyn LegacyContacts>) -> Self {
        self.config.legacy.dual_stack = true;
        self.legacy = Some(legacy);
        self
    }

    pub fn build(self) -> DmPair {
        let network = MemoryNetwork::new();
        let alix = self.side(&network, ALIX, BO, self.legacy.clone());
        let bo = self.side(&network, BO, ALIX, None);

        DmPair { network, alix, bo }
    }

    fn side(
        &self,
        network: &MemoryNetwork,
        me: &str,
        peer: &str,
        legacy: Option<Arc<dyn LegacyContacts>>,
    ) -> DmSide {
        let mut client = Client::new(me, self.config.clone()).expect("valid test config");
        if let Some(registry) = &self.registry {
            client = client.with_registry(Arc::new(registry_copy(registry)));
        }
        if let Some(legacy) = legacy {
            client = client.with_legacy_contacts(legacy);
        }
        let client = Arc::new(client);

        let conversation = network.find_or_create_dm(me, peer);
        let dm = Dm::new(conversation.clone(), Arc::clone(&client));

        DmSide {
            client,
            dm,
            conversation,
        }
    }
}

impl Default for DmPairBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Each client owns its registry; copy the seeded one per side
fn registry_copy(source: &CodecRegistry) -> CodecRegistry {
    let copy = CodecRegistry::new();
    for id in source.content_types() {
        if let Ok(codec) = source.find_by_id(&id) {
            copy.register_shared(codec);
        }
    }
    copy
}

/// Text-only channel pair
pub fn dm_pair() -> DmPair {
    DmPairBuilder::new().build()
}

/// Serialized envelope for `text`, as a substrate would store it
pub fn text_envelope_bytes(text: &str) -> Vec<u8> {
    let registry = CodecRegistry::new();
    crate::core_codec::encode_content(&registry, &Content::from(text), None)
        .and_then(|encoded| encoded.to_bytes())
        .expect("text encodes")
}

/// Serialized envelope bytes of an arbitrary envelope
pub fn envelope_bytes(encoded: &EncodedContent) -> Vec<u8> {
    encoded.to_bytes().expect("envelope serializes")
}

/// Legacy contact store that records every call
#[derive(Default)]
pub struct RecordingLegacyContacts {
    calls: Mutex<Vec<LegacyCall>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyCall {
    Allow(Vec<String>),
    Deny(Vec<String>),
}

impl RecordingLegacyContacts {
    pub fn calls(&self) -> Vec<LegacyCall> {
        self.calls.lock().expect("legacy calls lock").clone()
    }
}

#[async_trait]
impl LegacyContacts for RecordingLegacyContacts {
    async fn allow_groups(&self, group_ids: &[String]) -> SubstrateResult<()> {
        self.calls
            .lock()
            .expect("legacy calls lock")
            .push(LegacyCall::Allow(group_ids.to_vec()));
        Ok(())
    }

    async fn deny_groups(&self, group_ids: &[String]) -> SubstrateResult<()> {
        self.calls
            .lock()
            .expect("legacy calls lock")
            .push(LegacyCall::Deny(group_ids.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_codec::ReactionCodec;

    #[test]
    fn test_pair_shares_conversation() {
        let pair = dm_pair();
        assert_eq!(pair.alix.dm, pair.bo.dm);
        assert_eq!(pair.alix.client.inbox_id(), ALIX);
        assert_eq!(pair.bo.conversation.viewer(), BO);
    }

    #[test]
    fn test_standard_codec_registries_are_independent() {
        let pair = DmPairBuilder::new().with_standard_codecs().build();
        let alix = pair.alix.client.codec_registry();
        let bo = pair.bo.client.codec_registry();

        assert!(alix.contains(&ReactionCodec::content_type_id()));
        assert!(!Arc::ptr_eq(alix, bo));
    }
}
