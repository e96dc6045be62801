//! Consent gate
//!
//! First contact implicitly trusts the peer: sending into a channel whose
//! consent is still `Unknown` promotes it to `Allowed` before the message
//! leaves. `Denied` does not block sending, and `Allowed` is never downgraded.
//!
//! When the client runs dual-stack, explicit `Allowed`/`Denied` changes are
//! mirrored into the legacy contact lists first, then written to the substrate.

use crate::core_dm::client::Client;
use crate::core_dm::errors::DmResult;
use crate::core_dm::substrate::{ConsentState, Conversation};
use tracing::{debug, info};

/// Make the channel sendable, returning the consent state it ends up in
pub async fn ensure_sendable(conversation: &dyn Conversation, client: &Client) -> DmResult<ConsentState> {
    let current = conversation.consent_state()?;

    match current {
        ConsentState::Unknown => {
            update_consent_state(conversation, client, ConsentState::Allowed).await?;
            Ok(ConsentState::Allowed)
        }
        ConsentState::Allowed | ConsentState::Denied => {
            debug!(state = ?current, "Consent left unchanged for send");
            Ok(current)
        }
    }
}

/// Write an explicit consent state
pub async fn update_consent_state(
    conversation: &dyn Conversation,
    client: &Client,
    state: ConsentState,
) -> DmResult<()> {
    let channel_id = hex::encode(conversation.id());

    if let Some(legacy) = client.legacy_contacts() {
        let ids = [channel_id.clone()];
        match state {
            ConsentState::Allowed => legacy.allow_groups(&ids).await?,
            ConsentState::Denied => legacy.deny_groups(&ids).await?,
            ConsentState::Unknown => {}
        }
    }

    conversation.update_consent_state(state)?;
    info!(channel = %channel_id, state = ?state, "Consent updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core_dm::adapters::memory::MemoryNetwork;
    use crate::core_dm::client::LegacyContacts;
    use crate::core_dm::substrate::{SubstrateError, SubstrateResult};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records legacy list writes
    #[derive(Default)]
    struct RecordingContacts {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    impl RecordingContacts {
        fn record(&self, op: &str, ids: &[String]) -> SubstrateResult<()> {
            if self.fail {
                return Err(SubstrateError::Storage("legacy store offline".to_string()));
            }
            self.calls.lock().unwrap().push((op.to_string(), ids.to_vec()));
            Ok(())
        }

        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LegacyContacts for RecordingContacts {
        async fn allow_groups(&self, group_ids: &[String]) -> SubstrateResult<()> {
            self.record("allow", group_ids)
        }

        async fn deny_groups(&self, group_ids: &[String]) -> SubstrateResult<()> {
            self.record("deny", group_ids)
        }
    }

    fn dual_stack_client(contacts: Arc<RecordingContacts>) -> Client {
        let mut config = Config::default();
        config.legacy.dual_stack = true;
        Client::new("alix", config).unwrap().with_legacy_contacts(contacts)
    }

    #[tokio::test]
    async fn test_unknown_promoted_to_allowed() {
        let network = MemoryNetwork::new();
        let conversation = network.find_or_create_dm("alix", "bo");
        let client = Client::new("alix", Config::default()).unwrap();

        let state = ensure_sendable(conversation.as_ref(), &client).await.unwrap();
        assert_eq!(state, ConsentState::Allowed);
        assert_eq!(conversation.consent_state().unwrap(), ConsentState::Allowed);
    }

    #[tokio::test]
    async fn test_allowed_is_idempotent() {
        let network = MemoryNetwork::new();
        let conversation = network.find_or_create_dm("alix", "bo");
        let contacts = Arc::new(RecordingContacts::default());
        let client = dual_stack_client(Arc::clone(&contacts));

        ensure_sendable(conversation.as_ref(), &client).await.unwrap();
        ensure_sendable(conversation.as_ref(), &client).await.unwrap();

        assert_eq!(conversation.consent_state().unwrap(), ConsentState::Allowed);
        assert_eq!(contacts.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_denied_is_not_changed() {
        let network = MemoryNetwork::new();
        let conversation = network.find_or_create_dm("alix", "bo");
        let client = Client::new("alix", Config::default()).unwrap();
        conversation.update_consent_state(ConsentState::Denied).unwrap();

        let state = ensure_sendable(conversation.as_ref(), &client).await.unwrap();
        assert_eq!(state, ConsentState::Denied);
        assert_eq!(conversation.consent_state().unwrap(), ConsentState::Denied);
    }

    #[tokio::test]
    async fn test_dual_stack_mirrors_explicit_changes() {
        let network = MemoryNetwork::new();
        let conversation = network.find_or_create_dm("alix", "bo");
        let contacts = Arc::new(RecordingContacts::default());
        let client = dual_stack_client(Arc::clone(&contacts));
        let id = hex::encode(conversation.id());

        update_consent_state(conversation.as_ref(), &client, ConsentState::Denied)
            .await
            .unwrap();
        update_consent_state(conversation.as_ref(), &client, ConsentState::Unknown)
            .await
            .unwrap();
        update_consent_state(conversation.as_ref(), &client, ConsentState::Allowed)
            .await
            .unwrap();

        assert_eq!(
            contacts.calls(),
            vec![
                ("deny".to_string(), vec![id.clone()]),
                ("allow".to_string(), vec![id]),
            ]
        );
        assert_eq!(conversation.consent_state().unwrap(), ConsentState::Allowed);
    }

    #[tokio::test]
    async fn test_legacy_failure_leaves_substrate_untouched() {
        let network = MemoryNetwork::new();
        let conversation = network.find_or_create_dm("alix", "bo");
        let contacts = Arc::new(RecordingContacts {
            fail: true,
            ..Default::default()
        });
        let client = dual_stack_client(contacts);

        assert!(ensure_sendable(conversation.as_ref(), &client).await.is_err());
        assert_eq!(conversation.consent_state().unwrap(), ConsentState::Unknown);
    }

    #[tokio::test]
    async fn test_single_stack_never_touches_legacy() {
        let network = MemoryNetwork::new();
        let conversation = network.find_or_create_dm("alix", "bo");
        let contacts = Arc::new(RecordingContacts::default());
        let client = Client::new("alix", Config::default())
            .unwrap()
            .with_legacy_contacts(Arc::clone(&contacts) as Arc<dyn LegacyContacts>);

        update_consent_state(conversation.as_ref(), &client, ConsentState::Denied)
            .await
            .unwrap();
        assert!(contacts.calls().is_empty());
    }
}
