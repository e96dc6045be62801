//! Direct message channel
//!
//! [`Dm`] wraps one substrate conversation with exactly two members and the
//! [`Client`] that owns it. Sending goes through the consent gate and the
//! encoding pipeline; reads project substrate records through the client's
//! codec registry.

use crate::core_codec::{encode_content, Content, EncodedContent, SendOptions};
use crate::core_dm::client::Client;
use crate::core_dm::consent;
use crate::core_dm::errors::{DmError, DmResult};
use crate::core_dm::history::MessageQuery;
use crate::core_dm::message::{DecodedMessage, DecryptedMessage, MessageProjection};
use crate::core_dm::stream::{start_stream, MessageStream, StreamHolder, StreamState};
use crate::core_dm::substrate::{ConsentState, Conversation, Member};
use crate::core_dm::types::{group_message_topic, Timestamp};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info};

/// A direct message channel
///
/// Cheap to clone; clones share the active stream.
#[derive(Clone)]
pub struct Dm {
    conversation: Arc<dyn Conversation>,
    client: Arc<Client>,
    streams: Arc<StreamHolder>,
    id: String,
}

impl Dm {
    pub fn new(conversation: Arc<dyn Conversation>, client: Arc<Client>) -> Self {
        let id = hex::encode(conversation.id());
        Self {
            conversation,
            client,
            streams: Arc::new(StreamHolder::default()),
            id,
        }
    }

    /// Hex encoding of the conversation id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pub/sub topic carrying this channel's messages
    pub fn topic(&self) -> String {
        group_message_topic(&self.id)
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn created_at_ns(&self) -> i64 {
        self.conversation.created_at_ns()
    }

    pub fn created_at(&self) -> Timestamp {
        Timestamp::from_nanos(self.created_at_ns())
    }

    pub fn creator_inbox_id(&self) -> DmResult<String> {
        Ok(self.conversation.creator_inbox_id()?)
    }

    pub fn added_by_inbox_id(&self) -> DmResult<String> {
        Ok(self.conversation.added_by_inbox_id()?)
    }

    /// Whether the local client created this channel
    pub fn is_creator(&self) -> DmResult<bool> {
        Ok(self.creator_inbox_id()? == self.client.inbox_id())
    }

    pub async fn members(&self) -> DmResult<Vec<Member>> {
        Ok(self.conversation.list_members().await?)
    }

    /// Inbox id of the other participant
    pub async fn peer_inbox_id(&self) -> DmResult<String> {
        let mut inbox_ids: Vec<String> = self
            .members()
            .await?
            .into_iter()
            .map(|member| member.inbox_id)
            .collect();

        if let Some(own) = inbox_ids.iter().position(|id| id == self.client.inbox_id()) {
            inbox_ids.remove(own);
        }

        inbox_ids
            .into_iter()
            .next()
            .ok_or_else(|| DmError::MissingPeer(self.id.clone()))
    }

    pub fn consent_state(&self) -> DmResult<ConsentState> {
        Ok(self.conversation.consent_state()?)
    }

    /// Set consent explicitly, mirroring into the legacy lists when dual-stack
    pub async fn update_consent_state(&self, state: ConsentState) -> DmResult<()> {
        consent::update_consent_state(self.conversation.as_ref(), &self.client, state).await
    }

    /// Pull the latest state from the network
    pub async fn sync(&self) -> DmResult<()> {
        debug!(channel = %self.id, "Syncing");
        Ok(self.conversation.sync().await?)
    }

    /// Encode `content` with this channel's codec registry
    pub fn encode_content(&self, content: &Content, options: Option<&SendOptions>) -> DmResult<EncodedContent> {
        Ok(encode_content(self.client.codec_registry(), content, options)?)
    }

    /// Send a message, returning its hex id
    ///
    /// Promotes `Unknown` consent to `Allowed` first. That promotion is kept
    /// even if encoding or sending fails.
    pub async fn send(&self, content: &Content, options: Option<&SendOptions>) -> DmResult<String> {
        consent::ensure_sendable(self.conversation.as_ref(), &self.client).await?;
        let encoded = self.encode_content(content, options)?;
        self.send_envelope(&encoded).await
    }

    /// Send an already encoded envelope
    pub async fn send_encoded(&self, encoded: &EncodedContent) -> DmResult<String> {
        consent::ensure_sendable(self.conversation.as_ref(), &self.client).await?;
        self.send_envelope(encoded).await
    }

    async fn send_envelope(&self, encoded: &EncodedContent) -> DmResult<String> {
        let id = self.conversation.send(encoded.to_bytes()?).await?;
        let id = hex::encode(id);

        info!(
            channel = %self.id,
            message = %id,
            content_type = %encoded.content_type,
            "Message sent"
        );
        Ok(id)
    }

    /// Store a message locally for a later [`publish_messages`](Self::publish_messages)
    pub async fn prepare_message(&self, content: &Content, options: Option<&SendOptions>) -> DmResult<String> {
        consent::ensure_sendable(self.conversation.as_ref(), &self.client).await?;
        let encoded = self.encode_content(content, options)?;

        let id = hex::encode(self.conversation.send_optimistic(encoded.to_bytes()?)?);
        debug!(channel = %self.id, message = %id, "Message prepared");
        Ok(id)
    }

    /// Publish every prepared message
    pub async fn publish_messages(&self) -> DmResult<()> {
        self.conversation.publish_messages().await?;
        info!(channel = %self.id, "Prepared messages published");
        Ok(())
    }

    /// Process an envelope received out of band, e.g. from a push notification
    pub async fn process_message(&self, envelope: &[u8]) -> DmResult<DecodedMessage> {
        let raw = self.conversation.process_streamed_message(envelope).await?;
        MessageProjection::new(&self.client, raw).decode()
    }

    /// Decoded history; records that fail to decode are skipped
    pub fn messages(&self, query: &MessageQuery) -> DmResult<Vec<DecodedMessage>> {
        let raws = self.conversation.find_messages(query.to_list_options()?)?;
        let total = raws.len();

        let messages: Vec<DecodedMessage> = raws
            .into_iter()
            .filter_map(|raw| MessageProjection::new(&self.client, raw).decode_or_none())
            .collect();

        debug!(channel = %self.id, total, decoded = messages.len(), "Listed messages");
        Ok(messages)
    }

    /// History with envelopes parsed but not decoded
    pub fn decrypted_messages(&self, query: &MessageQuery) -> DmResult<Vec<DecryptedMessage>> {
        let raws = self.conversation.find_messages(query.to_list_options()?)?;

        Ok(raws
            .into_iter()
            .filter_map(|raw| MessageProjection::new(&self.client, raw).decrypt_or_none())
            .collect())
    }

    /// Stream new messages, closing any stream this channel already has
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream_messages(&self) -> MessageStream<DecodedMessage> {
        info!(channel = %self.id, "Starting message stream");
        start_stream(
            Arc::clone(&self.conversation),
            Arc::clone(&self.client),
            &self.streams,
            |projection| projection.decode(),
        )
    }

    /// Like [`stream_messages`](Self::stream_messages) without codec decoding
    pub fn stream_decrypted_messages(&self) -> MessageStream<DecryptedMessage> {
        info!(channel = %self.id, "Starting decrypted message stream");
        start_stream(
            Arc::clone(&self.conversation),
            Arc::clone(&self.client),
            &self.streams,
            |projection| projection.decrypt(),
        )
    }

    /// Close the current stream, if any
    pub fn end_stream(&self) {
        self.streams.end();
    }

    pub fn stream_state(&self) -> StreamState {
        self.streams.state()
    }
}

impl PartialEq for Dm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Dm {}

impl Hash for Dm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Dm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dm")
            .field("id", &self.id)
            .field("inbox_id", &self.client.inbox_id())
            .field("stream", &self.streams)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core_codec::{CodecError, Compression, ReactionCodec};
    use crate::core_dm::adapters::memory::MemoryNetwork;
    use crate::core_dm::substrate::DeliveryStatus;
    use std::collections::HashSet;

    fn dm(network: &MemoryNetwork, me: &str, peer: &str) -> Dm {
        let client = Arc::new(Client::new(me, Config::default()).unwrap());
        Dm::new(network.find_or_create_dm(me, peer), client)
    }

    #[tokio::test]
    async fn test_metadata() {
        let network = MemoryNetwork::new();
        let alix = dm(&network, "alix", "bo");
        let bo = dm(&network, "bo", "alix");

        assert_eq!(alix.id(), bo.id());
        assert_eq!(alix.id().len(), 64);
        assert_eq!(alix.topic(), format!("/parley/mls/1/g-{}/proto", alix.id()));
        assert!(alix.is_creator().unwrap());
        assert!(!bo.is_creator().unwrap());
        assert_eq!(bo.added_by_inbox_id().unwrap(), "alix");
        assert_eq!(alix.created_at(), Timestamp::from_nanos(alix.created_at_ns()));

        assert_eq!(alix.peer_inbox_id().await.unwrap(), "bo");
        assert_eq!(bo.peer_inbox_id().await.unwrap(), "alix");
        assert_eq!(alix.members().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_peer() {
        let network = MemoryNetwork::new();
        let solo = dm(&network, "alix", "alix");

        assert!(matches!(solo.peer_inbox_id().await, Err(DmError::MissingPeer(_))));
    }

    #[test]
    fn test_equality_by_id() {
        let network = MemoryNetwork::new();
        let first = dm(&network, "alix", "bo");
        let again = dm(&network, "alix", "bo");
        let other = dm(&network, "alix", "caro");

        assert_eq!(first, again);
        assert_ne!(first, other);

        let set: HashSet<Dm> = [first, again, other].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn test_send_promotes_consent_and_returns_id() {
        let network = MemoryNetwork::new();
        let alix = dm(&network, "alix", "bo");
        assert_eq!(alix.consent_state().unwrap(), ConsentState::Unknown);

        let id = alix.send(&Content::from("hi"), None).await.unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(alix.consent_state().unwrap(), ConsentState::Allowed);

        let bo = dm(&network, "bo", "alix");
        let history = bo.messages(&MessageQuery::new()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].content, Content::from("hi"));
        assert_eq!(history[0].sender_inbox_id, "alix");
    }

    #[tokio::test]
    async fn test_denied_channel_still_sends() {
        let network = MemoryNetwork::new();
        let alix = dm(&network, "alix", "bo");
        alix.update_consent_state(ConsentState::Denied).await.unwrap();

        alix.send(&Content::from("still here"), None).await.unwrap();
        assert_eq!(alix.consent_state().unwrap(), ConsentState::Denied);
    }

    #[tokio::test]
    async fn test_failed_encode_keeps_promoted_consent() {
        let network = MemoryNetwork::new();
        let alix = dm(&network, "alix", "bo");
        let options = SendOptions::new().content_type(ReactionCodec::content_type_id());

        let err = alix.send(&Content::from("hi"), Some(&options)).await.unwrap_err();
        assert!(matches!(err, DmError::Codec(CodecError::UnsupportedContentType(_))));
        assert_eq!(alix.consent_state().unwrap(), ConsentState::Allowed);
    }

    #[tokio::test]
    async fn test_prepare_then_publish() {
        let network = MemoryNetwork::new();
        let alix = dm(&network, "alix", "bo");
        let bo = dm(&network, "bo", "alix");

        let id = alix.prepare_message(&Content::from("later"), None).await.unwrap();
        let local = alix.messages(&MessageQuery::new()).unwrap();
        assert_eq!(local[0].id, id);
        assert_eq!(local[0].delivery_status, DeliveryStatus::Unpublished);
        assert!(bo.messages(&MessageQuery::new()).unwrap().is_empty());

        alix.publish_messages().await.unwrap();
        let delivered = bo.messages(&MessageQuery::new()).unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].delivery_status, DeliveryStatus::Published);
    }

    #[tokio::test]
    async fn test_send_compressed() {
        let network = MemoryNetwork::new();
        let alix = dm(&network, "alix", "bo");
        let options = SendOptions::new().compression(Compression::Deflate);

        alix.send(&Content::from("squeeze me ".repeat(20)), Some(&options))
            .await
            .unwrap();

        let history = alix.messages(&MessageQuery::new()).unwrap();
        assert_eq!(history[0].content, Content::from("squeeze me ".repeat(20)));
        assert_eq!(history[0].encoded.compression, Some(Compression::Deflate));
    }

    #[tokio::test]
    async fn test_process_pushed_envelope() {
        let network = MemoryNetwork::new();
        let bo = dm(&network, "bo", "alix");

        let encoded = bo.encode_content(&Content::from("via push"), None).unwrap();
        let envelope = network
            .push_envelope("alix", &encoded.to_bytes().unwrap())
            .unwrap();

        let message = bo.process_message(&envelope).await.unwrap();
        assert_eq!(message.content, Content::from("via push"));
        assert_eq!(message.sender_inbox_id, "alix");
        assert_eq!(message.conversation_id, bo.id());
    }

    #[tokio::test]
    async fn test_sync_reaches_substrate() {
        let network = MemoryNetwork::new();
        let conversation = network.find_or_create_dm("alix", "bo");
        let client = Arc::new(Client::new("alix", Config::default()).unwrap());
        let alix = Dm::new(conversation.clone(), client);

        alix.sync().await.unwrap();
        alix.sync().await.unwrap();
        assert_eq!(conversation.sync_calls(), 2);
    }
}
