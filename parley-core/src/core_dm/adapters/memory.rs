//! In-memory substrate
//!
//! A [`MemoryNetwork`] hosts direct conversations between inbox ids without any
//! encryption or transport. Each participant gets its own [`MemoryConversation`]
//! view: published messages are shared, while consent and optimistic
//! (unpublished) messages are local to the viewer.
//!
//! Used by the test suite and the CLI demo. The `set_*`/`inject_*` hooks let
//! tests script substrate behavior (failures, slow registration, malformed
//! records).

use crate::core_dm::substrate::{
    ConsentState, Conversation, DeliveryStatus, ListMessagesOptions, Member, MessageCallback,
    RawMessage, SortDirection, Subscription, SubstrateError, SubstrateResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

/// Clock origin: 2023-11-14T22:13:20Z in nanoseconds
const CLOCK_ORIGIN_NS: i64 = 1_700_000_000_000_000_000;

/// Clock step per event, one millisecond
const CLOCK_STEP_NS: i64 = 1_000_000;

type SharedCallback = Arc<dyn Fn(RawMessage) + Send + Sync>;

/// Envelope format for messages pushed out of band
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PushEnvelope {
    id: Vec<u8>,
    sender_inbox_id: String,
    sent_at_ns: i64,
    content: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    raw: RawMessage,
    /// Local-only messages (unpublished or failed) are seen by their sender only
    visible_to: Option<String>,
}

struct Subscriber {
    id: u64,
    callback: SharedCallback,
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    fail_sends: bool,
    fail_stream: bool,
    finish_on_register: bool,
    retain_ended_callbacks: bool,
    registration_delay: Option<Duration>,
}

#[derive(Default)]
struct ConversationState {
    messages: Vec<StoredMessage>,
    consent: HashMap<String, ConsentState>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    last_query: Option<ListMessagesOptions>,
    behavior: Behavior,
    sync_calls: usize,
}

struct SharedConversation {
    id: Vec<u8>,
    created_at_ns: i64,
    creator_inbox_id: String,
    members: Vec<String>,
    clock: Arc<AtomicI64>,
    end_calls: AtomicUsize,
    /// Held from storing a published record until every callback returned
    delivery: Mutex<()>,
    state: Mutex<ConversationState>,
}

impl SharedConversation {
    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(CLOCK_STEP_NS, Ordering::SeqCst) + CLOCK_STEP_NS
    }

    fn new_record(&self, sender: &str, sent_at_ns: i64, content: Vec<u8>, status: DeliveryStatus) -> RawMessage {
        RawMessage {
            id: Uuid::new_v4().as_bytes().to_vec(),
            conversation_id: self.id.clone(),
            sender_inbox_id: sender.to_string(),
            sent_at_ns,
            content,
            delivery_status: status,
        }
    }

    /// Store a published record and push it to every subscriber
    fn publish(&self, raw: RawMessage) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        self.deliver(raw);
    }

    /// Stamp a new record from `sender` and publish it
    ///
    /// Stamping happens under the delivery lock so send times, history order
    /// and push order agree.
    fn publish_new(&self, sender: &str, content: Vec<u8>) -> RawMessage {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let raw = self.new_record(sender, self.tick(), content, DeliveryStatus::Published);
        self.deliver(raw.clone());
        raw
    }

    fn deliver(&self, raw: RawMessage) {
        let callbacks: Vec<SharedCallback> = {
            let mut state = self.lock();
            state.messages.push(StoredMessage {
                raw: raw.clone(),
                visible_to: None,
            });
            state.subscribers.iter().map(|s| Arc::clone(&s.callback)).collect()
        };

        trace!(subscribers = callbacks.len(), "Delivering message");
        for callback in callbacks {
            callback(raw.clone());
        }
    }
}

/// A network of in-memory direct conversations
#[derive(Clone)]
pub struct MemoryNetwork {
    conversations: Arc<Mutex<HashMap<Vec<u8>, Arc<SharedConversation>>>>,
    clock: Arc<AtomicI64>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(AtomicI64::new(CLOCK_ORIGIN_NS)),
        }
    }

    /// The direct conversation between `me` and `peer`, as seen by `me`
    ///
    /// The first caller becomes the creator. Both participants resolve to the
    /// same conversation id regardless of who asks first.
    pub fn find_or_create_dm(&self, me: &str, peer: &str) -> Arc<MemoryConversation> {
        let id = dm_id(me, peer);
        let shared = {
            let mut conversations = self
                .conversations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let shared = conversations.entry(id.clone()).or_insert_with(|| {
                let created_at_ns = self.clock.fetch_add(CLOCK_STEP_NS, Ordering::SeqCst) + CLOCK_STEP_NS;
                debug!(conversation = %hex::encode(&id), creator = me, "Created memory dm");

                Arc::new(SharedConversation {
                    id: id.clone(),
                    created_at_ns,
                    creator_inbox_id: me.to_string(),
                    members: if me == peer {
                        vec![me.to_string()]
                    } else {
                        vec![me.to_string(), peer.to_string()]
                    },
                    clock: Arc::clone(&self.clock),
                    end_calls: AtomicUsize::new(0),
                    delivery: Mutex::new(()),
                    state: Mutex::new(ConversationState::default()),
                })
            });
            Arc::clone(shared)
        };

        Arc::new(MemoryConversation {
            shared,
            viewer: me.to_string(),
        })
    }

    /// Build the out-of-band envelope a push notification would carry
    pub fn push_envelope(&self, sender: &str, content: &[u8]) -> SubstrateResult<Vec<u8>> {
        let envelope = PushEnvelope {
            id: Uuid::new_v4().as_bytes().to_vec(),
            sender_inbox_id: sender.to_string(),
            sent_at_ns: self.clock.fetch_add(CLOCK_STEP_NS, Ordering::SeqCst) + CLOCK_STEP_NS,
            content: content.to_vec(),
        };
        bincode::serialize(&envelope).map_err(|e| SubstrateError::Transport(e.to_string()))
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn dm_id(a: &str, b: &str) -> Vec<u8> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = blake3::Hasher::new();
    hasher.update(first.as_bytes());
    hasher.update(&[0]);
    hasher.update(second.as_bytes());
    hasher.finalize().as_bytes().to_vec()
}

/// One participant's view of an in-memory conversation
pub struct MemoryConversation {
    shared: Arc<SharedConversation>,
    viewer: String,
}

impl MemoryConversation {
    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    /// The most recent options passed to `find_messages`
    pub fn last_query(&self) -> Option<ListMessagesOptions> {
        self.shared.lock().last_query.clone()
    }

    /// Append a published record with arbitrary content bytes
    pub fn inject_raw(&self, sender: &str, content: Vec<u8>) -> RawMessage {
        self.shared.publish_new(sender, content)
    }

    /// Like [`inject_raw`](Self::inject_raw) with an explicit send time
    pub fn inject_raw_at(&self, sender: &str, sent_at_ns: i64, content: Vec<u8>) -> RawMessage {
        let raw = self
            .shared
            .new_record(sender, sent_at_ns, content, DeliveryStatus::Published);
        self.shared.publish(raw.clone());
        raw
    }

    /// Make `send` and `publish_messages` fail with a transport error
    pub fn set_send_failure(&self, fail: bool) {
        self.shared.lock().behavior.fail_sends = fail;
    }

    /// Make stream registration fail with a transport error
    pub fn set_stream_failure(&self, fail: bool) {
        self.shared.lock().behavior.fail_stream = fail;
    }

    /// Delay stream registration
    pub fn set_registration_delay(&self, delay: Option<Duration>) {
        self.shared.lock().behavior.registration_delay = delay;
    }

    /// Make stream registration drop the callback and hand back a
    /// subscription that is already closed
    pub fn set_stream_finished_on_register(&self, finished: bool) {
        self.shared.lock().behavior.finish_on_register = finished;
    }

    /// Keep invoking callbacks of subscriptions that were ended
    pub fn set_retain_ended_callbacks(&self, retain: bool) {
        self.shared.lock().behavior.retain_ended_callbacks = retain;
    }

    /// Stop delivering to every subscriber, dropping their callbacks
    ///
    /// Models the substrate closing its push streams on its own.
    pub fn finish_streams(&self) {
        let finished = std::mem::take(&mut self.shared.lock().subscribers);
        debug!(subscribers = finished.len(), "Finishing memory streams");
        drop(finished);
    }

    /// Number of `Subscription::end` calls on this conversation
    pub fn subscription_end_calls(&self) -> usize {
        self.shared.end_calls.load(Ordering::SeqCst)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.shared.lock().subscribers.len()
    }

    pub fn sync_calls(&self) -> usize {
        self.shared.lock().sync_calls
    }

    fn store_local(&self, content: Vec<u8>, status: DeliveryStatus) -> RawMessage {
        let raw = self
            .shared
            .new_record(&self.viewer, self.shared.tick(), content, status);
        self.shared.lock().messages.push(StoredMessage {
            raw: raw.clone(),
            visible_to: Some(self.viewer.clone()),
        });
        raw
    }
}

#[async_trait]
impl Conversation for MemoryConversation {
    fn id(&self) -> Vec<u8> {
        self.shared.id.clone()
    }

    fn created_at_ns(&self) -> i64 {
        self.shared.created_at_ns
    }

    fn creator_inbox_id(&self) -> SubstrateResult<String> {
        Ok(self.shared.creator_inbox_id.clone())
    }

    fn added_by_inbox_id(&self) -> SubstrateResult<String> {
        Ok(self.shared.creator_inbox_id.clone())
    }

    async fn list_members(&self) -> SubstrateResult<Vec<Member>> {
        let state = self.shared.lock();
        Ok(self
            .shared
            .members
            .iter()
            .map(|inbox_id| Member {
                inbox_id: inbox_id.clone(),
                account_addresses: Vec::new(),
                consent_state: state
                    .consent
                    .get(inbox_id)
                    .copied()
                    .unwrap_or(ConsentState::Unknown),
            })
            .collect())
    }

    async fn sync(&self) -> SubstrateResult<()> {
        self.shared.lock().sync_calls += 1;
        Ok(())
    }

    fn consent_state(&self) -> SubstrateResult<ConsentState> {
        Ok(self
            .shared
            .lock()
            .consent
            .get(&self.viewer)
            .copied()
            .unwrap_or(ConsentState::Unknown))
    }

    fn update_consent_state(&self, state: ConsentState) -> SubstrateResult<()> {
        self.shared.lock().consent.insert(self.viewer.clone(), state);
        Ok(())
    }

    async fn send(&self, content: Vec<u8>) -> SubstrateResult<Vec<u8>> {
        if self.shared.lock().behavior.fail_sends {
            let failed = self.store_local(content, DeliveryStatus::Failed);
            return Err(SubstrateError::Transport(format!(
                "send of {} failed",
                hex::encode(&failed.id)
            )));
        }

        Ok(self.shared.publish_new(&self.viewer, content).id)
    }

    fn send_optimistic(&self, content: Vec<u8>) -> SubstrateResult<Vec<u8>> {
        Ok(self.store_local(content, DeliveryStatus::Unpublished).id)
    }

    async fn publish_messages(&self) -> SubstrateResult<()> {
        let pending: Vec<RawMessage> = {
            let mut state = self.shared.lock();
            if state.behavior.fail_sends {
                return Err(SubstrateError::Transport("publish failed".to_string()));
            }

            let mut pending = Vec::new();
            state.messages.retain(|stored| {
                let mine = stored.visible_to.as_deref() == Some(self.viewer.as_str());
                if mine && stored.raw.delivery_status == DeliveryStatus::Unpublished {
                    pending.push(stored.raw.clone());
                    false
                } else {
                    true
                }
            });
            pending
        };

        debug!(count = pending.len(), "Publishing queued messages");
        for mut raw in pending {
            raw.delivery_status = DeliveryStatus::Published;
            self.shared.publish(raw);
        }
        Ok(())
    }

    fn find_messages(&self, options: ListMessagesOptions) -> SubstrateResult<Vec<RawMessage>> {
        let mut state = self.shared.lock();
        state.last_query = Some(options.clone());

        let mut messages: Vec<RawMessage> = state
            .messages
            .iter()
            .filter(|stored| match &stored.visible_to {
                Some(owner) => owner == &self.viewer,
                None => true,
            })
            .map(|stored| &stored.raw)
            .filter(|raw| options.sent_after_ns.map_or(true, |after| raw.sent_at_ns >= after))
            .filter(|raw| options.sent_before_ns.map_or(true, |before| raw.sent_at_ns < before))
            .filter(|raw| {
                options
                    .delivery_status
                    .map_or(true, |status| raw.delivery_status == status)
            })
            .cloned()
            .collect();

        messages.sort_by_key(|raw| raw.sent_at_ns);
        if options.direction == Some(SortDirection::Descending) {
            messages.reverse();
        }
        if let Some(limit) = options.limit {
            messages.truncate(usize::try_from(limit).unwrap_or(0));
        }

        Ok(messages)
    }

    async fn stream(&self, callback: MessageCallback) -> SubstrateResult<Box<dyn Subscription>> {
        let behavior = self.shared.lock().behavior.clone();
        if let Some(delay) = behavior.registration_delay {
            tokio::time::sleep(delay).await;
        }
        if behavior.fail_stream {
            return Err(SubstrateError::Transport("stream registration refused".to_string()));
        }
        if behavior.finish_on_register {
            drop(callback);
            debug!(viewer = %self.viewer, "Stream finished at registration");
            return Ok(Box::new(MemorySubscription {
                shared: Arc::clone(&self.shared),
                id: u64::MAX,
                closed: AtomicBool::new(true),
            }));
        }

        let id = {
            let mut state = self.shared.lock();
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            state.subscribers.push(Subscriber {
                id,
                callback: Arc::from(callback),
            });
            id
        };

        debug!(viewer = %self.viewer, subscriber = id, "Registered stream callback");
        Ok(Box::new(MemorySubscription {
            shared: Arc::clone(&self.shared),
            id,
            closed: AtomicBool::new(false),
        }))
    }

    async fn process_streamed_message(&self, envelope: &[u8]) -> SubstrateResult<RawMessage> {
        let envelope: PushEnvelope = bincode::deserialize(envelope)
            .map_err(|e| SubstrateError::Transport(format!("malformed envelope: {}", e)))?;

        let existing = self
            .shared
            .lock()
            .messages
            .iter()
            .find(|stored| stored.raw.id == envelope.id)
            .map(|stored| stored.raw.clone());
        if let Some(raw) = existing {
            return Ok(raw);
        }

        let raw = RawMessage {
            id: envelope.id,
            conversation_id: self.shared.id.clone(),
            sender_inbox_id: envelope.sender_inbox_id,
            sent_at_ns: envelope.sent_at_ns,
            content: envelope.content,
            delivery_status: DeliveryStatus::Published,
        };
        self.shared.publish(raw.clone());
        Ok(raw)
    }
}

/// Push subscription on a [`MemoryConversation`]
pub struct MemorySubscription {
    shared: Arc<SharedConversation>,
    id: u64,
    closed: AtomicBool,
}

impl Subscription for MemorySubscription {
    fn end(&self) {
        self.shared.end_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let removed: Vec<Subscriber> = {
            let mut state = self.shared.lock();
            if state.behavior.retain_ended_callbacks {
                Vec::new()
            } else {
                let (removed, kept) = std::mem::take(&mut state.subscribers)
                    .into_iter()
                    .partition(|s| s.id == self.id);
                state.subscribers = kept;
                removed
            }
        };
        debug!(subscriber = self.id, removed = removed.len(), "Ended stream subscription");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
            || !self.shared.lock().subscribers.iter().any(|s| s.id == self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_dm_id_is_symmetric() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        let bo = network.find_or_create_dm("bo", "alix");

        assert_eq!(alix.id(), bo.id());
        assert_eq!(alix.created_at_ns(), bo.created_at_ns());
        assert_eq!(bo.creator_inbox_id().unwrap(), "alix");
        assert_eq!(bo.added_by_inbox_id().unwrap(), "alix");
    }

    #[tokio::test]
    async fn test_consent_is_per_viewer() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        let bo = network.find_or_create_dm("bo", "alix");

        alix.update_consent_state(ConsentState::Allowed).unwrap();
        assert_eq!(alix.consent_state().unwrap(), ConsentState::Allowed);
        assert_eq!(bo.consent_state().unwrap(), ConsentState::Unknown);

        let members = bo.list_members().await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].consent_state, ConsentState::Allowed);
    }

    #[tokio::test]
    async fn test_optimistic_messages_are_local_until_published() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        let bo = network.find_or_create_dm("bo", "alix");

        alix.send_optimistic(b"queued".to_vec()).unwrap();
        let mine = alix.find_messages(ListMessagesOptions::default()).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].delivery_status, DeliveryStatus::Unpublished);
        assert!(bo.find_messages(ListMessagesOptions::default()).unwrap().is_empty());

        alix.publish_messages().await.unwrap();
        let theirs = bo.find_messages(ListMessagesOptions::default()).unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].delivery_status, DeliveryStatus::Published);
    }

    #[test]
    fn test_find_messages_window_is_half_open() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        for ns in [10, 20, 30] {
            alix.inject_raw_at("bo", ns, vec![ns as u8]);
        }

        let found = alix
            .find_messages(ListMessagesOptions {
                sent_after_ns: Some(20),
                sent_before_ns: Some(30),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sent_at_ns, 20);

        let newest = alix
            .find_messages(ListMessagesOptions {
                direction: Some(SortDirection::Descending),
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        let times: Vec<i64> = newest.iter().map(|m| m.sent_at_ns).collect();
        assert_eq!(times, vec![30, 20]);
    }

    #[tokio::test]
    async fn test_failed_send_is_recorded_locally() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        alix.set_send_failure(true);

        assert!(matches!(
            alix.send(b"x".to_vec()).await,
            Err(SubstrateError::Transport(_))
        ));
        let found = alix
            .find_messages(ListMessagesOptions {
                delivery_status: Some(DeliveryStatus::Failed),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_delivery_and_end() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        let bo = network.find_or_create_dm("bo", "alix");

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = bo
            .stream(Box::new(move |raw: RawMessage| sink.lock().unwrap().push(raw.content)))
            .await
            .unwrap();

        alix.send(b"one".to_vec()).await.unwrap();
        subscription.end();
        subscription.end();
        alix.send(b"two".to_vec()).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![b"one".to_vec()]);
        assert!(subscription.is_closed());
        assert_eq!(bo.active_subscriptions(), 0);
        assert_eq!(bo.subscription_end_calls(), 2);
    }

    #[tokio::test]
    async fn test_finish_streams_drops_callbacks() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        let bo = network.find_or_create_dm("bo", "alix");

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = bo
            .stream(Box::new(move |raw: RawMessage| sink.lock().unwrap().push(raw.content)))
            .await
            .unwrap();

        bo.finish_streams();
        assert!(subscription.is_closed());
        assert_eq!(Arc::strong_count(&seen), 1);

        alix.send(b"unheard".to_vec()).await.unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(bo.subscription_end_calls(), 0);
    }

    #[tokio::test]
    async fn test_retained_callbacks_outlive_end() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        let bo = network.find_or_create_dm("bo", "alix");
        bo.set_retain_ended_callbacks(true);

        let seen = Arc::new(StdMutex::new(0usize));
        let sink = Arc::clone(&seen);
        let subscription = bo
            .stream(Box::new(move |_: RawMessage| *sink.lock().unwrap() += 1))
            .await
            .unwrap();

        subscription.end();
        alix.send(b"late".to_vec()).await.unwrap();

        assert!(subscription.is_closed());
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(bo.active_subscriptions(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_push_in_history_order() {
        let network = MemoryNetwork::new();
        let alix = network.find_or_create_dm("alix", "bo");
        let bo = network.find_or_create_dm("bo", "alix");

        let pushed = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&pushed);
        let _subscription = bo
            .stream(Box::new(move |raw: RawMessage| sink.lock().unwrap().push(raw.id)))
            .await
            .unwrap();

        let senders: Vec<_> = [alix, Arc::clone(&bo)]
            .into_iter()
            .map(|side| {
                tokio::spawn(async move {
                    for i in 0..50u8 {
                        side.send(vec![i]).await.unwrap();
                    }
                })
            })
            .collect();
        for sender in senders {
            sender.await.unwrap();
        }

        let history: Vec<Vec<u8>> = bo
            .find_messages(ListMessagesOptions {
                direction: Some(SortDirection::Ascending),
                ..Default::default()
            })
            .unwrap()
            .into_iter()
            .map(|raw| raw.id)
            .collect();
        assert_eq!(history.len(), 100);
        assert_eq!(*pushed.lock().unwrap(), history);
    }

    #[tokio::test]
    async fn test_push_envelope_processing_is_idempotent() {
        let network = MemoryNetwork::new();
        let bo = network.find_or_create_dm("bo", "alix");

        let envelope = network.push_envelope("alix", b"pushed").unwrap();
        let first = bo.process_streamed_message(&envelope).await.unwrap();
        let second = bo.process_streamed_message(&envelope).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.conversation_id, bo.id());
        assert_eq!(bo.find_messages(ListMessagesOptions::default()).unwrap().len(), 1);

        assert!(bo.process_streamed_message(b"garbage").await.is_err());
    }
}
