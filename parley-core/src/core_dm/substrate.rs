//! Conversation trait - the seam to the secure messaging substrate
//!
//! The substrate owns encryption, key rotation, storage and network sync. The
//! channel layer only ever talks to one already-synced conversation through
//! [`Conversation`], which keeps it independent of the engine behind it:
//!
//! ```text
//! Dm
//!  |
//!  v
//! Conversation (trait)
//!  |
//!  +---> engine bindings (production)
//!  |
//!  +---> MemoryConversation (tests, demo)
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for substrate calls
pub type SubstrateResult<T> = Result<T, SubstrateError>;

/// Errors surfaced by the substrate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubstrateError {
    /// Network delivery or sync failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Conversation or message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The conversation or subscription has been closed
    #[error("Closed: {0}")]
    Closed(String),
}

/// Trust state of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    Allowed,
    Denied,
    Unknown,
}

/// Delivery state of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Stored locally, not yet on the network
    Unpublished,
    Published,
    Failed,
}

/// Sort order for message queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A conversation participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub inbox_id: String,
    pub account_addresses: Vec<String>,
    pub consent_state: ConsentState,
}

impl Member {
    pub fn new(inbox_id: impl Into<String>) -> Self {
        Self {
            inbox_id: inbox_id.into(),
            account_addresses: Vec::new(),
            consent_state: ConsentState::Unknown,
        }
    }
}

/// A decrypted message record as stored by the substrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: Vec<u8>,
    pub conversation_id: Vec<u8>,
    pub sender_inbox_id: String,
    pub sent_at_ns: i64,
    /// Serialized [`EncodedContent`](crate::core_codec::EncodedContent)
    pub content: Vec<u8>,
    pub delivery_status: DeliveryStatus,
}

/// Native query options for [`Conversation::find_messages`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMessagesOptions {
    /// Only messages sent strictly before this time (ns)
    pub sent_before_ns: Option<i64>,
    /// Only messages sent at or after this time (ns)
    pub sent_after_ns: Option<i64>,
    pub limit: Option<i64>,
    /// `None` means no status predicate at all
    pub delivery_status: Option<DeliveryStatus>,
    pub direction: Option<SortDirection>,
}

/// Push callback invoked once per inbound message, in emission order
pub type MessageCallback = Box<dyn Fn(RawMessage) + Send + Sync>;

/// A registered push subscription
pub trait Subscription: Send + Sync {
    /// Stop delivery and release the callback
    fn end(&self);

    fn is_closed(&self) -> bool;
}

/// One conversation in the substrate
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Opaque conversation identifier
    fn id(&self) -> Vec<u8>;

    /// Substrate-assigned creation time (ns)
    fn created_at_ns(&self) -> i64;

    fn creator_inbox_id(&self) -> SubstrateResult<String>;

    /// Inbox that added this client to the conversation
    fn added_by_inbox_id(&self) -> SubstrateResult<String>;

    async fn list_members(&self) -> SubstrateResult<Vec<Member>>;

    /// Pull remote state forward; safe to call redundantly
    async fn sync(&self) -> SubstrateResult<()>;

    fn consent_state(&self) -> SubstrateResult<ConsentState>;

    fn update_consent_state(&self, state: ConsentState) -> SubstrateResult<()>;

    /// Encrypt and publish; returns the message id
    async fn send(&self, content: Vec<u8>) -> SubstrateResult<Vec<u8>>;

    /// Store locally as unpublished; returns the message id
    fn send_optimistic(&self, content: Vec<u8>) -> SubstrateResult<Vec<u8>>;

    /// Publish everything queued by [`send_optimistic`](Self::send_optimistic)
    async fn publish_messages(&self) -> SubstrateResult<()>;

    fn find_messages(&self, options: ListMessagesOptions) -> SubstrateResult<Vec<RawMessage>>;

    /// Register a push callback for new messages
    async fn stream(&self, callback: MessageCallback) -> SubstrateResult<Box<dyn Subscription>>;

    /// Decrypt and store an envelope received out of band
    async fn process_streamed_message(&self, envelope: &[u8]) -> SubstrateResult<RawMessage>;
}
