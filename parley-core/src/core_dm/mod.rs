//! Direct message channels
//!
//! The channel layer sits on top of an opaque secure-messaging substrate that
//! handles encryption, key rotation and network sync. It adds:
//!
//! - consent-gated sending ([`consent`])
//! - typed content through the client's codec registry ([`message`])
//! - history queries in caller time units ([`history`])
//! - live message streams ([`stream`])
//!
//! ```text
//! Dm::send ──► consent gate ──► encode pipeline ──► Conversation::send
//!
//! Dm::stream_messages ──► Conversation::stream(callback)
//!                                     │
//!                                     ▼
//!                   MessageProjection::decode ──► MessageStream
//! ```

pub mod adapters;
pub mod client;
pub mod consent;
pub mod dm;
pub mod errors;
pub mod history;
pub mod message;
pub mod stream;
pub mod substrate;
pub mod types;

pub use client::{Client, LegacyContacts};
pub use dm::Dm;
pub use errors::{DmError, DmResult};
pub use history::{DeliveryStatusFilter, MessageQuery};
pub use message::{DecodedMessage, DecryptedMessage, MessageProjection};
pub use stream::{MessageStream, StreamState};
pub use substrate::{
    ConsentState, Conversation, DeliveryStatus, ListMessagesOptions, Member, MessageCallback,
    RawMessage, SortDirection, Subscription, SubstrateError, SubstrateResult,
};
pub use types::{group_message_topic, Timestamp};
