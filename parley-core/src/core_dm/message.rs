//! Message projection
//!
//! Substrate records carry an opaque serialized envelope. A
//! [`MessageProjection`] pairs one record with the client whose codec registry
//! interprets it, and yields either a fully decoded [`DecodedMessage`] or a
//! [`DecryptedMessage`] whose envelope is parsed but not run through a codec.

use crate::core_codec::{decode_content, Content, EncodedContent};
use crate::core_dm::client::Client;
use crate::core_dm::errors::DmResult;
use crate::core_dm::substrate::{DeliveryStatus, RawMessage};
use crate::core_dm::types::Timestamp;
use tracing::debug;

/// A message with typed content
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Hex message id
    pub id: String,
    /// Hex id of the channel the message belongs to
    pub conversation_id: String,
    pub sender_inbox_id: String,
    pub sent_at_ns: i64,
    pub delivery_status: DeliveryStatus,
    /// The envelope as received, before decompression
    pub encoded: EncodedContent,
    pub content: Content,
}

impl DecodedMessage {
    pub fn sent_at(&self) -> Timestamp {
        Timestamp::from_nanos(self.sent_at_ns)
    }

    /// Fallback text attached by the sender's codec
    pub fn fallback(&self) -> Option<&str> {
        self.encoded.fallback.as_deref()
    }
}

/// A message whose envelope has been parsed but not decoded
///
/// Useful for relaying content types this client has no codec for.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_inbox_id: String,
    pub sent_at_ns: i64,
    pub delivery_status: DeliveryStatus,
    pub encoded_content: EncodedContent,
}

impl DecryptedMessage {
    pub fn sent_at(&self) -> Timestamp {
        Timestamp::from_nanos(self.sent_at_ns)
    }
}

/// One raw record viewed through a client
pub struct MessageProjection<'a> {
    client: &'a Client,
    raw: RawMessage,
}

impl<'a> MessageProjection<'a> {
    pub fn new(client: &'a Client, raw: RawMessage) -> Self {
        Self { client, raw }
    }

    pub fn raw(&self) -> &RawMessage {
        &self.raw
    }

    /// Parse the envelope and decode it with the registered codec
    pub fn decode(self) -> DmResult<DecodedMessage> {
        let encoded = EncodedContent::from_bytes(&self.raw.content)?;
        let content = decode_content(
            self.client.codec_registry(),
            &encoded,
            self.client.config().codec.max_decompressed_bytes,
        )?;

        Ok(DecodedMessage {
            id: hex::encode(&self.raw.id),
            conversation_id: hex::encode(&self.raw.conversation_id),
            sender_inbox_id: self.raw.sender_inbox_id,
            sent_at_ns: self.raw.sent_at_ns,
            delivery_status: self.raw.delivery_status,
            encoded,
            content,
        })
    }

    /// [`decode`](Self::decode), logging and discarding any failure
    pub fn decode_or_none(self) -> Option<DecodedMessage> {
        let id = hex::encode(&self.raw.id);
        match self.decode() {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(message = %id, error = %e, "Dropping undecodable message");
                None
            }
        }
    }

    /// Parse the envelope only
    pub fn decrypt(self) -> DmResult<DecryptedMessage> {
        let encoded_content = EncodedContent::from_bytes(&self.raw.content)?;

        Ok(DecryptedMessage {
            id: hex::encode(&self.raw.id),
            conversation_id: hex::encode(&self.raw.conversation_id),
            sender_inbox_id: self.raw.sender_inbox_id,
            sent_at_ns: self.raw.sent_at_ns,
            delivery_status: self.raw.delivery_status,
            encoded_content,
        })
    }

    pub fn decrypt_or_none(self) -> Option<DecryptedMessage> {
        let id = hex::encode(&self.raw.id);
        match self.decrypt() {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(message = %id, error = %e, "Dropping malformed message");
                None
            }
        }
    }
}
