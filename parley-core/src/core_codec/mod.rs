//! Content codecs - typed payloads to transport-ready envelopes
//!
//! Every message that leaves a channel is an [`EncodedContent`] envelope tagged
//! with a [`ContentTypeId`]. A [`CodecRegistry`] maps those tags to
//! [`ContentCodec`] implementations which know how to encode, decode and
//! describe (fallback text) one kind of [`Content`].
//!
//! # Pipeline
//!
//! ```text
//! Content ──► registry.find(options.content_type) ──► codec.encode
//!                                                        │
//!                                      codec.fallback ◄──┤
//!                                                        ▼
//!                                   compress(options.compression)
//!                                                        │
//!                                                        ▼
//!                                               EncodedContent ──► bytes
//! ```
//!
//! Decoding runs the same steps in reverse, always decompressing before the
//! codec sees the payload.
//!
//! # Modules
//!
//! - [`registry`] - Type tag to codec lookup
//! - [`pipeline`] - Encode/decode orchestration and [`SendOptions`]
//! - [`envelope`] - The [`EncodedContent`] envelope and its wire form
//! - [`compression`] - Deflate/gzip payload compression
//! - [`text`], [`reaction`], [`read_receipt`], [`json`] - Codec implementations

pub mod codec;
pub mod compression;
pub mod content_type;
pub mod envelope;
pub mod errors;
pub mod json;
pub mod pipeline;
pub mod reaction;
pub mod read_receipt;
pub mod registry;
pub mod text;

pub use codec::{Content, ContentCodec};
pub use compression::Compression;
pub use content_type::{ContentTypeId, DEFAULT_AUTHORITY};
pub use envelope::EncodedContent;
pub use errors::{CodecError, CodecResult};
pub use json::JsonCodec;
pub use pipeline::{decode_content, encode_content, SendOptions};
pub use reaction::{Reaction, ReactionAction, ReactionCodec, ReactionSchema};
pub use read_receipt::{ReadReceipt, ReadReceiptCodec};
pub use registry::CodecRegistry;
pub use text::TextCodec;
