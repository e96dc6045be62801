//! Parley core library
//!
//! Direct-message channels on top of a secure group-messaging substrate:
//! typed content codecs, consent-gated sending, history queries and live
//! message streams.
//!
//! # Modules
//!
//! - [`core_codec`] - Content types, codec registry, envelope encoding
//! - [`core_dm`] - Direct channels, consent, history and streaming
//! - [`config`] - Configuration from files and environment
//! - [`logging`] - `tracing` subscriber setup

pub mod config;
pub mod core_codec;
pub mod core_dm;
pub mod logging;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use core_codec::{CodecRegistry, Content, ContentTypeId, EncodedContent, SendOptions};
pub use core_dm::{Client, ConsentState, DecodedMessage, Dm, DmError, DmResult, MessageQuery, Timestamp};
pub use logging::{init_logging, LogLevel};
