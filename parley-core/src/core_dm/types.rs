/*
    types.rs - Common types for the channel layer

    Defines:
    - Millisecond timestamps and their nanosecond conversions
    - Conversation topics
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds per millisecond, the scale between caller and substrate time
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current wall-clock time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Truncate a substrate nanosecond timestamp; negative values clamp to zero
    pub fn from_nanos(nanos: i64) -> Self {
        Timestamp((nanos.max(0) / NANOS_PER_MILLI) as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Exact nanosecond value, or `None` if it does not fit in an `i64`
    pub fn checked_nanos(&self) -> Option<i64> {
        i64::try_from(self.0).ok()?.checked_mul(NANOS_PER_MILLI)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pub/sub topic carrying a conversation's messages
pub fn group_message_topic(conversation_id: &str) -> String {
    format!("/parley/mls/1/g-{}/proto", conversation_id)
}
