//! History queries
//!
//! Callers page through history with millisecond timestamps; the substrate
//! filters on nanoseconds. [`MessageQuery::to_list_options`] does the
//! translation and rejects values the substrate cannot represent.

use crate::core_dm::errors::{DmError, DmResult};
use crate::core_dm::substrate::{DeliveryStatus, ListMessagesOptions, SortDirection};
use crate::core_dm::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Delivery status predicate for history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatusFilter {
    /// No predicate
    #[default]
    All,
    Published,
    Unpublished,
    Failed,
}

impl DeliveryStatusFilter {
    fn to_status(self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatusFilter::All => None,
            DeliveryStatusFilter::Published => Some(DeliveryStatus::Published),
            DeliveryStatusFilter::Unpublished => Some(DeliveryStatus::Unpublished),
            DeliveryStatusFilter::Failed => Some(DeliveryStatus::Failed),
        }
    }
}

/// Filter and pagination options for channel history
///
/// The time window is half open: `after` is inclusive, `before` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageQuery {
    pub before: Option<Timestamp>,
    pub after: Option<Timestamp>,
    pub limit: Option<usize>,
    /// Newest first unless set to ascending
    pub direction: Option<SortDirection>,
    pub delivery_status: DeliveryStatusFilter,
}

impl MessageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, before: Timestamp) -> Self {
        self.before = Some(before);
        self
    }

    pub fn after(mut self, after: Timestamp) -> Self {
        self.after = Some(after);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn delivery_status(mut self, filter: DeliveryStatusFilter) -> Self {
        self.delivery_status = filter;
        self
    }

    /// Translate into substrate query options
    pub fn to_list_options(&self) -> DmResult<ListMessagesOptions> {
        let limit = self
            .limit
            .map(|limit| {
                i64::try_from(limit)
                    .map_err(|_| DmError::InvalidQuery(format!("limit {} is too large", limit)))
            })
            .transpose()?;

        Ok(ListMessagesOptions {
            sent_before_ns: self.before.map(|ts| to_nanos("before", ts)).transpose()?,
            sent_after_ns: self.after.map(|ts| to_nanos("after", ts)).transpose()?,
            limit,
            delivery_status: self.delivery_status.to_status(),
            direction: Some(self.direction.unwrap_or(SortDirection::Descending)),
        })
    }
}

fn to_nanos(field: &str, ts: Timestamp) -> DmResult<i64> {
    ts.checked_nanos()
        .ok_or_else(|| DmError::InvalidQuery(format!("{} = {}ms overflows nanoseconds", field, ts)))
}
